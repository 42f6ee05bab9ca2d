use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::crawler::CrawlerRegistry;
use crate::error::AppError;
use crate::job::{JobOutcome, JobState, OrchestratorConfig, RunSummary, SkipReason};
use crate::models::Product;
use crate::notification::NotificationService;
use crate::parser::OutputParser;
use crate::traits::{CrawlerRunner, HistoryStore, NotificationSink, ProductSource};

/// Events emitted by the orchestrator for monitoring/logging.
#[derive(Debug, Clone)]
pub enum OrchestratorEvent<'a> {
    RunStarted {
        run_id: Uuid,
        jobs: usize,
        workers: usize,
    },
    ProductDropped {
        product_id: Uuid,
        reason: &'a str,
    },
    JobStarted {
        worker: usize,
        product_id: Uuid,
        crawler: &'a str,
    },
    JobCompleted {
        product_id: Uuid,
        outcome: &'a JobOutcome,
    },
    JobSkipped {
        product_id: Uuid,
        reason: SkipReason,
        error: &'a str,
    },
    JobFailed {
        product_id: Uuid,
        error: &'a str,
    },
    Cancelled {
        run_id: Uuid,
    },
    RunFinished {
        run_id: Uuid,
        summary: &'a RunSummary,
    },
}

/// Trait for receiving orchestrator events (decoupled logging).
pub trait OrchestratorReporter: Send + Sync {
    fn report(&self, event: OrchestratorEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl OrchestratorReporter for TracingReporter {
    fn report(&self, event: OrchestratorEvent<'_>) {
        match event {
            OrchestratorEvent::RunStarted {
                run_id,
                jobs,
                workers,
            } => {
                tracing::info!(%run_id, %jobs, %workers, "Crawl run started");
            }
            OrchestratorEvent::ProductDropped { product_id, reason } => {
                tracing::debug!(%product_id, %reason, "Product not enqueued");
            }
            OrchestratorEvent::JobStarted {
                worker,
                product_id,
                crawler,
            } => {
                tracing::debug!(%worker, %product_id, %crawler, "Processing job");
            }
            OrchestratorEvent::JobCompleted {
                product_id,
                outcome,
            } => {
                tracing::info!(%product_id, outcome = outcome.label(), "Job completed");
            }
            OrchestratorEvent::JobSkipped {
                product_id,
                reason: SkipReason::InvalidPrice,
                error,
            } => {
                tracing::info!(%product_id, %error, "Job skipped");
            }
            OrchestratorEvent::JobSkipped {
                product_id,
                reason,
                error,
            } => {
                tracing::error!(%product_id, %reason, %error, "Job skipped");
            }
            OrchestratorEvent::JobFailed { product_id, error } => {
                tracing::error!(%product_id, %error, "Job failed");
            }
            OrchestratorEvent::Cancelled { run_id } => {
                tracing::warn!(%run_id, "Crawl run cancelled, no further jobs will start");
            }
            OrchestratorEvent::RunFinished { run_id, summary } => {
                tracing::info!(%run_id, %summary, "Crawl run finished");
            }
        }
    }
}

/// Fans a batch of products out to a fixed pool of crawler workers.
///
/// Each run spawns a producer feeding a bounded job queue, `worker_count`
/// workers consuming it, and a drain task tallying outcomes. Job-level
/// failures end up in the [`RunSummary`]; only infrastructure failures are
/// returned as errors.
pub struct CrawlOrchestrator<R, H, N>
where
    R: CrawlerRunner,
    H: HistoryStore,
    N: NotificationSink,
{
    registry: Arc<CrawlerRegistry>,
    runner: R,
    service: NotificationService<H, N>,
    parser: OutputParser,
    config: OrchestratorConfig,
    reporter: Arc<dyn OrchestratorReporter>,
}

impl<R, H, N> CrawlOrchestrator<R, H, N>
where
    R: CrawlerRunner + 'static,
    H: HistoryStore + 'static,
    N: NotificationSink + 'static,
{
    pub fn new(
        registry: CrawlerRegistry,
        runner: R,
        service: NotificationService<H, N>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            runner,
            service,
            parser: OutputParser::new(),
            config,
            reporter: Arc::new(TracingReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn OrchestratorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Fetch the crawlable products from `source` and run them.
    pub async fn run_from_source<P: ProductSource>(
        &self,
        source: &P,
    ) -> Result<RunSummary, AppError> {
        let products = source.get_crawlable_products().await?;
        self.run(products).await
    }

    /// Run every product to a terminal outcome.
    pub async fn run(&self, products: Vec<Product>) -> Result<RunSummary, AppError> {
        self.run_until_cancelled(products, CancellationToken::new())
            .await
    }

    /// Like [`run`](Self::run), but stops starting new jobs once `cancel` fires.
    /// Jobs already running finish; products left in the queue count as dropped.
    pub async fn run_until_cancelled(
        &self,
        products: Vec<Product>,
        cancel: CancellationToken,
    ) -> Result<RunSummary, AppError> {
        let worker_count = self.config.worker_count;
        if worker_count == 0 {
            return Err(AppError::ConfigError(
                "worker count must be at least 1".into(),
            ));
        }

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("crawl_run", %run_id);

        async {
            let (batch, dropped) = self.prepare_batch(products);
            let enqueued = batch.len();
            self.reporter.report(OrchestratorEvent::RunStarted {
                run_id,
                jobs: enqueued,
                workers: worker_count,
            });

            let (job_tx, job_rx) = mpsc::channel::<Product>(worker_count);
            let job_rx = Arc::new(Mutex::new(job_rx));
            let (result_tx, result_rx) = mpsc::channel::<(Uuid, JobOutcome)>(worker_count);

            let producer = tokio::spawn(
                produce(batch, job_tx, cancel.clone()).instrument(tracing::Span::current()),
            );
            let tally = tokio::spawn(
                drain(result_rx, Arc::clone(&self.reporter)).instrument(tracing::Span::current()),
            );

            let mut workers = JoinSet::new();
            for index in 0..worker_count {
                let worker = Worker {
                    index,
                    registry: Arc::clone(&self.registry),
                    runner: self.runner.clone(),
                    service: self.service.clone(),
                    parser: self.parser,
                    crawl_timeout: self.config.crawl_timeout,
                    reporter: Arc::clone(&self.reporter),
                };
                workers.spawn(
                    worker
                        .run(Arc::clone(&job_rx), result_tx.clone(), cancel.clone())
                        .instrument(tracing::Span::current()),
                );
            }

            let mut panicked = None;
            while let Some(joined) = workers.join_next().await {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "Worker task failed");
                    panicked.get_or_insert(e.to_string());
                }
            }
            // All workers are done; closing the last sender lets the drain finish.
            drop(result_tx);

            let mut summary = tally
                .await
                .map_err(|e| AppError::WorkerPanicked(format!("drain task: {e}")))?;
            producer
                .await
                .map_err(|e| AppError::WorkerPanicked(format!("producer task: {e}")))?;

            if let Some(e) = panicked {
                return Err(AppError::WorkerPanicked(e));
            }

            if cancel.is_cancelled() {
                self.reporter.report(OrchestratorEvent::Cancelled { run_id });
            }

            summary.total = summary.completed();
            summary.dropped = dropped + (enqueued - summary.total);
            self.reporter.report(OrchestratorEvent::RunFinished {
                run_id,
                summary: &summary,
            });
            Ok(summary)
        }
        .instrument(span)
        .await
    }

    /// Drop inactive products and repeated ids (first occurrence wins).
    fn prepare_batch(&self, products: Vec<Product>) -> (Vec<Product>, usize) {
        let mut seen = HashSet::with_capacity(products.len());
        let mut batch = Vec::with_capacity(products.len());
        let mut dropped = 0;

        for product in products {
            let reason = if !product.active {
                "inactive"
            } else if !seen.insert(product.id) {
                "duplicate"
            } else {
                batch.push(product);
                continue;
            };
            self.reporter.report(OrchestratorEvent::ProductDropped {
                product_id: product.id,
                reason,
            });
            dropped += 1;
        }

        (batch, dropped)
    }
}

async fn produce(batch: Vec<Product>, jobs: mpsc::Sender<Product>, cancel: CancellationToken) {
    for product in batch {
        let product_id = product.id;
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            sent = jobs.send(product) => {
                if sent.is_err() {
                    break;
                }
                tracing::trace!(%product_id, state = %JobState::Queued);
            }
        }
    }
}

async fn drain(
    mut results: mpsc::Receiver<(Uuid, JobOutcome)>,
    reporter: Arc<dyn OrchestratorReporter>,
) -> RunSummary {
    let mut summary = RunSummary::default();
    while let Some((product_id, outcome)) = results.recv().await {
        if matches!(outcome, JobOutcome::Notified | JobOutcome::Persisted) {
            reporter.report(OrchestratorEvent::JobCompleted {
                product_id,
                outcome: &outcome,
            });
        }
        summary.record(&outcome);
    }
    summary
}

/// One slot of the pool. Owns clones of every collaborator it needs.
struct Worker<R, H, N>
where
    R: CrawlerRunner,
    H: HistoryStore,
    N: NotificationSink,
{
    index: usize,
    registry: Arc<CrawlerRegistry>,
    runner: R,
    service: NotificationService<H, N>,
    parser: OutputParser,
    crawl_timeout: Duration,
    reporter: Arc<dyn OrchestratorReporter>,
}

impl<R, H, N> Worker<R, H, N>
where
    R: CrawlerRunner,
    H: HistoryStore,
    N: NotificationSink,
{
    async fn run(
        self,
        jobs: Arc<Mutex<mpsc::Receiver<Product>>>,
        results: mpsc::Sender<(Uuid, JobOutcome)>,
        cancel: CancellationToken,
    ) {
        loop {
            let next = {
                let mut jobs = jobs.lock().await;
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => None,
                    product = jobs.recv() => product,
                }
            };
            let Some(product) = next else {
                break;
            };

            let product_id = product.id;
            let outcome = self.process(product).await;
            if results.send((product_id, outcome)).await.is_err() {
                break;
            }
        }
        tracing::debug!(worker = self.index, "Worker stopped");
    }

    async fn process(&self, product: Product) -> JobOutcome {
        let product_id = product.id;
        self.reporter.report(OrchestratorEvent::JobStarted {
            worker: self.index,
            product_id,
            crawler: &product.crawler_name,
        });

        let outcome = match self.try_process(product).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let error = e.to_string();
                match SkipReason::from_error(&e) {
                    Some(reason) => {
                        self.reporter.report(OrchestratorEvent::JobSkipped {
                            product_id,
                            reason,
                            error: &error,
                        });
                        JobOutcome::Skipped(reason)
                    }
                    None => {
                        self.reporter.report(OrchestratorEvent::JobFailed {
                            product_id,
                            error: &error,
                        });
                        JobOutcome::Failed(error)
                    }
                }
            }
        };
        tracing::trace!(%product_id, state = %JobState::Terminal, outcome = outcome.label());
        outcome
    }

    async fn try_process(&self, product: Product) -> Result<JobOutcome, AppError> {
        let product_id = product.id;
        tracing::trace!(%product_id, state = %JobState::Resolving);
        let job = self.registry.resolve(product)?;
        let env = self.registry.environment_for(&job);

        tracing::trace!(%product_id, state = %JobState::Running);
        let output = tokio::time::timeout(self.crawl_timeout, self.runner.run(&job, &env))
            .await
            .map_err(|_| AppError::Timeout(self.crawl_timeout.as_millis() as u64))??;

        let parsed = self.parser.parse(&output.stdout)?;
        tracing::trace!(%product_id, state = %JobState::Parsed);

        let outcome = self.service.execute(&job.product, &parsed).await?;
        tracing::trace!(%product_id, state = %JobState::Decided, outcome = outcome.label());
        Ok(outcome)
    }
}
