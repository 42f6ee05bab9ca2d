//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::job::SkipReason;
use crate::models::{
    CrawlJob, NewPriceSearchRecord, NotificationPayload, PriceSearchRecord, Product,
    RawCrawlOutput,
};
use crate::orchestrator::{OrchestratorEvent, OrchestratorReporter};
use crate::traits::{CrawlerRunner, HistoryStore, NotificationSink, ProductSource};

// ---------------------------------------------------------------------------
// MockProductSource
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct MockProductSource {
    products: Arc<Mutex<Vec<Product>>>,
    error: Arc<Mutex<Option<AppError>>>,
}

impl MockProductSource {
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            products: Arc::new(Mutex::new(products)),
            error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_error(error: AppError) -> Self {
        Self {
            products: Arc::new(Mutex::new(Vec::new())),
            error: Arc::new(Mutex::new(Some(error))),
        }
    }
}

impl ProductSource for MockProductSource {
    async fn get_crawlable_products(&self) -> Result<Vec<Product>, AppError> {
        if let Some(e) = self.error.lock().unwrap().take() {
            return Err(e);
        }
        Ok(self.products.lock().unwrap().clone())
    }
}

// ---------------------------------------------------------------------------
// MockHistoryStore
// ---------------------------------------------------------------------------

/// In-memory history store. Inserts are recorded and become visible to
/// later queries, like the real table.
#[derive(Clone)]
pub struct MockHistoryStore {
    pub inserted: Arc<Mutex<Vec<NewPriceSearchRecord>>>,
    history: Arc<Mutex<Vec<PriceSearchRecord>>>,
    insert_error: Arc<Mutex<Option<AppError>>>,
    query_error: Arc<Mutex<Option<AppError>>>,
    queries: Arc<AtomicUsize>,
}

impl MockHistoryStore {
    pub fn empty() -> Self {
        Self::with_history(Vec::new())
    }

    /// Store preloaded with earlier observations.
    pub fn with_history(history: Vec<PriceSearchRecord>) -> Self {
        Self {
            inserted: Arc::new(Mutex::new(Vec::new())),
            history: Arc::new(Mutex::new(history)),
            insert_error: Arc::new(Mutex::new(None)),
            query_error: Arc::new(Mutex::new(None)),
            queries: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Store whose next insert fails.
    pub fn with_insert_error(error: AppError) -> Self {
        let store = Self::empty();
        *store.insert_error.lock().unwrap() = Some(error);
        store
    }

    /// Store whose next history query fails.
    pub fn with_query_error(error: AppError) -> Self {
        let store = Self::empty();
        *store.query_error.lock().unwrap() = Some(error);
        store
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl HistoryStore for MockHistoryStore {
    async fn insert(&self, record: &NewPriceSearchRecord) -> Result<Uuid, AppError> {
        if let Some(e) = self.insert_error.lock().unwrap().take() {
            return Err(e);
        }
        let id = Uuid::new_v4();
        self.inserted.lock().unwrap().push(record.clone());
        self.history.lock().unwrap().push(PriceSearchRecord {
            id,
            user_id: record.user_id,
            product_id: record.product_id,
            price: record.price,
            original_price: record.original_price,
            discount: record.discount.clone(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn query_by_product(&self, product_id: Uuid) -> Result<Vec<PriceSearchRecord>, AppError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.query_error.lock().unwrap().take() {
            return Err(e);
        }
        let history = self.history.lock().unwrap();
        Ok(history
            .iter()
            .filter(|r| r.product_id == product_id)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// MockSink
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct MockSink {
    pub published: Arc<Mutex<Vec<NotificationPayload>>>,
    error: Arc<Mutex<Option<AppError>>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink whose next publish fails.
    pub fn with_error(error: AppError) -> Self {
        Self {
            published: Arc::new(Mutex::new(Vec::new())),
            error: Arc::new(Mutex::new(Some(error))),
        }
    }
}

impl NotificationSink for MockSink {
    async fn publish(&self, payload: &NotificationPayload) -> Result<(), AppError> {
        if let Some(e) = self.error.lock().unwrap().take() {
            return Err(e);
        }
        self.published.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockRunner
// ---------------------------------------------------------------------------

/// What a mock crawler invocation does.
#[derive(Debug, Clone)]
pub enum MockCrawl {
    /// Exit 0 with this stdout.
    Output(String),
    /// Fail with an execution error carrying this message.
    Fail(String),
    /// Never finish.
    Hang,
}

/// Recorded invocation: (product link, environment).
pub type RunnerCall = (String, HashMap<String, String>);

/// Runner answering per product link, with a fallback for unknown links.
#[derive(Clone)]
pub struct MockRunner {
    responses: Arc<Mutex<HashMap<String, MockCrawl>>>,
    fallback: MockCrawl,
    pub calls: Arc<Mutex<Vec<RunnerCall>>>,
}

impl MockRunner {
    /// Every invocation prints `stdout`.
    pub fn new(stdout: &str) -> Self {
        Self::with_fallback(MockCrawl::Output(stdout.to_string()))
    }

    pub fn with_fallback(fallback: MockCrawl) -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            fallback,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Override the behaviour for one product link.
    pub fn respond(self, link: &str, crawl: MockCrawl) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(link.to_string(), crawl);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl CrawlerRunner for MockRunner {
    async fn run(
        &self,
        job: &CrawlJob,
        env: &HashMap<String, String>,
    ) -> Result<RawCrawlOutput, AppError> {
        let link = job.product.link.clone();
        self.calls.lock().unwrap().push((link.clone(), env.clone()));
        let crawl = self
            .responses
            .lock()
            .unwrap()
            .get(&link)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone());

        match crawl {
            MockCrawl::Output(stdout) => Ok(RawCrawlOutput {
                stdout,
                stderr: String::new(),
                exit_code: Some(0),
            }),
            MockCrawl::Fail(msg) => Err(AppError::ExecutionError(msg)),
            MockCrawl::Hang => std::future::pending().await,
        }
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Mock orchestrator reporter that records event labels and skip reasons.
#[derive(Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
    pub skips: Arc<Mutex<Vec<SkipReason>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, label: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| *e == label)
            .count()
    }
}

impl OrchestratorReporter for MockReporter {
    fn report(&self, event: OrchestratorEvent<'_>) {
        let label = match &event {
            OrchestratorEvent::RunStarted { .. } => "RunStarted",
            OrchestratorEvent::ProductDropped { .. } => "ProductDropped",
            OrchestratorEvent::JobStarted { .. } => "JobStarted",
            OrchestratorEvent::JobCompleted { .. } => "JobCompleted",
            OrchestratorEvent::JobSkipped { .. } => "JobSkipped",
            OrchestratorEvent::JobFailed { .. } => "JobFailed",
            OrchestratorEvent::Cancelled { .. } => "Cancelled",
            OrchestratorEvent::RunFinished { .. } => "RunFinished",
        };
        if let OrchestratorEvent::JobSkipped { reason, .. } = &event {
            self.skips.lock().unwrap().push(*reason);
        }
        self.events.lock().unwrap().push(label.to_string());
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Create an active product handled by `crawler_name`.
pub fn make_test_product(crawler_name: &str, max_price: i64) -> Product {
    let id = Uuid::new_v4();
    Product {
        id,
        user_id: Uuid::new_v4(),
        description: "Kindle Paperwhite".to_string(),
        link: format!("https://shop.test/p/{id}"),
        max_price,
        crawler_name: crawler_name.to_string(),
        active: true,
    }
}

/// Earlier observations for `product`, oldest first, one hour apart.
pub fn make_history(product: &Product, prices: &[i64]) -> Vec<PriceSearchRecord> {
    let start = Utc::now() - Duration::hours(prices.len() as i64);
    prices
        .iter()
        .enumerate()
        .map(|(i, &price)| PriceSearchRecord {
            id: Uuid::new_v4(),
            user_id: product.user_id,
            product_id: product.id,
            price,
            original_price: None,
            discount: None,
            created_at: start + Duration::hours(i as i64),
        })
        .collect()
}

/// A crawler output line reporting `price`.
pub fn product_line(price: i64, link: &str) -> String {
    format!("Product(price={price}, original_price=None, discount=None, link='{link}')")
}
