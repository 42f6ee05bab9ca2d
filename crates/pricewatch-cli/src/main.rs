use std::io::Read;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::builder::RangedU64ValueParser;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use pricewatch_client::{StdoutSink, WebhookSink};
use pricewatch_core::error::AppError;
use pricewatch_core::models::NotificationPayload;
use pricewatch_core::traits::{LogSink, NotificationSink, ProductSource};
use pricewatch_core::{
    CrawlOrchestrator, CrawlerConfig, CrawlerRegistry, NotificationService, OutputParser,
    ProcessCrawlerRunner,
};
use pricewatch_db::{Database, DatabaseConfig};

#[derive(Parser)]
#[command(name = "pricewatch", version, about = "Crawl products and notify on price drops")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl every active product once and notify on good prices
    Run {
        /// Concurrent crawler slots (overrides PRICEWATCH_NUM_CRAWLERS)
        #[arg(short, long, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
        workers: Option<usize>,

        /// Per-crawler deadline in seconds (overrides PRICEWATCH_CRAWL_TIMEOUT_SECS)
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
        timeout_secs: Option<u64>,

        /// POST notifications as JSON to this URL
        #[arg(long, env = "PRICEWATCH_WEBHOOK_URL", conflicts_with = "stdout")]
        webhook_url: Option<String>,

        /// Print notifications as JSON lines on stdout
        #[arg(long, default_value_t = false)]
        stdout: bool,
    },

    /// Parse one crawler output line and print it as JSON
    Parse {
        /// Output line; read from stdin when omitted
        line: Option<String>,
    },

    /// Show stored price history for a product
    History {
        /// Product ID
        #[arg(short, long)]
        product_id: Uuid,

        /// Number of observations to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    // stdout is reserved for notification lines and command output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pricewatch=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            workers,
            timeout_secs,
            webhook_url,
            stdout,
        } => {
            let sink = match (webhook_url, stdout) {
                (Some(url), _) => Sink::Webhook(
                    WebhookSink::new(&url).map_err(|e| anyhow::anyhow!(e))?,
                ),
                (None, true) => Sink::Stdout(StdoutSink::new()),
                (None, false) => Sink::Log(LogSink),
            };
            cmd_run(workers, timeout_secs, sink).await?;
        }
        Commands::Parse { line } => {
            let line = match line {
                Some(line) => line,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("Failed to read crawler output from stdin")?;
                    buf
                }
            };
            cmd_parse(&line)?;
        }
        Commands::History { product_id, limit } => {
            let db = connect_db().await?;
            cmd_history(&db, product_id, limit).await?;
        }
    }

    Ok(())
}

/// Connect to PostgreSQL using DATABASE_URL and apply migrations.
async fn connect_db() -> Result<Database> {
    let config = DatabaseConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    let db = Database::connect(&config)
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to connect to database")?;
    db.migrate().await.map_err(|e| anyhow::anyhow!(e))?;
    Ok(db)
}

async fn cmd_run(workers: Option<usize>, timeout_secs: Option<u64>, sink: Sink) -> Result<()> {
    let mut config = CrawlerConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    if let Some(workers) = workers {
        config.num_crawlers = workers;
    }
    if let Some(secs) = timeout_secs {
        config.crawl_timeout = Duration::from_secs(secs);
    }

    let registry = CrawlerRegistry::from_config(&config).map_err(|e| anyhow::anyhow!(e))?;
    let runner = ProcessCrawlerRunner::from_config(&config);

    let db = connect_db().await?;
    let products = db
        .product_repo()
        .get_crawlable_products()
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!(
        products = products.len(),
        crawlers = registry.crawler_count(),
        workers = config.num_crawlers,
        sink = sink.name(),
        "Starting crawl run"
    );

    let service = NotificationService::new(db.history_repo(), sink);
    let orchestrator =
        CrawlOrchestrator::new(registry, runner, service, config.orchestrator_config());

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing running crawlers");
            on_signal.cancel();
        }
    });

    let summary = orchestrator
        .run_until_cancelled(products, cancel)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    eprintln!("{summary}");
    Ok(())
}

fn cmd_parse(line: &str) -> Result<()> {
    let parsed = OutputParser::new()
        .parse(line)
        .map_err(|e| anyhow::anyhow!(e))?;
    println!("{}", serde_json::to_string_pretty(&parsed)?);
    Ok(())
}

async fn cmd_history(db: &Database, product_id: Uuid, limit: usize) -> Result<()> {
    let product = db
        .product_repo()
        .get_product(product_id)
        .await
        .map_err(|e| anyhow::anyhow!(e))?
        .with_context(|| format!("No product with id {product_id}"))?;

    let history = db
        .history_repo()
        .get_recent(product_id, limit)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    println!(
        "{} (max {}, crawler {})",
        product.description, product.max_price, product.crawler_name
    );
    if history.is_empty() {
        println!("No observations recorded.");
        return Ok(());
    }

    for record in &history {
        println!(
            "  {}  {:>10}  original {:>10}  discount {}",
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            record.price,
            record
                .original_price
                .map_or_else(|| "-".to_string(), |p| p.to_string()),
            record.discount.as_deref().unwrap_or("-"),
        );
    }

    Ok(())
}

/// Notification sink picked on the command line.
#[derive(Clone)]
enum Sink {
    Webhook(WebhookSink),
    Stdout(StdoutSink),
    Log(LogSink),
}

impl Sink {
    fn name(&self) -> &'static str {
        match self {
            Sink::Webhook(_) => "webhook",
            Sink::Stdout(_) => "stdout",
            Sink::Log(_) => "log",
        }
    }
}

impl NotificationSink for Sink {
    async fn publish(&self, payload: &NotificationPayload) -> Result<(), AppError> {
        match self {
            Sink::Webhook(sink) => sink.publish(payload).await,
            Sink::Stdout(sink) => sink.publish(payload).await,
            Sink::Log(sink) => sink.publish(payload).await,
        }
    }
}
