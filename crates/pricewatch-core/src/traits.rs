use std::collections::HashMap;
use std::future::Future;

use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    CrawlJob, NewPriceSearchRecord, NotificationPayload, PriceSearchRecord, Product,
    RawCrawlOutput,
};

/// Yields the batch of products a run should crawl.
pub trait ProductSource: Send + Sync + Clone {
    /// Current active-product set. No pagination.
    fn get_crawlable_products(&self) -> impl Future<Output = Result<Vec<Product>, AppError>> + Send;
}

/// Append-only store of price observations.
///
/// Implementations are shared across workers and must tolerate concurrent calls.
pub trait HistoryStore: Send + Sync + Clone {
    /// Insert a new observation. Returns the generated UUID.
    fn insert(
        &self,
        record: &NewPriceSearchRecord,
    ) -> impl Future<Output = Result<Uuid, AppError>> + Send;

    /// All observations for a product, oldest first.
    fn query_by_product(
        &self,
        product_id: Uuid,
    ) -> impl Future<Output = Result<Vec<PriceSearchRecord>, AppError>> + Send;
}

/// Delivers notification payloads. Fire-and-forget from the caller's view.
pub trait NotificationSink: Send + Sync + Clone {
    fn publish(
        &self,
        payload: &NotificationPayload,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Invokes an external crawler for one job and captures its output.
pub trait CrawlerRunner: Send + Sync + Clone {
    /// `env` holds variables set for this invocation only.
    fn run(
        &self,
        job: &CrawlJob,
        env: &HashMap<String, String>,
    ) -> impl Future<Output = Result<RawCrawlOutput, AppError>> + Send;
}

/// A sink that only logs payloads, for runs where delivery is not wanted.
#[derive(Debug, Clone)]
pub struct LogSink;

impl NotificationSink for LogSink {
    async fn publish(&self, payload: &NotificationPayload) -> Result<(), AppError> {
        tracing::info!(
            user_id = %payload.user_id,
            description = %payload.description,
            price = payload.price,
            avg_price = payload.avg_price,
            avg_discount = %payload.avg_discount,
            link = %payload.link,
            "Price notification"
        );
        Ok(())
    }
}
