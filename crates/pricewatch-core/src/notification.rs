use crate::decision::{Decision, PriceDecisionEngine};
use crate::error::AppError;
use crate::job::JobOutcome;
use crate::models::{NewPriceSearchRecord, ParsedCrawlResult, Product};
use crate::traits::{HistoryStore, NotificationSink};

/// Runs a parsed crawl result through validation, persistence and delivery.
///
/// 1. Reject invalid prices (nothing is written)
/// 2. Persist the observation
/// 3. Stop if the price is above the product's limit
/// 4. Load earlier observations and decide against the rolling average
/// 5. Publish the notification; delivery failures are logged, not returned
#[derive(Clone)]
pub struct NotificationService<H, N>
where
    H: HistoryStore,
    N: NotificationSink,
{
    engine: PriceDecisionEngine,
    store: H,
    sink: N,
}

impl<H, N> NotificationService<H, N>
where
    H: HistoryStore,
    N: NotificationSink,
{
    pub fn new(store: H, sink: N) -> Self {
        Self {
            engine: PriceDecisionEngine::new(),
            store,
            sink,
        }
    }

    pub async fn execute(
        &self,
        product: &Product,
        parsed: &ParsedCrawlResult,
    ) -> Result<JobOutcome, AppError> {
        let current = NewPriceSearchRecord::from_parsed(product, parsed);

        if let Err(e) = self.engine.validate(&current) {
            tracing::info!(product_id = %product.id, price = current.price, "Invalid price, not persisting");
            return Err(e);
        }

        let record_id = self.store.insert(&current).await?;
        tracing::debug!(product_id = %product.id, %record_id, price = current.price, "Price observation saved");

        if !product.is_below_max_price(current.price) {
            tracing::info!(
                product_id = %product.id,
                price = current.price,
                max_price = product.max_price,
                "Price above maximum"
            );
            return Ok(JobOutcome::Persisted);
        }

        let history: Vec<_> = self
            .store
            .query_by_product(product.id)
            .await?
            .into_iter()
            .filter(|r| r.id != record_id)
            .collect();

        let payload = match self.engine.decide(product, &current, &history)? {
            Decision::Notify(payload) => payload,
            Decision::AboveMaxPrice => return Ok(JobOutcome::Persisted),
        };

        tracing::info!(
            product_id = %product.id,
            price = payload.price,
            avg_price = payload.avg_price,
            avg_discount = %payload.avg_discount,
            history_len = history.len(),
            "Price within range, notifying"
        );

        match self.sink.publish(&payload).await {
            Ok(()) => Ok(JobOutcome::Notified),
            Err(e) => {
                tracing::warn!(product_id = %product.id, error = %e, "Notification delivery failed");
                Ok(JobOutcome::Persisted)
            }
        }
    }
}
