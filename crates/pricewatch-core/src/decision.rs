use crate::error::AppError;
use crate::models::{NewPriceSearchRecord, NotificationPayload, PriceSearchRecord, Product};

/// Outcome of judging one valid price observation.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// The price is within the user's limit; tell them.
    Notify(NotificationPayload),
    /// The price is above the user's limit.
    AboveMaxPrice,
}

impl Decision {
    pub fn should_notify(&self) -> bool {
        matches!(self, Decision::Notify(_))
    }
}

/// Stateless judge of whether a price observation is worth a notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct PriceDecisionEngine;

impl PriceDecisionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Reject observations that can never be persisted or notified.
    pub fn validate(&self, current: &NewPriceSearchRecord) -> Result<(), AppError> {
        if current.is_price_valid() {
            Ok(())
        } else {
            Err(AppError::InvalidPrice(current.price))
        }
    }

    /// Decide on `current` given the product's earlier observations.
    ///
    /// `history` must not contain `current` itself.
    pub fn decide(
        &self,
        product: &Product,
        current: &NewPriceSearchRecord,
        history: &[PriceSearchRecord],
    ) -> Result<Decision, AppError> {
        self.validate(current)?;

        if !product.is_below_max_price(current.price) {
            return Ok(Decision::AboveMaxPrice);
        }

        let avg_price = rolling_average_price(history, current.price);
        let avg_discount = discount_over_average(avg_price, current.price);

        Ok(Decision::Notify(NotificationPayload {
            description: product.description.clone(),
            price: current.price as f64,
            avg_price,
            discount: current.discount.clone(),
            avg_discount,
            link: product.link.clone(),
            user_id: product.user_id,
        }))
    }
}

/// Rolling mean over history plus the current observation, rounded to cents.
///
/// Units are mixed: stored prices are converted from minor to major units
/// (`/ 100`), the current price is added as-is. Recorded notifications were
/// computed this way; converting `current_price` too is the one-line fix once
/// that is confirmed.
///
/// The baseline also differs from a plain read-after-insert, independently of
/// the unit mix: `history` holds only earlier observations. Reading history
/// back after the insert would count the current price twice, so callers
/// filter the just-inserted record out before calling this.
pub fn rolling_average_price(history: &[PriceSearchRecord], current_price: i64) -> f64 {
    let history_sum: f64 = history.iter().map(|r| r.price as f64 / 100.0).sum();
    let sum = history_sum + current_price as f64;
    let avg = sum / (history.len() + 1) as f64;
    (avg * 100.0).round() / 100.0
}

/// Relative discount of the current price over the average, as `"0.00"`.
pub fn discount_over_average(avg_price: f64, current_price: i64) -> String {
    let current = current_price as f64 / 100.0;
    let discount = (avg_price - current) / avg_price;
    format!("{discount:.2}")
}
