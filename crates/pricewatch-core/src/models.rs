use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A monitored product, as handed to the orchestrator for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub user_id: Uuid,
    pub description: String,
    /// Page the crawler is pointed at.
    pub link: String,
    /// Highest price (minor currency unit) the user is willing to pay.
    pub max_price: i64,
    /// Selects which configured crawler executable handles this product.
    pub crawler_name: String,
    pub active: bool,
}

impl Product {
    /// A zero price never counts as being under the limit.
    pub fn is_below_max_price(&self, price: i64) -> bool {
        price != 0 && price <= self.max_price
    }
}

/// A value the crawler may or may not have reported.
///
/// The crawler prints the literal `None` when it could not find a field; that
/// is kept apart from a reported zero or empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reported<T> {
    Present(T),
    Absent,
}

impl<T> Default for Reported<T> {
    fn default() -> Self {
        Reported::Absent
    }
}

impl<T> Reported<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Reported::Absent)
    }

    pub fn as_option(&self) -> Option<&T> {
        match self {
            Reported::Present(v) => Some(v),
            Reported::Absent => None,
        }
    }
}

impl<T> From<Option<T>> for Reported<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Reported::Absent, Reported::Present)
    }
}

impl Reported<i64> {
    /// Numeric value for price arithmetic; absent counts as `0`.
    pub fn value_or_zero(&self) -> i64 {
        match self {
            Reported::Present(v) => *v,
            Reported::Absent => 0,
        }
    }
}

/// Structured form of one crawler output line.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ParsedCrawlResult {
    pub price: Reported<i64>,
    pub original_price: Reported<i64>,
    pub discount: Reported<String>,
    pub link: Reported<String>,
}

/// Captured streams of one crawler invocation.
#[derive(Debug, Clone)]
pub struct RawCrawlOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

/// A product paired with the resolved location of its crawler.
#[derive(Debug, Clone)]
pub struct CrawlJob {
    pub product: Product,
    /// Absolute path of the crawler entry point.
    pub crawler_path: PathBuf,
    /// Dependency manifest co-located with the entry point.
    pub manifest_path: PathBuf,
}

/// A persisted price observation. Never mutated after insertion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSearchRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    /// Observed price, minor currency unit.
    pub price: i64,
    pub original_price: Option<i64>,
    pub discount: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// DTO for inserting a new price observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPriceSearchRecord {
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub price: i64,
    pub original_price: Option<i64>,
    pub discount: Option<String>,
}

impl NewPriceSearchRecord {
    pub fn from_parsed(product: &Product, parsed: &ParsedCrawlResult) -> Self {
        Self {
            user_id: product.user_id,
            product_id: product.id,
            price: parsed.price.value_or_zero(),
            original_price: parsed.original_price.as_option().copied(),
            discount: parsed.discount.as_option().cloned(),
        }
    }

    pub fn is_price_valid(&self) -> bool {
        self.price > 0
    }
}

/// Message published when a price is worth telling the user about.
///
/// Keys are PascalCase on the wire, the shape downstream consumers read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NotificationPayload {
    pub description: String,
    pub price: f64,
    pub avg_price: f64,
    /// Discount announced by the retailer, as reported by the crawler.
    pub discount: Option<String>,
    /// Discount of the current price over the rolling average, e.g. `"0.99"`.
    pub avg_discount: String,
    pub link: String,
    #[serde(rename = "UserID")]
    pub user_id: Uuid,
}
