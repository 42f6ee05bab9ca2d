use thiserror::Error;

/// Application-wide error types for pricewatch.
#[derive(Error, Debug)]
pub enum AppError {
    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The product names a crawler that is not configured.
    #[error("Unknown crawler '{0}'")]
    UnknownCrawler(String),

    /// The crawler process could not be launched or exited unsuccessfully.
    #[error("Crawler execution failed: {0}")]
    ExecutionError(String),

    /// The crawler process did not finish before its deadline.
    #[error("Crawler timed out after {0} ms")]
    Timeout(u64),

    /// Crawler output does not match the `Product(...)` grammar.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The crawler reported a price that is zero or negative.
    #[error("Invalid price result: {0} (must be > 0)")]
    InvalidPrice(i64),

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Publishing a notification failed.
    #[error("Delivery error: {0}")]
    DeliveryError(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// A worker task panicked or was aborted.
    #[error("Worker task failed: {0}")]
    WorkerPanicked(String),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

/// Coarse classification of an [`AppError`], used to pick a job's terminal outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Execution,
    Parse,
    Validation,
    Persistence,
    Delivery,
    Infrastructure,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::ConfigError(_) | AppError::UnknownCrawler(_) => ErrorKind::Configuration,
            AppError::ExecutionError(_) | AppError::Timeout(_) => ErrorKind::Execution,
            AppError::ParseError(_) => ErrorKind::Parse,
            AppError::InvalidPrice(_) => ErrorKind::Validation,
            AppError::DatabaseError(_) => ErrorKind::Persistence,
            AppError::DeliveryError(_) | AppError::HttpError(_) => ErrorKind::Delivery,
            AppError::SerializationError(_)
            | AppError::WorkerPanicked(_)
            | AppError::Generic(_) => ErrorKind::Infrastructure,
        }
    }
}
