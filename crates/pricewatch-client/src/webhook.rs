use std::time::Duration;

use pricewatch_core::error::AppError;
use pricewatch_core::models::NotificationPayload;
use pricewatch_core::traits::NotificationSink;
use reqwest::Client;
use url::Url;

/// Delivers notifications by POSTing the payload as JSON to a fixed URL.
#[derive(Clone)]
pub struct WebhookSink {
    client: Client,
    url: Url,
}

impl WebhookSink {
    pub fn new(url: &str) -> Result<Self, AppError> {
        Self::with_timeout(url, Duration::from_secs(10))
    }

    pub fn with_timeout(url: &str, timeout: Duration) -> Result<Self, AppError> {
        let url = Url::parse(url)
            .map_err(|e| AppError::ConfigError(format!("Invalid webhook URL '{url}': {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AppError::ConfigError(format!(
                "Webhook URL scheme '{}' is not allowed (only http/https)",
                url.scheme()
            )));
        }

        let client = Client::builder()
            .user_agent(concat!("pricewatch/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self { client, url })
    }
}

impl NotificationSink for WebhookSink {
    async fn publish(&self, payload: &NotificationPayload) -> Result<(), AppError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::DeliveryError(format!("Webhook timed out: {e}"))
                } else {
                    AppError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::DeliveryError(format!(
                "Webhook responded HTTP {}",
                status.as_u16()
            )));
        }

        tracing::debug!(user_id = %payload.user_id, url = %self.url, "Notification delivered");
        Ok(())
    }
}
