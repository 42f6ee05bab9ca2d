use pricewatch_core::error::AppError;
use pricewatch_core::models::NotificationPayload;
use pricewatch_core::traits::NotificationSink;
use tokio::io::AsyncWriteExt;

/// Writes each payload as one JSON line on stdout, for a queue shipper to pick up.
#[derive(Debug, Clone, Default)]
pub struct StdoutSink;

impl StdoutSink {
    pub fn new() -> Self {
        Self
    }
}

/// Serialize `payload` as a single newline-terminated JSON line.
pub fn json_line(payload: &NotificationPayload) -> Result<String, AppError> {
    let mut line = serde_json::to_string(payload)?;
    line.push('\n');
    Ok(line)
}

impl NotificationSink for StdoutSink {
    async fn publish(&self, payload: &NotificationPayload) -> Result<(), AppError> {
        let line = json_line(payload)?;
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(line.as_bytes())
            .await
            .map_err(|e| AppError::DeliveryError(format!("stdout write failed: {e}")))?;
        stdout
            .flush()
            .await
            .map_err(|e| AppError::DeliveryError(format!("stdout flush failed: {e}")))
    }
}
