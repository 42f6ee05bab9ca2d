pub mod stdout;
pub mod webhook;

pub use stdout::StdoutSink;
pub use webhook::WebhookSink;
