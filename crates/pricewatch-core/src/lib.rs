pub mod config;
pub mod crawler;
pub mod decision;
pub mod error;
pub mod job;
pub mod models;
pub mod notification;
pub mod orchestrator;
pub mod parser;
pub mod traits;

#[cfg(test)]
pub mod testutil;

pub use config::CrawlerConfig;
pub use crawler::{CrawlerRegistry, ProcessCrawlerRunner};
pub use decision::{Decision, PriceDecisionEngine};
pub use error::{AppError, ErrorKind};
pub use job::{JobOutcome, OrchestratorConfig, RunSummary, SkipReason};
pub use notification::NotificationService;
pub use orchestrator::{CrawlOrchestrator, OrchestratorEvent, OrchestratorReporter, TracingReporter};
pub use parser::OutputParser;
