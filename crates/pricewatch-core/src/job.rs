use std::fmt;
use std::time::Duration;

use crate::error::{AppError, ErrorKind};

/// Lifecycle of one crawl job inside a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Resolving,
    Running,
    Parsed,
    Decided,
    Terminal,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Resolving => "resolving",
            JobState::Running => "running",
            JobState::Parsed => "parsed",
            JobState::Decided => "decided",
            JobState::Terminal => "terminal",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a job ended without a persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Crawler identifier not configured.
    Configuration,
    /// Crawler failed to launch, exited non-zero or timed out.
    Execution,
    /// Crawler output did not match the record grammar.
    Parse,
    /// Price was zero or negative.
    InvalidPrice,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Configuration => "configuration",
            SkipReason::Execution => "execution",
            SkipReason::Parse => "parse",
            SkipReason::InvalidPrice => "invalid_price",
        }
    }

    /// Map a job-local error to its skip reason. `None` for errors that fail the job instead.
    pub fn from_error(error: &AppError) -> Option<Self> {
        match error.kind() {
            ErrorKind::Configuration => Some(SkipReason::Configuration),
            ErrorKind::Execution => Some(SkipReason::Execution),
            ErrorKind::Parse => Some(SkipReason::Parse),
            ErrorKind::Validation => Some(SkipReason::InvalidPrice),
            ErrorKind::Persistence | ErrorKind::Delivery | ErrorKind::Infrastructure => None,
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal outcome of one job. Every job ends in exactly one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Record persisted and a notification published.
    Notified,
    /// Record persisted, no notification delivered.
    Persisted,
    /// Nothing persisted; the job was abandoned.
    Skipped(SkipReason),
    /// Persistence failed.
    Failed(String),
}

impl JobOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            JobOutcome::Notified => "notified",
            JobOutcome::Persisted => "persisted",
            JobOutcome::Skipped(_) => "skipped",
            JobOutcome::Failed(_) => "failed",
        }
    }
}

/// Tally of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Jobs that reached a terminal outcome.
    pub total: usize,
    pub notified: usize,
    pub persisted: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Products never run: inactive, duplicated in the batch, or still queued at cancellation.
    pub dropped: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &JobOutcome) {
        match outcome {
            JobOutcome::Notified => self.notified += 1,
            JobOutcome::Persisted => self.persisted += 1,
            JobOutcome::Skipped(_) => self.skipped += 1,
            JobOutcome::Failed(_) => self.failed += 1,
        }
    }

    /// Number of jobs that reached a terminal outcome.
    pub fn completed(&self) -> usize {
        self.notified + self.persisted + self.skipped + self.failed
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} jobs: {} notified, {} persisted, {} skipped, {} failed ({} dropped)",
            self.total, self.notified, self.persisted, self.skipped, self.failed, self.dropped
        )
    }
}

/// Configuration for the crawl orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Number of concurrent crawler slots.
    pub worker_count: usize,
    /// Deadline for a single crawler invocation.
    pub crawl_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            crawl_timeout: Duration::from_secs(120),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    pub fn with_crawl_timeout(mut self, timeout: Duration) -> Self {
        self.crawl_timeout = timeout;
        self
    }
}
