use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::AppError;
use crate::job::OrchestratorConfig;

const DEFAULT_NUM_CRAWLERS: usize = 4;
const DEFAULT_CRAWL_TIMEOUT_SECS: u64 = 120;
const DEFAULT_RUNTIME: &str = "pipenv run python";
const DEFAULT_MANIFEST_ENV: &str = "PIPENV_PIPFILE";
const DEFAULT_MANIFEST_FILE: &str = "Pipfile";

/// Configuration for locating and running the external crawlers.
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Number of crawlers allowed to run at once.
    pub num_crawlers: usize,
    /// Deadline for one crawler invocation.
    pub crawl_timeout: Duration,
    /// Command prefix the crawler entry point is handed to, e.g. `pipenv run python`.
    /// Empty means the entry point is executed directly.
    pub runtime: Vec<String>,
    /// Environment variable that points the runtime at the crawler's manifest.
    pub manifest_env: String,
    /// File name of the manifest next to each crawler entry point.
    pub manifest_file: String,
    /// Crawler identifier → entry point path.
    pub crawlers: BTreeMap<String, PathBuf>,
    /// If set, a successful run must print this on stderr.
    pub stderr_marker: Option<String>,
}

impl CrawlerConfig {
    /// Config with defaults for everything but the crawler table.
    pub fn new(crawlers: BTreeMap<String, PathBuf>) -> Self {
        Self {
            num_crawlers: DEFAULT_NUM_CRAWLERS,
            crawl_timeout: Duration::from_secs(DEFAULT_CRAWL_TIMEOUT_SECS),
            runtime: split_runtime(DEFAULT_RUNTIME),
            manifest_env: DEFAULT_MANIFEST_ENV.to_string(),
            manifest_file: DEFAULT_MANIFEST_FILE.to_string(),
            crawlers,
            stderr_marker: None,
        }
    }

    /// Read configuration from environment variables.
    ///
    /// - `PRICEWATCH_CRAWLERS` (required): `name=path` pairs separated by commas
    /// - `PRICEWATCH_NUM_CRAWLERS` (optional, defaults to 4)
    /// - `PRICEWATCH_CRAWL_TIMEOUT_SECS` (optional, defaults to 120)
    /// - `PRICEWATCH_CRAWLER_RUNTIME` (optional, defaults to `pipenv run python`)
    /// - `PRICEWATCH_MANIFEST_ENV` (optional, defaults to `PIPENV_PIPFILE`)
    /// - `PRICEWATCH_MANIFEST_FILE` (optional, defaults to `Pipfile`)
    /// - `PRICEWATCH_STDERR_MARKER` (optional)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_crawlers = lookup("PRICEWATCH_CRAWLERS").ok_or_else(|| {
            AppError::ConfigError("PRICEWATCH_CRAWLERS not set. Expected name=path pairs.".into())
        })?;
        let mut config = Self::new(parse_crawler_table(&raw_crawlers)?);

        if let Some(raw) = lookup("PRICEWATCH_NUM_CRAWLERS") {
            let parsed: usize = raw.trim().parse().map_err(|_| {
                AppError::ConfigError(format!(
                    "Invalid PRICEWATCH_NUM_CRAWLERS '{raw}': must be a positive integer"
                ))
            })?;
            if parsed == 0 {
                return Err(AppError::ConfigError(
                    "PRICEWATCH_NUM_CRAWLERS must be at least 1".into(),
                ));
            }
            config.num_crawlers = parsed;
        }

        if let Some(raw) = lookup("PRICEWATCH_CRAWL_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                AppError::ConfigError(format!(
                    "Invalid PRICEWATCH_CRAWL_TIMEOUT_SECS '{raw}': must be a number of seconds"
                ))
            })?;
            if secs == 0 {
                return Err(AppError::ConfigError(
                    "PRICEWATCH_CRAWL_TIMEOUT_SECS must be at least 1".into(),
                ));
            }
            config.crawl_timeout = Duration::from_secs(secs);
        }

        if let Some(raw) = lookup("PRICEWATCH_CRAWLER_RUNTIME") {
            config.runtime = split_runtime(&raw);
        }
        if let Some(raw) = lookup("PRICEWATCH_MANIFEST_ENV") {
            config.manifest_env = raw.trim().to_string();
        }
        if let Some(raw) = lookup("PRICEWATCH_MANIFEST_FILE") {
            config.manifest_file = raw.trim().to_string();
        }
        config.stderr_marker = lookup("PRICEWATCH_STDERR_MARKER").filter(|m| !m.is_empty());

        Ok(config)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig::default()
            .with_worker_count(self.num_crawlers)
            .with_crawl_timeout(self.crawl_timeout)
    }
}

fn split_runtime(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

/// Parse `amazon=../crawlers/amazon,mercado-livre=../crawlers/ml`.
fn parse_crawler_table(raw: &str) -> Result<BTreeMap<String, PathBuf>, AppError> {
    let mut crawlers = BTreeMap::new();

    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, path) = entry.split_once('=').ok_or_else(|| {
            AppError::ConfigError(format!("Invalid crawler entry '{entry}': expected name=path"))
        })?;
        let (name, path) = (name.trim(), path.trim());
        if name.is_empty() || path.is_empty() {
            return Err(AppError::ConfigError(format!(
                "Invalid crawler entry '{entry}': name and path must be non-empty"
            )));
        }
        crawlers.insert(name.to_lowercase(), PathBuf::from(path));
    }

    if crawlers.is_empty() {
        return Err(AppError::ConfigError(
            "PRICEWATCH_CRAWLERS must name at least one crawler".into(),
        ));
    }

    Ok(crawlers)
}
