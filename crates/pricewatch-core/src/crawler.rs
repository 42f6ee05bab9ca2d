//! Locating and invoking the external crawler programs.
//!
//! A crawler is an entry point on disk plus a dependency manifest next to
//! it. The [`CrawlerRegistry`] maps a product's crawler identifier to a
//! [`CrawlJob`]; the [`ProcessCrawlerRunner`] launches the job as a child
//! process and captures its streams.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::config::CrawlerConfig;
use crate::error::AppError;
use crate::models::{CrawlJob, Product, RawCrawlOutput};
use crate::traits::CrawlerRunner;

const STDERR_TAIL_CHARS: usize = 512;

/// Immutable crawler identifier → entry point table, built once per run.
#[derive(Debug, Clone)]
pub struct CrawlerRegistry {
    crawlers: HashMap<String, PathBuf>,
    manifest_env: String,
    manifest_file: String,
}

impl CrawlerRegistry {
    /// Build the registry, resolving every entry point against the working directory.
    pub fn from_config(config: &CrawlerConfig) -> Result<Self, AppError> {
        let mut crawlers = HashMap::with_capacity(config.crawlers.len());
        for (name, path) in &config.crawlers {
            let absolute = std::path::absolute(path).map_err(|e| {
                AppError::ConfigError(format!(
                    "Cannot resolve crawler '{name}' path {}: {e}",
                    path.display()
                ))
            })?;
            crawlers.insert(normalize(name), absolute);
        }

        Ok(Self {
            crawlers,
            manifest_env: config.manifest_env.clone(),
            manifest_file: config.manifest_file.clone(),
        })
    }

    pub fn crawler_count(&self) -> usize {
        self.crawlers.len()
    }

    /// Pair a product with its crawler. Unknown identifiers are an error.
    pub fn resolve(&self, product: Product) -> Result<CrawlJob, AppError> {
        let crawler_path = self
            .crawlers
            .get(&normalize(&product.crawler_name))
            .cloned()
            .ok_or_else(|| AppError::UnknownCrawler(product.crawler_name.clone()))?;
        let manifest_path = manifest_dir(&crawler_path).join(&self.manifest_file);

        Ok(CrawlJob {
            product,
            crawler_path,
            manifest_path,
        })
    }

    /// Variables added to the child environment for this job only.
    pub fn environment_for(&self, job: &CrawlJob) -> HashMap<String, String> {
        HashMap::from([(
            self.manifest_env.clone(),
            job.manifest_path.to_string_lossy().into_owned(),
        )])
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

fn manifest_dir(entry: &Path) -> &Path {
    if entry.is_dir() {
        entry
    } else {
        entry.parent().unwrap_or(entry)
    }
}

/// Runs crawlers as `<runtime...> <entry> -u <link>` child processes.
#[derive(Debug, Clone)]
pub struct ProcessCrawlerRunner {
    runtime: Vec<String>,
    stderr_marker: Option<String>,
}

impl ProcessCrawlerRunner {
    pub fn new(runtime: Vec<String>) -> Self {
        Self {
            runtime,
            stderr_marker: None,
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            runtime: config.runtime.clone(),
            stderr_marker: config.stderr_marker.clone(),
        }
    }

    /// Require `marker` on stderr for a run to count as successful.
    pub fn with_stderr_marker(mut self, marker: impl Into<String>) -> Self {
        self.stderr_marker = Some(marker.into());
        self
    }

    fn command(&self, job: &CrawlJob) -> Command {
        let mut cmd = match self.runtime.split_first() {
            Some((program, args)) => {
                let mut cmd = Command::new(program);
                cmd.args(args).arg(&job.crawler_path);
                cmd
            }
            None => Command::new(&job.crawler_path),
        };
        cmd.arg("-u")
            .arg(&job.product.link)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl CrawlerRunner for ProcessCrawlerRunner {
    async fn run(
        &self,
        job: &CrawlJob,
        env: &HashMap<String, String>,
    ) -> Result<RawCrawlOutput, AppError> {
        let mut cmd = self.command(job);
        cmd.envs(env);

        tracing::debug!(
            product_id = %job.product.id,
            crawler = %job.crawler_path.display(),
            link = %job.product.link,
            "Launching crawler"
        );

        let output = cmd.output().await.map_err(|e| {
            AppError::ExecutionError(format!(
                "failed to launch crawler {}: {e}",
                job.crawler_path.display()
            ))
        })?;

        let raw = RawCrawlOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        };

        if !output.status.success() {
            return Err(AppError::ExecutionError(format!(
                "crawler exited with {}: {}",
                output.status,
                stderr_tail(&raw.stderr)
            )));
        }

        if let Some(marker) = &self.stderr_marker
            && !raw.stderr.contains(marker.as_str())
        {
            return Err(AppError::ExecutionError(format!(
                "crawler stderr is missing '{marker}': {}",
                stderr_tail(&raw.stderr)
            )));
        }

        Ok(raw)
    }
}

fn stderr_tail(stderr: &str) -> &str {
    let trimmed = stderr.trim_end();
    let start = trimmed
        .char_indices()
        .rev()
        .nth(STDERR_TAIL_CHARS - 1)
        .map_or(0, |(i, _)| i);
    &trimmed[start..]
}
