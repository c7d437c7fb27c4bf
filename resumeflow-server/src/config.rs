use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;

use resumeflow::config::{ArtifactConfig, LlmConfig, ResumeflowConfig, WorkerConfig};
use resumeflow::observability::LogFormat;

const DEFAULT_BIND: &str = "0.0.0.0:8000";

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub log_format: LogFormat,
    pub core: ResumeflowConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bind = var("RESUMEFLOW_BIND")
            .unwrap_or_else(|| DEFAULT_BIND.to_string())
            .parse::<SocketAddr>()
            .context("RESUMEFLOW_BIND must be a socket address such as 0.0.0.0:8000")?;

        let log_format = match var("RESUMEFLOW_LOG_FORMAT") {
            Some(format) => format
                .parse::<LogFormat>()
                .map_err(anyhow::Error::msg)
                .context("RESUMEFLOW_LOG_FORMAT must be 'pretty' or 'json'")?,
            None => LogFormat::default(),
        };

        let api_key = var("RESUMEFLOW_LLM_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .context("Required environment variable 'RESUMEFLOW_LLM_API_KEY' is not set")?;
        let mut llm = LlmConfig::new(api_key);
        if let Some(base_url) = var("RESUMEFLOW_LLM_BASE_URL") {
            llm = llm.with_base_url(base_url);
        }
        if let Some(model) = var("RESUMEFLOW_LLM_MODEL") {
            llm = llm.with_model(model);
        }

        let mut workers = WorkerConfig::default();
        if let Some(jobs) = parse_var(&var, "RESUMEFLOW_MAX_CONCURRENT_JOBS")? {
            workers = workers.with_max_concurrent_jobs(jobs);
        }
        if let Some(capacity) = parse_var(&var, "RESUMEFLOW_QUEUE_CAPACITY")? {
            workers = workers.with_queue_capacity(capacity);
        }

        let artifacts = var("RESUMEFLOW_OUTPUT_DIR")
            .map(|dir| ArtifactConfig::filesystem(PathBuf::from(dir)))
            .unwrap_or_default();

        Ok(Self {
            bind,
            log_format,
            core: ResumeflowConfig::new()
                .with_llm(llm)
                .with_workers(workers)
                .with_artifacts(artifacts),
        })
    }
}

fn parse_var(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<usize>> {
    var(key)
        .map(|value| {
            value
                .trim()
                .parse::<usize>()
                .with_context(|| format!("{key} must be a positive integer"))
        })
        .transpose()
}
