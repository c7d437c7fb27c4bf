mod config;
mod error;
mod routes;
mod state;

use std::sync::Arc;

use anyhow::{Context, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use resumeflow::agents::{HttpPageFetcher, OpenAiCompatibleProvider, PageFetcher};
use resumeflow::events::LoggingEventSink;
use resumeflow::observability::init_tracing;
use resumeflow::service::JobService;

use crate::config::ServerConfig;
use crate::routes::build_router;
use crate::state::AppState;

const DEFAULT_LOG_FILTER: &str = "resumeflow=info,resumeflow_server=info,tower_http=info";

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::from_env()?;
    init_tracing(config.log_format, DEFAULT_LOG_FILTER)?;

    info!(version = resumeflow::VERSION, "Starting resumeflow server");

    let provider = Arc::new(
        OpenAiCompatibleProvider::new(config.core.llm.clone())
            .context("Failed to build the model provider")?,
    );
    let fetcher: Arc<dyn PageFetcher> = Arc::new(
        HttpPageFetcher::new(config.core.fetch.clone())
            .context("Failed to build the page fetcher")?,
    );
    let service = Arc::new(JobService::from_config(
        &config.core,
        provider,
        Some(fetcher),
        Arc::new(LoggingEventSink::default()),
    )?);

    let app = build_router(AppState::new(service.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!("Listening on {}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Draining in-flight jobs");
    service.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for shutdown signal");
    }
}
