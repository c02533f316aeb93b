//! Stats Proxy - Cloud Foundry app stats proxy
//!
//! Logs in to the platform on every request, fetches the per-instance stats
//! of one application and serves them as normalized JSON, together with a
//! datacenter-level aggregate.

use anyhow::Result;
use proxy_lib::{CloudFoundryClient, HealthRegistry, StatsPipeline, StructuredLogger};
use stats_proxy::{api, config::ProxyConfig};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const PROXY_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting stats-proxy");

    let config = ProxyConfig::load().map_err(|e| {
        error!(error = %e, "Refusing to start");
        e
    })?;
    info!(app = %config.app_name, api_url = %config.cf_api_url, "Proxy configured");

    let client = CloudFoundryClient::new(config.upstream()?)?;
    let health_registry = HealthRegistry::for_control_plane().await;
    let pipeline = StatsPipeline::new(Arc::new(client), config.credentials(), health_registry.clone());

    let logger = StructuredLogger::new(&config.app_name);
    let listen_addr = config.listen_addr();
    logger.log_startup(PROXY_VERSION, &listen_addr, &config.cf_api_url);

    let app_state = Arc::new(api::AppState::new(pipeline, config.app_name.clone()));

    // Mark ready once the pipeline is wired up
    health_registry.set_ready(true).await;

    let shutdown_logger = logger.clone();
    api::serve(&listen_addr, app_state, async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
        }
        shutdown_logger.log_shutdown("SIGINT received");
    })
    .await?;

    info!("Shutting down");
    Ok(())
}
