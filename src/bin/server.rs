use anyhow::Context;
use sitepulse::api::create_api_server;
use sitepulse::config::ServiceConfig;
use sitepulse::liveness::LivenessEngine;
use sitepulse::site::SiteStore;
use sitepulse::telemetry::{init_metrics, MetricsSink};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::from_env().context("failed to load configuration")?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("sitepulse v{}", env!("CARGO_PKG_VERSION"));

    init_metrics();

    let store = SiteStore::new(&config.database_url)
        .await
        .with_context(|| format!("failed to open site store at {}", config.database_url))?;
    info!(database = %config.database_url, sites = store.count().await.unwrap_or(0), "site store ready");

    let engine = LivenessEngine::new(Arc::new(store), Arc::new(MetricsSink))
        .with_config(config.engine_config());
    info!(
        staleness_secs = config.staleness_secs,
        uptime_quantum_secs = config.uptime_quantum_secs,
        "liveness engine ready"
    );

    let app = create_api_server(engine);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "listening for bandwidth reports");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
    }
}
