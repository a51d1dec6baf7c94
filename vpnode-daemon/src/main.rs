use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use vpnode_core::{
    init_observability, shutdown_observability, Config, HealthChecker, PeerRegistrar, ReportCycle,
};

mod api;
mod reporter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    // Initialize observability FIRST
    init_observability(&config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize observability: {}", e))?;

    info!(interface = %config.interface, "vpnode daemon starting");

    let health = HealthChecker::for_reporting().await;
    health.register_component(api::REGISTRAR).await;

    let registrar = Arc::new(PeerRegistrar::from_config(&config)?);
    let cycle = ReportCycle::from_config(&config)?;
    let report_handle =
        tokio::spawn(reporter::run(cycle, config.report_interval(), health.clone()));

    let listener = TcpListener::bind(config.listen_addr.as_str())
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!("Registration API listening on {}", config.listen_addr);

    let app = api::router(api::AppState { registrar, health });
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    report_handle.abort();
    let _ = report_handle.await;

    info!("vpnode daemon shutting down");
    shutdown_observability();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
