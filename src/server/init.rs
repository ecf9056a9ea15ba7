//! Server initialization and run loop

use super::config::AppConfig;
use crate::api::api_router;
use anyhow::{bail, Context, Result};
use axum::{Extension, Router};
use flowmanager_core::{
    wait_for_shutdown_signal, DataSources, EventBus, Orchestrator, RunMonitor,
};
use flowmanager_sources::SourcesConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Capacity of the run event broadcast channel
const MONITOR_CAPACITY: usize = 1024;

/// Build the six data sources and wire the orchestrator onto a fresh bus.
pub fn build_orchestrator(
    sources: &SourcesConfig,
    client: &reqwest::Client,
) -> Result<Arc<Orchestrator>> {
    let sources = DataSources::from_config(sources, client)
        .context("Failed to build data sources")?;
    Orchestrator::new(
        sources,
        Arc::new(EventBus::new()),
        RunMonitor::new(MONITOR_CAPACITY),
    )
    .context("Failed to wire orchestrator")
}

/// Assemble the HTTP application around `orchestrator`.
pub fn build_app(orchestrator: Arc<Orchestrator>) -> Router {
    api_router()
        .layer(Extension(orchestrator))
        .layer(TraceLayer::new_for_http())
}

/// Resolve on Ctrl+C, SIGTERM, or an internal fault raised by the
/// orchestrator.
async fn shutdown_or_fault(mut faults: watch::Receiver<Option<String>>) {
    tokio::select! {
        _ = wait_for_shutdown_signal() => {}
        fault_ok = async { faults.wait_for(Option::is_some).await.is_ok() } => {
            if fault_ok {
                error!("Internal fault, shutting down");
            } else {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Run the server until Ctrl+C or SIGTERM.
///
/// `port` overrides `server.port` from the configuration. An internal fault
/// stops the server and is returned as an error, so the process exits 1.
pub async fn run(config: AppConfig, port: Option<u16>) -> Result<()> {
    info!(
        "Starting Flow Manager v{} ({})",
        env!("CARGO_PKG_VERSION"),
        super::loader::environment()
    );

    let client = reqwest::Client::new();
    let orchestrator = build_orchestrator(&config.sources, &client)?;
    let faults = orchestrator.faults();
    let app = build_app(orchestrator.clone());

    let port = port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", config.server.host, port)
        .parse()
        .context("Invalid server address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("Flow Manager is running on port: {}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_or_fault(faults))
        .await
        .context("HTTP server error")?;

    let fault = orchestrator.faults().borrow().clone();
    if let Some(fault) = fault {
        bail!("internal fault: {fault}");
    }

    info!("Flow Manager stopped");
    Ok(())
}
