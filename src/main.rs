//! `aegisd`: the Aegis Orchestrator daemon.

use anyhow::{Context, Result};

use aegis_orchestrator::infrastructure::config::ConfigLoader;
use aegis_orchestrator::infrastructure::logging::LoggerImpl;
use aegis_orchestrator::server;
use aegis_orchestrator::server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ConfigLoader::load().context("failed to load configuration")?;
    let _logger = LoggerImpl::init(&config.log).context("failed to initialize logger")?;

    tracing::info!(bind_addr = %config.http.bind_addr, max_workers = config.swarm.max_workers, "starting aegisd");

    let state = std::sync::Arc::new(AppState::bootstrap(&config).await.context("failed to bootstrap application state")?);

    server::serve_with_shutdown(&config.http, state, shutdown_signal()).await.map_err(|e| anyhow::anyhow!("server error: {e}"))?;

    tracing::info!("aegisd shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate()).expect("failed to install SIGTERM handler").recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
