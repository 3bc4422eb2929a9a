//! Headless HTTP control plane (spec.md §6).

pub mod error;
pub mod routes;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::domain::models::config::HttpConfig;
use state::AppState;

/// Binds and serves the control plane until `shutdown` resolves.
pub async fn serve_with_shutdown<F>(
    config: &HttpConfig,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = config.bind_addr.parse()?;
    let router = routes::build_router(state);

    tracing::info!(%addr, "aegisd control plane listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router).with_graceful_shutdown(shutdown).await?;
    Ok(())
}
