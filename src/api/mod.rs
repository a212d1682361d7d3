//! HTTP surface

pub mod handlers;
pub mod routes;

use crate::{AppState, Config};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

pub use routes::create_router;

/// Bind and serve until the process is stopped.
pub async fn start_server(config: Config) -> Result<()> {
    let port = config.server_port;
    let backend = config.store_backend();
    let state = Arc::new(AppState::new(config).await?);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, ?backend, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
