//! # Workshop Server
//!
//! Multi-session remote server. Hosts one agent loop per session behind
//! an in-memory registry, confines each user to their own workspace, and
//! fans turn output out as Server-Sent Events.

mod routes;
mod state;

pub use routes::router;
pub use state::{sanitize_user_id, AppState, ServerConfig};

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

/// Bind and serve until the task is dropped.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "workshop server listening");
    axum::serve(listener, router(state))
        .await
        .context("server error")?;
    Ok(())
}
