//! HTTP surface
//!
//! `/metrics` recomputes a fresh [`MetricsSnapshot`](crate::metrics::MetricsSnapshot)
//! on every scrape. A refresh that fails keeps serving the last snapshot that
//! was published, or an empty exposition before the first success.

mod handlers;
mod router;

pub use handlers::{AppState, METRICS_CONTENT_TYPE};
pub use router::create_router;

use crate::analyzer::ClaudeUsageAnalyzer;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Bind `0.0.0.0:port` and serve until Ctrl-C.
pub async fn serve(analyzer: ClaudeUsageAnalyzer, port: u16) -> Result<()> {
    let state = Arc::new(AppState::new(analyzer));
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(%addr, "Exporter listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Exporter stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; run until the process is killed
        std::future::pending::<()>().await;
    }
}
