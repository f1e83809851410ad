use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse},
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error, warn};

use crate::analyzer::ClaudeUsageAnalyzer;
use crate::metrics::MetricsSnapshot;

pub const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Shared application state
pub struct AppState {
    analyzer: Arc<ClaudeUsageAnalyzer>,
    next_refresh: AtomicU64,
    /// Snapshot of the latest-started refresh that succeeded, with its sequence number.
    published: RwLock<(u64, Arc<MetricsSnapshot>)>,
}

impl AppState {
    pub fn new(analyzer: ClaudeUsageAnalyzer) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
            next_refresh: AtomicU64::new(1),
            published: RwLock::new((0, Arc::new(MetricsSnapshot::new()))),
        }
    }

    /// The most recently published snapshot.
    pub fn published(&self) -> Arc<MetricsSnapshot> {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .1
            .clone()
    }

    /// Publish `snapshot` unless a refresh started after `seq` already did.
    fn publish(&self, seq: u64, snapshot: MetricsSnapshot) -> Arc<MetricsSnapshot> {
        let mut published = self.published.write().unwrap_or_else(PoisonError::into_inner);
        if seq > published.0 {
            *published = (seq, Arc::new(snapshot));
        } else {
            debug!(seq, current = published.0, "Discarding refresh overtaken by a newer one");
        }
        published.1.clone()
    }

    /// Run one refresh off the async runtime and publish it.
    ///
    /// On failure the previously published snapshot is returned unchanged.
    pub async fn refresh(&self) -> Arc<MetricsSnapshot> {
        let seq = self.next_refresh.fetch_add(1, Ordering::Relaxed);
        let analyzer = self.analyzer.clone();
        match tokio::task::spawn_blocking(move || analyzer.refresh_metrics()).await {
            Ok(Ok(snapshot)) => self.publish(seq, snapshot),
            Ok(Err(e)) => {
                warn!(error = %e, "Metrics refresh failed, serving previous snapshot");
                self.published()
            }
            Err(e) => {
                error!(error = %e, "Metrics refresh task panicked");
                self.published()
            }
        }
    }
}

/// Prometheus text exposition
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.refresh().await;
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, METRICS_CONTENT_TYPE)],
        snapshot.encode_text(),
    )
}

pub async fn index() -> impl IntoResponse {
    Html(
        "<html><head><title>Claude Usage Exporter</title></head>\
         <body><h1>Claude Usage Exporter</h1>\
         <p><a href=\"/metrics\">Metrics</a></p></body></html>",
    )
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with_sessions(sessions: f64) -> MetricsSnapshot {
        let mut snapshot = MetricsSnapshot::new();
        snapshot.set("claude_sessions_total", vec![], sessions);
        snapshot
    }

    #[test]
    fn test_older_refresh_does_not_replace_newer() {
        let state = AppState::new(ClaudeUsageAnalyzer::new("/nonexistent/stats.json", "/nonexistent"));

        let served = state.publish(2, snapshot_with_sessions(20.0));
        assert_eq!(served.get("claude_sessions_total", &[]), Some(20.0));

        // Started first, finished last
        let served = state.publish(1, snapshot_with_sessions(10.0));
        assert_eq!(served.get("claude_sessions_total", &[]), Some(20.0));
        assert_eq!(state.published().get("claude_sessions_total", &[]), Some(20.0));

        state.publish(3, snapshot_with_sessions(30.0));
        assert_eq!(state.published().get("claude_sessions_total", &[]), Some(30.0));
    }
}
