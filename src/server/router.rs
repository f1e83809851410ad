use axum::{routing::get, Router};
use std::sync::Arc;

use super::handlers::{self, AppState};

/// Create the exporter router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/metrics", get(handlers::metrics))
        .route("/health", get(handlers::health_check))
        .with_state(state)
}
