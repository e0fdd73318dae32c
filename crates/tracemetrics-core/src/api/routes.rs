//! API routes

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use super::handlers::{self, AppState};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(handlers::health))

        // Run metrics
        .route("/api/v1/runs/metrics", post(handlers::compute_batch_metrics))
        .route("/api/v1/runs/:run_id/metrics", get(handlers::get_run_metrics))

        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
