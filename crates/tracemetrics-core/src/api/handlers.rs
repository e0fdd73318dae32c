//! API handlers for the HTTP REST API

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::Error;
use crate::models::{BatchReport, DataSourceConfig, RunMetrics};
use crate::pipeline::{parse_run_ids, BatchOrchestrator};
use crate::source::resolve_data_source;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Pipeline entry point
    pub orchestrator: Arc<BatchOrchestrator>,
    /// Source used when a request does not name one
    pub default_source: Option<DataSourceConfig>,
}

impl AppState {
    fn data_source(&self, headers: &HeaderMap) -> Option<DataSourceConfig> {
        resolve_data_source(headers, self.default_source.as_ref())
    }
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    /// Always `ok` while serving
    pub status: String,
    /// Crate version
    pub version: String,
}

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Error body returned for rejected requests
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable reason
    pub error: String,
}

/// Error returned by handlers
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorResponse { error: self.0.to_string() })).into_response()
    }
}

/// Metrics for a single run
pub async fn get_run_metrics(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(run_id): Path<String>,
) -> Json<RunMetrics> {
    let data_source = state.data_source(&headers);
    Json(state.orchestrator.compute_run(&run_id, data_source.as_ref()).await)
}

/// Metrics for a batch of runs plus their aggregate.
///
/// Any unreadable body, whether not JSON, the wrong content type, or a
/// malformed `runIds`, is reported as a 400 with a JSON error body.
pub async fn compute_batch_metrics(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<BatchReport>, ApiError> {
    let Json(body) = payload.map_err(|rejection| Error::invalid_input(rejection.body_text()))?;
    let run_ids = parse_run_ids(&body)?;
    let data_source = state.data_source(&headers);

    Ok(Json(state.orchestrator.run(&run_ids, data_source.as_ref()).await))
}
