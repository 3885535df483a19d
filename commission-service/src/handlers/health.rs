//! Health, readiness, and metrics endpoints.

use crate::services::get_metrics;
use crate::startup::AppState;
use agency_core::error::AppError;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

/// Liveness probe.
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Readiness probe: verifies the database is reachable.
pub async fn ready(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    state.db.health_check().await?;
    Ok(Json(json!({ "status": "ready" })))
}

/// Prometheus metrics in text exposition format.
pub async fn metrics() -> impl IntoResponse {
    get_metrics()
}
