//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" when the stereotype definitions failed to load
    pub status: String,
    pub module: String,
    pub version: String,
    pub regions: usize,
    pub items: usize,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.definitions.is_available() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        module: "stereo-quiz".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        regions: state.definitions.regions().len(),
        items: state.definitions.len(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
