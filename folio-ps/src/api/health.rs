//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use folio_common::api::HealthResponse;
use tracing::trace;

use crate::AppState;

/// GET /health
///
/// Does not require authentication.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    trace!(
        uptime_secs = (chrono::Utc::now() - state.startup_time).num_seconds(),
        "Health check"
    );
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "folio-ps".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
