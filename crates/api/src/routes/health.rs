use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Response body for the health check endpoint.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub db_healthy: bool,
    pub generator: &'static str,
}

/// GET /health
///
/// Returns service status including database connectivity. Returns
/// `"degraded"` if the database is unreachable.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = jigsaw_db::health_check(&state.pool).await.is_ok();

    Json(HealthResponse {
        status: if db_healthy { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        db_healthy,
        generator: state.generator.name(),
    })
}

/// Mount health-check routes.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
