use axum::routing::post;
use axum::Router;

use crate::handlers::expansions;
use crate::state::AppState;

/// Expansion routes mounted at `/expansions`.
///
/// ```text
/// POST /{id}/run       -> run_expansion
/// POST /{id}/adopt     -> adopt_expansion
/// POST /{id}/reject    -> reject_expansion
/// POST /{id}/votes     -> cast_vote
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/run", post(expansions::run_expansion))
        .route("/{id}/adopt", post(expansions::adopt_expansion))
        .route("/{id}/reject", post(expansions::reject_expansion))
        .route("/{id}/votes", post(expansions::cast_vote))
}
