//! Expansion endpoints: create, run, adopt, reject, vote.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use jigsaw_core::types::EntityId;
use jigsaw_db::models::expansion::{CreateExpansion, Expansion};
use jigsaw_db::models::tile::Tile;
use jigsaw_db::models::vote::CastVote;
use serde::Serialize;

use crate::engine::lifecycle;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct AdoptedExpansion {
    pub tile: Tile,
    pub expansion: Expansion,
}

/// POST /api/v1/rooms/{id}/expansions
pub async fn create_expansion(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<EntityId>,
    Json(input): Json<CreateExpansion>,
) -> AppResult<impl IntoResponse> {
    let expansion = lifecycle::create_expansion(&state, room_id, auth.user_id, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: expansion })))
}

/// POST /api/v1/expansions/{id}/run
///
/// Blocks until generation finishes. A provider failure is 502 and leaves
/// the expansion `FAILED` with its cell unlocked.
pub async fn run_expansion(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(expansion_id): Path<EntityId>,
) -> AppResult<impl IntoResponse> {
    let expansion = lifecycle::run_expansion(&state, expansion_id, auth.user_id).await?;
    Ok(Json(DataResponse { data: expansion }))
}

/// POST /api/v1/expansions/{id}/adopt
pub async fn adopt_expansion(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(expansion_id): Path<EntityId>,
) -> AppResult<impl IntoResponse> {
    let (tile, expansion) =
        lifecycle::adopt_expansion(&state, expansion_id, auth.user_id).await?;
    Ok(Json(DataResponse {
        data: AdoptedExpansion { tile, expansion },
    }))
}

/// POST /api/v1/expansions/{id}/reject
pub async fn reject_expansion(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(expansion_id): Path<EntityId>,
) -> AppResult<impl IntoResponse> {
    let expansion = lifecycle::reject_expansion(&state, expansion_id, auth.user_id).await?;
    Ok(Json(DataResponse { data: expansion }))
}

/// POST /api/v1/expansions/{id}/votes
pub async fn cast_vote(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(expansion_id): Path<EntityId>,
    Json(input): Json<CastVote>,
) -> AppResult<impl IntoResponse> {
    let vote = lifecycle::cast_vote(&state, expansion_id, auth.user_id, input.vote).await?;
    Ok(Json(DataResponse { data: vote }))
}
