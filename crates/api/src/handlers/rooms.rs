//! Room endpoints: create, list, detail, initial tile, explicit resolve.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use jigsaw_core::types::EntityId;
use jigsaw_db::models::room::CreateRoom;

use crate::engine::{initial, load_room, resolver, rooms};
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/rooms
pub async fn list_rooms(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let rooms = rooms::list_rooms(&state).await?;
    Ok(Json(DataResponse { data: rooms }))
}

/// POST /api/v1/rooms
pub async fn create_room(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateRoom>,
) -> AppResult<impl IntoResponse> {
    let room = rooms::create_room(&state, auth.user_id, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: room })))
}

/// GET /api/v1/rooms/{id}
///
/// Settles stale candidates first, so the response already reflects any
/// auto-adoption that was due.
pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<EntityId>,
) -> AppResult<impl IntoResponse> {
    let detail = rooms::room_detail(&state, room_id).await?;
    Ok(Json(DataResponse { data: detail }))
}

/// POST /api/v1/rooms/{id}/generate-initial
pub async fn generate_initial(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<EntityId>,
) -> AppResult<impl IntoResponse> {
    let tile = initial::generate_initial_tile(&state, room_id, auth.user_id).await?;
    Ok(Json(DataResponse { data: tile }))
}

/// POST /api/v1/rooms/{id}/resolve
pub async fn resolve_room(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<EntityId>,
) -> AppResult<impl IntoResponse> {
    load_room(&state.pool, room_id).await?;
    let report = resolver::resolve_stale_expansions(&state, room_id, Utc::now()).await?;
    tracing::debug!(room_id = %room_id, user_id = %auth.user_id, "Resolve requested");
    Ok(Json(DataResponse { data: report }))
}
