//! Room creation, listing and the aggregated read model.

use chrono::Utc;
use jigsaw_core::room::validate_room_name;
use jigsaw_core::types::EntityId;
use jigsaw_db::models::room::{CreateRoom, Room, RoomDetail, RoomSummary};
use jigsaw_db::repositories::{CellLockRepo, ExpansionRepo, RoomRepo, TileRepo};
use validator::Validate;

use crate::engine::load_room;
use crate::engine::resolver::resolve_if_stale;
use crate::error::AppResult;
use crate::state::AppState;

pub async fn create_room(
    state: &AppState,
    owner_user_id: EntityId,
    input: &CreateRoom,
) -> AppResult<Room> {
    input.validate()?;
    validate_room_name(&input.name)?;

    let room = RoomRepo::create(&state.pool, owner_user_id, input).await?;
    tracing::info!(room_id = %room.id, owner = %owner_user_id, name = %room.name, "Room created");
    Ok(room)
}

pub async fn list_rooms(state: &AppState) -> AppResult<Vec<RoomSummary>> {
    Ok(RoomRepo::list(&state.pool).await?)
}

/// Settle stale candidates, then load everything a client renders.
///
/// A resolver failure is logged and the read still succeeds.
pub async fn room_detail(state: &AppState, room_id: EntityId) -> AppResult<RoomDetail> {
    load_room(&state.pool, room_id).await?;

    let now = Utc::now();
    if let Err(err) = resolve_if_stale(state, room_id, now).await {
        tracing::error!(room_id = %room_id, error = %err, "Auto-resolution failed");
    }

    let room = load_room(&state.pool, room_id).await?;
    let tiles = TileRepo::list_by_room(&state.pool, room_id).await?;
    let expansions = ExpansionRepo::list_open_by_room(&state.pool, room_id).await?;
    let locks = CellLockRepo::list_active(&state.pool, room_id, now).await?;

    Ok(RoomDetail {
        room,
        tiles,
        expansions,
        locks,
    })
}
