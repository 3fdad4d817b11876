//! Coordination engine: the operations behind the HTTP handlers.
//!
//! - [`locks`] -- cell lease acquire/release.
//! - [`lifecycle`] -- expansion create, run, adopt, reject and votes.
//! - [`resolver`] -- auto-resolution of stale `DONE` candidates.
//! - [`initial`] -- a room's first tile.
//! - [`rooms`] -- room creation and the aggregated read model.
//!
//! Every operation commits its state change first and only then calls the
//! [`ChangeNotifier`](jigsaw_events::ChangeNotifier). Nothing here keeps a
//! transaction open across a provider call.

pub mod initial;
pub mod lifecycle;
pub mod locks;
pub mod resolver;
pub mod rooms;

use jigsaw_core::error::CoreError;
use jigsaw_core::types::EntityId;
use jigsaw_db::models::expansion::Expansion;
use jigsaw_db::models::room::Room;
use jigsaw_db::repositories::{ExpansionRepo, RoomRepo};
use jigsaw_db::DbPool;

use crate::error::AppResult;

pub(crate) async fn load_room(pool: &DbPool, room_id: EntityId) -> AppResult<Room> {
    RoomRepo::find_by_id(pool, room_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Room", room_id).into())
}

pub(crate) async fn load_expansion(pool: &DbPool, expansion_id: EntityId) -> AppResult<Expansion> {
    ExpansionRepo::find_by_id(pool, expansion_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Expansion", expansion_id).into())
}

/// Run, adopt and reject are limited to the expansion's creator and the
/// room owner.
pub(crate) fn ensure_creator_or_owner(
    expansion: &Expansion,
    room: &Room,
    user_id: EntityId,
    action: &str,
) -> Result<(), CoreError> {
    if expansion.created_by_user_id == user_id || room.owner_user_id == user_id {
        Ok(())
    } else {
        Err(CoreError::Forbidden(format!(
            "Only the expansion creator or the room owner may {action} it"
        )))
    }
}
