//! Room models, DTOs, and the aggregated room read model.

use jigsaw_core::error::CoreError;
use jigsaw_core::room::InitialTileStatus;
use jigsaw_core::types::{EntityId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::expansion::Expansion;
use crate::models::lock::CellLock;
use crate::models::tile::Tile;

/// A row from the `rooms` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Room {
    pub id: EntityId,
    pub name: String,
    pub owner_user_id: EntityId,
    pub style_preset: Option<String>,
    pub initial_prompt: Option<String>,
    pub initial_tile_status: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Room {
    pub fn initial_status(&self) -> Result<InitialTileStatus, CoreError> {
        InitialTileStatus::parse(&self.initial_tile_status)
    }
}

/// Room list entry joined with the owner's display name.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RoomSummary {
    pub id: EntityId,
    pub name: String,
    pub owner_user_id: EntityId,
    pub owner_display_name: String,
    pub style_preset: Option<String>,
    pub initial_tile_status: String,
    pub created_at: Timestamp,
}

/// DTO for creating a room.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoom {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 100))]
    pub style_preset: Option<String>,
    #[validate(length(max = 1000))]
    pub initial_prompt: Option<String>,
}

/// Everything a client needs to render a room.
///
/// Only open expansions (not `ADOPTED`/`REJECTED`) and unexpired locks are
/// included.
#[derive(Debug, Clone, Serialize)]
pub struct RoomDetail {
    #[serde(flatten)]
    pub room: Room,
    pub tiles: Vec<Tile>,
    pub expansions: Vec<Expansion>,
    pub locks: Vec<CellLock>,
}
