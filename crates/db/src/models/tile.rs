//! Tile model.

use jigsaw_core::grid::Cell;
use jigsaw_core::types::{EntityId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `tiles` table. Tiles are never updated once inserted.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Tile {
    pub id: EntityId,
    pub room_id: EntityId,
    pub x: i32,
    pub y: i32,
    pub image_url: String,
    pub created_by_user_id: EntityId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Tile {
    pub fn cell(&self) -> Cell {
        Cell::new(self.x, self.y)
    }
}

/// Values for inserting a tile.
#[derive(Debug, Clone)]
pub struct NewTile<'a> {
    pub room_id: EntityId,
    pub cell: Cell,
    pub image_url: &'a str,
    pub created_by_user_id: EntityId,
}
