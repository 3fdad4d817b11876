//! Cell lock model and DTOs.

use jigsaw_core::grid::Cell;
use jigsaw_core::lease::Lease;
use jigsaw_core::types::{EntityId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `cell_locks` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CellLock {
    pub id: EntityId,
    pub room_id: EntityId,
    pub x: i32,
    pub y: i32,
    pub holder_user_id: EntityId,
    pub expires_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl CellLock {
    pub fn cell(&self) -> Cell {
        Cell::new(self.x, self.y)
    }

    pub fn lease(&self) -> Lease {
        Lease {
            holder_user_id: self.holder_user_id,
            expires_at: self.expires_at,
        }
    }
}

/// DTO for acquiring or releasing a cell lock.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CellRequest {
    pub x: i32,
    pub y: i32,
}

impl CellRequest {
    pub fn cell(self) -> Cell {
        Cell::new(self.x, self.y)
    }
}
