//! Expansion model, DTOs, and the stale-candidate projection used by the
//! auto-resolver.

use jigsaw_core::error::CoreError;
use jigsaw_core::expansion::{ExpansionStatus, Prompt};
use jigsaw_core::grid::{Cell, Direction};
use jigsaw_core::resolution::Candidate;
use jigsaw_core::types::{EntityId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `expansions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Expansion {
    pub id: EntityId,
    pub room_id: EntityId,
    pub from_tile_id: EntityId,
    pub target_x: i32,
    pub target_y: i32,
    pub direction: String,
    pub prompt: Json<Prompt>,
    pub status: String,
    pub result_image_url: Option<String>,
    pub created_by_user_id: EntityId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Expansion {
    pub fn target(&self) -> Cell {
        Cell::new(self.target_x, self.target_y)
    }

    pub fn status(&self) -> Result<ExpansionStatus, CoreError> {
        ExpansionStatus::parse(&self.status)
    }

    pub fn direction(&self) -> Result<Direction, CoreError> {
        Direction::parse(&self.direction)
    }
}

/// DTO for creating an expansion.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateExpansion {
    pub from_tile_id: EntityId,
    pub target_x: i32,
    pub target_y: i32,
    pub direction: Direction,
    pub prompt: Prompt,
}

impl CreateExpansion {
    pub fn target(&self) -> Cell {
        Cell::new(self.target_x, self.target_y)
    }
}

/// A `DONE` expansion past the grace period, with its vote counts.
#[derive(Debug, Clone, FromRow)]
pub struct StaleCandidate {
    pub id: EntityId,
    pub room_id: EntityId,
    pub target_x: i32,
    pub target_y: i32,
    pub result_image_url: Option<String>,
    pub created_by_user_id: EntityId,
    pub adopt_votes: i64,
    pub reject_votes: i64,
}

impl StaleCandidate {
    pub fn cell(&self) -> Cell {
        Cell::new(self.target_x, self.target_y)
    }

    pub fn to_candidate(&self) -> Candidate {
        Candidate {
            expansion_id: self.id,
            cell: self.cell(),
            has_result_image: self.result_image_url.is_some(),
            adopt_votes: self.adopt_votes,
            reject_votes: self.reject_votes,
        }
    }
}

/// What [`ExpansionRepo::settle_group`](crate::repositories::ExpansionRepo::settle_group)
/// did with one cell group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupSettlement {
    /// Committed. `rejected` lists only the rows that actually moved.
    Settled {
        adopted: Option<EntityId>,
        rejected: Vec<EntityId>,
    },
    /// The winner was no longer `DONE` or had no image. Nothing was written.
    WinnerUnavailable,
    /// No row in the group was still `DONE`. Nothing was written.
    AlreadySettled,
}
