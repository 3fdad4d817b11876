//! Expansion vote model and DTO.

use jigsaw_core::expansion::VoteValue;
use jigsaw_core::types::{EntityId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `expansion_votes` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Vote {
    pub id: EntityId,
    pub expansion_id: EntityId,
    pub user_id: EntityId,
    pub vote: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for casting or changing a vote.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CastVote {
    pub vote: VoteValue,
}
