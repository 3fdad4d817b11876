//! Repository for the `expansion_votes` table.

use jigsaw_core::expansion::{ExpansionStatus, VoteValue};
use jigsaw_core::types::{new_id, EntityId};
use sqlx::PgPool;

use crate::models::vote::Vote;

const COLUMNS: &str = "id, expansion_id, user_id, vote, created_at, updated_at";

pub struct VoteRepo;

impl VoteRepo {
    /// Record or change a user's vote on an expansion that is still `DONE`.
    ///
    /// The status guard and the upsert are one statement. Returns `None`
    /// when the expansion is missing or no longer `DONE`.
    pub async fn cast(
        pool: &PgPool,
        expansion_id: EntityId,
        user_id: EntityId,
        vote: VoteValue,
    ) -> Result<Option<Vote>, sqlx::Error> {
        let query = format!(
            "INSERT INTO expansion_votes (id, expansion_id, user_id, vote) \
             SELECT $1, $2, $3, $4 \
             WHERE EXISTS (SELECT 1 FROM expansions WHERE id = $2 AND status = $5) \
             ON CONFLICT ON CONSTRAINT uq_expansion_votes_expansion_user \
             DO UPDATE SET vote = EXCLUDED.vote, updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Vote>(&query)
            .bind(new_id())
            .bind(expansion_id)
            .bind(user_id)
            .bind(vote.as_str())
            .bind(ExpansionStatus::Done.as_str())
            .fetch_optional(pool)
            .await
    }

    pub async fn list_by_expansion(
        pool: &PgPool,
        expansion_id: EntityId,
    ) -> Result<Vec<Vote>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM expansion_votes WHERE expansion_id = $1 ORDER BY created_at"
        );
        sqlx::query_as::<_, Vote>(&query)
            .bind(expansion_id)
            .fetch_all(pool)
            .await
    }
}
