//! Repository for the `expansions` table.
//!
//! Every status change goes through [`ExpansionRepo::transition`] or
//! [`ExpansionRepo::transition_many`]: an `UPDATE ... WHERE status = $from`
//! whose returned rows tell the caller whether it won. Operations that
//! touch tiles or locks as well run the guard and the side effects in one
//! transaction.

use jigsaw_core::expansion::ExpansionStatus;
use jigsaw_core::grid::Cell;
use jigsaw_core::types::{new_id, EntityId, Timestamp};
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};

use crate::models::expansion::{CreateExpansion, Expansion, GroupSettlement, StaleCandidate};
use crate::models::tile::{NewTile, Tile};
use crate::repositories::{CellLockRepo, TileRepo};

/// Column list for `expansions` queries.
const COLUMNS: &str = "id, room_id, from_tile_id, target_x, target_y, direction, prompt, \
                       status, result_image_url, created_by_user_id, created_at, updated_at";

pub struct ExpansionRepo;

impl ExpansionRepo {
    // -----------------------------------------------------------------------
    // Reads and inserts
    // -----------------------------------------------------------------------

    /// Insert a new `QUEUED` expansion.
    pub async fn create(
        pool: &PgPool,
        room_id: EntityId,
        created_by_user_id: EntityId,
        input: &CreateExpansion,
    ) -> Result<Expansion, sqlx::Error> {
        let query = format!(
            "INSERT INTO expansions \
                (id, room_id, from_tile_id, target_x, target_y, direction, prompt, status, created_by_user_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Expansion>(&query)
            .bind(new_id())
            .bind(room_id)
            .bind(input.from_tile_id)
            .bind(input.target_x)
            .bind(input.target_y)
            .bind(input.direction.as_str())
            .bind(Json(input.prompt.clone()))
            .bind(ExpansionStatus::Queued.as_str())
            .bind(created_by_user_id)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: EntityId) -> Result<Option<Expansion>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM expansions WHERE id = $1");
        sqlx::query_as::<_, Expansion>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Expansions of a room that are not yet `ADOPTED` or `REJECTED`.
    pub async fn list_open_by_room(
        pool: &PgPool,
        room_id: EntityId,
    ) -> Result<Vec<Expansion>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM expansions \
             WHERE room_id = $1 AND status <> ALL($2) \
             ORDER BY created_at, id"
        );
        sqlx::query_as::<_, Expansion>(&query)
            .bind(room_id)
            .bind(vec![
                ExpansionStatus::Adopted.as_str(),
                ExpansionStatus::Rejected.as_str(),
            ])
            .fetch_all(pool)
            .await
    }

    // -----------------------------------------------------------------------
    // Guarded transitions
    // -----------------------------------------------------------------------

    /// Move one expansion from `from` to `to`.
    ///
    /// Returns the updated row, or `None` if the expansion is missing or was
    /// not in `from`. Of several concurrent callers with the same `from`,
    /// exactly one gets `Some`.
    pub async fn transition<'e, E>(
        executor: E,
        id: EntityId,
        from: ExpansionStatus,
        to: ExpansionStatus,
    ) -> Result<Option<Expansion>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        debug_assert!(from.can_transition_to(to), "illegal transition {from} -> {to}");
        let query = format!(
            "UPDATE expansions SET status = $3, updated_at = NOW() \
             WHERE id = $1 AND status = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Expansion>(&query)
            .bind(id)
            .bind(from.as_str())
            .bind(to.as_str())
            .fetch_optional(executor)
            .await
    }

    /// Move every listed expansion still in `from` to `to`. Returns the ids
    /// that actually moved; rows in any other status are left alone.
    pub async fn transition_many<'e, E>(
        executor: E,
        ids: &[EntityId],
        from: ExpansionStatus,
        to: ExpansionStatus,
    ) -> Result<Vec<EntityId>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        debug_assert!(from.can_transition_to(to), "illegal transition {from} -> {to}");
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_scalar::<_, EntityId>(
            "UPDATE expansions SET status = $3, updated_at = NOW() \
             WHERE id = ANY($1) AND status = $2 \
             RETURNING id",
        )
        .bind(ids)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_all(executor)
        .await
    }

    /// `RUNNING -> DONE`, recording the generated image.
    pub async fn complete(
        pool: &PgPool,
        id: EntityId,
        result_image_url: &str,
    ) -> Result<Option<Expansion>, sqlx::Error> {
        let query = format!(
            "UPDATE expansions SET status = $3, result_image_url = $4, updated_at = NOW() \
             WHERE id = $1 AND status = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Expansion>(&query)
            .bind(id)
            .bind(ExpansionStatus::Running.as_str())
            .bind(ExpansionStatus::Done.as_str())
            .bind(result_image_url)
            .fetch_optional(pool)
            .await
    }

    /// `RUNNING -> FAILED` and drop the target cell's lease, atomically.
    pub async fn fail_and_release(
        pool: &PgPool,
        expansion: &Expansion,
    ) -> Result<Option<Expansion>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let failed = Self::transition(
            &mut *tx,
            expansion.id,
            ExpansionStatus::Running,
            ExpansionStatus::Failed,
        )
        .await?;
        if failed.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }
        CellLockRepo::delete_for_cell(&mut *tx, expansion.room_id, expansion.target()).await?;

        tx.commit().await?;
        Ok(failed)
    }

    /// `DONE -> ADOPTED`: insert the tile at the target cell and drop the
    /// lease, atomically.
    ///
    /// Returns `None` if the expansion was no longer `DONE`. If the cell is
    /// already occupied the tile insert fails with a unique violation on
    /// `uq_tiles_room_cell` and the whole transaction rolls back.
    pub async fn adopt(
        pool: &PgPool,
        expansion: &Expansion,
        image_url: &str,
    ) -> Result<Option<(Tile, Expansion)>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let Some(adopted) = Self::transition(
            &mut *tx,
            expansion.id,
            ExpansionStatus::Done,
            ExpansionStatus::Adopted,
        )
        .await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };

        let tile = TileRepo::insert(
            &mut *tx,
            &NewTile {
                room_id: expansion.room_id,
                cell: expansion.target(),
                image_url,
                created_by_user_id: expansion.created_by_user_id,
            },
        )
        .await?;
        CellLockRepo::delete_for_cell(&mut *tx, expansion.room_id, expansion.target()).await?;

        tx.commit().await?;
        Ok(Some((tile, adopted)))
    }

    /// `DONE -> REJECTED` and drop the lease, atomically.
    pub async fn reject(
        pool: &PgPool,
        expansion: &Expansion,
    ) -> Result<Option<Expansion>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let rejected = Self::transition(
            &mut *tx,
            expansion.id,
            ExpansionStatus::Done,
            ExpansionStatus::Rejected,
        )
        .await?;
        if rejected.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }
        CellLockRepo::delete_for_cell(&mut *tx, expansion.room_id, expansion.target()).await?;

        tx.commit().await?;
        Ok(rejected)
    }

    // -----------------------------------------------------------------------
    // Auto-resolution
    // -----------------------------------------------------------------------

    /// Whether the room has any `DONE` expansion last touched before `cutoff`.
    pub async fn has_stale_done(
        pool: &PgPool,
        room_id: EntityId,
        cutoff: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS ( \
                SELECT 1 FROM expansions \
                WHERE room_id = $1 AND status = $2 AND updated_at < $3 \
             )",
        )
        .bind(room_id)
        .bind(ExpansionStatus::Done.as_str())
        .bind(cutoff)
        .fetch_one(pool)
        .await
    }

    /// Stale `DONE` expansions with their vote counts, ordered by target cell
    /// and then by creation time.
    pub async fn list_stale_candidates(
        pool: &PgPool,
        room_id: EntityId,
        cutoff: Timestamp,
    ) -> Result<Vec<StaleCandidate>, sqlx::Error> {
        sqlx::query_as::<_, StaleCandidate>(
            "SELECT e.id, e.room_id, e.target_x, e.target_y, e.result_image_url, \
                    e.created_by_user_id, \
                    COUNT(v.id) FILTER (WHERE v.vote = 'adopt') AS adopt_votes, \
                    COUNT(v.id) FILTER (WHERE v.vote = 'reject') AS reject_votes \
             FROM expansions e \
             LEFT JOIN expansion_votes v ON v.expansion_id = e.id \
             WHERE e.room_id = $1 AND e.status = $2 AND e.updated_at < $3 \
             GROUP BY e.id \
             ORDER BY e.target_x, e.target_y, e.created_at, e.id",
        )
        .bind(room_id)
        .bind(ExpansionStatus::Done.as_str())
        .bind(cutoff)
        .fetch_all(pool)
        .await
    }

    /// Commit one cell group's resolution in a single transaction: adopt
    /// `winner` (if any) into a tile, reject `reject_ids`, drop the lease.
    ///
    /// Nothing is written when the winner is no longer `DONE` or has no
    /// image, or when there is no winner and none of `reject_ids` is still
    /// `DONE`. In particular a replay of an already settled group leaves the
    /// cell's current lease alone. Rejections of rows that already moved are
    /// skipped.
    pub async fn settle_group(
        pool: &PgPool,
        room_id: EntityId,
        cell: Cell,
        winner: Option<&StaleCandidate>,
        reject_ids: &[EntityId],
    ) -> Result<GroupSettlement, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let adopted = match winner {
            Some(winner) => {
                let Some(image_url) = winner.result_image_url.as_deref() else {
                    tx.rollback().await?;
                    return Ok(GroupSettlement::WinnerUnavailable);
                };
                let moved = Self::transition(
                    &mut *tx,
                    winner.id,
                    ExpansionStatus::Done,
                    ExpansionStatus::Adopted,
                )
                .await?;
                if moved.is_none() {
                    tx.rollback().await?;
                    return Ok(GroupSettlement::WinnerUnavailable);
                }
                TileRepo::insert(
                    &mut *tx,
                    &NewTile {
                        room_id,
                        cell,
                        image_url,
                        created_by_user_id: winner.created_by_user_id,
                    },
                )
                .await?;
                Some(winner.id)
            }
            None => None,
        };

        let rejected = Self::transition_many(
            &mut *tx,
            reject_ids,
            ExpansionStatus::Done,
            ExpansionStatus::Rejected,
        )
        .await?;
        if adopted.is_none() && rejected.is_empty() {
            tx.rollback().await?;
            return Ok(GroupSettlement::AlreadySettled);
        }
        CellLockRepo::delete_for_cell(&mut *tx, room_id, cell).await?;

        tx.commit().await?;
        Ok(GroupSettlement::Settled { adopted, rejected })
    }

    /// Reject every listed expansion still `DONE` and drop the cell's lease.
    /// Fallback for a group whose settlement could not be committed.
    ///
    /// Returns the ids that moved. When none did, the lease is kept.
    pub async fn force_reject(
        pool: &PgPool,
        room_id: EntityId,
        cell: Cell,
        ids: &[EntityId],
    ) -> Result<Vec<EntityId>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let rejected = Self::transition_many(
            &mut *tx,
            ids,
            ExpansionStatus::Done,
            ExpansionStatus::Rejected,
        )
        .await?;
        if rejected.is_empty() {
            tx.rollback().await?;
            return Ok(rejected);
        }
        CellLockRepo::delete_for_cell(&mut *tx, room_id, cell).await?;
        tx.commit().await?;
        Ok(rejected)
    }
}
