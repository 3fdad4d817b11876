//! Repository for the `cell_locks` table.
//!
//! At most one row exists per `(room_id, x, y)`. Expired rows are left in
//! place and reclaimed by the next acquirer; reads filter them out.

use jigsaw_core::grid::Cell;
use jigsaw_core::lease::{
    decide_acquire, decide_release, lease_expiry, AcquireDecision, AcquireOutcome,
    ReleaseDecision, ReleaseOutcome,
};
use jigsaw_core::types::{new_id, EntityId, Timestamp};
use sqlx::{PgConnection, PgExecutor, PgPool};

use crate::is_unique_violation;
use crate::models::lock::CellLock;

/// Column list for `cell_locks` queries.
const LOCK_COLUMNS: &str = "id, room_id, x, y, holder_user_id, expires_at, created_at, updated_at";

/// Name of the one-lock-per-cell constraint.
pub const UNIQUE_CELL_CONSTRAINT: &str = "uq_cell_locks_room_cell";

/// Provides the lease operations on cell locks.
pub struct CellLockRepo;

impl CellLockRepo {
    /// Acquire or renew the lease on `cell` for `user_id`.
    ///
    /// The existing row is read `FOR UPDATE` so that renewals and reclaims of
    /// the same row serialize. Two acquirers racing on an empty cell both
    /// attempt the insert; the loser's unique violation is reported as a
    /// denial without a known holder.
    pub async fn acquire(
        pool: &PgPool,
        room_id: EntityId,
        cell: Cell,
        user_id: EntityId,
        now: Timestamp,
        lease_seconds: i64,
    ) -> Result<AcquireOutcome, sqlx::Error> {
        match Self::acquire_in_tx(pool, room_id, cell, user_id, now, lease_seconds).await {
            Err(e) if is_unique_violation(&e, UNIQUE_CELL_CONSTRAINT) => {
                tracing::debug!(%room_id, %cell, %user_id, "Lost lock insert race");
                Ok(AcquireOutcome::Denied { holder_user_id: None })
            }
            other => other,
        }
    }

    async fn acquire_in_tx(
        pool: &PgPool,
        room_id: EntityId,
        cell: Cell,
        user_id: EntityId,
        now: Timestamp,
        lease_seconds: i64,
    ) -> Result<AcquireOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let existing = Self::find_for_update(&mut *tx, room_id, cell).await?;
        let lease = existing.as_ref().map(CellLock::lease);
        let lock_id = existing.as_ref().map(|l| l.id);
        let expires_at = lease_expiry(now, lease_seconds);

        let outcome = match decide_acquire(lease.as_ref(), user_id, now) {
            AcquireDecision::Deny { holder_user_id } => {
                tx.rollback().await?;
                return Ok(AcquireOutcome::Denied {
                    holder_user_id: Some(holder_user_id),
                });
            }
            AcquireDecision::Renew => {
                sqlx::query(
                    "UPDATE cell_locks SET expires_at = $2, updated_at = NOW() WHERE id = $1",
                )
                .bind(lock_id)
                .bind(expires_at)
                .execute(&mut *tx)
                .await?;
                AcquireOutcome::Granted {
                    expires_at,
                    renewed: true,
                }
            }
            decision @ (AcquireDecision::Reclaim | AcquireDecision::Create) => {
                if decision == AcquireDecision::Reclaim {
                    sqlx::query("DELETE FROM cell_locks WHERE id = $1")
                        .bind(lock_id)
                        .execute(&mut *tx)
                        .await?;
                }
                sqlx::query(
                    "INSERT INTO cell_locks (id, room_id, x, y, holder_user_id, expires_at) \
                     VALUES ($1, $2, $3, $4, $5, $6)",
                )
                .bind(new_id())
                .bind(room_id)
                .bind(cell.x)
                .bind(cell.y)
                .bind(user_id)
                .bind(expires_at)
                .execute(&mut *tx)
                .await?;
                AcquireOutcome::Granted {
                    expires_at,
                    renewed: false,
                }
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    /// Release the lease on `cell`. Releasing a free cell succeeds; releasing
    /// someone else's lease is denied and changes nothing.
    pub async fn release(
        pool: &PgPool,
        room_id: EntityId,
        cell: Cell,
        user_id: EntityId,
    ) -> Result<ReleaseOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let existing = Self::find_for_update(&mut *tx, room_id, cell).await?;
        let lease = existing.as_ref().map(CellLock::lease);
        let lock_id = existing.as_ref().map(|l| l.id);

        let outcome = match decide_release(lease.as_ref(), user_id) {
            ReleaseDecision::AlreadyReleased => ReleaseOutcome::Released,
            ReleaseDecision::Deny => ReleaseOutcome::Denied,
            ReleaseDecision::Delete => {
                sqlx::query("DELETE FROM cell_locks WHERE id = $1")
                    .bind(lock_id)
                    .execute(&mut *tx)
                    .await?;
                ReleaseOutcome::Released
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    /// The stored row for `cell`, expired or not.
    pub async fn find_for_cell(
        pool: &PgPool,
        room_id: EntityId,
        cell: Cell,
    ) -> Result<Option<CellLock>, sqlx::Error> {
        let query = format!(
            "SELECT {LOCK_COLUMNS} FROM cell_locks WHERE room_id = $1 AND x = $2 AND y = $3"
        );
        sqlx::query_as::<_, CellLock>(&query)
            .bind(room_id)
            .bind(cell.x)
            .bind(cell.y)
            .fetch_optional(pool)
            .await
    }

    /// Locks in a room that have not expired at `now`.
    pub async fn list_active(
        pool: &PgPool,
        room_id: EntityId,
        now: Timestamp,
    ) -> Result<Vec<CellLock>, sqlx::Error> {
        let query = format!(
            "SELECT {LOCK_COLUMNS} FROM cell_locks \
             WHERE room_id = $1 AND expires_at >= $2 \
             ORDER BY y, x"
        );
        sqlx::query_as::<_, CellLock>(&query)
            .bind(room_id)
            .bind(now)
            .fetch_all(pool)
            .await
    }

    /// Drop whatever lease exists on `cell`, regardless of holder.
    ///
    /// Used inside lifecycle transactions once a candidate for the cell is
    /// settled. Returns the number of rows deleted.
    pub async fn delete_for_cell<'e, E>(
        executor: E,
        room_id: EntityId,
        cell: Cell,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM cell_locks WHERE room_id = $1 AND x = $2 AND y = $3")
            .bind(room_id)
            .bind(cell.x)
            .bind(cell.y)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    async fn find_for_update(
        conn: &mut PgConnection,
        room_id: EntityId,
        cell: Cell,
    ) -> Result<Option<CellLock>, sqlx::Error> {
        let query = format!(
            "SELECT {LOCK_COLUMNS} FROM cell_locks \
             WHERE room_id = $1 AND x = $2 AND y = $3 \
             FOR UPDATE"
        );
        sqlx::query_as::<_, CellLock>(&query)
            .bind(room_id)
            .bind(cell.x)
            .bind(cell.y)
            .fetch_optional(conn)
            .await
    }
}
