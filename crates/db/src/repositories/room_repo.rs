//! Repository for the `rooms` table, including the initial-tile status
//! machine.

use jigsaw_core::grid::Cell;
use jigsaw_core::room::InitialTileStatus;
use jigsaw_core::types::{new_id, EntityId, Timestamp};
use sqlx::{PgExecutor, PgPool};

use crate::models::room::{CreateRoom, Room, RoomSummary};
use crate::models::tile::{NewTile, Tile};
use crate::repositories::TileRepo;

const COLUMNS: &str = "id, name, owner_user_id, style_preset, initial_prompt, \
                       initial_tile_status, created_at, updated_at";

pub struct RoomRepo;

impl RoomRepo {
    pub async fn create(
        pool: &PgPool,
        owner_user_id: EntityId,
        input: &CreateRoom,
    ) -> Result<Room, sqlx::Error> {
        let query = format!(
            "INSERT INTO rooms (id, name, owner_user_id, style_preset, initial_prompt) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Room>(&query)
            .bind(new_id())
            .bind(input.name.trim())
            .bind(owner_user_id)
            .bind(non_blank(input.style_preset.as_deref()))
            .bind(non_blank(input.initial_prompt.as_deref()))
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: EntityId) -> Result<Option<Room>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM rooms WHERE id = $1");
        sqlx::query_as::<_, Room>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All rooms, newest first, with the owner's display name.
    pub async fn list(pool: &PgPool) -> Result<Vec<RoomSummary>, sqlx::Error> {
        sqlx::query_as::<_, RoomSummary>(
            "SELECT r.id, r.name, r.owner_user_id, u.display_name AS owner_display_name, \
                    r.style_preset, r.initial_tile_status, r.created_at \
             FROM rooms r \
             JOIN users u ON u.id = r.owner_user_id \
             ORDER BY r.created_at DESC, r.id DESC",
        )
        .fetch_all(pool)
        .await
    }

    /// Move the initial-tile status to `to` if it is currently one of `from`.
    ///
    /// Returns `None` when the guard did not match.
    pub async fn transition_initial_status<'e, E>(
        executor: E,
        id: EntityId,
        from: &[InitialTileStatus],
        to: InitialTileStatus,
    ) -> Result<Option<Room>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let from: Vec<&str> = from.iter().map(|s| s.as_str()).collect();
        let query = format!(
            "UPDATE rooms SET initial_tile_status = $3, updated_at = NOW() \
             WHERE id = $1 AND initial_tile_status = ANY($2) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Room>(&query)
            .bind(id)
            .bind(from)
            .bind(to.as_str())
            .fetch_optional(executor)
            .await
    }

    /// Reset a `GENERATING` room to `FAILED` if its status was last touched
    /// before `started_before`. Returns `None` if another caller got there
    /// first or the run is not stuck.
    pub async fn reset_stuck_generation(
        pool: &PgPool,
        id: EntityId,
        started_before: Timestamp,
    ) -> Result<Option<Room>, sqlx::Error> {
        let query = format!(
            "UPDATE rooms SET initial_tile_status = $2, updated_at = NOW() \
             WHERE id = $1 AND initial_tile_status = $3 AND updated_at < $4 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Room>(&query)
            .bind(id)
            .bind(InitialTileStatus::Failed.as_str())
            .bind(InitialTileStatus::Generating.as_str())
            .bind(started_before)
            .fetch_optional(pool)
            .await
    }

    /// Store the generated origin tile and mark the room `DONE` in one
    /// transaction.
    ///
    /// Returns `None` if the room was no longer `GENERATING`; nothing is
    /// written in that case.
    pub async fn complete_initial_tile(
        pool: &PgPool,
        room_id: EntityId,
        created_by_user_id: EntityId,
        image_url: &str,
    ) -> Result<Option<Tile>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let moved = Self::transition_initial_status(
            &mut *tx,
            room_id,
            &[InitialTileStatus::Generating],
            InitialTileStatus::Done,
        )
        .await?;
        if moved.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        let tile = TileRepo::insert(
            &mut *tx,
            &NewTile {
                room_id,
                cell: Cell::ORIGIN,
                image_url,
                created_by_user_id,
            },
        )
        .await?;

        tx.commit().await?;
        Ok(Some(tile))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
