//! Repository for the append-only `tiles` table.

use jigsaw_core::grid::Cell;
use jigsaw_core::types::{new_id, EntityId};
use sqlx::{PgExecutor, PgPool};

use crate::models::tile::{NewTile, Tile};

/// Column list shared across queries.
const COLUMNS: &str = "id, room_id, x, y, image_url, created_by_user_id, created_at, updated_at";

/// Name of the one-tile-per-cell constraint.
pub const UNIQUE_CELL_CONSTRAINT: &str = "uq_tiles_room_cell";

pub struct TileRepo;

impl TileRepo {
    /// Insert a tile. Fails with a unique violation on
    /// [`UNIQUE_CELL_CONSTRAINT`] if the cell is already occupied.
    pub async fn insert<'e, E>(executor: E, tile: &NewTile<'_>) -> Result<Tile, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO tiles (id, room_id, x, y, image_url, created_by_user_id) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Tile>(&query)
            .bind(new_id())
            .bind(tile.room_id)
            .bind(tile.cell.x)
            .bind(tile.cell.y)
            .bind(tile.image_url)
            .bind(tile.created_by_user_id)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: EntityId) -> Result<Option<Tile>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tiles WHERE id = $1");
        sqlx::query_as::<_, Tile>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// The tile occupying `cell`, if any.
    pub async fn find_at(
        pool: &PgPool,
        room_id: EntityId,
        cell: Cell,
    ) -> Result<Option<Tile>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tiles WHERE room_id = $1 AND x = $2 AND y = $3");
        sqlx::query_as::<_, Tile>(&query)
            .bind(room_id)
            .bind(cell.x)
            .bind(cell.y)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_by_room(pool: &PgPool, room_id: EntityId) -> Result<Vec<Tile>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tiles WHERE room_id = $1 ORDER BY y, x");
        sqlx::query_as::<_, Tile>(&query)
            .bind(room_id)
            .fetch_all(pool)
            .await
    }

    /// Tiles orthogonally adjacent to `cell`.
    pub async fn list_neighbors(
        pool: &PgPool,
        room_id: EntityId,
        cell: Cell,
    ) -> Result<Vec<Tile>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM tiles \
             WHERE room_id = $1 AND abs(x - $2) + abs(y - $3) = 1"
        );
        sqlx::query_as::<_, Tile>(&query)
            .bind(room_id)
            .bind(cell.x)
            .bind(cell.y)
            .fetch_all(pool)
            .await
    }
}
