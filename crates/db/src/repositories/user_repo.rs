//! Repository for the `users` table.

use jigsaw_core::types::{new_id, EntityId};
use sqlx::PgPool;

use crate::models::user::User;

const COLUMNS: &str = "id, display_name, created_at, updated_at";

pub struct UserRepo;

impl UserRepo {
    pub async fn create(pool: &PgPool, display_name: &str) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (id, display_name) VALUES ($1, $2) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(new_id())
            .bind(display_name.trim())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: EntityId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
