//! Cell lock endpoints.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use jigsaw_core::error::CoreError;
use jigsaw_core::lease::{AcquireOutcome, ReleaseOutcome};
use jigsaw_core::types::{EntityId, Timestamp};
use jigsaw_db::models::lock::CellRequest;
use serde::Serialize;

use crate::engine::locks;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct LockGranted {
    pub x: i32,
    pub y: i32,
    pub expires_at: Timestamp,
    pub renewed: bool,
}

/// POST /api/v1/rooms/{id}/locks
///
/// Acquire or renew the lease on a cell. Returns 409 while another user
/// holds an unexpired lease.
pub async fn acquire_lock(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<EntityId>,
    Json(input): Json<CellRequest>,
) -> AppResult<impl IntoResponse> {
    let cell = input.cell();
    match locks::acquire(&state, room_id, cell, auth.user_id).await? {
        AcquireOutcome::Granted {
            expires_at,
            renewed,
        } => Ok(Json(DataResponse {
            data: LockGranted {
                x: cell.x,
                y: cell.y,
                expires_at,
                renewed,
            },
        })),
        AcquireOutcome::Denied {
            holder_user_id: Some(holder),
        } => Err(CoreError::Conflict(format!("Cell {cell} is locked by user {holder}")).into()),
        AcquireOutcome::Denied {
            holder_user_id: None,
        } => Err(CoreError::Conflict(format!("Cell {cell} is locked by another user")).into()),
    }
}

/// DELETE /api/v1/rooms/{id}/locks
///
/// Release the caller's lease. Releasing a free cell succeeds; another
/// user's lease is 403.
pub async fn release_lock(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<EntityId>,
    Json(input): Json<CellRequest>,
) -> AppResult<impl IntoResponse> {
    let cell = input.cell();
    match locks::release(&state, room_id, cell, auth.user_id).await? {
        ReleaseOutcome::Released => Ok(Json(DataResponse {
            data: ReleaseOutcome::Released,
        })),
        ReleaseOutcome::Denied => {
            Err(CoreError::Forbidden(format!("Cell {cell} is locked by another user")).into())
        }
    }
}
