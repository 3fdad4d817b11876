//! Cell lease operations.

use chrono::Utc;
use jigsaw_core::grid::Cell;
use jigsaw_core::lease::{AcquireOutcome, ReleaseOutcome};
use jigsaw_core::types::EntityId;
use jigsaw_db::repositories::CellLockRepo;
use jigsaw_events::ChangeNotifier;

use crate::engine::load_room;
use crate::error::AppResult;
use crate::state::AppState;

/// Acquire or renew the lease on `cell` for `user_id`.
///
/// A denial is a normal outcome, not an error; handlers decide how to
/// present it.
pub async fn acquire(
    state: &AppState,
    room_id: EntityId,
    cell: Cell,
    user_id: EntityId,
) -> AppResult<AcquireOutcome> {
    load_room(&state.pool, room_id).await?;

    let outcome = CellLockRepo::acquire(
        &state.pool,
        room_id,
        cell,
        user_id,
        Utc::now(),
        state.config.lock_ttl_seconds,
    )
    .await?;

    match &outcome {
        AcquireOutcome::Granted { expires_at, renewed } => {
            tracing::info!(
                room_id = %room_id,
                %cell,
                user_id = %user_id,
                %expires_at,
                renewed,
                "Cell lock granted"
            );
            state.event_bus.notify(room_id, "lock.acquired");
        }
        AcquireOutcome::Denied { holder_user_id } => {
            tracing::debug!(
                room_id = %room_id,
                %cell,
                user_id = %user_id,
                holder = ?holder_user_id,
                "Cell lock denied"
            );
        }
    }

    Ok(outcome)
}

/// Release `user_id`'s lease on `cell`. Releasing a free cell succeeds.
pub async fn release(
    state: &AppState,
    room_id: EntityId,
    cell: Cell,
    user_id: EntityId,
) -> AppResult<ReleaseOutcome> {
    load_room(&state.pool, room_id).await?;

    let outcome = CellLockRepo::release(&state.pool, room_id, cell, user_id).await?;
    if outcome == ReleaseOutcome::Released {
        tracing::info!(room_id = %room_id, %cell, user_id = %user_id, "Cell lock released");
        state.event_bus.notify(room_id, "lock.released");
    }
    Ok(outcome)
}
