//! A room's first tile.
//!
//! `PENDING | FAILED -> GENERATING -> DONE | FAILED`. A `GENERATING` run
//! older than [`INITIAL_GENERATION_TIMEOUT_SECS`] is treated as stuck and may
//! be restarted.

use chrono::{Duration, Utc};
use jigsaw_core::error::CoreError;
use jigsaw_core::expansion::Prompt;
use jigsaw_core::room::{
    check_initial_generation, InitialTileStatus, DEFAULT_INITIAL_PROMPT,
    INITIAL_GENERATION_TIMEOUT_SECS,
};
use jigsaw_core::types::EntityId;
use jigsaw_db::models::room::Room;
use jigsaw_db::models::tile::Tile;
use jigsaw_db::repositories::RoomRepo;
use jigsaw_events::ChangeNotifier;
use jigsaw_imagegen::InitialRequest;

use crate::engine::lifecycle::GENERATION_FAILED;
use crate::engine::load_room;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

fn initial_prompt(room: &Room) -> Prompt {
    let text = room
        .initial_prompt
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_INITIAL_PROMPT);
    Prompt {
        text: text.to_string(),
        style: room.style_preset.clone(),
    }
}

/// Generate and place the tile at the origin. Owner only.
pub async fn generate_initial_tile(
    state: &AppState,
    room_id: EntityId,
    user_id: EntityId,
) -> AppResult<Tile> {
    let room = load_room(&state.pool, room_id).await?;
    if room.owner_user_id != user_id {
        return Err(CoreError::Forbidden(
            "Only the room owner may generate the initial tile".into(),
        )
        .into());
    }

    let now = Utc::now();
    if check_initial_generation(room.initial_status()?, room.updated_at, now)? {
        let started_before = now - Duration::seconds(INITIAL_GENERATION_TIMEOUT_SECS);
        RoomRepo::reset_stuck_generation(&state.pool, room.id, started_before)
            .await?
            .ok_or_else(|| {
                CoreError::Conflict("Initial tile generation already in progress".into())
            })?;
        tracing::warn!(room_id = %room.id, "Reset stuck initial tile generation");
    }

    let generating = RoomRepo::transition_initial_status(
        &state.pool,
        room.id,
        &[InitialTileStatus::Pending, InitialTileStatus::Failed],
        InitialTileStatus::Generating,
    )
    .await?
    .ok_or_else(|| CoreError::Conflict("Initial tile generation already in progress".into()))?;
    state.event_bus.notify(room.id, "room.generating");

    let request = InitialRequest {
        prompt: initial_prompt(&generating),
        size: state.config.tile_size,
    };
    tracing::info!(
        room_id = %room.id,
        generator = state.generator.name(),
        prompt = %request.prompt.render(),
        "Generating initial tile"
    );

    let task_state = state.clone();
    tokio::spawn(async move { finish_initial(&task_state, generating, user_id, request).await })
        .await
        .map_err(|e| AppError::InternalError(format!("Generation task aborted: {e}")))?
}

async fn finish_initial(
    state: &AppState,
    room: Room,
    user_id: EntityId,
    request: InitialRequest,
) -> AppResult<Tile> {
    match state.generator.generate_initial(&request).await {
        Ok(image) => {
            let tile =
                RoomRepo::complete_initial_tile(&state.pool, room.id, user_id, &image.image_path)
                    .await?
                    .ok_or_else(|| {
                        CoreError::Conflict("Room left GENERATING during generation".into())
                    })?;
            tracing::info!(room_id = %room.id, tile_id = %tile.id, "Initial tile placed");
            state.event_bus.notify(room.id, "room.initial_tile");
            Ok(tile)
        }
        Err(err) => {
            tracing::error!(room_id = %room.id, error = %err, "Initial tile generation failed");
            let failed = RoomRepo::transition_initial_status(
                &state.pool,
                room.id,
                &[InitialTileStatus::Generating],
                InitialTileStatus::Failed,
            )
            .await?;
            if failed.is_some() {
                state.event_bus.notify(room.id, "room.initial_failed");
            }
            Err(CoreError::Provider(GENERATION_FAILED.into()).into())
        }
    }
}
