//! Expansion lifecycle: create, run, adopt, reject, vote.
//!
//! Every status change goes through the conditional-update primitive in
//! [`ExpansionRepo`], so of two racing callers exactly one observes the
//! transition and the other gets a conflict.

use std::collections::HashMap;

use chrono::Utc;
use jigsaw_core::error::CoreError;
use jigsaw_core::expansion::{ExpansionStatus, VoteValue};
use jigsaw_core::grid::{validate_adjacency, Direction};
use jigsaw_core::types::EntityId;
use jigsaw_db::is_unique_violation;
use jigsaw_db::models::expansion::{CreateExpansion, Expansion};
use jigsaw_db::models::tile::Tile;
use jigsaw_db::models::vote::Vote;
use jigsaw_db::repositories::tile_repo::UNIQUE_CELL_CONSTRAINT;
use jigsaw_db::repositories::{CellLockRepo, ExpansionRepo, TileRepo, VoteRepo};
use jigsaw_events::ChangeNotifier;
use jigsaw_imagegen::ExpandRequest;

use crate::engine::{ensure_creator_or_owner, load_expansion, load_room};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Message surfaced to clients when the generation backend fails.
pub const GENERATION_FAILED: &str = "Image generation failed";

/// Queue a new expansion into an empty cell the caller holds the lease on.
pub async fn create_expansion(
    state: &AppState,
    room_id: EntityId,
    user_id: EntityId,
    input: &CreateExpansion,
) -> AppResult<Expansion> {
    input.prompt.check()?;

    load_room(&state.pool, room_id).await?;

    let source = TileRepo::find_by_id(&state.pool, input.from_tile_id)
        .await?
        .filter(|t| t.room_id == room_id)
        .ok_or_else(|| CoreError::not_found("Tile", input.from_tile_id))?;

    let target = input.target();
    validate_adjacency(source.cell(), target, input.direction)?;

    if TileRepo::find_at(&state.pool, room_id, target).await?.is_some() {
        return Err(CoreError::Conflict(format!("Cell {target} already has a tile")).into());
    }

    let now = Utc::now();
    let holds_lease = CellLockRepo::find_for_cell(&state.pool, room_id, target)
        .await?
        .is_some_and(|lock| lock.lease().is_held_by(user_id, now));
    if !holds_lease {
        return Err(CoreError::Conflict(format!(
            "You must hold an active lock on cell {target} to expand into it"
        ))
        .into());
    }

    let expansion = ExpansionRepo::create(&state.pool, room_id, user_id, input).await?;

    tracing::info!(
        expansion_id = %expansion.id,
        room_id = %room_id,
        %target,
        direction = %input.direction,
        user_id = %user_id,
        "Expansion queued"
    );
    state.event_bus.notify(room_id, "expansion.created");

    Ok(expansion)
}

/// Move a `QUEUED` expansion through generation to `DONE` or `FAILED`.
///
/// The `QUEUED -> RUNNING` claim is committed before the provider is called;
/// a failed generation marks the expansion `FAILED` and frees the cell.
pub async fn run_expansion(
    state: &AppState,
    expansion_id: EntityId,
    user_id: EntityId,
) -> AppResult<Expansion> {
    let expansion = load_expansion(&state.pool, expansion_id).await?;
    let room = load_room(&state.pool, expansion.room_id).await?;
    ensure_creator_or_owner(&expansion, &room, user_id, "run")?;
    ExpansionStatus::ensure(expansion.status()?, ExpansionStatus::Queued)?;

    let source = TileRepo::find_by_id(&state.pool, expansion.from_tile_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Tile", expansion.from_tile_id))?;

    let target = expansion.target();
    let neighbors = TileRepo::list_neighbors(&state.pool, room.id, target).await?;
    let adjacent_images: HashMap<Direction, String> = target
        .neighbors()
        .into_iter()
        .filter_map(|(dir, cell)| {
            neighbors
                .iter()
                .find(|t| t.cell() == cell)
                .map(|t| (dir, t.image_url.clone()))
        })
        .collect();

    let running = ExpansionRepo::transition(
        &state.pool,
        expansion.id,
        ExpansionStatus::Queued,
        ExpansionStatus::Running,
    )
    .await?
    .ok_or_else(|| CoreError::Conflict("Expansion is already running or finished".into()))?;
    state.event_bus.notify(room.id, "expansion.running");

    let request = ExpandRequest {
        reference_image_url: source.image_url.clone(),
        direction: running.direction()?,
        prompt: running.prompt.0.clone(),
        size: state.config.tile_size,
        adjacent_images,
    };

    tracing::info!(
        expansion_id = %running.id,
        room_id = %room.id,
        %target,
        generator = state.generator.name(),
        neighbors = request.adjacent_images.len(),
        "Generating expansion"
    );

    // Detached so a dropped request or a request timeout cannot strand the
    // expansion in RUNNING.
    let task_state = state.clone();
    tokio::spawn(async move { finish_run(&task_state, running, request).await })
        .await
        .map_err(|e| AppError::InternalError(format!("Generation task aborted: {e}")))?
}

async fn finish_run(
    state: &AppState,
    running: Expansion,
    request: ExpandRequest,
) -> AppResult<Expansion> {
    match state.generator.generate(&request).await {
        Ok(image) => {
            let done = ExpansionRepo::complete(&state.pool, running.id, &image.image_path)
                .await?
                .ok_or_else(|| {
                    CoreError::Conflict("Expansion left RUNNING during generation".into())
                })?;
            tracing::info!(
                expansion_id = %done.id,
                image = %image.image_path,
                "Expansion generated"
            );
            state.event_bus.notify(done.room_id, "expansion.done");
            Ok(done)
        }
        Err(err) => {
            tracing::error!(expansion_id = %running.id, error = %err, "Expansion generation failed");
            if ExpansionRepo::fail_and_release(&state.pool, &running).await?.is_some() {
                state.event_bus.notify(running.room_id, "expansion.failed");
            }
            Err(CoreError::Provider(GENERATION_FAILED.into()).into())
        }
    }
}

/// `DONE -> ADOPTED`: place the generated tile and free the cell.
pub async fn adopt_expansion(
    state: &AppState,
    expansion_id: EntityId,
    user_id: EntityId,
) -> AppResult<(Tile, Expansion)> {
    let expansion = load_expansion(&state.pool, expansion_id).await?;
    let room = load_room(&state.pool, expansion.room_id).await?;
    ensure_creator_or_owner(&expansion, &room, user_id, "adopt")?;
    ExpansionStatus::ensure(expansion.status()?, ExpansionStatus::Done)?;

    let image_url = expansion
        .result_image_url
        .clone()
        .ok_or_else(|| CoreError::Validation("Expansion has no result image to adopt".into()))?;

    let adopted = match ExpansionRepo::adopt(&state.pool, &expansion, &image_url).await {
        Ok(adopted) => adopted,
        Err(err) if is_unique_violation(&err, UNIQUE_CELL_CONSTRAINT) => {
            return Err(CoreError::Conflict(format!(
                "Cell {} already has a tile",
                expansion.target()
            ))
            .into());
        }
        Err(err) => return Err(err.into()),
    };
    let (tile, adopted) = adopted
        .ok_or_else(|| CoreError::Conflict("Expansion is no longer DONE".into()))?;

    tracing::info!(
        expansion_id = %adopted.id,
        tile_id = %tile.id,
        cell = %tile.cell(),
        user_id = %user_id,
        "Expansion adopted"
    );
    state.event_bus.notify(room.id, "expansion.adopted");

    Ok((tile, adopted))
}

/// `DONE -> REJECTED`: discard the candidate and free the cell.
pub async fn reject_expansion(
    state: &AppState,
    expansion_id: EntityId,
    user_id: EntityId,
) -> AppResult<Expansion> {
    let expansion = load_expansion(&state.pool, expansion_id).await?;
    let room = load_room(&state.pool, expansion.room_id).await?;
    ensure_creator_or_owner(&expansion, &room, user_id, "reject")?;
    ExpansionStatus::ensure(expansion.status()?, ExpansionStatus::Done)?;

    let rejected = ExpansionRepo::reject(&state.pool, &expansion)
        .await?
        .ok_or_else(|| CoreError::Conflict("Expansion is no longer DONE".into()))?;

    tracing::info!(expansion_id = %rejected.id, user_id = %user_id, "Expansion rejected");
    state.event_bus.notify(room.id, "expansion.rejected");

    Ok(rejected)
}

/// Record or change `user_id`'s vote. Only `DONE` expansions take votes.
pub async fn cast_vote(
    state: &AppState,
    expansion_id: EntityId,
    user_id: EntityId,
    value: VoteValue,
) -> AppResult<Vote> {
    let expansion = load_expansion(&state.pool, expansion_id).await?;

    let vote = VoteRepo::cast(&state.pool, expansion.id, user_id, value)
        .await?
        .ok_or_else(|| {
            CoreError::Conflict(format!(
                "Votes are only accepted while the expansion is DONE (currently {})",
                expansion.status
            ))
        })?;

    tracing::info!(
        expansion_id = %expansion.id,
        user_id = %user_id,
        vote = value.as_str(),
        "Vote cast"
    );
    state.event_bus.notify(expansion.room_id, "vote.cast");

    Ok(vote)
}
