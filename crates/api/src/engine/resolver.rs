//! Auto-resolution of stale `DONE` expansions.
//!
//! Runs only when asked: from the room read model when at least one `DONE`
//! candidate has outlived the grace period, and from the explicit resolve
//! endpoint. Each cell group is committed in its own transaction; a group
//! that fails to commit is force-rejected and the pass moves on. A group
//! that a concurrent pass already settled is skipped without writes.

use std::collections::HashMap;

use jigsaw_core::grid::Cell;
use jigsaw_core::resolution::{group_by_cell, resolve_group, stale_cutoff, GroupOutcome};
use jigsaw_core::types::{EntityId, Timestamp};
use jigsaw_db::models::expansion::{GroupSettlement, StaleCandidate};
use jigsaw_db::repositories::ExpansionRepo;
use jigsaw_events::ChangeNotifier;
use rand::Rng;
use serde::Serialize;

use crate::error::AppResult;
use crate::state::AppState;

/// What one resolver pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionReport {
    pub adopted: Vec<EntityId>,
    pub rejected: Vec<EntityId>,
    /// Cells whose commit failed and were force-rejected instead.
    pub failed_groups: Vec<Cell>,
}

impl ResolutionReport {
    pub fn is_empty(&self) -> bool {
        self.adopted.is_empty() && self.rejected.is_empty() && self.failed_groups.is_empty()
    }
}

#[derive(Debug)]
struct PlannedGroup {
    cell: Cell,
    outcome: GroupOutcome,
}

/// Decide every group up front so no RNG is held across an await.
fn plan<R: Rng + ?Sized>(candidates: &[StaleCandidate], rng: &mut R) -> Vec<PlannedGroup> {
    group_by_cell(candidates.iter().map(StaleCandidate::to_candidate).collect())
        .into_iter()
        .map(|(cell, group)| PlannedGroup {
            cell,
            outcome: resolve_group(&group, rng),
        })
        .collect()
}

fn plan_with_thread_rng(candidates: &[StaleCandidate]) -> Vec<PlannedGroup> {
    plan(candidates, &mut rand::rng())
}

/// Cheap pre-check used by the room read model.
pub async fn resolve_if_stale(
    state: &AppState,
    room_id: EntityId,
    now: Timestamp,
) -> AppResult<Option<ResolutionReport>> {
    let cutoff = stale_cutoff(now, state.config.auto_adopt_after_ms);
    if !ExpansionRepo::has_stale_done(&state.pool, room_id, cutoff).await? {
        return Ok(None);
    }
    resolve_stale_expansions(state, room_id, now).await.map(Some)
}

/// Settle every `DONE` expansion in the room older than the grace period.
///
/// Running it again on a settled room finds no candidates and changes
/// nothing.
pub async fn resolve_stale_expansions(
    state: &AppState,
    room_id: EntityId,
    now: Timestamp,
) -> AppResult<ResolutionReport> {
    let cutoff = stale_cutoff(now, state.config.auto_adopt_after_ms);
    let candidates = ExpansionRepo::list_stale_candidates(&state.pool, room_id, cutoff).await?;
    if candidates.is_empty() {
        return Ok(ResolutionReport::default());
    }

    let groups = plan_with_thread_rng(&candidates);
    let by_id: HashMap<EntityId, &StaleCandidate> =
        candidates.iter().map(|c| (c.id, c)).collect();

    let mut report = ResolutionReport::default();
    for group in groups {
        commit_group(state, room_id, &group, &by_id, &mut report).await;
    }

    if !report.is_empty() {
        tracing::info!(
            room_id = %room_id,
            adopted = report.adopted.len(),
            rejected = report.rejected.len(),
            failed_groups = report.failed_groups.len(),
            "Resolved stale expansions"
        );
        state.event_bus.notify(room_id, "expansions.resolved");
    }
    Ok(report)
}

async fn commit_group(
    state: &AppState,
    room_id: EntityId,
    group: &PlannedGroup,
    by_id: &HashMap<EntityId, &StaleCandidate>,
    report: &mut ResolutionReport,
) {
    let cell = group.cell;
    let committed = match &group.outcome {
        GroupOutcome::Adopt { winner, losers } => {
            let winner = by_id.get(winner).copied();
            ExpansionRepo::settle_group(&state.pool, room_id, cell, winner, losers).await
        }
        GroupOutcome::RejectAll { ids, .. } => {
            ExpansionRepo::settle_group(&state.pool, room_id, cell, None, ids).await
        }
    };

    match committed {
        Ok(GroupSettlement::Settled { adopted, rejected }) => {
            tracing::debug!(
                room_id = %room_id,
                %cell,
                adopted = ?adopted,
                rejected = rejected.len(),
                "Group settled"
            );
            report.adopted.extend(adopted);
            report.rejected.extend(rejected);
        }
        Ok(GroupSettlement::AlreadySettled) => {
            tracing::debug!(room_id = %room_id, %cell, "Group already settled");
        }
        Ok(GroupSettlement::WinnerUnavailable) => {
            tracing::warn!(room_id = %room_id, %cell, "Group winner changed during resolution");
            if force_reject(state, room_id, group).await > 0 {
                report.failed_groups.push(cell);
            }
        }
        Err(err) => {
            tracing::error!(room_id = %room_id, %cell, error = %err, "Group commit failed");
            force_reject(state, room_id, group).await;
            report.failed_groups.push(cell);
        }
    }
}

/// Best effort. Returns how many candidates moved to `REJECTED`.
async fn force_reject(state: &AppState, room_id: EntityId, group: &PlannedGroup) -> usize {
    let ids = group.outcome.expansion_ids();
    match ExpansionRepo::force_reject(&state.pool, room_id, group.cell, &ids).await {
        Ok(rejected) => {
            tracing::warn!(
                room_id = %room_id,
                cell = %group.cell,
                count = rejected.len(),
                "Force-rejected group"
            );
            rejected.len()
        }
        Err(err) => {
            tracing::error!(
                room_id = %room_id,
                cell = %group.cell,
                error = %err,
                "Force-reject failed"
            );
            0
        }
    }
}
