//! Vote tally and winner selection for stale `DONE` candidates.
//!
//! Candidates are grouped by target cell. For each group the adopt and
//! reject votes of every candidate are summed:
//!
//! - reject strictly greater than adopt: the whole group is rejected;
//! - otherwise a winner is chosen among candidates that carry a result
//!   image. With zero votes in total the pick is uniformly random, else the
//!   candidate with the most adopt votes wins and ties go to the first one
//!   encountered;
//! - a group without any result image is rejected outright.
//!
//! The functions here only decide. Committing the outcome is the job of the
//! repository layer.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Serialize;

use crate::grid::Cell;
use crate::types::{EntityId, Timestamp};

/// A stale `DONE` expansion together with its vote counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub expansion_id: EntityId,
    pub cell: Cell,
    pub has_result_image: bool,
    pub adopt_votes: i64,
    pub reject_votes: i64,
}

/// Summed votes across every candidate of one cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub adopt: i64,
    pub reject: i64,
}

impl Tally {
    pub fn total(&self) -> i64 {
        self.adopt + self.reject
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Reject votes outnumbered adopt votes.
    Outvoted,
    /// No candidate in the group produced an image.
    NoResultImage,
}

/// The decision for one cell group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupOutcome {
    Adopt {
        winner: EntityId,
        losers: Vec<EntityId>,
    },
    RejectAll {
        ids: Vec<EntityId>,
        reason: RejectReason,
    },
}

impl GroupOutcome {
    /// Every expansion id the outcome touches.
    pub fn expansion_ids(&self) -> Vec<EntityId> {
        match self {
            Self::Adopt { winner, losers } => std::iter::once(*winner).chain(losers.iter().copied()).collect(),
            Self::RejectAll { ids, .. } => ids.clone(),
        }
    }
}

/// Instant before which a `DONE` candidate counts as stale. Saturates at the
/// ends of the representable range instead of overflowing.
pub fn stale_cutoff(now: Timestamp, grace_period_ms: i64) -> Timestamp {
    Duration::try_milliseconds(grace_period_ms)
        .and_then(|grace| now.checked_sub_signed(grace))
        .unwrap_or(if grace_period_ms < 0 {
            DateTime::<Utc>::MAX_UTC
        } else {
            DateTime::<Utc>::MIN_UTC
        })
}

pub fn tally(candidates: &[Candidate]) -> Tally {
    candidates.iter().fold(Tally::default(), |acc, c| Tally {
        adopt: acc.adopt + c.adopt_votes,
        reject: acc.reject + c.reject_votes,
    })
}

/// Group candidates by target cell, preserving their input order within a group.
pub fn group_by_cell(candidates: Vec<Candidate>) -> BTreeMap<Cell, Vec<Candidate>> {
    let mut groups: BTreeMap<Cell, Vec<Candidate>> = BTreeMap::new();
    for candidate in candidates {
        groups.entry(candidate.cell).or_default().push(candidate);
    }
    groups
}

/// Decide the outcome for the candidates of a single cell.
pub fn resolve_group<R: Rng + ?Sized>(candidates: &[Candidate], rng: &mut R) -> GroupOutcome {
    let all_ids = || candidates.iter().map(|c| c.expansion_id).collect::<Vec<_>>();
    let votes = tally(candidates);

    if votes.reject > votes.adopt {
        return GroupOutcome::RejectAll {
            ids: all_ids(),
            reason: RejectReason::Outvoted,
        };
    }

    let eligible: Vec<&Candidate> = candidates.iter().filter(|c| c.has_result_image).collect();
    if eligible.is_empty() {
        return GroupOutcome::RejectAll {
            ids: all_ids(),
            reason: RejectReason::NoResultImage,
        };
    }

    let winner = if votes.total() == 0 {
        eligible[rng.random_range(0..eligible.len())]
    } else {
        let mut best = eligible[0];
        for candidate in &eligible[1..] {
            if candidate.adopt_votes > best.adopt_votes {
                best = candidate;
            }
        }
        best
    };

    GroupOutcome::Adopt {
        winner: winner.expansion_id,
        losers: candidates
            .iter()
            .map(|c| c.expansion_id)
            .filter(|id| *id != winner.expansion_id)
            .collect(),
    }
}
