//! Cell lease rules: duration constants and the acquire/release decisions.
//!
//! The repository reads the current lock row inside a transaction, asks
//! [`decide_acquire`] / [`decide_release`] what to do, and applies the
//! answer before committing. Expiry is evaluated lazily against the `now`
//! supplied by the caller; nothing sweeps stale rows in the background.

use chrono::Duration;
use serde::Serialize;

use crate::types::{EntityId, Timestamp};

// ---------------------------------------------------------------------------
// Lease duration constants
// ---------------------------------------------------------------------------

/// Default lease length in seconds.
pub const DEFAULT_LEASE_SECONDS: i64 = 90;

/// Minimum configurable lease length in seconds.
pub const MIN_LEASE_SECONDS: i64 = 5;

/// Maximum configurable lease length in seconds (1 hour).
pub const MAX_LEASE_SECONDS: i64 = 3600;

/// Validate a configured lease length. Returns `Ok(())` or an error message.
pub fn validate_lease_seconds(seconds: i64) -> Result<(), String> {
    if seconds < MIN_LEASE_SECONDS {
        return Err(format!(
            "Lease duration must be at least {MIN_LEASE_SECONDS} seconds, got {seconds}"
        ));
    }
    if seconds > MAX_LEASE_SECONDS {
        return Err(format!(
            "Lease duration must be at most {MAX_LEASE_SECONDS} seconds, got {seconds}"
        ));
    }
    Ok(())
}

/// Absolute expiry for a lease granted or renewed at `now`.
pub fn lease_expiry(now: Timestamp, lease_seconds: i64) -> Timestamp {
    now + Duration::seconds(lease_seconds)
}

// ---------------------------------------------------------------------------
// Lease view
// ---------------------------------------------------------------------------

/// The parts of a stored lock that the lease rules look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lease {
    pub holder_user_id: EntityId,
    pub expires_at: Timestamp,
}

impl Lease {
    /// A lease is expired strictly after its expiry instant.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at < now
    }

    /// `true` if `user_id` holds this lease and it has not expired.
    pub fn is_held_by(&self, user_id: EntityId, now: Timestamp) -> bool {
        self.holder_user_id == user_id && !self.is_expired(now)
    }
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// What `acquire` must do given the current row for the cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireDecision {
    /// No row exists: insert one.
    Create,
    /// An expired row exists: delete it, then insert.
    Reclaim,
    /// The caller already holds an active lease: push the expiry out.
    Renew,
    /// Another user holds an active lease. Nothing is written.
    Deny { holder_user_id: EntityId },
}

pub fn decide_acquire(existing: Option<&Lease>, user_id: EntityId, now: Timestamp) -> AcquireDecision {
    match existing {
        None => AcquireDecision::Create,
        Some(lease) if lease.is_expired(now) => AcquireDecision::Reclaim,
        Some(lease) if lease.holder_user_id == user_id => AcquireDecision::Renew,
        Some(lease) => AcquireDecision::Deny {
            holder_user_id: lease.holder_user_id,
        },
    }
}

/// What `release` must do given the current row for the cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseDecision {
    /// Nothing to release; report success.
    AlreadyReleased,
    /// The caller is the holder: delete the row.
    Delete,
    /// The row belongs to someone else.
    Deny,
}

pub fn decide_release(existing: Option<&Lease>, user_id: EntityId) -> ReleaseDecision {
    match existing {
        None => ReleaseDecision::AlreadyReleased,
        Some(lease) if lease.holder_user_id == user_id => ReleaseDecision::Delete,
        Some(_) => ReleaseDecision::Deny,
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of an acquire attempt as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AcquireOutcome {
    Granted {
        expires_at: Timestamp,
        renewed: bool,
    },
    /// `holder_user_id` is `None` when a concurrent acquirer won the insert
    /// race and the winner is unknown to this transaction.
    Denied { holder_user_id: Option<EntityId> },
}

/// Result of a release attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseOutcome {
    Released,
    Denied,
}
