//! Expansion lifecycle: status machine, prompt payload, and vote values.
//!
//! ```text
//! QUEUED -> RUNNING -> DONE -> ADOPTED
//!                  \       \-> REJECTED
//!                   \-> FAILED
//! ```
//!
//! `FAILED`, `ADOPTED` and `REJECTED` are terminal. Every transition is
//! written as a conditional update guarded by the expected source status, so
//! this table only decides which guards are legal.

use std::fmt;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default grace period before a `DONE` candidate may be auto-resolved (5 minutes).
pub const DEFAULT_GRACE_PERIOD_MS: i64 = 5 * 60 * 1000;

/// Maximum configurable grace period (30 days).
pub const MAX_GRACE_PERIOD_MS: i64 = 30 * 24 * 60 * 60 * 1000;

/// Validate a configured grace period. Returns `Ok(())` or an error message.
pub fn validate_grace_period_ms(ms: i64) -> Result<(), String> {
    if ms < 0 {
        return Err(format!("Grace period must not be negative, got {ms}"));
    }
    if ms > MAX_GRACE_PERIOD_MS {
        return Err(format!(
            "Grace period must be at most {MAX_GRACE_PERIOD_MS} ms, got {ms}"
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// ExpansionStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpansionStatus {
    Queued,
    Running,
    Done,
    Failed,
    Adopted,
    Rejected,
}

impl ExpansionStatus {
    /// Database representation, matching the `ck_expansions_status` constraint.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
            Self::Adopted => "ADOPTED",
            Self::Rejected => "REJECTED",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "QUEUED" => Ok(Self::Queued),
            "RUNNING" => Ok(Self::Running),
            "DONE" => Ok(Self::Done),
            "FAILED" => Ok(Self::Failed),
            "ADOPTED" => Ok(Self::Adopted),
            "REJECTED" => Ok(Self::Rejected),
            other => Err(CoreError::Internal(format!("Unknown expansion status '{other}'"))),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Adopted | Self::Rejected)
    }

    /// Whether the candidate still shows up in a room's working set.
    pub fn is_open(self) -> bool {
        !matches!(self, Self::Adopted | Self::Rejected)
    }

    pub fn can_transition_to(self, next: ExpansionStatus) -> bool {
        use ExpansionStatus::*;
        matches!(
            (self, next),
            (Queued, Running) | (Running, Done) | (Running, Failed) | (Done, Adopted) | (Done, Rejected)
        )
    }

    /// Reject a transition request up front when `current` is not `expected`.
    ///
    /// The storage guard still decides the race; this only produces the
    /// human-readable conflict for the common, non-racing case.
    pub fn ensure(current: ExpansionStatus, expected: ExpansionStatus) -> Result<(), CoreError> {
        if current == expected {
            Ok(())
        } else {
            Err(CoreError::Conflict(format!(
                "Expansion is in status {current}, expected {expected}"
            )))
        }
    }
}

impl fmt::Display for ExpansionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

/// The prompt payload stored with each expansion as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Prompt {
    #[validate(length(min = 1, max = 1000))]
    pub text: String,
    #[validate(length(max = 100))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

impl Prompt {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: None,
        }
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    /// Validate lengths and reject whitespace-only text.
    pub fn check(&self) -> Result<(), CoreError> {
        self.validate()
            .map_err(|e| CoreError::Validation(format!("Invalid prompt: {e}")))?;
        if self.text.trim().is_empty() {
            return Err(CoreError::Validation("Prompt text must not be blank".into()));
        }
        Ok(())
    }

    /// The text sent to the generation backend.
    pub fn render(&self) -> String {
        match self.style.as_deref().map(str::trim) {
            Some(style) if !style.is_empty() => format!("{} ({style} style)", self.text),
            _ => self.text.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Votes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteValue {
    Adopt,
    Reject,
}

impl VoteValue {
    /// Database representation, matching the `ck_expansion_votes_vote` constraint.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Adopt => "adopt",
            Self::Reject => "reject",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "adopt" => Ok(Self::Adopt),
            "reject" => Ok(Self::Reject),
            other => Err(CoreError::Validation(format!(
                "Invalid vote '{other}'. Must be one of: adopt, reject"
            ))),
        }
    }
}
