//! Room-level rules: name validation and the initial-tile generation gate.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

/// Initial generation running longer than this is considered stuck (5 minutes).
pub const INITIAL_GENERATION_TIMEOUT_SECS: i64 = 300;

/// Prompt used for the first tile when the room was created without one.
pub const DEFAULT_INITIAL_PROMPT: &str = "a colorful landscape";

/// Maximum room name length.
pub const MAX_ROOM_NAME_LEN: usize = 100;

/// Maximum user display name length.
pub const MAX_DISPLAY_NAME_LEN: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InitialTileStatus {
    Pending,
    Generating,
    Done,
    Failed,
}

impl InitialTileStatus {
    /// Database representation, matching the `ck_rooms_initial_tile_status` constraint.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Generating => "GENERATING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "PENDING" => Ok(Self::Pending),
            "GENERATING" => Ok(Self::Generating),
            "DONE" => Ok(Self::Done),
            "FAILED" => Ok(Self::Failed),
            other => Err(CoreError::Internal(format!("Unknown initial tile status '{other}'"))),
        }
    }
}

/// Whether an initial-tile generation may start, given the room's current status.
///
/// Returns `Ok(true)` when a stuck `GENERATING` run must first be reset to
/// `FAILED`, `Ok(false)` when the room can go straight to `GENERATING`.
pub fn check_initial_generation(
    status: InitialTileStatus,
    status_updated_at: Timestamp,
    now: Timestamp,
) -> Result<bool, CoreError> {
    match status {
        InitialTileStatus::Pending | InitialTileStatus::Failed => Ok(false),
        InitialTileStatus::Done => Err(CoreError::Conflict(
            "Initial tile generation already completed".into(),
        )),
        InitialTileStatus::Generating => {
            if now - status_updated_at < Duration::seconds(INITIAL_GENERATION_TIMEOUT_SECS) {
                Err(CoreError::Conflict(
                    "Initial tile generation already in progress".into(),
                ))
            } else {
                Ok(true)
            }
        }
    }
}

fn validate_name(kind: &str, value: &str, max: usize) -> Result<(), CoreError> {
    let len = value.trim().chars().count();
    if len == 0 {
        return Err(CoreError::Validation(format!("{kind} must not be empty")));
    }
    if len > max {
        return Err(CoreError::Validation(format!(
            "{kind} must be at most {max} characters, got {len}"
        )));
    }
    Ok(())
}

pub fn validate_room_name(name: &str) -> Result<(), CoreError> {
    validate_name("Room name", name, MAX_ROOM_NAME_LEN)
}

pub fn validate_display_name(name: &str) -> Result<(), CoreError> {
    validate_name("Display name", name, MAX_DISPLAY_NAME_LEN)
}
