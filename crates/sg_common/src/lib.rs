//! Common types and errors for StudyGuide
//!
//! This crate provides the error type, exit codes and logging setup shared by
//! the collaboration bridge, its configuration layer and the CLI.

pub mod telemetry;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core error types shared across StudyGuide crates
#[derive(Error, Debug)]
pub enum StudyGuideError {
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Snapshot not found for room {room_id}")]
    SnapshotNotFound { room_id: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Identity a participant shows to the rest of the room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayIdentity {
    /// Room the participant edits in
    pub room_id: String,

    /// Name rendered next to the participant's caret
    pub display_name: String,
}

impl DisplayIdentity {
    pub fn new(room_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, StudyGuideError>;

/// Exit code constants used by the `studyguide` binary
pub const EXIT_ERROR: i32 = 1;
pub const EXIT_CONFIG_ERROR: i32 = 101;
