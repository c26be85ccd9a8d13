//! Session domain model.
//!
//! A session is the full lifetime of one conversation. It owns exactly one
//! [`SessionState`] and must round-trip through serialization so a
//! conversation can be suspended between turns and resumed later with no
//! behavior difference from an uninterrupted run.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::dialog::SessionState;

/// A stored conversation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier (UUID format).
    pub id: String,
    /// Human-readable session title.
    pub title: String,
    /// Timestamp when the session was created (RFC 3339).
    pub created_at: String,
    /// Timestamp when the session was last updated (RFC 3339).
    pub updated_at: String,
    /// Storage format version, reserved for future migrations.
    #[serde(default = "default_version")]
    pub version: u32,
    /// The dialog state, the part the state machine operates on.
    pub state: SessionState,
}

fn default_version() -> u32 {
    1
}

impl Session {
    /// Creates a fresh session with a new UUID and an initial dialog state.
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            created_at: now.clone(),
            updated_at: now,
            version: default_version(),
            state: SessionState::new(),
        }
    }

    /// Bumps the updated-at timestamp; call after each turn before saving.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now().to_rfc3339();
    }
}
