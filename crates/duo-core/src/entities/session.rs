//! Session entity
//!
//! A session is a stable anonymous identity for one chat participant,
//! independent of any single transport connection.

use serde::{Deserialize, Serialize};

use super::now_ms;

/// Session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    /// Queued, awaiting a pairing partner
    #[serde(rename = "waiting")]
    Waiting,
    /// Paired into a room
    #[serde(rename = "in-chat")]
    InChat,
}

/// A chat participant's session record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Stable session identifier (derived from the first transport connection)
    pub session_id: String,
    /// Current status
    pub status: SessionStatus,
    /// Room this session participates in, if paired
    pub current_room_id: Option<String>,
    /// Last activity timestamp (Unix epoch milliseconds)
    pub last_activity: i64,
}

impl Session {
    /// Create a fresh session in the waiting state
    #[must_use]
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            status: SessionStatus::Waiting,
            current_room_id: None,
            last_activity: now_ms(),
        }
    }

    /// Mark the session as paired into a room
    pub fn enter_room(&mut self, room_id: impl Into<String>) {
        self.status = SessionStatus::InChat;
        self.current_room_id = Some(room_id.into());
        self.touch();
    }

    /// Update the last-activity timestamp
    pub fn touch(&mut self) {
        self.last_activity = now_ms();
    }

    /// Whether the session is currently paired
    #[must_use]
    pub fn is_in_chat(&self) -> bool {
        self.status == SessionStatus::InChat
    }
}
