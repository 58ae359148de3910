//! Chat room entity and its lifecycle state machine

use serde::{Deserialize, Serialize};

use super::now_ms;
use crate::error::DomainError;

/// Maximum participants per room
pub const ROOM_CAPACITY: usize = 2;

/// Room lifecycle state
///
/// `Idle` covers both a newly created room awaiting participants and a
/// room one participant has left. A room with zero participants after a
/// leave is removed from the registry entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomState {
    #[serde(rename = "idle")]
    Idle,
    #[serde(rename = "occupied")]
    Occupied,
}

/// A two-participant chat room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRoom {
    /// Room identifier (UUID v4)
    pub id: String,
    /// Lifecycle state
    pub state: RoomState,
    /// Participant session ids, in join order, at most [`ROOM_CAPACITY`]
    pub participants: Vec<String>,
    /// Last activity timestamp (Unix epoch milliseconds)
    pub last_activity: i64,
}

impl ChatRoom {
    /// Create an empty idle room with a fresh id
    #[must_use]
    pub fn new() -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string())
    }

    /// Create an empty idle room with the given id
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: RoomState::Idle,
            participants: Vec::new(),
            last_activity: now_ms(),
        }
    }

    /// Create an occupied room holding exactly the two given sessions
    #[must_use]
    pub fn paired(first: impl Into<String>, second: impl Into<String>) -> Self {
        let mut room = Self::new();
        room.participants = vec![first.into(), second.into()];
        room.state = RoomState::Occupied;
        room
    }

    /// Add a participant, transitioning to `Occupied` once full
    ///
    /// # Errors
    /// Returns [`DomainError::RoomFull`] if the room already holds
    /// [`ROOM_CAPACITY`] participants.
    pub fn add_participant(&mut self, session_id: impl Into<String>) -> Result<(), DomainError> {
        let session_id = session_id.into();
        if self.participants.contains(&session_id) {
            return Ok(());
        }
        if self.participants.len() >= ROOM_CAPACITY {
            return Err(DomainError::RoomFull(self.id.clone()));
        }
        self.participants.push(session_id);
        if self.participants.len() == ROOM_CAPACITY {
            self.state = RoomState::Occupied;
        }
        self.touch();
        Ok(())
    }

    /// Remove a participant, setting the room idle
    ///
    /// Returns `true` if the session was present.
    pub fn remove_participant(&mut self, session_id: &str) -> bool {
        let before = self.participants.len();
        self.participants.retain(|p| p != session_id);
        let removed = self.participants.len() < before;
        if removed {
            self.state = RoomState::Idle;
            self.touch();
        }
        removed
    }

    /// Whether the room holds no participants
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Whether the given session participates in this room
    #[must_use]
    pub fn has_participant(&self, session_id: &str) -> bool {
        self.participants.iter().any(|p| p == session_id)
    }

    /// The other participant, if the given session is in the room
    #[must_use]
    pub fn counterpart_of(&self, session_id: &str) -> Option<&str> {
        if !self.has_participant(session_id) {
            return None;
        }
        self.participants
            .iter()
            .find(|p| p.as_str() != session_id)
            .map(String::as_str)
    }

    /// Update the last-activity timestamp
    pub fn touch(&mut self) {
        self.last_activity = now_ms();
    }
}

impl Default for ChatRoom {
    fn default() -> Self {
        Self::new()
    }
}
