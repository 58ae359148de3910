//! Domain errors - error types for the domain layer

use thiserror::Error;

/// Domain layer errors
#[derive(Debug, Error)]
pub enum DomainError {
    // =========================================================================
    // Not Found Errors
    // =========================================================================
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Room not found: {0}")]
    RoomNotFound(String),

    // =========================================================================
    // Invariant Violations
    // =========================================================================
    #[error("Room is full: {0}")]
    RoomFull(String),

    #[error("Session {session_id} already participates in room {room_id}")]
    AlreadyInRoom { session_id: String, room_id: String },

    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("Validation error: {0}")]
    Validation(String),

    // =========================================================================
    // Infrastructure Errors
    // =========================================================================
    /// A state-store call failed; the triggering action is aborted
    #[error("State store unavailable: {0}")]
    StoreUnavailable(String),

    /// A logical-channel broadcast failed
    #[error("Broadcast failed: {0}")]
    Broadcast(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// Whether this is a not-found error
    ///
    /// Stale client-held ids are expected after teardown, so callers
    /// typically degrade these to a no-op rather than a fatal error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SessionNotFound(_) | Self::RoomNotFound(_))
    }

    /// Whether the underlying store failed (as opposed to a domain rule)
    #[must_use]
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(DomainError::SessionNotFound("s1".into()).is_not_found());
        assert!(DomainError::RoomNotFound("r1".into()).is_not_found());
        assert!(!DomainError::RoomFull("r1".into()).is_not_found());
    }

    #[test]
    fn test_store_unavailable_classification() {
        assert!(DomainError::StoreUnavailable("down".into()).is_store_unavailable());
        assert!(!DomainError::Validation("bad".into()).is_store_unavailable());
    }
}
