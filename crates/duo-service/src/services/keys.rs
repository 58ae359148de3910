//! Store key layout
//!
//! Every key the services touch is built here, so the full footprint of
//! the system in the shared store is visible in one place.

/// FIFO queue of waiting session ids
pub const MATCH_QUEUE: &str = "matchmaking:queue";

/// Hash of session id -> serialized `Session`
pub const SESSIONS_HASH: &str = "sessions";

/// Hash of room id -> serialized `ChatRoom` (the room registry)
pub const ROOMS_HASH: &str = "chat:rooms";

/// Sorted set of processed event markers, scored by receipt time (ms)
pub const PROCESSED_EVENTS: &str = "events:processed";

/// Append-only message log of a room
#[must_use]
pub fn room_messages(room_id: &str) -> String {
    format!("chat:room:{room_id}:messages")
}

/// Per-room set of already-relayed message ids
#[must_use]
pub fn room_message_ids(room_id: &str) -> String {
    format!("chat:room:{room_id}:message-ids")
}

/// Last-activity timestamp of a session (ms, as a string)
#[must_use]
pub fn session_activity(session_id: &str) -> String {
    format!("activity:session:{session_id}")
}

/// Last-activity timestamp of a room (ms, as a string)
#[must_use]
pub fn room_activity(room_id: &str) -> String {
    format!("activity:room:{room_id}")
}

/// Member key for the processed-events sorted set
#[must_use]
pub fn processed_member(event: &str, event_id: &str) -> String {
    format!("{event}:{event_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_shapes() {
        assert_eq!(room_messages("r1"), "chat:room:r1:messages");
        assert_eq!(room_message_ids("r1"), "chat:room:r1:message-ids");
        assert_eq!(session_activity("s1"), "activity:session:s1");
        assert_eq!(room_activity("r1"), "activity:room:r1");
        assert_eq!(processed_member("send-message", "e1"), "send-message:e1");
    }
}
