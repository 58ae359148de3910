//! Chat message entity

use serde::{Deserialize, Serialize};

use super::now_ms;

/// A single relayed chat message
///
/// The id is client-generated and globally unique; it drives the
/// per-room de-duplication set. Messages are never mutated once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Client-generated, globally unique id
    pub id: String,
    /// Sending session id
    pub sender: String,
    /// Receiving session id
    pub receiver: String,
    /// Message body
    pub body: String,
    /// Send timestamp (Unix epoch milliseconds), assigned server-side
    pub timestamp: i64,
}

impl ChatMessage {
    /// Create a message stamped with the current time
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        sender: impl Into<String>,
        receiver: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            sender: sender.into(),
            receiver: receiver.into(),
            body: body.into(),
            timestamp: now_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_is_stamped() {
        let msg = ChatMessage::new("m1", "a", "b", "hi");
        assert_eq!(msg.id, "m1");
        assert_eq!(msg.sender, "a");
        assert_eq!(msg.receiver, "b");
        assert!(msg.timestamp > 0);
    }

    #[test]
    fn test_message_roundtrip() {
        let msg = ChatMessage::new("m1", "a", "b", "hi");
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, msg);
    }
}
