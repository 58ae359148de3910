//! Pub/Sub channel definitions.
//!
//! A logical channel is an addressable group of connections independent
//! of which worker holds each connection. Room channels carry events
//! for both participants of a room; session channels reach one session
//! before it has joined a room channel (pairing notification).

/// Channel prefix for room events
pub const ROOM_CHANNEL_PREFIX: &str = "room:";
/// Channel prefix for session-addressed events
pub const SESSION_CHANNEL_PREFIX: &str = "session:";
/// Channel for events addressed to every connected client
pub const BROADCAST_CHANNEL: &str = "broadcast";

/// Pub/Sub channel types
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PubSubChannel {
    /// Events for one room's participants
    Room(String),
    /// Events for one session's connections
    Session(String),
    /// Broadcast to all connected clients
    Broadcast,
    /// Custom channel name
    Custom(String),
}

impl PubSubChannel {
    /// Create a room channel
    #[must_use]
    pub fn room(room_id: impl Into<String>) -> Self {
        Self::Room(room_id.into())
    }

    /// Create a session channel
    #[must_use]
    pub fn session(session_id: impl Into<String>) -> Self {
        Self::Session(session_id.into())
    }

    /// Get the Redis channel name
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Room(id) => format!("{ROOM_CHANNEL_PREFIX}{id}"),
            Self::Session(id) => format!("{SESSION_CHANNEL_PREFIX}{id}"),
            Self::Broadcast => BROADCAST_CHANNEL.to_string(),
            Self::Custom(name) => name.clone(),
        }
    }

    /// Parse a channel name back to a `PubSubChannel`
    #[must_use]
    pub fn parse(name: &str) -> Self {
        if name == BROADCAST_CHANNEL {
            return Self::Broadcast;
        }
        if let Some(id) = name.strip_prefix(ROOM_CHANNEL_PREFIX) {
            return Self::Room(id.to_string());
        }
        if let Some(id) = name.strip_prefix(SESSION_CHANNEL_PREFIX) {
            return Self::Session(id.to_string());
        }
        Self::Custom(name.to_string())
    }
}

impl std::fmt::Display for PubSubChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_names() {
        assert_eq!(PubSubChannel::room("r1").name(), "room:r1");
        assert_eq!(PubSubChannel::session("s1").name(), "session:s1");
        assert_eq!(PubSubChannel::Broadcast.name(), "broadcast");
        assert_eq!(PubSubChannel::Custom("test".into()).name(), "test");
    }

    #[test]
    fn test_channel_parse() {
        assert_eq!(PubSubChannel::parse("room:r1"), PubSubChannel::room("r1"));
        assert_eq!(
            PubSubChannel::parse("session:s1"),
            PubSubChannel::session("s1")
        );
        assert_eq!(PubSubChannel::parse("broadcast"), PubSubChannel::Broadcast);
        assert_eq!(
            PubSubChannel::parse("unknown:123"),
            PubSubChannel::Custom("unknown:123".to_string())
        );
    }
}
