//! Server-emitted event names, shared by the service layer (which
//! publishes them over logical channels) and the gateway (which relays
//! them to clients).

/// Session assignment, emitted once per connection
pub const EVT_SESSION: &str = "session";

/// Both parties have been paired into a room
pub const EVT_CHAT_ROOM_CREATED: &str = "chatRoom-created";

/// A message relayed to the counterpart
pub const EVT_RECEIVE_MESSAGE: &str = "receive-message";

/// Full message history of a room
pub const EVT_CHAT_HISTORY: &str = "chat-history";

/// Messages missed while disconnected
pub const EVT_MISSED_MESSAGES: &str = "missed-messages";

/// A participant left the room
pub const EVT_LEFT_CHAT: &str = "left-chat";

/// The room was torn down for inactivity
pub const EVT_INACTIVE_ROOM: &str = "inactive-chatRoom";

/// Response to a room-session membership check
pub const EVT_RECEIVE_ROOM_SESSION: &str = "receive-chatRoom-session";
