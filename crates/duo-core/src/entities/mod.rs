//! Domain entities

mod message;
mod room;
mod session;

pub use message::ChatMessage;
pub use room::{ChatRoom, RoomState, ROOM_CAPACITY};
pub use session::{Session, SessionStatus};

/// Current wall-clock time in integer milliseconds.
///
/// All `last_activity` and message timestamps use this resolution.
#[must_use]
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
