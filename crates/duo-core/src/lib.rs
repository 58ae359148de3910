//! # duo-core
//!
//! Domain layer for the anonymous pair-chat service: entities, domain
//! errors, and the ports (store, broadcast) the infrastructure layer
//! implements. This crate has zero dependencies on Redis, the web
//! framework, or any other infrastructure.

pub mod entities;
pub mod error;
pub mod traits;

// Re-export commonly used types at crate root
pub use entities::{now_ms, ChatMessage, ChatRoom, RoomState, Session, SessionStatus, ROOM_CAPACITY};
pub use error::{DomainError, DomainResult};
pub use traits::{ChannelBroadcaster, StateStore};
