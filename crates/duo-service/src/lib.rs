//! # duo-service
//!
//! Service layer for the anonymous pair-chat system. Each service is a
//! thin borrowing wrapper over [`ServiceContext`], which carries the
//! shared state store, the cross-worker broadcaster, and the chat
//! tunables. All cross-worker coordination happens through those two
//! ports; nothing in this crate touches Redis directly.

pub mod events;
pub mod services;

pub use services::{
    EventDeduplicator, Handshake, InactivityReaper, MatchmakerService, MessageService,
    RoomService, SendOutcome, ServiceContext, ServiceError, ServiceResult, SessionService,
};
