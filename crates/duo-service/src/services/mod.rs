//! Service layer modules

pub mod context;
pub mod dedup;
pub mod error;
pub mod keys;
pub mod matchmaker;
pub mod messages;
pub mod reaper;
pub mod rooms;
pub mod sessions;

pub use context::ServiceContext;
pub use dedup::EventDeduplicator;
pub use error::{ServiceError, ServiceResult};
pub use matchmaker::MatchmakerService;
pub use messages::{MessageService, SendOutcome};
pub use reaper::InactivityReaper;
pub use rooms::RoomService;
pub use sessions::{Handshake, SessionService};
