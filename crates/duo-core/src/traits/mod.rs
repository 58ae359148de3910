//! Ports - interfaces the infrastructure layer implements
//!
//! The domain layer defines what it needs (a shared state store, a
//! cross-worker broadcast capability); the infrastructure layer
//! provides the implementation.

mod broadcaster;
mod state_store;

pub use broadcaster::ChannelBroadcaster;
pub use state_store::StateStore;
