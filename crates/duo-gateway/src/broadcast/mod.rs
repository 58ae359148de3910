//! Redis Pub/Sub to WebSocket event dispatch

mod dispatcher;

pub use dispatcher::{EventDispatcher, EventDispatcherConfig};
