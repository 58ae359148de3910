//! # duo-cache
//!
//! Redis layer for the pair-chat service.
//!
//! - **Connection pool**: managed Redis pool with deadpool
//! - **State store**: [`RedisStateStore`] implements the shared
//!   `StateStore` port (queue, hash, set, sorted-set, string, list);
//!   [`MemoryStateStore`] is a single-process implementation used by
//!   tests
//! - **Pub/Sub**: logical-channel broadcast across worker processes

pub mod pool;
pub mod pubsub;
pub mod store;

// Re-export pool types
pub use pool::{RedisPool, RedisPoolConfig, RedisPoolError, RedisResult};

// Re-export store types
pub use store::{MemoryStateStore, RedisStateStore};

// Re-export pubsub types
pub use pubsub::{
    PubSubChannel, PubSubEvent, Publisher, ReceivedMessage, Subscriber, SubscriberConfig,
    SubscriberError, SubscriberResult, BROADCAST_CHANNEL, ROOM_CHANNEL_PREFIX,
    SESSION_CHANNEL_PREFIX,
};
