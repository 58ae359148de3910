//! Redis Pub/Sub - the cross-worker logical-channel transport.

mod channels;
mod publisher;
mod subscriber;

pub use channels::{PubSubChannel, BROADCAST_CHANNEL, ROOM_CHANNEL_PREFIX, SESSION_CHANNEL_PREFIX};
pub use publisher::{PubSubEvent, Publisher};
pub use subscriber::{
    ReceivedMessage, Subscriber, SubscriberConfig, SubscriberError, SubscriberResult,
};
