//! Redis Pub/Sub subscriber.
//!
//! One pub/sub connection per worker. Decoded events fan out to local
//! consumers over a tokio broadcast channel; undecodable payloads are
//! dropped at the wire. Channel membership changes travel over a
//! control channel because the message stream borrows the connection.
//! A dropped connection is re-established and the held channel set
//! replayed.

use crate::pubsub::{PubSubChannel, PubSubEvent};
use futures_util::StreamExt;
use redis::Client;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, RwLock};

/// Error type for subscriber operations
#[derive(Debug, thiserror::Error)]
pub enum SubscriberError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Pub/Sub stream ended")]
    StreamEnded,

    #[error("Subscriber listener is gone")]
    ListenerGone,
}

/// Result type for subscriber operations
pub type SubscriberResult<T> = Result<T, SubscriberError>;

/// A decoded event received on a logical channel
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    /// Channel the event arrived on
    pub channel: PubSubChannel,
    /// The decoded event
    pub event: PubSubEvent,
}

/// Subscriber configuration
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Redis connection URL
    pub redis_url: String,
    /// Buffer size of the local fan-out channel
    pub broadcast_buffer: usize,
    /// Delay before re-establishing a dropped connection
    pub reconnect_delay_ms: u64,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            broadcast_buffer: 1024,
            reconnect_delay_ms: 1000,
        }
    }
}

#[derive(Debug)]
enum ChannelChange {
    Join(String),
    Leave(String),
    Shutdown,
}

/// Redis Pub/Sub subscriber
pub struct Subscriber {
    events_tx: broadcast::Sender<ReceivedMessage>,
    changes_tx: mpsc::Sender<ChannelChange>,
}

impl Subscriber {
    /// Connect and start the background listener, already subscribed to
    /// the given channels
    pub async fn connect(
        config: SubscriberConfig,
        initial: &[PubSubChannel],
    ) -> SubscriberResult<Self> {
        let (events_tx, _) = broadcast::channel(config.broadcast_buffer);
        let (changes_tx, changes_rx) = mpsc::channel(32);

        let listener = Listener {
            client: Client::open(config.redis_url.as_str())?,
            reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
            channels: Arc::new(RwLock::new(
                initial.iter().map(PubSubChannel::name).collect(),
            )),
            events_tx: events_tx.clone(),
        };
        tokio::spawn(listener.run(changes_rx));

        Ok(Self {
            events_tx,
            changes_tx,
        })
    }

    /// Subscribe to a logical channel
    pub async fn subscribe(&self, channel: &PubSubChannel) -> SubscriberResult<()> {
        self.changes_tx
            .send(ChannelChange::Join(channel.name()))
            .await
            .map_err(|_| SubscriberError::ListenerGone)
    }

    /// Unsubscribe from a logical channel
    pub async fn unsubscribe(&self, channel: &PubSubChannel) -> SubscriberResult<()> {
        self.changes_tx
            .send(ChannelChange::Leave(channel.name()))
            .await
            .map_err(|_| SubscriberError::ListenerGone)
    }

    /// Get a receiver for decoded events
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<ReceivedMessage> {
        self.events_tx.subscribe()
    }

    /// Shut down the background listener
    pub async fn shutdown(&self) -> SubscriberResult<()> {
        self.changes_tx
            .send(ChannelChange::Shutdown)
            .await
            .map_err(|_| SubscriberError::ListenerGone)
    }
}

/// The background half of the subscriber
struct Listener {
    client: Client,
    reconnect_delay: Duration,
    /// Channels the worker wants, surviving reconnects
    channels: Arc<RwLock<HashSet<String>>>,
    events_tx: broadcast::Sender<ReceivedMessage>,
}

enum Step {
    Message(Option<redis::Msg>),
    Change(Option<ChannelChange>),
}

impl Listener {
    async fn run(self, mut changes_rx: mpsc::Receiver<ChannelChange>) {
        loop {
            match self.serve(&mut changes_rx).await {
                Ok(()) => {
                    tracing::info!("Subscriber shut down");
                    return;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Subscriber connection lost, reconnecting");
                    tokio::time::sleep(self.reconnect_delay).await;
                }
            }
        }
    }

    /// One connection's lifetime: replay the held channel set, then
    /// pump messages and membership changes until shutdown or error
    async fn serve(
        &self,
        changes_rx: &mut mpsc::Receiver<ChannelChange>,
    ) -> SubscriberResult<()> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        for name in self.channels.read().await.iter() {
            pubsub.subscribe(name).await?;
        }
        tracing::info!("Subscriber connected to Redis");

        loop {
            // The message stream borrows the connection, so it is
            // rebuilt after every membership change.
            let step = {
                let mut stream = pubsub.on_message();
                tokio::select! {
                    msg = stream.next() => Step::Message(msg),
                    change = changes_rx.recv() => Step::Change(change),
                }
            };

            match step {
                Step::Message(Some(msg)) => self.deliver(&msg),
                Step::Message(None) => return Err(SubscriberError::StreamEnded),
                Step::Change(Some(ChannelChange::Join(name))) => {
                    // Recorded before the subscribe so a failure still
                    // replays the channel after the reconnect.
                    self.channels.write().await.insert(name.clone());
                    pubsub.subscribe(&name).await?;
                    tracing::debug!(channel = %name, "Subscribed to channel");
                }
                Step::Change(Some(ChannelChange::Leave(name))) => {
                    self.channels.write().await.remove(&name);
                    pubsub.unsubscribe(&name).await?;
                    tracing::debug!(channel = %name, "Unsubscribed from channel");
                }
                Step::Change(Some(ChannelChange::Shutdown)) | Step::Change(None) => {
                    return Ok(());
                }
            }
        }
    }

    fn deliver(&self, msg: &redis::Msg) {
        let payload: String = msg.get_payload().unwrap_or_default();
        match decode(msg.get_channel_name(), &payload) {
            Some(received) => {
                // Send errors mean no receivers, which is fine.
                let _ = self.events_tx.send(received);
            }
            None => {
                tracing::warn!(
                    channel = %msg.get_channel_name(),
                    "Dropping undecodable Pub/Sub payload"
                );
            }
        }
    }
}

fn decode(channel_name: &str, payload: &str) -> Option<ReceivedMessage> {
    let event = serde_json::from_str(payload).ok()?;
    Some(ReceivedMessage {
        channel: PubSubChannel::parse(channel_name),
        event,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_room_event() {
        let payload = r#"{"event":"receive-message","data":{"body":"hi"}}"#;
        let msg = decode("room:r1", payload).unwrap();

        assert_eq!(msg.channel, PubSubChannel::room("r1"));
        assert_eq!(msg.event.event, "receive-message");
        assert_eq!(msg.event.data["body"], "hi");
    }

    #[test]
    fn test_decode_rejects_bad_json() {
        assert!(decode("session:s1", "not json").is_none());
    }

    #[test]
    fn test_subscriber_config_default() {
        let config = SubscriberConfig::default();
        assert_eq!(config.redis_url, "redis://127.0.0.1:6379");
        assert_eq!(config.broadcast_buffer, 1024);
        assert_eq!(config.reconnect_delay_ms, 1000);
    }
}
