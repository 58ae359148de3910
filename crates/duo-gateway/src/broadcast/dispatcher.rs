//! Event dispatcher
//!
//! Receives events from Redis Pub/Sub and fans them out to local
//! WebSocket connections. Room events go to every local connection
//! joined to the room channel, minus the excluded session. Session
//! events go to that session's local connections; a pairing
//! notification additionally joins those connections to the new room's
//! channel, since neither worker knows in advance which of them holds
//! the counterpart.

use crate::connection::ConnectionManager;
use crate::protocol::ServerFrame;
use duo_cache::{PubSubChannel, ReceivedMessage, Subscriber, SubscriberConfig};
use duo_service::events;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Configuration for the event dispatcher
#[derive(Debug, Clone)]
pub struct EventDispatcherConfig {
    /// Redis URL
    pub redis_url: String,
    /// Broadcast buffer size
    pub broadcast_buffer: usize,
    /// Reconnection delay in milliseconds
    pub reconnect_delay_ms: u64,
}

impl Default for EventDispatcherConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            broadcast_buffer: 1024,
            reconnect_delay_ms: 1000,
        }
    }
}

/// Routes Redis Pub/Sub events to local WebSocket connections
pub struct EventDispatcher {
    /// Connection manager for local delivery
    connection_manager: Arc<ConnectionManager>,
    /// Redis subscriber
    subscriber: Subscriber,
    /// Whether the dispatcher is running
    running: Arc<AtomicBool>,
}

impl EventDispatcher {
    /// Create a new event dispatcher
    pub async fn new(
        config: EventDispatcherConfig,
        connection_manager: Arc<ConnectionManager>,
    ) -> Result<Self, duo_cache::SubscriberError> {
        let subscriber = Subscriber::connect(
            SubscriberConfig {
                redis_url: config.redis_url.clone(),
                broadcast_buffer: config.broadcast_buffer,
                reconnect_delay_ms: config.reconnect_delay_ms,
            },
            &[PubSubChannel::Broadcast],
        )
        .await?;

        Ok(Self {
            connection_manager,
            subscriber,
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Subscribe to a session's channel
    pub async fn subscribe_session(
        &self,
        session_id: &str,
    ) -> Result<(), duo_cache::SubscriberError> {
        self.subscriber
            .subscribe(&PubSubChannel::session(session_id))
            .await
    }

    /// Unsubscribe from a session's channel
    pub async fn unsubscribe_session(
        &self,
        session_id: &str,
    ) -> Result<(), duo_cache::SubscriberError> {
        self.subscriber
            .unsubscribe(&PubSubChannel::session(session_id))
            .await
    }

    /// Subscribe to a room's channel
    pub async fn subscribe_room(&self, room_id: &str) -> Result<(), duo_cache::SubscriberError> {
        self.subscriber
            .subscribe(&PubSubChannel::room(room_id))
            .await
    }

    /// Unsubscribe from a room's channel
    pub async fn unsubscribe_room(&self, room_id: &str) -> Result<(), duo_cache::SubscriberError> {
        self.subscriber
            .unsubscribe(&PubSubChannel::room(room_id))
            .await
    }

    /// Start the event dispatcher
    pub fn start(self: Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("Event dispatcher is already running");
            return;
        }

        let dispatcher = self.clone();
        tokio::spawn(async move {
            dispatcher.run().await;
        });

        tracing::info!("Event dispatcher started");
    }

    /// Stop the event dispatcher
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.subscriber.shutdown().await.ok();
        tracing::info!("Event dispatcher stopped");
    }

    /// Run the event dispatcher loop
    async fn run(&self) {
        let mut receiver = self.subscriber.events();

        while self.running.load(Ordering::SeqCst) {
            match receiver.recv().await {
                Ok(msg) => {
                    self.handle_message(msg).await;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "Event dispatcher lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::warn!("Event dispatcher channel closed");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        tracing::info!("Event dispatcher loop ended");
    }

    /// Handle a received Pub/Sub message
    async fn handle_message(&self, msg: ReceivedMessage) {
        let event = &msg.event;
        let frame = ServerFrame::new(&event.event, event.data.clone());

        match &msg.channel {
            PubSubChannel::Room(room_id) => {
                let channel_name = msg.channel.name();
                let sent = self
                    .connection_manager
                    .send_to_channel(&channel_name, frame, event.exclude_session.as_deref())
                    .await;

                tracing::trace!(
                    room_id = %room_id,
                    event = %event.event,
                    sent,
                    "Event dispatched to room"
                );
            }
            PubSubChannel::Session(session_id) => {
                // A pairing notification also moves the session's local
                // connections onto the new room's channel.
                if event.event == events::EVT_CHAT_ROOM_CREATED {
                    self.join_room_channel(session_id, &event.data).await;
                }

                let sent = self
                    .connection_manager
                    .send_to_session(session_id, frame)
                    .await;

                tracing::trace!(
                    session_id = %session_id,
                    event = %event.event,
                    sent,
                    "Event dispatched to session"
                );
            }
            PubSubChannel::Broadcast => {
                let sent = self.connection_manager.broadcast(frame).await;
                tracing::trace!(event = %event.event, sent, "Event broadcast to all");
            }
            PubSubChannel::Custom(name) => {
                tracing::debug!(
                    channel = %name,
                    event = %event.event,
                    "Received event on custom channel, ignoring"
                );
            }
        }
    }

    /// Join a session's local connections to a freshly created room
    async fn join_room_channel(&self, session_id: &str, data: &serde_json::Value) {
        let Some(room_id) = data.get("chatRoomId").and_then(|v| v.as_str()) else {
            tracing::warn!(session_id, "Pairing notification without chatRoomId");
            return;
        };
        let channel_name = PubSubChannel::room(room_id).name();

        let connections = self.connection_manager.get_session_connections(session_id);
        if connections.is_empty() {
            return;
        }
        for conn in &connections {
            self.connection_manager
                .join_channel(conn.connection_id(), &channel_name)
                .await;
        }

        if let Err(e) = self.subscribe_room(room_id).await {
            tracing::error!(room_id, error = %e, "Failed to subscribe to room channel");
        }

        tracing::debug!(
            session_id,
            room_id,
            connections = connections.len(),
            "Session connections joined room channel"
        );
    }

    /// Check if the dispatcher is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatcher_config_default() {
        let config = EventDispatcherConfig::default();
        assert_eq!(config.redis_url, "redis://127.0.0.1:6379");
        assert_eq!(config.broadcast_buffer, 1024);
        assert_eq!(config.reconnect_delay_ms, 1000);
    }
}
