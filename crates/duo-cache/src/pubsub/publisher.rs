//! Redis Pub/Sub publisher.
//!
//! Publishes named events to logical channels for distribution to
//! connections on any worker. Implements the `ChannelBroadcaster` port,
//! so this is the only path a cross-worker notification may take; a
//! worker's local connection map is never authoritative for delivery.

use async_trait::async_trait;
use duo_core::{ChannelBroadcaster, DomainError, DomainResult};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pool::{RedisPool, RedisResult};
use crate::pubsub::PubSubChannel;

/// Event wrapper for Pub/Sub messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubSubEvent {
    /// Event name (e.g., "receive-message", "inactive-chatRoom")
    pub event: String,
    /// Event payload
    pub data: Value,
    /// Session that must not receive this event (the sender of a relay)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_session: Option<String>,
}

impl PubSubEvent {
    /// Create a new event
    #[must_use]
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
            exclude_session: None,
        }
    }

    /// Exclude one session from delivery
    #[must_use]
    pub fn excluding(mut self, session_id: impl Into<String>) -> Self {
        self.exclude_session = Some(session_id.into());
        self
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Redis Pub/Sub publisher
#[derive(Debug, Clone)]
pub struct Publisher {
    pool: RedisPool,
}

impl Publisher {
    /// Create a new publisher
    #[must_use]
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    /// Publish an event to a channel; returns the subscriber count
    pub async fn publish(&self, channel: &PubSubChannel, event: &PubSubEvent) -> RedisResult<u32> {
        let mut conn = self.pool.get().await?;
        let channel_name = channel.name();
        let payload = event.to_json()?;

        let receivers: u32 = conn.publish(&channel_name, &payload).await?;

        tracing::debug!(
            channel = %channel_name,
            event = %event.event,
            receivers = receivers,
            "Published event"
        );

        Ok(receivers)
    }
}

#[async_trait]
impl ChannelBroadcaster for Publisher {
    async fn broadcast(
        &self,
        room_id: &str,
        event: &str,
        payload: Value,
        exclude_session: Option<&str>,
    ) -> DomainResult<()> {
        let mut pubsub_event = PubSubEvent::new(event, payload);
        if let Some(session_id) = exclude_session {
            pubsub_event = pubsub_event.excluding(session_id);
        }

        self.publish(&PubSubChannel::room(room_id), &pubsub_event)
            .await
            .map_err(|e| DomainError::Broadcast(e.to_string()))?;
        Ok(())
    }

    async fn notify_session(
        &self,
        session_id: &str,
        event: &str,
        payload: Value,
    ) -> DomainResult<()> {
        let pubsub_event = PubSubEvent::new(event, payload);
        self.publish(&PubSubChannel::session(session_id), &pubsub_event)
            .await
            .map_err(|e| DomainError::Broadcast(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let data = serde_json::json!({"id": "m1", "body": "hi"});
        let event = PubSubEvent::new("receive-message", data.clone());
        assert_eq!(event.event, "receive-message");
        assert_eq!(event.data, data);
        assert!(event.exclude_session.is_none());
    }

    #[test]
    fn test_event_excluding() {
        let event = PubSubEvent::new("receive-message", serde_json::json!({})).excluding("s1");
        assert_eq!(event.exclude_session.as_deref(), Some("s1"));
    }

    #[test]
    fn test_event_serialization_omits_empty_exclude() {
        let event = PubSubEvent::new("left-chat", serde_json::json!({"sessionId": "s1"}));
        let json = event.to_json().unwrap();
        assert!(json.contains("left-chat"));
        assert!(!json.contains("exclude_session"));
    }
}
