//! Individual WebSocket connection
//!
//! One transport connection bound to one session. The bound session id
//! and joined channels are process-local routing state only; the shared
//! store stays authoritative for everything durable.

use crate::protocol::ServerFrame;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, RwLock};

/// A single WebSocket connection
pub struct Connection {
    /// Unique connection id (also the session id of first-time clients)
    connection_id: String,

    /// Session this connection is bound to
    session_id: RwLock<Option<String>>,

    /// Channel to send frames to the WebSocket
    sender: mpsc::Sender<ServerFrame>,

    /// Logical channels this connection has joined
    channels: RwLock<HashSet<String>>,

    /// Connection creation time
    created_at: Instant,
}

impl Connection {
    /// Create a new connection
    pub fn new(connection_id: String, sender: mpsc::Sender<ServerFrame>) -> Arc<Self> {
        Arc::new(Self {
            connection_id,
            session_id: RwLock::new(None),
            sender,
            channels: RwLock::new(HashSet::new()),
            created_at: Instant::now(),
        })
    }

    /// Get the connection id
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Get the bound session id
    pub async fn session_id(&self) -> Option<String> {
        self.session_id.read().await.clone()
    }

    /// Bind the connection to a session
    pub async fn bind_session(&self, session_id: impl Into<String>) {
        *self.session_id.write().await = Some(session_id.into());
    }

    /// Join a logical channel
    pub async fn join_channel(&self, channel: impl Into<String>) {
        self.channels.write().await.insert(channel.into());
    }

    /// Leave a logical channel
    pub async fn leave_channel(&self, channel: &str) {
        self.channels.write().await.remove(channel);
    }

    /// All joined channels
    pub async fn channels(&self) -> Vec<String> {
        self.channels.read().await.iter().cloned().collect()
    }

    /// Whether the connection has joined a channel
    pub async fn is_in_channel(&self, channel: &str) -> bool {
        self.channels.read().await.contains(channel)
    }

    /// Get connection age
    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }

    /// Send a frame to this connection
    pub async fn send(&self, frame: ServerFrame) -> Result<(), mpsc::error::SendError<ServerFrame>> {
        self.sender.send(frame).await
    }

    /// Check if the sender channel is closed
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("connection_id", &self.connection_id)
            .field("created_at", &self.created_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_connection_creation() {
        let (tx, _rx) = mpsc::channel(10);
        let conn = Connection::new("c1".to_string(), tx);

        assert_eq!(conn.connection_id(), "c1");
        assert!(conn.session_id().await.is_none());
        assert!(conn.channels().await.is_empty());
    }

    #[tokio::test]
    async fn test_session_binding() {
        let (tx, _rx) = mpsc::channel(10);
        let conn = Connection::new("c1".to_string(), tx);

        conn.bind_session("s1").await;
        assert_eq!(conn.session_id().await.as_deref(), Some("s1"));
    }

    #[tokio::test]
    async fn test_channel_membership() {
        let (tx, _rx) = mpsc::channel(10);
        let conn = Connection::new("c1".to_string(), tx);

        conn.join_channel("room:r1").await;
        assert!(conn.is_in_channel("room:r1").await);

        conn.leave_channel("room:r1").await;
        assert!(!conn.is_in_channel("room:r1").await);
    }

    #[tokio::test]
    async fn test_send_delivers_frame() {
        let (tx, mut rx) = mpsc::channel(10);
        let conn = Connection::new("c1".to_string(), tx);

        conn.send(ServerFrame::new("session", json!({"sessionId": "s1"})))
            .await
            .unwrap();
        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.event, "session");
    }
}
