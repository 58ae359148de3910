//! Connection manager
//!
//! Tracks this worker's live connections using DashMap for concurrent
//! access. The session and channel indexes only cover local
//! connections; cross-worker delivery always goes through Pub/Sub, and
//! this map is the final hop that fans a received event out to sockets.

use super::Connection;
use crate::protocol::ServerFrame;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Manages all active WebSocket connections of this worker
pub struct ConnectionManager {
    /// Active connections by connection id
    connections: DashMap<String, Arc<Connection>>,

    /// Session id to connection ids mapping
    session_connections: DashMap<String, HashSet<String>>,

    /// Channel name to connection ids mapping
    channel_connections: DashMap<String, HashSet<String>>,
}

impl ConnectionManager {
    /// Create a new connection manager
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            session_connections: DashMap::new(),
            channel_connections: DashMap::new(),
        }
    }

    /// Create a new connection manager wrapped in Arc
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a new connection
    pub fn add_connection(
        &self,
        connection_id: String,
        sender: mpsc::Sender<ServerFrame>,
    ) -> Arc<Connection> {
        let connection = Connection::new(connection_id.clone(), sender);
        self.connections
            .insert(connection_id.clone(), connection.clone());

        tracing::debug!(connection_id = %connection_id, "Connection added");

        connection
    }

    /// Remove a connection and drop it from all indexes
    pub async fn remove_connection(&self, connection_id: &str) {
        if let Some((_, connection)) = self.connections.remove(connection_id) {
            if let Some(session_id) = connection.session_id().await {
                self.session_connections.alter(&session_id, |_, mut conns| {
                    conns.remove(connection_id);
                    conns
                });
                self.session_connections.retain(|_, conns| !conns.is_empty());
            }

            for channel in connection.channels().await {
                self.channel_connections.alter(&channel, |_, mut conns| {
                    conns.remove(connection_id);
                    conns
                });
            }
            self.channel_connections.retain(|_, conns| !conns.is_empty());

            tracing::debug!(connection_id = %connection_id, "Connection removed");
        }
    }

    /// Get a connection by id
    pub fn get_connection(&self, connection_id: &str) -> Option<Arc<Connection>> {
        self.connections.get(connection_id).map(|r| r.clone())
    }

    /// Bind a connection to a session
    pub async fn bind_session(&self, connection_id: &str, session_id: &str) -> bool {
        if let Some(connection) = self.connections.get(connection_id) {
            connection.bind_session(session_id).await;
            self.session_connections
                .entry(session_id.to_string())
                .or_default()
                .insert(connection_id.to_string());

            tracing::debug!(
                connection_id = %connection_id,
                session_id = %session_id,
                "Connection bound to session"
            );
            true
        } else {
            false
        }
    }

    /// Join a connection to a logical channel
    pub async fn join_channel(&self, connection_id: &str, channel: &str) -> bool {
        if let Some(connection) = self.connections.get(connection_id) {
            connection.join_channel(channel).await;
            self.channel_connections
                .entry(channel.to_string())
                .or_default()
                .insert(connection_id.to_string());

            tracing::trace!(
                connection_id = %connection_id,
                channel = %channel,
                "Connection joined channel"
            );
            true
        } else {
            false
        }
    }

    /// Remove a connection from a logical channel
    pub async fn leave_channel(&self, connection_id: &str, channel: &str) -> bool {
        if let Some(connection) = self.connections.get(connection_id) {
            connection.leave_channel(channel).await;

            self.channel_connections.alter(channel, |_, mut conns| {
                conns.remove(connection_id);
                conns
            });
            self.channel_connections.retain(|_, conns| !conns.is_empty());

            tracing::trace!(
                connection_id = %connection_id,
                channel = %channel,
                "Connection left channel"
            );
            true
        } else {
            false
        }
    }

    /// All local connections bound to a session
    pub fn get_session_connections(&self, session_id: &str) -> Vec<Arc<Connection>> {
        self.session_connections
            .get(session_id)
            .map(|conns| {
                conns
                    .iter()
                    .filter_map(|cid| self.connections.get(cid).map(|c| c.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All local connections joined to a channel
    pub fn get_channel_connections(&self, channel: &str) -> Vec<Arc<Connection>> {
        self.channel_connections
            .get(channel)
            .map(|conns| {
                conns
                    .iter()
                    .filter_map(|cid| self.connections.get(cid).map(|c| c.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether any local connection is joined to a channel
    pub fn channel_has_local_members(&self, channel: &str) -> bool {
        self.channel_connections
            .get(channel)
            .is_some_and(|conns| !conns.is_empty())
    }

    /// Whether any local connection is bound to a session
    pub fn session_has_local_connections(&self, session_id: &str) -> bool {
        self.session_connections
            .get(session_id)
            .is_some_and(|conns| !conns.is_empty())
    }

    /// Send a frame to all local connections of a session
    pub async fn send_to_session(&self, session_id: &str, frame: ServerFrame) -> usize {
        let connections = self.get_session_connections(session_id);
        let mut sent = 0;

        for conn in connections {
            if conn.send(frame.clone()).await.is_ok() {
                sent += 1;
            }
        }

        tracing::trace!(session_id = %session_id, sent, "Frame sent to session connections");
        sent
    }

    /// Send a frame to all local connections in a channel
    ///
    /// `exclude_session` suppresses delivery to connections bound to
    /// that session (the sender of a relayed message).
    pub async fn send_to_channel(
        &self,
        channel: &str,
        frame: ServerFrame,
        exclude_session: Option<&str>,
    ) -> usize {
        let connections = self.get_channel_connections(channel);
        let mut sent = 0;

        for conn in connections {
            if let Some(exclude) = exclude_session {
                if conn.session_id().await.as_deref() == Some(exclude) {
                    continue;
                }
            }
            if conn.send(frame.clone()).await.is_ok() {
                sent += 1;
            }
        }

        tracing::trace!(channel = %channel, sent, "Frame sent to channel connections");
        sent
    }

    /// Send a frame to every local connection
    pub async fn broadcast(&self, frame: ServerFrame) -> usize {
        let mut sent = 0;
        for entry in self.connections.iter() {
            if entry.send(frame.clone()).await.is_ok() {
                sent += 1;
            }
        }
        sent
    }

    /// Get the total number of active connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connections", &self.connections.len())
            .field("sessions", &self.session_connections.len())
            .field("channels", &self.channel_connections.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_add_remove_connection() {
        let manager = ConnectionManager::new();
        let (tx, _rx) = mpsc::channel(10);

        let conn = manager.add_connection("c1".to_string(), tx);
        assert_eq!(conn.connection_id(), "c1");
        assert_eq!(manager.connection_count(), 1);

        manager.remove_connection("c1").await;
        assert_eq!(manager.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_session_binding_and_delivery() {
        let manager = ConnectionManager::new();
        let (tx, mut rx) = mpsc::channel(10);

        manager.add_connection("c1".to_string(), tx);
        assert!(manager.bind_session("c1", "s1").await);
        assert!(manager.session_has_local_connections("s1"));

        let sent = manager
            .send_to_session("s1", ServerFrame::new("session", json!({})))
            .await;
        assert_eq!(sent, 1);
        assert_eq!(rx.recv().await.unwrap().event, "session");
    }

    #[tokio::test]
    async fn test_channel_delivery_excludes_sender() {
        let manager = ConnectionManager::new();
        let (tx1, mut rx1) = mpsc::channel(10);
        let (tx2, mut rx2) = mpsc::channel(10);

        manager.add_connection("c1".to_string(), tx1);
        manager.add_connection("c2".to_string(), tx2);
        manager.bind_session("c1", "s1").await;
        manager.bind_session("c2", "s2").await;
        manager.join_channel("c1", "room:r1").await;
        manager.join_channel("c2", "room:r1").await;

        let sent = manager
            .send_to_channel(
                "room:r1",
                ServerFrame::new("receive-message", json!({})),
                Some("s1"),
            )
            .await;
        assert_eq!(sent, 1);
        assert_eq!(rx2.recv().await.unwrap().event, "receive-message");
        assert!(rx1.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_remove_cleans_indexes() {
        let manager = ConnectionManager::new();
        let (tx, _rx) = mpsc::channel(10);

        manager.add_connection("c1".to_string(), tx);
        manager.bind_session("c1", "s1").await;
        manager.join_channel("c1", "room:r1").await;

        manager.remove_connection("c1").await;
        assert!(!manager.session_has_local_connections("s1"));
        assert!(!manager.channel_has_local_members("room:r1"));
    }
}
