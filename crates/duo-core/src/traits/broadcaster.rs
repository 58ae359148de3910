//! Logical-channel broadcast port
//!
//! A logical channel is an addressable group of connections used for
//! broadcast, independent of which worker holds each connection. The
//! production implementation rides on Redis Pub/Sub; tests use a
//! recording fake. Process-local connection caches must never stand in
//! for this capability.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::DomainResult;

/// Cross-worker broadcast to a room's logical channel
#[async_trait]
pub trait ChannelBroadcaster: Send + Sync {
    /// Broadcast a named event to every connection joined to the room's
    /// channel, on any worker.
    ///
    /// `exclude_session` suppresses delivery to one participant (the
    /// sender of a relayed message).
    async fn broadcast(
        &self,
        room_id: &str,
        event: &str,
        payload: Value,
        exclude_session: Option<&str>,
    ) -> DomainResult<()>;

    /// Deliver a named event to one session's connections, on whichever
    /// worker holds them.
    ///
    /// Used where the target is known before it has joined the room's
    /// channel (pairing notification).
    async fn notify_session(
        &self,
        session_id: &str,
        event: &str,
        payload: Value,
    ) -> DomainResult<()>;
}
