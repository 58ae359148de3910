//! check-chatRoom-session handler

use super::{HandlerError, HandlerResult};
use crate::connection::Connection;
use crate::protocol::{RoomRef, ServerFrame};
use crate::server::GatewayState;
use duo_cache::PubSubChannel;
use duo_service::{events, SessionService};
use serde_json::{json, Value};
use std::sync::Arc;

/// Handles check-chatRoom-session frames
pub struct CheckSessionHandler;

impl CheckSessionHandler {
    /// Handle a check-chatRoom-session frame
    ///
    /// Replies with the room the session still belongs to, or null. A
    /// confirmed membership also rejoins the connection to the room
    /// channel, covering clients that check instead of reconnecting
    /// with handshake parameters.
    pub async fn handle(
        state: &GatewayState,
        connection: &Arc<Connection>,
        session_id: &str,
        data: Value,
    ) -> HandlerResult<Option<String>> {
        let claimed_room: Option<RoomRef> = serde_json::from_value(data).ok();
        let room = SessionService::new(state.service_context())
            .check_room_session(session_id, claimed_room.as_ref().map(|r| r.chat_room_id.as_str()))
            .await?;

        if let Some(room) = &room {
            let channel_name = PubSubChannel::room(&room.id).name();
            state
                .connection_manager()
                .join_channel(connection.connection_id(), &channel_name)
                .await;
            if let Err(e) = state.event_dispatcher().subscribe_room(&room.id).await {
                tracing::warn!(room_id = %room.id, error = %e, "Failed to subscribe to room channel");
            }
        }

        let frame = ServerFrame::new(
            events::EVT_RECEIVE_ROOM_SESSION,
            json!({ "chatRoom": room }),
        );
        connection
            .send(frame)
            .await
            .map_err(|_| HandlerError::Internal("connection closed".to_string()))?;

        Ok(None)
    }
}
