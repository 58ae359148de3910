//! retrieve-chat-messages handler

use super::{HandlerError, HandlerResult};
use crate::connection::Connection;
use crate::protocol::{RoomRef, ServerFrame};
use crate::server::GatewayState;
use duo_service::{events, MessageService};
use serde_json::{json, Value};
use std::sync::Arc;

/// Handles retrieve-chat-messages frames
pub struct RetrieveHandler;

impl RetrieveHandler {
    /// Handle a retrieve-chat-messages frame
    ///
    /// The full history goes back to the requesting connection only.
    pub async fn handle(
        state: &GatewayState,
        connection: &Arc<Connection>,
        data: Value,
    ) -> HandlerResult<Option<String>> {
        let data: RoomRef = serde_json::from_value(data)
            .map_err(|e| HandlerError::InvalidPayload(e.to_string()))?;

        let messages = MessageService::new(state.service_context())
            .history(&data.chat_room_id)
            .await?;

        let frame = ServerFrame::new(
            events::EVT_CHAT_HISTORY,
            json!({
                "chatRoomId": data.chat_room_id,
                "messages": messages,
            }),
        );
        connection
            .send(frame)
            .await
            .map_err(|_| HandlerError::Internal("connection closed".to_string()))?;

        Ok(None)
    }
}
