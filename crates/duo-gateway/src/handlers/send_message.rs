//! send-message handler

use super::{HandlerError, HandlerResult};
use crate::protocol::SendMessageData;
use crate::server::GatewayState;
use duo_service::{MessageService, SendOutcome};
use serde_json::Value;

/// Handles send-message frames
pub struct SendMessageHandler;

impl SendMessageHandler {
    /// Handle a send-message frame
    pub async fn handle(
        state: &GatewayState,
        session_id: &str,
        data: Value,
    ) -> HandlerResult<Option<String>> {
        let data: SendMessageData = serde_json::from_value(data)
            .map_err(|e| HandlerError::InvalidPayload(e.to_string()))?;

        let outcome = MessageService::new(state.service_context())
            .send_message(session_id, &data.chat_room_id, &data.message_id, &data.body)
            .await?;

        match outcome {
            SendOutcome::Delivered(_) => Ok(None),
            SendOutcome::Duplicate => Ok(Some("duplicate".to_string())),
        }
    }
}
