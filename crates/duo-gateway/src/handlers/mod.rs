//! Client event handlers
//!
//! Routes inbound frames by event name. A frame carrying an `eventId`
//! is always answered with exactly one `ack`: ok when handled (with a
//! detail of "duplicate" for absorbed redeliveries), error with a code
//! otherwise. A client error never closes the connection.

mod check_session;
mod error;
mod leave_chat;
mod retrieve;
mod send_message;
mod start_chat;

pub use check_session::CheckSessionHandler;
pub use error::{HandlerError, HandlerResult};
pub use leave_chat::LeaveChatHandler;
pub use retrieve::RetrieveHandler;
pub use send_message::SendMessageHandler;
pub use start_chat::StartChatHandler;

use crate::connection::Connection;
use crate::protocol::{AckStatus, ClientFrame, ServerFrame};
use crate::server::GatewayState;
use duo_service::EventDeduplicator;
use std::sync::Arc;

/// Client-sendable event names
pub const EVT_START_CHAT: &str = "start-chat";
pub const EVT_SEND_MESSAGE: &str = "send-message";
pub const EVT_LEAVE_CHAT: &str = "leave-chat";
pub const EVT_RETRIEVE_MESSAGES: &str = "retrieve-chat-messages";
pub const EVT_CHECK_ROOM_SESSION: &str = "check-chatRoom-session";

/// Dispatch incoming client frames to the appropriate handler
pub struct EventRouter;

impl EventRouter {
    /// Handle an incoming client frame
    pub async fn dispatch(
        state: &GatewayState,
        connection: &Arc<Connection>,
        frame: ClientFrame,
    ) {
        let outcome = Self::route(state, connection, &frame).await;

        // One ack per event id, success or failure.
        let Some(event_id) = frame.event_id.as_deref() else {
            if let Err(e) = outcome {
                tracing::warn!(
                    connection_id = %connection.connection_id(),
                    event = %frame.event,
                    error = %e,
                    "Handler error for unacknowledged frame"
                );
            }
            return;
        };

        let ack = match outcome {
            Ok(detail) => ServerFrame::ack(event_id, AckStatus::Ok, detail.as_deref()),
            Err(e) => {
                tracing::warn!(
                    connection_id = %connection.connection_id(),
                    event = %frame.event,
                    error = %e,
                    "Handler error"
                );
                ServerFrame::ack(event_id, AckStatus::Error, Some(e.error_code()))
            }
        };
        if connection.send(ack).await.is_err() {
            tracing::debug!(
                connection_id = %connection.connection_id(),
                "Connection gone before acknowledgment"
            );
        }
    }

    async fn route(
        state: &GatewayState,
        connection: &Arc<Connection>,
        frame: &ClientFrame,
    ) -> HandlerResult<Option<String>> {
        let session_id = connection.session_id().await.ok_or(HandlerError::NotBound)?;

        // Redelivered events are acknowledged and dropped.
        if let Some(event_id) = frame.event_id.as_deref() {
            let fresh = EventDeduplicator::new(state.service_context())
                .check_and_record(&frame.event, event_id)
                .await?;
            if !fresh {
                return Ok(Some("duplicate".to_string()));
            }
        }

        match frame.event.as_str() {
            EVT_START_CHAT => StartChatHandler::handle(state, &session_id).await,
            EVT_SEND_MESSAGE => {
                SendMessageHandler::handle(state, &session_id, frame.data.clone()).await
            }
            EVT_LEAVE_CHAT => LeaveChatHandler::handle(state, &session_id).await,
            EVT_RETRIEVE_MESSAGES => {
                RetrieveHandler::handle(state, connection, frame.data.clone()).await
            }
            EVT_CHECK_ROOM_SESSION => {
                CheckSessionHandler::handle(state, connection, &session_id, frame.data.clone())
                    .await
            }
            other => Err(HandlerError::InvalidPayload(format!(
                "unknown event: {other}"
            ))),
        }
    }
}
