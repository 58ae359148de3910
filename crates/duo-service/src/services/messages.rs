//! Message service
//!
//! Relays messages between room participants and keeps the capped
//! per-room log. Delivery is broadcast-first: the counterpart hears the
//! message before the log write, so a store hiccup after broadcast
//! costs history, never liveness. Duplicate message ids are absorbed by
//! the per-room id set and acknowledged without a second delivery.

use duo_core::ChatMessage;
use tracing::{debug, info, instrument, warn};

use crate::events;

use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};
use super::keys;
use super::rooms::RoomService;
use super::sessions::SessionService;

/// Outcome of a send-message request
#[derive(Debug)]
pub enum SendOutcome {
    /// The message was relayed and logged
    Delivered(ChatMessage),
    /// The message id was already relayed; nothing was sent again
    Duplicate,
}

/// Message service
pub struct MessageService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> MessageService<'a> {
    /// Create a new MessageService
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Relay a message to the sender's counterpart and log it
    #[instrument(skip(self, body))]
    pub async fn send_message(
        &self,
        session_id: &str,
        room_id: &str,
        message_id: &str,
        body: &str,
    ) -> ServiceResult<SendOutcome> {
        if message_id.is_empty() {
            return Err(ServiceError::validation("message id must not be empty"));
        }
        if body.is_empty() {
            return Err(ServiceError::validation("message body must not be empty"));
        }

        let rooms = RoomService::new(self.ctx);
        let room = rooms.get_required(room_id).await?;
        if !room.has_participant(session_id) {
            return Err(ServiceError::validation(
                "session is not a participant of this room",
            ));
        }

        // set_add is the duplicate gate: false means already relayed.
        let fresh = self
            .ctx
            .store()
            .set_add(&keys::room_message_ids(room_id), message_id)
            .await?;
        if !fresh {
            debug!(room_id, message_id, "Duplicate message absorbed");
            return Ok(SendOutcome::Duplicate);
        }

        let receiver = room
            .counterpart_of(session_id)
            .map(str::to_string)
            .unwrap_or_default();
        let message = ChatMessage::new(message_id, session_id, receiver, body);

        let payload = serde_json::to_value(&message).map_err(duo_core::DomainError::from)?;
        self.ctx
            .broadcaster()
            .broadcast(
                room_id,
                events::EVT_RECEIVE_MESSAGE,
                payload,
                Some(session_id),
            )
            .await?;

        let raw = serde_json::to_string(&message).map_err(duo_core::DomainError::from)?;
        let log_key = keys::room_messages(room_id);
        let len = self.ctx.store().list_append(&log_key, &raw).await?;
        if len > self.ctx.chat().message_log_cap {
            self.ctx
                .store()
                .list_trim_to_latest(&log_key, self.ctx.chat().message_log_cap)
                .await?;
            debug!(room_id, "Message log trimmed to cap");
        }

        rooms.touch_activity(room_id).await?;
        SessionService::new(self.ctx)
            .touch_activity(session_id)
            .await?;

        info!(room_id, message_id, "Message relayed");
        Ok(SendOutcome::Delivered(message))
    }

    /// Full message history of a room, oldest first
    ///
    /// A room that was torn down or never existed has an empty history;
    /// retrieval is a read, never a membership check.
    #[instrument(skip(self))]
    pub async fn history(&self, room_id: &str) -> ServiceResult<Vec<ChatMessage>> {
        let raw = self
            .ctx
            .store()
            .list_range(&keys::room_messages(room_id), 0, -1)
            .await?;
        Ok(Self::parse_log(room_id, raw))
    }

    /// Messages logged strictly after the given timestamp, oldest first
    ///
    /// The backlog a reconnecting participant missed: everything newer
    /// than its own last recorded activity.
    #[instrument(skip(self))]
    pub async fn missed_since(
        &self,
        room_id: &str,
        since_ms: i64,
    ) -> ServiceResult<Vec<ChatMessage>> {
        let raw = self
            .ctx
            .store()
            .list_range(&keys::room_messages(room_id), 0, -1)
            .await?;
        Ok(Self::parse_log(room_id, raw)
            .into_iter()
            .filter(|m| m.timestamp > since_ms)
            .collect())
    }

    fn parse_log(room_id: &str, raw: Vec<String>) -> Vec<ChatMessage> {
        raw.iter()
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(msg) => Some(msg),
                Err(e) => {
                    warn!(room_id, error = %e, "Skipping corrupt log entry");
                    None
                }
            })
            .collect()
    }
}
