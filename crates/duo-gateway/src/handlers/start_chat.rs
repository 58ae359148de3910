//! start-chat handler
//!
//! Requests pairing for the connection's session. The pairing result
//! does not come back on this code path: when a partner is found, both
//! participants are told through their session channels, which also
//! works when the counterpart lives on another worker.

use super::HandlerResult;
use crate::server::GatewayState;
use duo_service::MatchmakerService;

/// Handles start-chat frames
pub struct StartChatHandler;

impl StartChatHandler {
    /// Handle a start-chat frame
    pub async fn handle(state: &GatewayState, session_id: &str) -> HandlerResult<Option<String>> {
        let matchmaker = MatchmakerService::new(state.service_context());
        let room = matchmaker.request_chat(session_id).await?;

        tracing::debug!(
            session_id,
            paired = room.is_some(),
            "start-chat handled"
        );
        Ok(Some(
            if room.is_some() { "paired" } else { "queued" }.to_string(),
        ))
    }
}
