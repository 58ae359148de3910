//! leave-chat handler

use super::HandlerResult;
use crate::server::GatewayState;
use duo_cache::PubSubChannel;
use duo_service::RoomService;

/// Handles leave-chat frames
pub struct LeaveChatHandler;

impl LeaveChatHandler {
    /// Handle a leave-chat frame
    ///
    /// A leave with no live room degrades to a no-op acknowledgment;
    /// the client's held id was simply stale.
    pub async fn handle(state: &GatewayState, session_id: &str) -> HandlerResult<Option<String>> {
        let Some(room_id) = RoomService::new(state.service_context())
            .leave(session_id)
            .await?
        else {
            return Ok(Some("no-op".to_string()));
        };

        // Drop the leaver's local connections from the room channel.
        let channel_name = PubSubChannel::room(&room_id).name();
        for conn in state.connection_manager().get_session_connections(session_id) {
            state
                .connection_manager()
                .leave_channel(conn.connection_id(), &channel_name)
                .await;
        }
        if !state.connection_manager().channel_has_local_members(&channel_name) {
            if let Err(e) = state.event_dispatcher().unsubscribe_room(&room_id).await {
                tracing::warn!(room_id, error = %e, "Failed to unsubscribe from room channel");
            }
        }

        tracing::debug!(session_id, room_id, "leave-chat handled");
        Ok(None)
    }
}
