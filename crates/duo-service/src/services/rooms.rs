//! Room service
//!
//! The room registry is one hash keyed by room id; every mutation is a
//! read-modify-write of a whole record, last writer wins. Per-room
//! artifacts (message log, message-id set, activity marker) are purged
//! together with the registry entry.

use duo_core::{now_ms, ChatRoom, SessionStatus};
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::events;

use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};
use super::keys;
use super::sessions::SessionService;

/// Room service
pub struct RoomService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> RoomService<'a> {
    /// Create a new RoomService
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Create and register an empty idle room
    #[instrument(skip(self))]
    pub async fn create(&self) -> ServiceResult<ChatRoom> {
        let room = ChatRoom::new();
        self.save(&room).await?;
        self.touch_activity(&room.id).await?;

        info!(room_id = %room.id, "Room created");
        Ok(room)
    }

    /// Load a room by id
    pub async fn get(&self, room_id: &str) -> ServiceResult<Option<ChatRoom>> {
        let Some(raw) = self.ctx.store().hash_get(keys::ROOMS_HASH, room_id).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(room) => Ok(Some(room)),
            Err(e) => {
                warn!(room_id, error = %e, "Dropping corrupt room record");
                Ok(None)
            }
        }
    }

    /// Load a room by id, failing if absent
    pub async fn get_required(&self, room_id: &str) -> ServiceResult<ChatRoom> {
        self.get(room_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Room", room_id))
    }

    /// Persist a room record (last writer wins)
    pub async fn save(&self, room: &ChatRoom) -> ServiceResult<()> {
        let raw = serde_json::to_string(room).map_err(duo_core::DomainError::from)?;
        self.ctx
            .store()
            .hash_set(keys::ROOMS_HASH, &room.id, &raw)
            .await?;
        Ok(())
    }

    /// All registered rooms
    pub async fn list(&self) -> ServiceResult<Vec<ChatRoom>> {
        let entries = self.ctx.store().hash_get_all(keys::ROOMS_HASH).await?;
        let mut rooms = Vec::with_capacity(entries.len());
        for (room_id, raw) in entries {
            match serde_json::from_str(&raw) {
                Ok(room) => rooms.push(room),
                Err(e) => warn!(room_id, error = %e, "Skipping corrupt room record"),
            }
        }
        Ok(rooms)
    }

    /// Refresh the room's activity marker
    pub async fn touch_activity(&self, room_id: &str) -> ServiceResult<()> {
        self.ctx
            .store()
            .string_set(&keys::room_activity(room_id), &now_ms().to_string())
            .await?;
        Ok(())
    }

    /// Remove a session from its room
    ///
    /// The counterpart is told over the room channel. A room left empty
    /// is purged; otherwise it is saved back idle with the remaining
    /// participant. The leaver's session reverts to a fresh waiting
    /// state. A leave with no live session or room degrades to a no-op.
    #[instrument(skip(self))]
    pub async fn leave(&self, session_id: &str) -> ServiceResult<Option<String>> {
        let sessions = SessionService::new(self.ctx);
        let Some(mut session) = sessions.load(session_id).await? else {
            return Ok(None);
        };
        let Some(room_id) = session.current_room_id.take() else {
            return Ok(None);
        };

        session.status = SessionStatus::Waiting;
        session.touch();
        sessions.save(&session).await?;

        let Some(mut room) = self.get(&room_id).await? else {
            return Ok(None);
        };
        if !room.remove_participant(session_id) {
            return Ok(None);
        }

        self.ctx
            .broadcaster()
            .broadcast(
                &room_id,
                events::EVT_LEFT_CHAT,
                json!({ "sessionId": session_id }),
                Some(session_id),
            )
            .await?;

        if room.is_empty() {
            self.purge(&room_id).await?;
            info!(room_id, session_id, "Last participant left, room purged");
        } else {
            self.save(&room).await?;
            self.touch_activity(&room_id).await?;
            info!(room_id, session_id, "Participant left room");
        }

        Ok(Some(room_id))
    }

    /// Delete a room's registry entry and all per-room artifacts
    #[instrument(skip(self))]
    pub async fn purge(&self, room_id: &str) -> ServiceResult<bool> {
        let existed = self.ctx.store().hash_del(keys::ROOMS_HASH, room_id).await?;
        self.ctx
            .store()
            .delete_key(&keys::room_messages(room_id))
            .await?;
        self.ctx
            .store()
            .delete_key(&keys::room_message_ids(room_id))
            .await?;
        self.ctx
            .store()
            .string_del(&keys::room_activity(room_id))
            .await?;
        Ok(existed)
    }
}
