//! Matchmaker service
//!
//! Pairs waiting sessions two at a time off one shared FIFO queue.
//! Candidates are popped one by one: a pop is the only cross-worker
//! claim there is, so a session popped by this worker can never be
//! paired by another. Stale entries (sessions that disconnected or were
//! already paired) are dropped during the hunt. The trade is explicit:
//! pairing is at-most-once, and a candidate skipped as stale loses its
//! queue position.

use duo_core::{ChatRoom, Session, SessionStatus};
use serde_json::json;
use tracing::{debug, info, instrument};

use crate::events;

use super::context::ServiceContext;
use super::error::ServiceResult;
use super::keys;
use super::rooms::RoomService;
use super::sessions::SessionService;

/// Matchmaker service
pub struct MatchmakerService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> MatchmakerService<'a> {
    /// Create a new MatchmakerService
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Handle a start-chat request for the given session
    ///
    /// Returns the created room if a partner was found, `None` if the
    /// session was placed on the waiting queue. Repeating the request
    /// while already paired is idempotent and returns the current room.
    /// Both participants of a new room are notified on their session
    /// channels; neither worker can rely on holding both connections.
    #[instrument(skip(self))]
    pub async fn request_chat(&self, session_id: &str) -> ServiceResult<Option<ChatRoom>> {
        let sessions = SessionService::new(self.ctx);
        let rooms = RoomService::new(self.ctx);

        let mut session = match sessions.load(session_id).await? {
            Some(existing) => existing,
            None => Session::new(session_id),
        };

        // Repeat request while paired: hand back the existing room.
        if session.is_in_chat() {
            if let Some(room_id) = session.current_room_id.as_deref() {
                if let Some(room) = rooms.get(room_id).await? {
                    if room.has_participant(session_id) {
                        debug!(session_id, room_id, "Already paired, returning room");
                        return Ok(Some(room));
                    }
                }
            }
            // The room is gone; fall through and re-queue.
            session.status = SessionStatus::Waiting;
            session.current_room_id = None;
        }

        // Idempotent enqueue: drop any stale entry of our own first.
        self.ctx
            .store()
            .queue_remove(keys::MATCH_QUEUE, session_id)
            .await?;

        let Some(partner_id) = self.pop_waiting_partner(session_id, &sessions).await? else {
            session.touch();
            sessions.save(&session).await?;
            sessions.touch_activity(session_id).await?;
            self.ctx
                .store()
                .queue_push(keys::MATCH_QUEUE, session_id)
                .await?;

            info!(session_id, "No partner available, queued");
            return Ok(None);
        };

        let room = ChatRoom::paired(partner_id.clone(), session_id);
        rooms.save(&room).await?;
        rooms.touch_activity(&room.id).await?;

        let mut partner = sessions.load_required(&partner_id).await?;
        partner.enter_room(&room.id);
        sessions.save(&partner).await?;
        sessions.touch_activity(&partner_id).await?;

        session.enter_room(&room.id);
        sessions.save(&session).await?;
        sessions.touch_activity(session_id).await?;

        let payload = json!({
            "chatRoomId": room.id,
            "room": &room,
        });
        self.ctx
            .broadcaster()
            .notify_session(&partner_id, events::EVT_CHAT_ROOM_CREATED, payload.clone())
            .await?;
        self.ctx
            .broadcaster()
            .notify_session(session_id, events::EVT_CHAT_ROOM_CREATED, payload)
            .await?;

        info!(
            room_id = %room.id,
            session_id,
            partner_id = %partner_id,
            "Sessions paired"
        );
        Ok(Some(room))
    }

    /// Number of sessions currently waiting
    pub async fn queue_depth(&self) -> ServiceResult<u64> {
        Ok(self.ctx.store().queue_len(keys::MATCH_QUEUE).await?)
    }

    /// Pop queue entries until a live waiting partner is found
    async fn pop_waiting_partner(
        &self,
        session_id: &str,
        sessions: &SessionService<'_>,
    ) -> ServiceResult<Option<String>> {
        loop {
            let Some(candidate) = self.ctx.store().queue_pop(keys::MATCH_QUEUE).await? else {
                return Ok(None);
            };
            if candidate == session_id {
                continue;
            }
            match sessions.load(&candidate).await? {
                Some(partner) if partner.status == SessionStatus::Waiting => {
                    return Ok(Some(candidate));
                }
                _ => {
                    debug!(candidate, "Dropped stale queue entry");
                }
            }
        }
    }
}
