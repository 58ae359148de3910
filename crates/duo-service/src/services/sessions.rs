//! Session service
//!
//! Session records are the stable anonymous identities behind transport
//! connections. This service owns their persistence plus the two
//! recovery paths: handshake-time reconnection and the explicit
//! room-session check.

use duo_core::{now_ms, ChatRoom, Session, SessionStatus};
use tracing::{debug, info, instrument, warn};

use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};
use super::keys;
use super::rooms::RoomService;

/// Outcome of a connection handshake
#[derive(Debug)]
pub struct Handshake {
    /// The session bound to the new connection
    pub session: Session,
    /// The room recovered for a reconnecting participant, if any
    pub recovered_room: Option<ChatRoom>,
    /// Last recorded activity before this reconnect (ms); messages
    /// logged after this moment were missed while disconnected
    pub resumed_at: Option<i64>,
}

/// Session service
pub struct SessionService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> SessionService<'a> {
    /// Create a new SessionService
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Load a session record by id
    pub async fn load(&self, session_id: &str) -> ServiceResult<Option<Session>> {
        let Some(raw) = self
            .ctx
            .store()
            .hash_get(keys::SESSIONS_HASH, session_id)
            .await?
        else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!(session_id, error = %e, "Dropping corrupt session record");
                Ok(None)
            }
        }
    }

    /// Load a session record, failing if absent
    pub async fn load_required(&self, session_id: &str) -> ServiceResult<Session> {
        self.load(session_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Session", session_id))
    }

    /// Persist a session record (last writer wins)
    pub async fn save(&self, session: &Session) -> ServiceResult<()> {
        let raw = serde_json::to_string(session).map_err(duo_core::DomainError::from)?;
        self.ctx
            .store()
            .hash_set(keys::SESSIONS_HASH, &session.session_id, &raw)
            .await?;
        Ok(())
    }

    /// Delete a session record and its activity marker
    pub async fn remove(&self, session_id: &str) -> ServiceResult<bool> {
        let existed = self
            .ctx
            .store()
            .hash_del(keys::SESSIONS_HASH, session_id)
            .await?;
        self.ctx
            .store()
            .string_del(&keys::session_activity(session_id))
            .await?;
        Ok(existed)
    }

    /// Refresh the session's activity marker
    pub async fn touch_activity(&self, session_id: &str) -> ServiceResult<()> {
        self.ctx
            .store()
            .string_set(&keys::session_activity(session_id), &now_ms().to_string())
            .await?;
        Ok(())
    }

    /// Resolve a new connection into a session
    ///
    /// A reconnecting client presents the session id and room id it
    /// held before the drop. Recovery succeeds only if that session
    /// still exists, is marked in-chat with that exact room, and the
    /// room still lists it as a participant. Any weaker match falls
    /// through to a fresh session under the connection id, so a client
    /// can never be attached to a room it does not belong to.
    #[instrument(skip(self))]
    pub async fn resolve_handshake(
        &self,
        connection_id: &str,
        claimed_session: Option<&str>,
        claimed_room: Option<&str>,
    ) -> ServiceResult<Handshake> {
        if let (Some(session_id), Some(room_id)) = (claimed_session, claimed_room) {
            if let Some(mut session) = self.load(session_id).await? {
                let claim_holds = session.is_in_chat()
                    && session.current_room_id.as_deref() == Some(room_id);
                if claim_holds {
                    if let Some(room) = self.validate_membership(session_id, room_id).await? {
                        let resumed_at = self
                            .last_activity(session_id)
                            .await?
                            .unwrap_or(session.last_activity);

                        session.touch();
                        self.save(&session).await?;
                        self.touch_activity(session_id).await?;

                        info!(session_id, room_id, "Session recovered on reconnect");
                        return Ok(Handshake {
                            session,
                            recovered_room: Some(room),
                            resumed_at: Some(resumed_at),
                        });
                    }
                }
            }
            debug!(
                session_id,
                room_id, "Reconnect claim rejected, issuing fresh session"
            );
        }

        let session = Session::new(connection_id);
        self.save(&session).await?;
        self.touch_activity(connection_id).await?;

        info!(session_id = connection_id, "Fresh session issued");
        Ok(Handshake {
            session,
            recovered_room: None,
            resumed_at: None,
        })
    }

    /// Last recorded activity of a session, if any
    pub async fn last_activity(&self, session_id: &str) -> ServiceResult<Option<i64>> {
        let Some(raw) = self
            .ctx
            .store()
            .string_get(&keys::session_activity(session_id))
            .await?
        else {
            return Ok(None);
        };
        Ok(raw.parse().ok())
    }

    /// Check whether a session still holds a live room membership
    ///
    /// Returns the room if the session is in-chat and the room lists it
    /// as a participant, `None` otherwise. A `claimed_room` that does
    /// not match the session's own record also comes back `None`;
    /// unknown ids are an empty answer, never an error.
    #[instrument(skip(self))]
    pub async fn check_room_session(
        &self,
        session_id: &str,
        claimed_room: Option<&str>,
    ) -> ServiceResult<Option<ChatRoom>> {
        let Some(session) = self.load(session_id).await? else {
            return Ok(None);
        };
        let Some(room_id) = session.current_room_id.as_deref() else {
            return Ok(None);
        };
        if !session.is_in_chat() {
            return Ok(None);
        }
        if claimed_room.is_some_and(|claimed| claimed != room_id) {
            return Ok(None);
        }
        self.validate_membership(session_id, room_id).await
    }

    /// Handle a transport disconnect
    ///
    /// Waiting sessions are dequeued and forgotten; they have nothing
    /// to recover. In-chat sessions are kept so the client can
    /// reconnect, and are eventually collected by the inactivity
    /// reaper if it never does.
    #[instrument(skip(self))]
    pub async fn disconnect(&self, session_id: &str) -> ServiceResult<()> {
        let removed = self
            .ctx
            .store()
            .queue_remove(keys::MATCH_QUEUE, session_id)
            .await?;
        if removed > 0 {
            debug!(session_id, "Dequeued on disconnect");
        }

        match self.load(session_id).await? {
            Some(session) if session.status == SessionStatus::Waiting => {
                self.remove(session_id).await?;
                info!(session_id, "Waiting session discarded on disconnect");
            }
            Some(_) => {
                self.touch_activity(session_id).await?;
                debug!(session_id, "In-chat session kept for reconnection");
            }
            None => {}
        }
        Ok(())
    }

    /// Room returned only if it exists and lists the session
    async fn validate_membership(
        &self,
        session_id: &str,
        room_id: &str,
    ) -> ServiceResult<Option<ChatRoom>> {
        let Some(room) = RoomService::new(self.ctx).get(room_id).await? else {
            return Ok(None);
        };
        if room.has_participant(session_id) {
            Ok(Some(room))
        } else {
            Ok(None)
        }
    }
}
