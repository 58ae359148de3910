//! Inactivity reaper
//!
//! Periodically tears down rooms with no recent activity. Several
//! workers may run the sweep at once; the registry hash-delete is the
//! claim, so exactly one worker announces and purges each expired room.
//! A room that loses the claim race was already handled and is skipped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use duo_core::{now_ms, ChatRoom};
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};

use crate::events;

use super::context::ServiceContext;
use super::error::ServiceResult;
use super::keys;
use super::rooms::RoomService;
use super::sessions::SessionService;

/// Background reaper for inactive rooms
pub struct InactivityReaper {
    ctx: ServiceContext,
    running: AtomicBool,
}

impl InactivityReaper {
    /// Create a new reaper
    pub fn new(ctx: ServiceContext) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            running: AtomicBool::new(false),
        })
    }

    /// Start the periodic sweep loop
    ///
    /// Returns the task handle; `stop` ends the loop after the sweep in
    /// progress finishes.
    pub fn start(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        let reaper = Arc::clone(self);
        let interval_secs = reaper.ctx.chat().reap_interval_secs;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
            info!(interval_secs, "Inactivity reaper started");

            while reaper.running.load(Ordering::SeqCst) {
                ticker.tick().await;
                if !reaper.running.load(Ordering::SeqCst) {
                    break;
                }
                match reaper.run_once().await {
                    Ok(0) => {}
                    Ok(reaped) => info!(reaped, "Reaped inactive rooms"),
                    Err(e) => error!(error = %e, "Reaper sweep failed"),
                }
            }
            info!("Inactivity reaper stopped");
        })
    }

    /// Signal the sweep loop to stop
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Run one sweep; returns how many rooms were reaped
    ///
    /// A room that fails to reap is logged and left for the next sweep;
    /// it never aborts the rest of the pass.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> ServiceResult<u64> {
        let rooms = RoomService::new(&self.ctx);
        let threshold_ms = (self.ctx.chat().reap_threshold_secs * 1000) as i64;
        let now = now_ms();

        let mut reaped = 0;
        for room in rooms.list().await? {
            match self.reap_room(&room, now, threshold_ms).await {
                Ok(true) => reaped += 1,
                Ok(false) => {}
                Err(e) => error!(room_id = %room.id, error = %e, "Failed to reap room"),
            }
        }
        Ok(reaped)
    }

    /// Reap one room if it is idle past the threshold
    ///
    /// The claim is won before anything else happens, and the per-room
    /// artifacts go before the announcement: once the registry entry is
    /// gone no other sweep will revisit the room, so a broadcast
    /// failure must not leave its keys behind.
    async fn reap_room(&self, room: &ChatRoom, now: i64, threshold_ms: i64) -> ServiceResult<bool> {
        let last = self
            .last_room_activity(&room.id)
            .await?
            .unwrap_or(room.last_activity);
        if now - last < threshold_ms {
            return Ok(false);
        }

        // The registry delete is the claim: losing it means another
        // worker already reaped this room.
        if !self
            .ctx
            .store()
            .hash_del(keys::ROOMS_HASH, &room.id)
            .await?
        {
            debug!(room_id = %room.id, "Room already reaped elsewhere");
            return Ok(false);
        }

        let rooms = RoomService::new(&self.ctx);
        let sessions = SessionService::new(&self.ctx);
        rooms.purge(&room.id).await?;
        for participant in &room.participants {
            sessions.remove(participant).await?;
        }

        if let Err(e) = self
            .ctx
            .broadcaster()
            .broadcast(
                &room.id,
                events::EVT_INACTIVE_ROOM,
                json!({ "chatRoomId": room.id, "room": room }),
                None,
            )
            .await
        {
            warn!(room_id = %room.id, error = %e, "Failed to announce room teardown");
        }

        info!(
            room_id = %room.id,
            idle_ms = now - last,
            "Inactive room torn down"
        );
        Ok(true)
    }

    async fn last_room_activity(&self, room_id: &str) -> ServiceResult<Option<i64>> {
        let Some(raw) = self
            .ctx
            .store()
            .string_get(&keys::room_activity(room_id))
            .await?
        else {
            return Ok(None);
        };
        Ok(raw.parse().ok())
    }
}
