//! Event de-duplicator
//!
//! Best-effort suppression of redelivered client events. Processed
//! event markers live in one sorted set scored by receipt time; markers
//! older than the sliding window are pruned lazily on each check. The
//! check-then-record pair is not atomic across workers, which is
//! acceptable: the per-room message-id set still keeps duplicate
//! messages out of the log.

use duo_core::now_ms;
use tracing::{debug, instrument};

use super::context::ServiceContext;
use super::error::ServiceResult;
use super::keys;

/// Sliding-window event de-duplicator
pub struct EventDeduplicator<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> EventDeduplicator<'a> {
    /// Create a new EventDeduplicator
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Record an event marker unless it was already seen in the window
    ///
    /// Returns `true` if the event is fresh and was recorded, `false`
    /// if it is a duplicate the caller should acknowledge and drop.
    #[instrument(skip(self))]
    pub async fn check_and_record(&self, event: &str, event_id: &str) -> ServiceResult<bool> {
        let now = now_ms();
        let window_ms = (self.ctx.chat().dedup_window_secs * 1000) as i64;

        let pruned = self
            .ctx
            .store()
            .zset_remove_below(keys::PROCESSED_EVENTS, (now - window_ms) as f64)
            .await?;
        if pruned > 0 {
            debug!(pruned, "Pruned expired event markers");
        }

        let member = keys::processed_member(event, event_id);
        if self
            .ctx
            .store()
            .zset_score(keys::PROCESSED_EVENTS, &member)
            .await?
            .is_some()
        {
            debug!(event, event_id, "Duplicate event suppressed");
            return Ok(false);
        }

        self.ctx
            .store()
            .zset_add(keys::PROCESSED_EVENTS, &member, now as f64)
            .await?;
        Ok(true)
    }
}
