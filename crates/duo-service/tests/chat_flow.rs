//! End-to-end behavior tests for the service layer, run over the
//! in-memory store and a recording broadcaster.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use duo_cache::MemoryStateStore;
use duo_common::ChatConfig;
use duo_core::{ChannelBroadcaster, DomainError, DomainResult, SessionStatus};
use duo_service::{
    events, EventDeduplicator, InactivityReaper, MatchmakerService, MessageService, RoomService,
    SendOutcome, ServiceContext, SessionService,
};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
enum Target {
    Room(String),
    Session(String),
}

#[derive(Debug, Clone)]
struct Recorded {
    target: Target,
    event: String,
    payload: Value,
    exclude: Option<String>,
}

#[derive(Debug, Default)]
struct RecordingBroadcaster {
    records: Mutex<Vec<Recorded>>,
}

impl RecordingBroadcaster {
    fn all(&self) -> Vec<Recorded> {
        self.records.lock().unwrap().clone()
    }

    fn named(&self, event: &str) -> Vec<Recorded> {
        self.all().into_iter().filter(|r| r.event == event).collect()
    }
}

#[async_trait]
impl ChannelBroadcaster for RecordingBroadcaster {
    async fn broadcast(
        &self,
        room_id: &str,
        event: &str,
        payload: Value,
        exclude_session: Option<&str>,
    ) -> DomainResult<()> {
        self.records.lock().unwrap().push(Recorded {
            target: Target::Room(room_id.to_string()),
            event: event.to_string(),
            payload,
            exclude: exclude_session.map(str::to_string),
        });
        Ok(())
    }

    async fn notify_session(
        &self,
        session_id: &str,
        event: &str,
        payload: Value,
    ) -> DomainResult<()> {
        self.records.lock().unwrap().push(Recorded {
            target: Target::Session(session_id.to_string()),
            event: event.to_string(),
            payload,
            exclude: None,
        });
        Ok(())
    }
}

fn make_ctx(chat: ChatConfig) -> (ServiceContext, Arc<RecordingBroadcaster>) {
    let store = Arc::new(MemoryStateStore::new());
    let broadcaster = Arc::new(RecordingBroadcaster::default());
    let ctx = ServiceContext::new(store, broadcaster.clone(), chat);
    (ctx, broadcaster)
}

fn default_ctx() -> (ServiceContext, Arc<RecordingBroadcaster>) {
    make_ctx(ChatConfig::default())
}

async fn pair(ctx: &ServiceContext, first: &str, second: &str) -> duo_core::ChatRoom {
    let sessions = SessionService::new(ctx);
    sessions
        .resolve_handshake(first, None, None)
        .await
        .unwrap();
    sessions
        .resolve_handshake(second, None, None)
        .await
        .unwrap();

    let matchmaker = MatchmakerService::new(ctx);
    assert!(matchmaker.request_chat(first).await.unwrap().is_none());
    matchmaker.request_chat(second).await.unwrap().unwrap()
}

#[tokio::test]
async fn first_requester_waits_second_pairs() {
    let (ctx, broadcaster) = default_ctx();
    let room = pair(&ctx, "s1", "s2").await;

    assert_eq!(room.participants, vec!["s1", "s2"]);

    let sessions = SessionService::new(&ctx);
    for sid in ["s1", "s2"] {
        let session = sessions.load(sid).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::InChat);
        assert_eq!(session.current_room_id.as_deref(), Some(room.id.as_str()));
    }

    // Both parties were notified on their session channels.
    let created = broadcaster.named(events::EVT_CHAT_ROOM_CREATED);
    assert_eq!(created.len(), 2);
    assert!(created
        .iter()
        .any(|r| r.target == Target::Session("s1".into())));
    assert!(created
        .iter()
        .any(|r| r.target == Target::Session("s2".into())));

    // The queue is drained.
    assert_eq!(MatchmakerService::new(&ctx).queue_depth().await.unwrap(), 0);
}

#[tokio::test]
async fn repeated_start_chat_does_not_self_pair() {
    let (ctx, _) = default_ctx();
    let sessions = SessionService::new(&ctx);
    sessions.resolve_handshake("s1", None, None).await.unwrap();

    let matchmaker = MatchmakerService::new(&ctx);
    assert!(matchmaker.request_chat("s1").await.unwrap().is_none());
    assert!(matchmaker.request_chat("s1").await.unwrap().is_none());

    assert_eq!(matchmaker.queue_depth().await.unwrap(), 1);
}

#[tokio::test]
async fn start_chat_while_paired_returns_current_room() {
    let (ctx, _) = default_ctx();
    let room = pair(&ctx, "s1", "s2").await;

    let matchmaker = MatchmakerService::new(&ctx);
    let again = matchmaker.request_chat("s1").await.unwrap().unwrap();
    assert_eq!(again.id, room.id);
    assert_eq!(matchmaker.queue_depth().await.unwrap(), 0);
}

#[tokio::test]
async fn stale_queue_entries_are_skipped() {
    let (ctx, _) = default_ctx();
    let sessions = SessionService::new(&ctx);
    sessions.resolve_handshake("gone", None, None).await.unwrap();
    sessions.resolve_handshake("live", None, None).await.unwrap();
    sessions.resolve_handshake("s3", None, None).await.unwrap();

    let matchmaker = MatchmakerService::new(&ctx);
    assert!(matchmaker.request_chat("gone").await.unwrap().is_none());

    // "gone" loses its record while its queue entry lingers.
    sessions.remove("gone").await.unwrap();

    // The hunt pops and drops the stale entry, then queues "live".
    assert!(matchmaker.request_chat("live").await.unwrap().is_none());

    let room = matchmaker.request_chat("s3").await.unwrap().unwrap();
    assert_eq!(room.participants, vec!["live", "s3"]);
}

#[tokio::test]
async fn disconnect_while_waiting_dequeues_and_discards() {
    let (ctx, _) = default_ctx();
    let sessions = SessionService::new(&ctx);
    sessions.resolve_handshake("gone", None, None).await.unwrap();
    sessions.resolve_handshake("live", None, None).await.unwrap();
    sessions.resolve_handshake("s3", None, None).await.unwrap();

    let matchmaker = MatchmakerService::new(&ctx);
    assert!(matchmaker.request_chat("gone").await.unwrap().is_none());

    sessions.disconnect("gone").await.unwrap();
    assert!(sessions.load("gone").await.unwrap().is_none());
    assert_eq!(matchmaker.queue_depth().await.unwrap(), 0);

    // The dropped requester is never paired.
    assert!(matchmaker.request_chat("live").await.unwrap().is_none());
    let room = matchmaker.request_chat("s3").await.unwrap().unwrap();
    assert_eq!(room.participants, vec!["live", "s3"]);
}

#[tokio::test]
async fn message_relay_excludes_sender_and_logs() {
    let (ctx, broadcaster) = default_ctx();
    let room = pair(&ctx, "s1", "s2").await;

    let messages = MessageService::new(&ctx);
    let outcome = messages
        .send_message("s1", &room.id, "m1", "hello")
        .await
        .unwrap();
    let SendOutcome::Delivered(msg) = outcome else {
        panic!("expected delivery");
    };
    assert_eq!(msg.sender, "s1");
    assert_eq!(msg.receiver, "s2");

    let relayed = broadcaster.named(events::EVT_RECEIVE_MESSAGE);
    assert_eq!(relayed.len(), 1);
    assert_eq!(relayed[0].target, Target::Room(room.id.clone()));
    assert_eq!(relayed[0].exclude.as_deref(), Some("s1"));

    let history = messages.history(&room.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].body, "hello");
}

#[tokio::test]
async fn duplicate_message_id_is_absorbed() {
    let (ctx, broadcaster) = default_ctx();
    let room = pair(&ctx, "s1", "s2").await;

    let messages = MessageService::new(&ctx);
    messages
        .send_message("s1", &room.id, "m1", "hello")
        .await
        .unwrap();
    let second = messages
        .send_message("s1", &room.id, "m1", "hello")
        .await
        .unwrap();
    assert!(matches!(second, SendOutcome::Duplicate));

    assert_eq!(broadcaster.named(events::EVT_RECEIVE_MESSAGE).len(), 1);
    assert_eq!(messages.history(&room.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn non_participant_cannot_send() {
    let (ctx, _) = default_ctx();
    let room = pair(&ctx, "s1", "s2").await;

    let err = MessageService::new(&ctx)
        .send_message("intruder", &room.id, "m1", "hi")
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn message_log_is_capped_oldest_first() {
    let (ctx, _) = make_ctx(ChatConfig {
        message_log_cap: 3,
        ..ChatConfig::default()
    });
    let room = pair(&ctx, "s1", "s2").await;

    let messages = MessageService::new(&ctx);
    for i in 0..5 {
        messages
            .send_message("s1", &room.id, &format!("m{i}"), &format!("body {i}"))
            .await
            .unwrap();
    }

    let history = messages.history(&room.id).await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].id, "m2");
    assert_eq!(history[2].id, "m4");
}

#[tokio::test]
async fn reconnect_recovers_session_and_backlog() {
    let (ctx, _) = default_ctx();
    let room = pair(&ctx, "s1", "s2").await;

    let messages = MessageService::new(&ctx);
    let SendOutcome::Delivered(first) = messages
        .send_message("s1", &room.id, "m1", "before drop")
        .await
        .unwrap()
    else {
        panic!("expected delivery");
    };

    // s2 drops; in-chat sessions survive a disconnect.
    let sessions = SessionService::new(&ctx);
    sessions.disconnect("s2").await.unwrap();
    assert!(sessions.load("s2").await.unwrap().is_some());

    // Keep the two messages on distinct millisecond timestamps.
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    messages
        .send_message("s1", &room.id, "m2", "while away")
        .await
        .unwrap();

    let handshake = sessions
        .resolve_handshake("conn-2", Some("s2"), Some(&room.id))
        .await
        .unwrap();
    assert_eq!(handshake.session.session_id, "s2");
    let recovered = handshake.recovered_room.expect("room recovered");
    assert_eq!(recovered.id, room.id);

    let missed = messages.missed_since(&room.id, first.timestamp).await.unwrap();
    assert_eq!(missed.len(), 1);
    assert_eq!(missed[0].id, "m2");
}

#[tokio::test]
async fn reconnect_claim_with_wrong_room_is_rejected() {
    let (ctx, _) = default_ctx();
    let room = pair(&ctx, "s1", "s2").await;

    let sessions = SessionService::new(&ctx);
    let handshake = sessions
        .resolve_handshake("conn-2", Some("s2"), Some("no-such-room"))
        .await
        .unwrap();
    assert!(handshake.recovered_room.is_none());
    assert_eq!(handshake.session.session_id, "conn-2");

    // A session that never joined the room cannot claim it either.
    let handshake = sessions
        .resolve_handshake("conn-3", Some("conn-2"), Some(&room.id))
        .await
        .unwrap();
    assert!(handshake.recovered_room.is_none());
}

#[tokio::test]
async fn check_room_session_reflects_membership() {
    let (ctx, _) = default_ctx();
    let room = pair(&ctx, "s1", "s2").await;

    let sessions = SessionService::new(&ctx);
    let found = sessions
        .check_room_session("s1", Some(&room.id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, room.id);

    // A claim naming a different room is rejected.
    assert!(sessions
        .check_room_session("s1", Some("other-room"))
        .await
        .unwrap()
        .is_none());

    // After leaving, the membership check comes back empty.
    RoomService::new(&ctx).leave("s1").await.unwrap();
    assert!(sessions
        .check_room_session("s1", None)
        .await
        .unwrap()
        .is_none());
    assert!(sessions
        .check_room_session("unknown", None)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn leave_notifies_counterpart_and_purges_empty_room() {
    let (ctx, broadcaster) = default_ctx();
    let room = pair(&ctx, "s1", "s2").await;
    MessageService::new(&ctx)
        .send_message("s1", &room.id, "m1", "hello")
        .await
        .unwrap();

    let rooms = RoomService::new(&ctx);
    assert_eq!(rooms.leave("s1").await.unwrap().as_deref(), Some(room.id.as_str()));

    let left = broadcaster.named(events::EVT_LEFT_CHAT);
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].exclude.as_deref(), Some("s1"));

    // One participant remains; the room stays registered but idle.
    let remaining = rooms.get(&room.id).await.unwrap().unwrap();
    assert_eq!(remaining.participants, vec!["s2"]);

    // Second leave empties and purges the room.
    rooms.leave("s2").await.unwrap();
    assert!(rooms.get(&room.id).await.unwrap().is_none());

    // Every derived key went with the registry entry.
    let store = ctx.store();
    assert_eq!(
        store
            .list_len(&format!("chat:room:{}:messages", room.id))
            .await
            .unwrap(),
        0
    );
    assert!(!store
        .set_contains(&format!("chat:room:{}:message-ids", room.id), "m1")
        .await
        .unwrap());
    assert!(store
        .string_get(&format!("activity:room:{}", room.id))
        .await
        .unwrap()
        .is_none());

    // Leaving again degrades to a no-op.
    assert!(rooms.leave("s2").await.unwrap().is_none());
}

#[tokio::test]
async fn reaper_tears_down_idle_rooms_once() {
    let (ctx, broadcaster) = make_ctx(ChatConfig {
        reap_threshold_secs: 0,
        ..ChatConfig::default()
    });
    let room = pair(&ctx, "s1", "s2").await;

    let reaper = InactivityReaper::new(ctx.clone());
    assert_eq!(reaper.run_once().await.unwrap(), 1);

    let inactive = broadcaster.named(events::EVT_INACTIVE_ROOM);
    assert_eq!(inactive.len(), 1);
    assert_eq!(inactive[0].target, Target::Room(room.id.clone()));

    let rooms = RoomService::new(&ctx);
    assert!(rooms.get(&room.id).await.unwrap().is_none());

    let sessions = SessionService::new(&ctx);
    assert!(sessions.load("s1").await.unwrap().is_none());
    assert!(sessions.load("s2").await.unwrap().is_none());

    // A second sweep finds nothing; the teardown already happened.
    assert_eq!(reaper.run_once().await.unwrap(), 0);
    assert_eq!(broadcaster.named(events::EVT_INACTIVE_ROOM).len(), 1);
}

#[tokio::test]
async fn reaper_spares_active_rooms() {
    let (ctx, _) = default_ctx();
    let room = pair(&ctx, "s1", "s2").await;

    let reaper = InactivityReaper::new(ctx.clone());
    assert_eq!(reaper.run_once().await.unwrap(), 0);
    assert!(RoomService::new(&ctx).get(&room.id).await.unwrap().is_some());
}

#[tokio::test]
async fn history_of_torn_down_room_is_empty() {
    let (ctx, _) = make_ctx(ChatConfig {
        reap_threshold_secs: 0,
        ..ChatConfig::default()
    });
    let room = pair(&ctx, "s1", "s2").await;

    let messages = MessageService::new(&ctx);
    messages
        .send_message("s1", &room.id, "m1", "hello")
        .await
        .unwrap();

    let reaper = InactivityReaper::new(ctx.clone());
    assert_eq!(reaper.run_once().await.unwrap(), 1);

    // Retrieval after teardown answers with an empty log, not an error.
    assert!(messages.history(&room.id).await.unwrap().is_empty());
    assert!(messages.history("never-existed").await.unwrap().is_empty());
}

/// Broadcaster whose teardown announcement always fails
#[derive(Debug, Default)]
struct MutedTeardownBroadcaster;

#[async_trait]
impl ChannelBroadcaster for MutedTeardownBroadcaster {
    async fn broadcast(
        &self,
        _room_id: &str,
        event: &str,
        _payload: Value,
        _exclude_session: Option<&str>,
    ) -> DomainResult<()> {
        if event == events::EVT_INACTIVE_ROOM {
            Err(DomainError::Broadcast("channel down".to_string()))
        } else {
            Ok(())
        }
    }

    async fn notify_session(
        &self,
        _session_id: &str,
        _event: &str,
        _payload: Value,
    ) -> DomainResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn reaper_purges_even_when_announcement_fails() {
    let store = Arc::new(MemoryStateStore::new());
    let ctx = ServiceContext::new(
        store,
        Arc::new(MutedTeardownBroadcaster),
        ChatConfig {
            reap_threshold_secs: 0,
            ..ChatConfig::default()
        },
    );
    let room = pair(&ctx, "s1", "s2").await;
    MessageService::new(&ctx)
        .send_message("s1", &room.id, "m1", "hello")
        .await
        .unwrap();

    let reaper = InactivityReaper::new(ctx.clone());
    assert_eq!(reaper.run_once().await.unwrap(), 1);

    // The claim was won, so the teardown went through regardless of the
    // failed announcement; nothing lingers in the store.
    let rooms = RoomService::new(&ctx);
    assert!(rooms.get(&room.id).await.unwrap().is_none());
    let sessions = SessionService::new(&ctx);
    assert!(sessions.load("s1").await.unwrap().is_none());
    assert!(sessions.load("s2").await.unwrap().is_none());

    let store = ctx.store();
    assert_eq!(
        store
            .list_len(&format!("chat:room:{}:messages", room.id))
            .await
            .unwrap(),
        0
    );
    assert!(!store
        .set_contains(&format!("chat:room:{}:message-ids", room.id), "m1")
        .await
        .unwrap());
    assert!(store
        .string_get(&format!("activity:room:{}", room.id))
        .await
        .unwrap()
        .is_none());

    assert_eq!(reaper.run_once().await.unwrap(), 0);
}

#[tokio::test]
async fn event_dedup_suppresses_repeats() {
    let (ctx, _) = default_ctx();
    let dedup = EventDeduplicator::new(&ctx);

    assert!(dedup.check_and_record("send-message", "e1").await.unwrap());
    assert!(!dedup.check_and_record("send-message", "e1").await.unwrap());

    // Same id under a different event name is a distinct marker.
    assert!(dedup.check_and_record("leave-chat", "e1").await.unwrap());
}

#[tokio::test]
async fn expired_dedup_markers_are_pruned_and_reusable() {
    let (ctx, _) = make_ctx(ChatConfig {
        dedup_window_secs: 0,
        ..ChatConfig::default()
    });
    let dedup = EventDeduplicator::new(&ctx);

    assert!(dedup.check_and_record("send-message", "e1").await.unwrap());

    // Past the window the marker is pruned and the id accepted again.
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    assert!(dedup.check_and_record("send-message", "e1").await.unwrap());
}

#[tokio::test]
async fn created_room_starts_idle_and_empty() {
    let (ctx, _) = default_ctx();
    let rooms = RoomService::new(&ctx);
    let room = rooms.create().await.unwrap();

    let loaded = rooms.get(&room.id).await.unwrap().unwrap();
    assert!(loaded.is_empty());
    assert_eq!(loaded.state, duo_core::RoomState::Idle);
    assert_eq!(rooms.list().await.unwrap().len(), 1);
}
