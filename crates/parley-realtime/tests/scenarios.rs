//! End-to-end behavior of the engine over an in-memory store.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use parley_auth::{JwtAuthenticator, JwtEncoder};
use parley_core::config::{AuthConfig, RealtimeConfig};
use parley_core::error::AppError;
use parley_core::result::AppResult;
use parley_core::types::{RoomId, UserId};
use parley_core::ErrorKind;
use parley_entity::{FriendshipStatus, Identity, Message, Room, RoomType, User};
use parley_realtime::{
    GroupEvent, GroupName, LiveSession, OutboundFrame, RealtimeEngine, SessionKind, SessionState,
};
use parley_store::{MemoryStore, Store};

struct Harness {
    store: Arc<MemoryStore>,
    engine: RealtimeEngine,
    encoder: JwtEncoder,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::with_store(store.clone(), store)
    }

    fn with_store(seed: Arc<MemoryStore>, backend: Arc<dyn Store>) -> Self {
        let auth = AuthConfig::default();
        let authenticator = Arc::new(JwtAuthenticator::new(&auth, backend.clone()));
        let engine = RealtimeEngine::new(RealtimeConfig::default(), backend, authenticator);
        Self {
            store: seed,
            engine,
            encoder: JwtEncoder::new(&auth),
        }
    }

    fn user(&self, name: &str) -> User {
        self.store.insert_user(User::new(name))
    }

    async fn direct_room(&self, a: &User, b: &User) -> Room {
        self.store
            .create_room(RoomType::Direct, &[a.id, b.id])
            .await
            .unwrap()
    }

    fn token(&self, user: &User) -> String {
        self.encoder.issue(&user.identity()).unwrap().0
    }

    async fn connect(&self, user: &User, kind: SessionKind) -> LiveSession {
        let token = self.token(user);
        self.engine.connect(Some(&token), kind).await.unwrap()
    }

    async fn next_frames(&self, live: &mut LiveSession) -> Vec<OutboundFrame> {
        let event = tokio::time::timeout(Duration::from_secs(2), live.events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed");
        self.engine.render_event(&live.session, event).await
    }
}

fn message_frame(text: &str) -> String {
    serde_json::json!({ "type": "message", "message": text }).to_string()
}

fn room_list(frames: Vec<OutboundFrame>) -> Vec<parley_realtime::message::RoomSummary> {
    match frames.as_slice() {
        [OutboundFrame::ChatRoomList { rooms }] => rooms.clone(),
        other => panic!("expected a single chat_room_list, got {other:?}"),
    }
}

#[tokio::test]
async fn scenario_unread_count_then_mark_read() {
    let h = Harness::new();
    let a = h.user("alice");
    let b = h.user("bob");
    let room = h.direct_room(&a, &b).await;

    let mut b_sidebar = h.connect(&b, SessionKind::Sidebar).await;
    let initial = room_list(b_sidebar.greeting.clone());
    assert_eq!(initial.len(), 1);
    assert_eq!(initial[0].unread_count, 0);

    let mut b_room = h.connect(&b, SessionKind::Room(room.id)).await;
    let a_room = h.connect(&a, SessionKind::Room(room.id)).await;

    let replies = h.engine.handle_frame(&a_room.session, &message_frame("hi")).await;
    assert!(replies.is_empty());

    match h.next_frames(&mut b_room).await.as_slice() {
        [OutboundFrame::Message { message }] => {
            assert_eq!(message.content, "hi");
            assert_eq!(message.sender_name, "alice");
            assert!(!message.is_read);
        }
        other => panic!("unexpected frames {other:?}"),
    }

    let rooms = room_list(h.next_frames(&mut b_sidebar).await);
    assert_eq!(rooms[0].unread_count, 1);
    assert_eq!(
        rooms[0].last_message.as_ref().map(|m| m.content.as_str()),
        Some("hi")
    );

    let _reopened = h.connect(&b, SessionKind::Room(room.id)).await;
    let rooms = room_list(h.next_frames(&mut b_sidebar).await);
    assert_eq!(rooms[0].unread_count, 0);
}

#[tokio::test]
async fn concurrent_sends_observed_in_created_at_order() {
    let h = Harness::new();
    let a = h.user("alice");
    let b = h.user("bob");
    let room = h.direct_room(&a, &b).await;
    let mut observer = h.connect(&b, SessionKind::Room(room.id)).await;

    let tasks: Vec<_> = (0..40)
        .map(|i| {
            let engine = h.engine.clone();
            let sender: Identity = if i % 2 == 0 { a.identity() } else { b.identity() };
            let room_id = room.id;
            tokio::spawn(async move {
                engine
                    .rooms
                    .send_message(&sender, room_id, &format!("m{i}"))
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let mut seen = Vec::new();
    for _ in 0..40 {
        match h.next_frames(&mut observer).await.as_slice() {
            [OutboundFrame::Message { message }] => seen.push(message.clone()),
            other => panic!("unexpected frames {other:?}"),
        }
    }

    assert!(seen.windows(2).all(|w| w[0].created_at < w[1].created_at));
    let stored: Vec<_> = h
        .store
        .recent_messages(room.id, 100)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.id)
        .collect();
    let observed: Vec<_> = seen.iter().map(|m| m.id).collect();
    assert_eq!(stored, observed);
}

#[tokio::test]
async fn content_is_escaped_and_bounded() {
    let h = Harness::new();
    let a = h.user("alice");
    let b = h.user("bob");
    let room = h.direct_room(&a, &b).await;
    let a_room = h.connect(&a, SessionKind::Room(room.id)).await;
    let mut b_room = h.connect(&b, SessionKind::Room(room.id)).await;

    h.engine
        .handle_frame(&a_room.session, &message_frame("<script>x</script>"))
        .await;
    match h.next_frames(&mut b_room).await.as_slice() {
        [OutboundFrame::Message { message }] => {
            assert_eq!(message.content, "&lt;script&gt;x&lt;/script&gt;");
        }
        other => panic!("unexpected frames {other:?}"),
    }

    let replies = h
        .engine
        .handle_frame(&a_room.session, &message_frame(&"a".repeat(1001)))
        .await;
    assert!(matches!(replies.as_slice(), [OutboundFrame::Error { .. }]));

    let replies = h.engine.handle_frame(&a_room.session, &message_frame("   ")).await;
    assert!(matches!(replies.as_slice(), [OutboundFrame::Error { .. }]));

    assert_eq!(h.store.message_count(room.id), 1);
    assert!(b_room.events.try_recv().is_err());
    assert_eq!(a_room.session.state().await, SessionState::Active);
}

#[tokio::test]
async fn malformed_frame_keeps_session_open() {
    let h = Harness::new();
    let a = h.user("alice");
    let b = h.user("bob");
    let room = h.direct_room(&a, &b).await;
    let a_room = h.connect(&a, SessionKind::Room(room.id)).await;

    let replies = h.engine.handle_frame(&a_room.session, "{not json").await;
    assert_eq!(replies, vec![OutboundFrame::error("Invalid message format")]);
    assert_eq!(a_room.session.state().await, SessionState::Active);
}

#[tokio::test]
async fn online_announced_once_per_session_offline_every_disconnect() {
    let h = Harness::new();
    let a = h.user("alice");
    let b = h.user("bob");
    h.store.add_friendship(a.id, b.id, FriendshipStatus::Accepted);

    let mut b_status = h.connect(&b, SessionKind::Status).await;
    let first = h.connect(&a, SessionKind::Status).await;
    let second = h.connect(&a, SessionKind::Status).await;

    h.engine.handle_frame(&first.session, r#"{"message":"online"}"#).await;
    h.engine.handle_frame(&first.session, r#"{"message":"online"}"#).await;

    match h.next_frames(&mut b_status).await.as_slice() {
        [OutboundFrame::StatusUpdate(update)] => {
            assert_eq!(update.user_id, a.id);
            assert!(update.is_online);
        }
        other => panic!("unexpected frames {other:?}"),
    }
    assert!(b_status.events.try_recv().is_err());

    h.engine.disconnect(&first.session).await;
    h.engine.disconnect(&second.session).await;
    h.engine.disconnect(&first.session).await;

    for _ in 0..2 {
        match h.next_frames(&mut b_status).await.as_slice() {
            [OutboundFrame::StatusUpdate(update)] => {
                assert_eq!(update.user_id, a.id);
                assert!(!update.is_online);
            }
            other => panic!("unexpected frames {other:?}"),
        }
    }
    assert!(b_status.events.try_recv().is_err());

    let stored = h.store.get_user(a.id).await.unwrap().unwrap();
    assert!(!stored.is_online);
}

#[tokio::test]
async fn offline_reaches_every_presence_subscriber() {
    let h = Harness::new();
    let a = h.user("alice");
    let b = h.user("bob");
    let c = h.user("carol");
    h.store.add_friendship(a.id, b.id, FriendshipStatus::Accepted);
    h.store.add_friendship(c.id, a.id, FriendshipStatus::Accepted);
    let room = h.direct_room(&a, &c).await;

    let a_status = h.connect(&a, SessionKind::Status).await;
    let mut b_status = h.connect(&b, SessionKind::Status).await;
    let mut c_status = h.connect(&c, SessionKind::Status).await;
    let mut c_sidebar = h.connect(&c, SessionKind::Sidebar).await;

    h.engine.disconnect(&a_status.session).await;

    for live in [&mut b_status, &mut c_status] {
        match h.next_frames(live).await.as_slice() {
            [OutboundFrame::StatusUpdate(update)] => {
                assert_eq!(update.user_id, a.id);
                assert!(!update.is_online);
            }
            other => panic!("unexpected frames {other:?}"),
        }
    }

    let rooms = room_list(h.next_frames(&mut c_sidebar).await);
    assert_eq!(rooms[0].id, room.id);
    assert!(!rooms[0].other_participant.is_online);
}

#[tokio::test]
async fn pending_friendships_do_not_subscribe() {
    let h = Harness::new();
    let a = h.user("alice");
    let b = h.user("bob");
    h.store.add_friendship(a.id, b.id, FriendshipStatus::Pending);

    let b_status = h.connect(&b, SessionKind::Status).await;
    assert_eq!(
        b_status.session.memberships().await,
        vec![GroupName::Presence(b.id)]
    );
}

#[tokio::test]
async fn closed_sessions_leave_no_memberships() {
    let h = Harness::new();
    let a = h.user("alice");
    let b = h.user("bob");
    h.store.add_friendship(a.id, b.id, FriendshipStatus::Accepted);
    let room = h.direct_room(&a, &b).await;

    let sessions = vec![
        h.connect(&a, SessionKind::Room(room.id)).await,
        h.connect(&a, SessionKind::Sidebar).await,
        h.connect(&a, SessionKind::Status).await,
    ];
    assert!(h.engine.fabric.group_count() > 0);

    for live in &sessions {
        h.engine.disconnect(&live.session).await;
        assert!(h.engine.fabric.memberships(live.session.id()).is_empty());
        assert_eq!(live.session.state().await, SessionState::Closed);
    }
    assert_eq!(h.engine.fabric.group_count(), 0);
    assert_eq!(h.engine.fabric.connection_count(), 0);
    assert_eq!(h.engine.sessions.count(), 0);
}

#[tokio::test]
async fn rejected_connections_join_nothing() {
    let h = Harness::new();
    let a = h.user("alice");
    let b = h.user("bob");
    let eve = h.user("eve");
    let room = h.direct_room(&a, &b).await;

    let err = h
        .engine
        .connect(Some("garbage"), SessionKind::Status)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Authentication);

    let err = h.engine.connect(None, SessionKind::Sidebar).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Authentication);

    let token = h.token(&eve);
    let err = h
        .engine
        .connect(Some(&token), SessionKind::Room(room.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);

    let err = h
        .engine
        .connect(Some(&token), SessionKind::Room(RoomId::new()))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    assert!(err.is_fatal_for_session());
    assert_eq!(h.engine.fabric.group_count(), 0);
    assert_eq!(h.engine.sessions.count(), 0);
    assert_eq!(h.engine.fabric.connection_count(), 0);
}

#[tokio::test]
async fn profile_change_refreshes_room_and_sidebar() {
    let h = Harness::new();
    let a = h.user("alice");
    let b = h.user("bob");
    let room = h.direct_room(&a, &b).await;

    let a_room = h.connect(&a, SessionKind::Room(room.id)).await;
    let mut b_room = h.connect(&b, SessionKind::Room(room.id)).await;
    let mut b_sidebar = h.connect(&b, SessionKind::Sidebar).await;

    h.store
        .set_avatar(a.id, Some("/media/alice.png".to_string()))
        .unwrap();
    h.engine
        .handle_frame(&a_room.session, r#"{"type":"profile_image_updated"}"#)
        .await;

    match h.next_frames(&mut b_room).await.as_slice() {
        [OutboundFrame::ParticipantsInfo { participants }] => {
            let alice = participants.iter().find(|p| p.id == a.id).unwrap();
            assert_eq!(alice.image, "/media/alice.png");
        }
        other => panic!("unexpected frames {other:?}"),
    }

    let rooms = room_list(h.next_frames(&mut b_sidebar).await);
    assert_eq!(rooms[0].other_participant.image, "/media/alice.png");
}

#[tokio::test]
async fn dead_subscriber_does_not_block_others() {
    let h = Harness::new();
    let a = h.user("alice");
    let b = h.user("bob");
    let room = h.direct_room(&a, &b).await;

    let a_room = h.connect(&a, SessionKind::Room(room.id)).await;
    let dead = h.connect(&b, SessionKind::Room(room.id)).await;
    let mut alive = h.connect(&b, SessionKind::Room(room.id)).await;
    drop(dead.events);

    h.engine.handle_frame(&a_room.session, &message_frame("still here")).await;

    match h.next_frames(&mut alive).await.as_slice() {
        [OutboundFrame::Message { message }] => assert_eq!(message.content, "still here"),
        other => panic!("unexpected frames {other:?}"),
    }
    assert!(h.engine.metrics.snapshot().delivery_failures >= 1);
}

#[tokio::test]
async fn shutdown_closes_everything() {
    let h = Harness::new();
    let a = h.user("alice");
    let b = h.user("bob");
    h.store.add_friendship(a.id, b.id, FriendshipStatus::Accepted);

    let a_status = h.connect(&a, SessionKind::Status).await;
    let token = a_status.session.cancel_token();
    let _b_status = h.connect(&b, SessionKind::Status).await;

    h.engine.shutdown().await;

    assert!(token.is_cancelled());
    assert_eq!(h.engine.sessions.count(), 0);
    assert_eq!(h.engine.fabric.group_count(), 0);

    let err = h
        .engine
        .connect(Some(&h.token(&a)), SessionKind::Status)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Internal);
}

/// Store wrapper with switchable faults.
#[derive(Debug)]
struct FaultyStore {
    inner: Arc<MemoryStore>,
    fail_messages: AtomicBool,
    fail_presence: AtomicBool,
    slow_mark_read: AtomicBool,
    hide_rooms: AtomicBool,
}

impl FaultyStore {
    fn new(inner: Arc<MemoryStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fail_messages: AtomicBool::new(false),
            fail_presence: AtomicBool::new(false),
            slow_mark_read: AtomicBool::new(false),
            hide_rooms: AtomicBool::new(false),
        })
    }

    fn harness(self: &Arc<Self>) -> Harness {
        Harness::with_store(self.inner.clone(), self.clone())
    }
}

#[async_trait]
impl Store for FaultyStore {
    async fn get_user(&self, id: UserId) -> AppResult<Option<User>> {
        self.inner.get_user(id).await
    }
    async fn set_online(&self, id: UserId, online: bool) -> AppResult<()> {
        if self.fail_presence.load(Ordering::SeqCst) {
            return Err(AppError::persistence("presence store down"));
        }
        self.inner.set_online(id, online).await
    }
    async fn accepted_friends(&self, id: UserId) -> AppResult<Vec<UserId>> {
        self.inner.accepted_friends(id).await
    }
    async fn get_room(&self, id: RoomId) -> AppResult<Option<Room>> {
        if self.hide_rooms.load(Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.get_room(id).await
    }
    async fn find_direct_room(&self, a: UserId, b: UserId) -> AppResult<Option<Room>> {
        self.inner.find_direct_room(a, b).await
    }
    async fn create_room(&self, room_type: RoomType, participants: &[UserId]) -> AppResult<Room> {
        self.inner.create_room(room_type, participants).await
    }
    async fn add_participant(&self, room_id: RoomId, user: UserId) -> AppResult<()> {
        self.inner.add_participant(room_id, user).await
    }
    async fn create_message(&self, room_id: RoomId, sender: &Identity, content: &str) -> AppResult<Message> {
        if self.fail_messages.load(Ordering::SeqCst) {
            return Err(AppError::internal("disk full"));
        }
        self.inner.create_message(room_id, sender, content).await
    }
    async fn mark_read(&self, room_id: RoomId, reader: UserId) -> AppResult<u64> {
        if self.slow_mark_read.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        self.inner.mark_read(room_id, reader).await
    }
    async fn rooms_for_user(&self, user: UserId, room_type: RoomType) -> AppResult<Vec<Room>> {
        self.inner.rooms_for_user(user, room_type).await
    }
    async fn last_message(&self, room_id: RoomId) -> AppResult<Option<Message>> {
        self.inner.last_message(room_id).await
    }
    async fn unread_count(&self, room_id: RoomId, reader: UserId) -> AppResult<u64> {
        self.inner.unread_count(room_id, reader).await
    }
    async fn recent_messages(&self, room_id: RoomId, limit: usize) -> AppResult<Vec<Message>> {
        self.inner.recent_messages(room_id, limit).await
    }
}

#[tokio::test]
async fn persistence_failure_errors_sender_only() {
    let store = FaultyStore::new(Arc::new(MemoryStore::new()));
    store.fail_messages.store(true, Ordering::SeqCst);
    let h = store.harness();
    let a = h.user("alice");
    let b = h.user("bob");
    let room = h.direct_room(&a, &b).await;

    let a_room = h.connect(&a, SessionKind::Room(room.id)).await;
    let mut b_room = h.connect(&b, SessionKind::Room(room.id)).await;
    let mut b_sidebar = h.connect(&b, SessionKind::Sidebar).await;

    let replies = h.engine.handle_frame(&a_room.session, &message_frame("hi")).await;
    match replies.as_slice() {
        [OutboundFrame::Error { message }] => assert!(message.contains("disk full")),
        other => panic!("unexpected frames {other:?}"),
    }

    tokio::task::yield_now().await;
    assert!(b_room.events.try_recv().is_err());
    assert!(b_sidebar.events.try_recv().is_err());
    assert_eq!(a_room.session.state().await, SessionState::Active);
    assert_eq!(h.engine.metrics.snapshot().messages_persisted, 0);
}

#[tokio::test]
async fn room_list_changed_reaches_sender_sidebar() {
    let h = Harness::new();
    let a = h.user("alice");
    let b = h.user("bob");
    let room = h.direct_room(&a, &b).await;

    let mut a_sidebar = h.connect(&a, SessionKind::Sidebar).await;
    let a_room = h.connect(&a, SessionKind::Room(room.id)).await;
    h.engine.handle_frame(&a_room.session, &message_frame("mine")).await;

    let event = a_sidebar.events.recv().await;
    assert_eq!(event, Some(GroupEvent::RoomListChanged));
}

#[tokio::test]
async fn abandoned_connect_leaves_nothing_behind() {
    let store = FaultyStore::new(Arc::new(MemoryStore::new()));
    let h = store.harness();
    let a = h.user("alice");
    let b = h.user("bob");
    let room = h.direct_room(&a, &b).await;
    store.slow_mark_read.store(true, Ordering::SeqCst);

    let token = h.token(&a);
    let attempt = tokio::time::timeout(
        Duration::from_millis(200),
        h.engine.connect(Some(&token), SessionKind::Room(room.id)),
    )
    .await;
    assert!(attempt.is_err());

    let engine = h.engine.clone();
    tokio::time::timeout(Duration::from_secs(2), async move {
        while engine.sessions.count() != 0
            || engine.fabric.group_count() != 0
            || engine.fabric.connection_count() != 0
        {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("abandoned session was not torn down");

    assert_eq!(h.engine.fabric.subscriber_count(GroupName::Room(room.id)), 0);
    assert_eq!(h.engine.metrics.snapshot().connections_active, 0);
}

#[tokio::test]
async fn failed_presence_write_keeps_user_offline() {
    let store = FaultyStore::new(Arc::new(MemoryStore::new()));
    let h = store.harness();
    let a = h.user("alice");
    let b = h.user("bob");
    h.store.add_friendship(a.id, b.id, FriendshipStatus::Accepted);
    h.direct_room(&a, &b).await;

    let mut b_status = h.connect(&b, SessionKind::Status).await;
    let a_status = h.connect(&a, SessionKind::Status).await;
    store.fail_presence.store(true, Ordering::SeqCst);

    let replies = h.engine.handle_frame(&a_status.session, "{}").await;
    match replies.as_slice() {
        [OutboundFrame::Error { message }] => assert!(message.contains("presence store down")),
        other => panic!("unexpected frames {other:?}"),
    }
    assert_eq!(a_status.session.state().await, SessionState::Active);

    let tracker = h.engine.presence.tracker();
    assert_eq!(tracker.cached(a.id), None);
    assert_eq!(tracker.online_count(), 0);
    let rooms = h.engine.sidebar.build_room_list(&b.identity()).await.unwrap();
    assert!(!rooms[0].other_participant.is_online);
    assert!(b_status.events.try_recv().is_err());

    store.fail_presence.store(false, Ordering::SeqCst);
    assert!(h.engine.handle_frame(&a_status.session, "{}").await.is_empty());
    assert_eq!(tracker.cached(a.id), Some(true));
    match h.next_frames(&mut b_status).await.as_slice() {
        [OutboundFrame::StatusUpdate(update)] => assert!(update.is_online),
        other => panic!("unexpected frames {other:?}"),
    }
}

#[tokio::test]
async fn vanished_room_closes_session_with_error() {
    let store = FaultyStore::new(Arc::new(MemoryStore::new()));
    let h = store.harness();
    let a = h.user("alice");
    let b = h.user("bob");
    let room = h.direct_room(&a, &b).await;

    let a_room = h.connect(&a, SessionKind::Room(room.id)).await;
    let cancel = a_room.session.cancel_token();
    store.hide_rooms.store(true, Ordering::SeqCst);

    let replies = h.engine.handle_frame(&a_room.session, &message_frame("hi")).await;
    match replies.as_slice() {
        [OutboundFrame::Error { message }] => assert!(message.contains("not found")),
        other => panic!("unexpected frames {other:?}"),
    }

    assert_eq!(a_room.session.state().await, SessionState::Closed);
    assert!(cancel.is_cancelled());
    assert!(h.engine.fabric.memberships(a_room.session.id()).is_empty());
    assert_eq!(h.engine.sessions.count(), 0);
    assert_eq!(h.store.message_count(room.id), 0);
}
