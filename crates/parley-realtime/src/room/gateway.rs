//! Room gateway: membership checks, message persistence and fanout.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use parley_core::config::RealtimeConfig;
use parley_core::error::AppError;
use parley_core::result::AppResult;
use parley_core::types::{RoomId, UserId};
use parley_entity::{Identity, MessageView, PublicProfile, Room, RoomType};
use parley_store::Store;

use crate::connection::session::Session;
use crate::fabric::{GroupFabric, GroupName};
use crate::message::types::GroupEvent;
use crate::message::validator::sanitize_content;
use crate::metrics::RealtimeMetrics;
use crate::presence::tracker::PresenceTracker;

/// Entry point for everything that happens inside a direct room.
#[derive(Debug)]
pub struct RoomGateway {
    store: Arc<dyn Store>,
    fabric: Arc<GroupFabric>,
    tracker: Arc<PresenceTracker>,
    metrics: Arc<RealtimeMetrics>,
    config: RealtimeConfig,
    /// Room ID → ordering lock held across persist and room fanout.
    send_locks: DashMap<RoomId, Arc<Mutex<()>>>,
    /// Serializes direct-room creation so a pair never gets two rooms.
    create_lock: Mutex<()>,
}

impl RoomGateway {
    /// Creates a new gateway.
    pub fn new(
        store: Arc<dyn Store>,
        fabric: Arc<GroupFabric>,
        tracker: Arc<PresenceTracker>,
        metrics: Arc<RealtimeMetrics>,
        config: RealtimeConfig,
    ) -> Self {
        Self {
            store,
            fabric,
            tracker,
            metrics,
            config,
            send_locks: DashMap::new(),
            create_lock: Mutex::new(()),
        }
    }

    /// Loads a direct room the identity participates in.
    pub async fn authorize(&self, identity: &Identity, room_id: RoomId) -> AppResult<Room> {
        let room = self
            .store
            .get_room(room_id)
            .await?
            .filter(Room::is_direct)
            .ok_or_else(|| AppError::not_found(format!("Room {room_id} not found")))?;

        if !room.has_participant(identity.id) {
            return Err(AppError::forbidden(format!(
                "User {} is not a participant of room {room_id}",
                identity.id
            )));
        }
        Ok(room)
    }

    /// Validates access and joins `room:{room_id}`.
    pub async fn open_room_session(&self, session: &Session, room_id: RoomId) -> AppResult<Room> {
        let room = self.authorize(session.identity()?, room_id).await?;
        session.join(GroupName::Room(room_id)).await?;
        debug!(conn_id = %session.id(), room_id = %room_id, "Room session subscribed");
        Ok(room)
    }

    /// Validates, persists and fans out a chat message.
    ///
    /// Order: persist, then `room:{id}`, then every participant's sidebar.
    /// Nothing is published if validation or persistence fails.
    pub async fn send_message(
        &self,
        identity: &Identity,
        room_id: RoomId,
        raw_content: &str,
    ) -> AppResult<MessageView> {
        let content = sanitize_content(raw_content, self.config.max_message_chars)?;
        let room = self.authorize(identity, room_id).await?;

        let lock = self
            .send_locks
            .entry(room_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let view = {
            let _ordered = lock.lock().await;

            let message = self
                .store
                .create_message(room_id, identity, &content)
                .await
                .map_err(|e| {
                    error!(room_id = %room_id, user_id = %identity.id, error = %e, "Failed to persist message");
                    AppError::persistence(format!("Failed to save message: {}", e.message))
                })?;
            self.metrics.message_persisted();

            let view = message.view();
            self.fabric
                .publish(GroupName::Room(room_id), GroupEvent::ChatMessage(view.clone()));
            view
        };

        for participant in &room.participants {
            self.fabric
                .publish(GroupName::Sidebar(*participant), GroupEvent::RoomListChanged);
        }

        info!(room_id = %room_id, message_id = %view.id, sender = %identity.id, "Message sent");
        Ok(view)
    }

    /// Marks every message from others as read for `reader`.
    ///
    /// Refreshes the reader's sidebar when anything changed.
    pub async fn mark_room_read(&self, reader: &Identity, room_id: RoomId) -> AppResult<u64> {
        let changed = self
            .store
            .mark_read(room_id, reader.id)
            .await
            .map_err(|e| AppError::persistence(format!("Failed to mark messages read: {}", e.message)))?;

        if changed > 0 {
            self.fabric
                .publish(GroupName::Sidebar(reader.id), GroupEvent::RoomListChanged);
            debug!(room_id = %room_id, user_id = %reader.id, changed, "Messages marked read");
        }
        Ok(changed)
    }

    /// Tells the room and the other participants' sidebars that the
    /// identity's avatar changed.
    pub async fn handle_profile_image_changed(
        &self,
        identity: &Identity,
        room_id: RoomId,
    ) -> AppResult<()> {
        let room = self.authorize(identity, room_id).await?;
        let event = GroupEvent::ProfileImageChanged {
            user_id: identity.id,
        };

        self.fabric.publish(GroupName::Room(room_id), event.clone());
        for other in room.others(identity.id) {
            self.fabric.publish(GroupName::Sidebar(other), event.clone());
        }
        Ok(())
    }

    /// Public profiles of every participant, with the presence overlay.
    pub async fn participants(&self, room: &Room) -> AppResult<Vec<PublicProfile>> {
        let mut profiles = Vec::with_capacity(room.participants.len());
        for id in &room.participants {
            if let Some(user) = self.store.get_user(*id).await? {
                profiles.push(
                    user.public_profile(self.tracker.is_online(&user), &self.config.default_avatar_url),
                );
            }
        }
        Ok(profiles)
    }

    /// Finds or creates the direct room between `identity` and `other`.
    ///
    /// Returns the room and whether it was created by this call.
    pub async fn create_direct_room(&self, identity: &Identity, other: UserId) -> AppResult<(Room, bool)> {
        if other == identity.id {
            return Err(AppError::validation("Cannot start a chat with yourself"));
        }
        if self.store.get_user(other).await?.is_none() {
            return Err(AppError::not_found(format!("User {other} not found")));
        }

        let _guard = self.create_lock.lock().await;

        if let Some(room) = self.store.find_direct_room(identity.id, other).await? {
            return Ok((room, false));
        }

        let room = self
            .store
            .create_room(RoomType::Direct, &[identity.id, other])
            .await?;

        for user in [identity.id, other] {
            self.fabric
                .publish(GroupName::Sidebar(user), GroupEvent::RoomListChanged);
        }

        info!(room_id = %room.id, a = %identity.id, b = %other, "Direct room created");
        Ok((room, true))
    }
}
