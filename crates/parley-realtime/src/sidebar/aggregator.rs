//! Sidebar aggregator: ordered room list with unread counts and presence.

use std::sync::Arc;

use tracing::{debug, warn};

use parley_core::result::AppResult;
use parley_entity::{Identity, Room, RoomType};
use parley_store::Store;

use crate::connection::session::Session;
use crate::fabric::GroupName;
use crate::message::types::RoomSummary;
use crate::presence::tracker::PresenceTracker;

/// Builds the sidebar view for one user.
#[derive(Debug)]
pub struct SidebarAggregator {
    store: Arc<dyn Store>,
    tracker: Arc<PresenceTracker>,
    default_avatar: String,
}

impl SidebarAggregator {
    /// Creates a new aggregator.
    pub fn new(store: Arc<dyn Store>, tracker: Arc<PresenceTracker>, default_avatar: String) -> Self {
        Self {
            store,
            tracker,
            default_avatar,
        }
    }

    /// Joins `sidebar:{me}` and the presence group of every direct-room
    /// partner, as of now.
    pub async fn open_sidebar_session(&self, session: &Session) -> AppResult<()> {
        let me = session.identity()?.id;
        session.join(GroupName::Sidebar(me)).await?;

        let rooms = self.store.rooms_for_user(me, RoomType::Direct).await?;
        for room in &rooms {
            if let Some(partner) = room.other_participant(me) {
                session.join(GroupName::Presence(partner)).await?;
            }
        }

        debug!(conn_id = %session.id(), user_id = %me, rooms = rooms.len(), "Sidebar session subscribed");
        Ok(())
    }

    /// Direct rooms of `identity`, most recently active first.
    ///
    /// Read-only; safe to call as often as events arrive.
    pub async fn build_room_list(&self, identity: &Identity) -> AppResult<Vec<RoomSummary>> {
        let rooms = self
            .store
            .rooms_for_user(identity.id, RoomType::Direct)
            .await?;

        let mut summaries = Vec::with_capacity(rooms.len());
        for room in &rooms {
            if let Some(summary) = self.summarize(identity, room).await? {
                summaries.push(summary);
            }
        }
        Ok(summaries)
    }

    /// One sidebar entry. `None` when the partner no longer exists.
    pub async fn summarize(&self, identity: &Identity, room: &Room) -> AppResult<Option<RoomSummary>> {
        let Some(partner_id) = room.other_participant(identity.id) else {
            return Ok(None);
        };
        let Some(partner) = self.store.get_user(partner_id).await? else {
            warn!(room_id = %room.id, user_id = %partner_id, "Room partner missing from store");
            return Ok(None);
        };

        let last_message = self.store.last_message(room.id).await?.map(|m| m.view());
        let unread_count = self.store.unread_count(room.id, identity.id).await?;

        Ok(Some(RoomSummary {
            id: room.id,
            other_participant: partner
                .public_profile(self.tracker.is_online(&partner), &self.default_avatar),
            last_message,
            unread_count,
            updated_at: room.updated_at,
        }))
    }
}
