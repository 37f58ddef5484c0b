//! Presence hub: status sessions and online/offline announcements.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use parley_core::result::AppResult;
use parley_entity::Identity;
use parley_store::Store;

use crate::connection::session::Session;
use crate::fabric::{GroupFabric, GroupName};
use crate::message::types::{GroupEvent, StatusUpdate};

use super::tracker::PresenceTracker;

/// Fans out presence transitions to `presence:{user}` groups.
#[derive(Debug)]
pub struct PresenceHub {
    store: Arc<dyn Store>,
    fabric: Arc<GroupFabric>,
    tracker: Arc<PresenceTracker>,
}

impl PresenceHub {
    /// Creates a new presence hub.
    pub fn new(
        store: Arc<dyn Store>,
        fabric: Arc<GroupFabric>,
        tracker: Arc<PresenceTracker>,
    ) -> Self {
        Self {
            store,
            fabric,
            tracker,
        }
    }

    /// Shared presence cache.
    pub fn tracker(&self) -> &Arc<PresenceTracker> {
        &self.tracker
    }

    /// Joins the caller's own presence group and each accepted friend's.
    ///
    /// Friends are read once here. Friendships formed later in the session
    /// are not picked up until the client reconnects.
    pub async fn open_status_session(&self, session: &Session) -> AppResult<usize> {
        let me = session.identity()?.id;
        let friends = self.store.accepted_friends(me).await?;

        session.join(GroupName::Presence(me)).await?;
        for friend in &friends {
            session.join(GroupName::Presence(*friend)).await?;
        }

        debug!(conn_id = %session.id(), user_id = %me, friends = friends.len(), "Status session subscribed");
        Ok(friends.len())
    }

    /// Announces the session's user as online, once per session.
    ///
    /// Returns `false` when this session already announced.
    pub async fn announce_online(&self, session: &Session) -> AppResult<bool> {
        let identity = session.identity()?;
        if !session.claim_online_announcement() {
            return Ok(false);
        }

        if let Err(e) = self.tracker.set(identity.id, true).await {
            session.release_online_announcement();
            return Err(e);
        }

        self.publish_status(identity, true);
        Ok(true)
    }

    /// Announces a user as offline. Every call publishes.
    pub async fn announce_offline(&self, identity: &Identity) -> AppResult<usize> {
        self.tracker.set(identity.id, false).await?;
        Ok(self.publish_status(identity, false))
    }

    fn publish_status(&self, identity: &Identity, is_online: bool) -> usize {
        let update = StatusUpdate {
            user_id: identity.id,
            username: identity.username.clone(),
            is_online,
            updated_at: Utc::now(),
        };
        let delivered = self.fabric.publish(
            GroupName::Presence(identity.id),
            GroupEvent::StatusChanged(update),
        );
        info!(user_id = %identity.id, is_online, delivered, "Presence announced");
        delivered
    }
}
