//! Presence tracker: cached online flags written through to the store.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::error;

use parley_core::result::AppResult;
use parley_core::types::UserId;
use parley_entity::User;
use parley_store::Store;

/// Online flags mutated only by session lifecycle events.
#[derive(Debug)]
pub struct PresenceTracker {
    /// User ID → last announced flag.
    online: DashMap<UserId, bool>,
    store: Arc<dyn Store>,
}

impl PresenceTracker {
    /// Create a new presence tracker
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            online: DashMap::new(),
            store,
        }
    }

    /// Persist a user's presence, then cache it.
    ///
    /// The cache only changes once the store accepted the write.
    pub async fn set(&self, user_id: UserId, online: bool) -> AppResult<()> {
        self.store
            .set_online(user_id, online)
            .await
            .inspect_err(|e| {
                error!(user_id = %user_id, online, error = %e, "Failed to persist presence");
            })?;
        self.online.insert(user_id, online);
        Ok(())
    }

    /// Cached flag, if this process has seen the user announce.
    pub fn cached(&self, user_id: UserId) -> Option<bool> {
        self.online.get(&user_id).map(|r| *r.value())
    }

    /// Cached flag, falling back to the stored one.
    pub fn is_online(&self, user: &User) -> bool {
        self.cached(user.id).unwrap_or(user.is_online)
    }

    /// Number of users currently flagged online.
    pub fn online_count(&self) -> usize {
        self.online.iter().filter(|r| *r.value()).count()
    }
}
