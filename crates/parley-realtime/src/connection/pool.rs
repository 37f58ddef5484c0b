//! Connection pool: live handles by connection and by user.

use std::sync::Arc;

use dashmap::DashMap;

use parley_core::types::{ConnectionId, UserId};

use super::handle::ConnectionHandle;

/// Thread-safe pool of live connection handles.
#[derive(Debug, Default)]
pub struct ConnectionPool {
    /// Connection ID → handle.
    by_id: DashMap<ConnectionId, Arc<ConnectionHandle>>,
    /// User ID → connection IDs (one user can have several sockets).
    by_user: DashMap<UserId, Vec<ConnectionId>>,
}

impl ConnectionPool {
    /// Creates a new empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handle. Authenticated handles are also indexed by user.
    pub fn add(&self, handle: Arc<ConnectionHandle>) {
        if let Some(identity) = handle.identity() {
            let mut ids = self.by_user.entry(identity.id).or_default();
            if !ids.contains(&handle.id) {
                ids.push(handle.id);
            }
        }
        self.by_id.insert(handle.id, handle);
    }

    /// Removes a handle.
    pub fn remove(&self, conn_id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        let (_, handle) = self.by_id.remove(conn_id)?;
        if let Some(identity) = handle.identity() {
            if let Some(mut ids) = self.by_user.get_mut(&identity.id) {
                ids.retain(|id| id != conn_id);
            }
            self.by_user.remove_if(&identity.id, |_, ids| ids.is_empty());
        }
        Some(handle)
    }

    /// Gets a handle by connection ID.
    pub fn get(&self, conn_id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.by_id.get(conn_id).map(|entry| entry.value().clone())
    }

    /// Returns total number of live connections.
    pub fn connection_count(&self) -> usize {
        self.by_id.len()
    }

    /// Returns number of distinct connected users.
    pub fn user_count(&self) -> usize {
        self.by_user.len()
    }
}
