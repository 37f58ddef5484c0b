//! Single group with subscriber tracking.

use std::collections::HashSet;

use parley_core::types::ConnectionId;

/// Set of connections joined to one group.
#[derive(Debug, Clone, Default)]
pub struct Group {
    subscribers: HashSet<ConnectionId>,
}

impl Group {
    /// Adds a subscriber. Returns `false` if it was already present.
    pub fn subscribe(&mut self, conn_id: ConnectionId) -> bool {
        self.subscribers.insert(conn_id)
    }

    /// Removes a subscriber. Returns `false` if it was absent.
    pub fn unsubscribe(&mut self, conn_id: ConnectionId) -> bool {
        self.subscribers.remove(&conn_id)
    }

    /// Returns subscriber count.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Returns whether the group has any subscribers.
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Snapshot of subscriber IDs.
    pub fn subscribers(&self) -> Vec<ConnectionId> {
        self.subscribers.iter().copied().collect()
    }
}
