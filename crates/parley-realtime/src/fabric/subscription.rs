//! Reverse index: which groups each connection is in.

use std::collections::HashSet;

use dashmap::DashMap;

use parley_core::types::ConnectionId;

use super::name::GroupName;

/// Connection → groups mapping.
#[derive(Debug, Default)]
pub struct SubscriptionTracker {
    conn_to_groups: DashMap<ConnectionId, HashSet<GroupName>>,
}

impl SubscriptionTracker {
    /// Creates a new tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a membership.
    pub fn add(&self, conn_id: ConnectionId, group: GroupName) {
        self.conn_to_groups.entry(conn_id).or_default().insert(group);
    }

    /// Removes a membership, dropping the entry once it is empty.
    pub fn remove(&self, conn_id: ConnectionId, group: &GroupName) {
        if let Some(mut groups) = self.conn_to_groups.get_mut(&conn_id) {
            groups.remove(group);
        }
        self.conn_to_groups
            .remove_if(&conn_id, |_, groups| groups.is_empty());
    }

    /// All groups a connection is in.
    pub fn groups(&self, conn_id: ConnectionId) -> HashSet<GroupName> {
        self.conn_to_groups
            .get(&conn_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }
}
