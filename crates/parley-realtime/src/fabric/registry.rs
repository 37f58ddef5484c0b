//! Group fabric: join, leave and publish over live connections.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use parley_core::types::ConnectionId;

use crate::connection::handle::ConnectionHandle;
use crate::connection::pool::ConnectionPool;
use crate::message::types::GroupEvent;
use crate::metrics::RealtimeMetrics;

use super::group::Group;
use super::name::GroupName;
use super::subscription::SubscriptionTracker;

/// Process-wide publish/subscribe substrate.
///
/// Groups exist only while they have members. Publishing snapshots the
/// member set at call time and queues the event on each member's handle
/// without waiting, so a slow or dead connection never holds up the rest.
#[derive(Debug)]
pub struct GroupFabric {
    /// Group name → members.
    groups: DashMap<GroupName, Group>,
    /// Reverse index.
    subscriptions: SubscriptionTracker,
    /// Delivery endpoints.
    connections: ConnectionPool,
    /// Metrics.
    metrics: Arc<RealtimeMetrics>,
}

impl GroupFabric {
    /// Creates an empty fabric.
    pub fn new(metrics: Arc<RealtimeMetrics>) -> Self {
        Self {
            groups: DashMap::new(),
            subscriptions: SubscriptionTracker::new(),
            connections: ConnectionPool::new(),
            metrics,
        }
    }

    /// Makes a connection reachable for delivery.
    pub fn attach(&self, handle: Arc<ConnectionHandle>) {
        self.connections.add(handle);
    }

    /// Removes a connection's delivery endpoint.
    ///
    /// Memberships are left to the owner, which knows what it joined.
    pub fn detach(&self, conn_id: ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.connections.remove(&conn_id)
    }

    /// Adds a connection to a group. Returns `false` if it was already in.
    pub fn join(&self, group: GroupName, conn_id: ConnectionId) -> bool {
        let added = self.groups.entry(group).or_default().subscribe(conn_id);

        if added {
            self.subscriptions.add(conn_id, group);
            self.metrics.group_joined();
            debug!(conn_id = %conn_id, group = %group, "Joined group");
        }
        added
    }

    /// Removes a connection from a group. Returns `false` if it was not in.
    pub fn leave(&self, group: GroupName, conn_id: ConnectionId) -> bool {
        let removed = self
            .groups
            .get_mut(&group)
            .map(|mut g| g.unsubscribe(conn_id))
            .unwrap_or(false);

        self.groups.remove_if(&group, |_, g| g.is_empty());

        if removed {
            self.subscriptions.remove(conn_id, &group);
            debug!(conn_id = %conn_id, group = %group, "Left group");
        }
        removed
    }

    /// Delivers an event to every connection in the group right now.
    ///
    /// Returns the number of connections the event was queued for.
    /// Per-connection failures are logged and counted, never returned.
    pub fn publish(&self, group: GroupName, event: GroupEvent) -> usize {
        self.metrics.event_published();

        let members = match self.groups.get(&group) {
            Some(g) => g.subscribers(),
            None => {
                debug!(group = %group, kind = event.kind(), "Publish to empty group");
                return 0;
            }
        };

        let mut delivered = 0;
        for conn_id in &members {
            let Some(handle) = self.connections.get(conn_id) else {
                self.metrics.delivery_failed();
                warn!(conn_id = %conn_id, group = %group, "Group member has no live handle");
                continue;
            };

            match handle.deliver(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    self.metrics.delivered();
                }
                Err(e) => {
                    self.metrics.delivery_failed();
                    warn!(
                        conn_id = %conn_id,
                        group = %group,
                        kind = event.kind(),
                        error = %e,
                        "Event delivery failed"
                    );
                }
            }
        }

        debug!(
            group = %group,
            kind = event.kind(),
            members = members.len(),
            delivered,
            "Published event"
        );
        delivered
    }

    /// Groups a connection is currently in.
    pub fn memberships(&self, conn_id: ConnectionId) -> Vec<GroupName> {
        let mut groups: Vec<GroupName> = self.subscriptions.groups(conn_id).into_iter().collect();
        groups.sort();
        groups
    }

    /// Number of connections in a group.
    pub fn subscriber_count(&self, group: GroupName) -> usize {
        self.groups
            .get(&group)
            .map(|g| g.subscriber_count())
            .unwrap_or(0)
    }

    /// Number of non-empty groups.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Number of attached connections.
    pub fn connection_count(&self) -> usize {
        self.connections.connection_count()
    }

    /// Number of distinct users with at least one attached connection.
    pub fn user_count(&self) -> usize {
        self.connections.user_count()
    }
}

#[cfg(test)]
mod tests {
    use parley_core::types::RoomId;
    use tokio::sync::mpsc;

    use super::*;

    fn fabric() -> GroupFabric {
        GroupFabric::new(Arc::new(RealtimeMetrics::new()))
    }

    fn connect(fabric: &GroupFabric, buffer: usize) -> (ConnectionId, mpsc::Receiver<GroupEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        let handle = Arc::new(ConnectionHandle::new(tx));
        let id = handle.id;
        fabric.attach(handle);
        (id, rx)
    }

    #[test]
    fn test_join_is_idempotent() {
        let fabric = fabric();
        let group = GroupName::Room(RoomId::new());
        let (conn, _rx) = connect(&fabric, 4);

        assert!(fabric.join(group, conn));
        assert!(!fabric.join(group, conn));
        assert_eq!(fabric.subscriber_count(group), 1);
        assert_eq!(fabric.memberships(conn), vec![group]);
    }

    #[test]
    fn test_leave_removes_fully() {
        let fabric = fabric();
        let group = GroupName::Room(RoomId::new());
        let (conn, _rx) = connect(&fabric, 4);

        fabric.join(group, conn);
        assert!(fabric.leave(group, conn));
        assert!(!fabric.leave(group, conn));
        assert_eq!(fabric.subscriber_count(group), 0);
        assert_eq!(fabric.group_count(), 0);
        assert!(fabric.memberships(conn).is_empty());
    }

    #[tokio::test]
    async fn test_publish_reaches_all_members() {
        let fabric = fabric();
        let group = GroupName::Room(RoomId::new());
        let (a, mut rx_a) = connect(&fabric, 4);
        let (b, mut rx_b) = connect(&fabric, 4);
        fabric.join(group, a);
        fabric.join(group, b);

        assert_eq!(fabric.publish(group, GroupEvent::RoomListChanged), 2);
        assert_eq!(rx_a.recv().await, Some(GroupEvent::RoomListChanged));
        assert_eq!(rx_b.recv().await, Some(GroupEvent::RoomListChanged));
    }

    #[tokio::test]
    async fn test_late_joiner_misses_past_publish() {
        let fabric = fabric();
        let group = GroupName::Room(RoomId::new());
        let (a, mut rx_a) = connect(&fabric, 4);

        fabric.publish(group, GroupEvent::RoomListChanged);
        fabric.join(group, a);
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failing_member_does_not_block_others() {
        let metrics = Arc::new(RealtimeMetrics::new());
        let fabric = GroupFabric::new(metrics.clone());
        let group = GroupName::Room(RoomId::new());

        let (dead, dead_rx) = connect(&fabric, 4);
        let (full, _full_rx) = connect(&fabric, 1);
        let (ok, mut ok_rx) = connect(&fabric, 4);
        drop(dead_rx);
        for conn in [dead, full, ok] {
            fabric.join(group, conn);
        }

        fabric.publish(group, GroupEvent::RoomListChanged);
        let delivered = fabric.publish(group, GroupEvent::RoomListChanged);

        assert_eq!(delivered, 1);
        assert_eq!(ok_rx.recv().await, Some(GroupEvent::RoomListChanged));
        assert_eq!(ok_rx.recv().await, Some(GroupEvent::RoomListChanged));
        assert!(metrics.snapshot().delivery_failures >= 3);
    }

    #[test]
    fn test_concurrent_joins_not_lost() {
        let fabric = Arc::new(fabric());
        let group = GroupName::Room(RoomId::new());

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let fabric = fabric.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        fabric.join(group, ConnectionId::new());
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(fabric.subscriber_count(group), 400);
    }
}
