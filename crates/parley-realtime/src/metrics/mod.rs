//! Realtime engine metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Engine-level counters.
#[derive(Debug, Default)]
pub struct RealtimeMetrics {
    connections_opened: AtomicU64,
    connections_closed: AtomicU64,
    groups_joined: AtomicU64,
    events_published: AtomicU64,
    deliveries: AtomicU64,
    delivery_failures: AtomicU64,
    messages_persisted: AtomicU64,
}

impl RealtimeMetrics {
    /// Create zeroed metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// A session was opened.
    pub fn connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// A session finished teardown.
    pub fn connection_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// A connection joined a group it was not already in.
    pub fn group_joined(&self) {
        self.groups_joined.fetch_add(1, Ordering::Relaxed);
    }

    /// One publish call, regardless of subscriber count.
    pub fn event_published(&self) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
    }

    /// An event was queued for one connection.
    pub fn delivered(&self) {
        self.deliveries.fetch_add(1, Ordering::Relaxed);
    }

    /// An event could not be queued for one connection.
    pub fn delivery_failed(&self) {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A chat message was written to the store.
    pub fn message_persisted(&self) {
        self.messages_persisted.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let opened = self.connections_opened.load(Ordering::Relaxed);
        let closed = self.connections_closed.load(Ordering::Relaxed);
        MetricsSnapshot {
            connections_opened: opened,
            connections_closed: closed,
            connections_active: opened.saturating_sub(closed),
            groups_joined: self.groups_joined.load(Ordering::Relaxed),
            events_published: self.events_published.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            messages_persisted: self.messages_persisted.load(Ordering::Relaxed),
        }
    }
}

/// Serializable metrics snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Sessions ever opened.
    pub connections_opened: u64,
    /// Sessions torn down.
    pub connections_closed: u64,
    /// Sessions currently open.
    pub connections_active: u64,
    /// Successful group joins.
    pub groups_joined: u64,
    /// Publish calls.
    pub events_published: u64,
    /// Per-connection deliveries.
    pub deliveries: u64,
    /// Per-connection delivery failures.
    pub delivery_failures: u64,
    /// Chat messages persisted.
    pub messages_persisted: u64,
}
