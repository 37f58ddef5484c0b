//! Session manager: creates sessions and tracks the live ones.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

use parley_core::config::RealtimeConfig;
use parley_core::types::ConnectionId;

use crate::fabric::GroupFabric;
use crate::message::types::GroupEvent;
use crate::metrics::RealtimeMetrics;

use super::handle::ConnectionHandle;
use super::session::{Session, SessionKind};

/// Registry of every session that has not finished teardown.
#[derive(Debug)]
pub struct SessionManager {
    /// Connection ID → session.
    sessions: DashMap<ConnectionId, Arc<Session>>,
    /// Fabric handed to every session.
    fabric: Arc<GroupFabric>,
    /// Metrics.
    metrics: Arc<RealtimeMetrics>,
    /// Configuration.
    config: RealtimeConfig,
}

impl SessionManager {
    /// Creates a new session manager.
    pub fn new(
        config: RealtimeConfig,
        fabric: Arc<GroupFabric>,
        metrics: Arc<RealtimeMetrics>,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            fabric,
            metrics,
            config,
        }
    }

    /// Opens a pending session.
    ///
    /// Returns the session and the receiver its group events arrive on.
    pub fn open(&self, kind: SessionKind) -> (Arc<Session>, mpsc::Receiver<GroupEvent>) {
        let (tx, rx) = mpsc::channel(self.config.channel_buffer_size);
        let handle = Arc::new(ConnectionHandle::new(tx));
        let session = Arc::new(Session::new(
            handle,
            kind,
            self.fabric.clone(),
            self.metrics.clone(),
        ));
        self.sessions.insert(session.id(), session.clone());
        debug!(conn_id = %session.id(), kind = ?kind, "Session opened");
        (session, rx)
    }

    /// Forgets a session. Does not close it.
    pub fn remove(&self, conn_id: &ConnectionId) -> Option<Arc<Session>> {
        self.sessions.remove(conn_id).map(|(_, s)| s)
    }

    /// All tracked sessions.
    pub fn all(&self) -> Vec<Arc<Session>> {
        self.sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Number of tracked sessions.
    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}
