//! Per-socket session state machine.
//!
//! `Pending → Authenticated → Active → Closed`. Any state may jump straight
//! to `Closed`. Teardown leaves exactly the groups this session recorded
//! joining, and runs once no matter how many times `close` is called.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use parley_core::error::AppError;
use parley_core::result::AppResult;
use parley_core::types::{ConnectionId, RoomId};
use parley_entity::Identity;

use crate::fabric::{GroupFabric, GroupName};
use crate::metrics::RealtimeMetrics;

use super::handle::ConnectionHandle;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Socket opened, credential not yet verified.
    Pending,
    /// Credential and resource precheck passed; groups being joined.
    Authenticated,
    /// Joins done and transport accepted.
    Active,
    /// Torn down.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Authenticated => "authenticated",
            Self::Active => "active",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// What a session is connected to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// A chat room.
    Room(RoomId),
    /// The caller's own room list.
    Sidebar,
    /// The caller's friends' presence.
    Status,
}

/// One connected socket.
pub struct Session {
    handle: Arc<ConnectionHandle>,
    kind: SessionKind,
    state: RwLock<SessionState>,
    /// Groups joined through this session, in join order.
    memberships: Mutex<Vec<GroupName>>,
    fabric: Arc<GroupFabric>,
    metrics: Arc<RealtimeMetrics>,
    online_announced: AtomicBool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.handle.id)
            .field("kind", &self.kind)
            .finish()
    }
}

impl Session {
    /// Creates a pending session around a fresh handle.
    pub fn new(
        handle: Arc<ConnectionHandle>,
        kind: SessionKind,
        fabric: Arc<GroupFabric>,
        metrics: Arc<RealtimeMetrics>,
    ) -> Self {
        metrics.connection_opened();
        Self {
            handle,
            kind,
            state: RwLock::new(SessionState::Pending),
            memberships: Mutex::new(Vec::new()),
            fabric,
            metrics,
            online_announced: AtomicBool::new(false),
        }
    }

    /// Connection ID.
    pub fn id(&self) -> ConnectionId {
        self.handle.id
    }

    /// Session kind.
    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    /// Delivery handle.
    pub fn handle(&self) -> &Arc<ConnectionHandle> {
        &self.handle
    }

    /// Current state.
    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    /// Verified identity. Errors before authentication.
    pub fn identity(&self) -> AppResult<&Identity> {
        self.handle
            .identity()
            .ok_or_else(|| AppError::authentication("Session is not authenticated"))
    }

    /// `Pending → Authenticated`. Attaches the handle to the fabric.
    pub async fn authenticate(&self, identity: Identity) -> AppResult<()> {
        let mut state = self.state.write().await;
        if *state != SessionState::Pending {
            return Err(AppError::conflict(format!(
                "Cannot authenticate a {} session",
                *state
            )));
        }

        let user_id = identity.id;
        self.handle.set_identity(identity)?;
        self.fabric.attach(self.handle.clone());
        *state = SessionState::Authenticated;

        debug!(conn_id = %self.id(), user_id = %user_id, "Session authenticated");
        Ok(())
    }

    /// Joins a group and records it for teardown.
    ///
    /// Allowed while `Authenticated` or `Active`. Returns `false` when the
    /// session was already in the group.
    pub async fn join(&self, group: GroupName) -> AppResult<bool> {
        let state = self.state.read().await;
        if !matches!(*state, SessionState::Authenticated | SessionState::Active) {
            return Err(AppError::conflict(format!(
                "Cannot join {group} from a {} session",
                *state
            )));
        }

        let mut memberships = self.memberships.lock().await;
        if memberships.contains(&group) {
            return Ok(false);
        }
        self.fabric.join(group, self.id());
        memberships.push(group);
        Ok(true)
    }

    /// Leaves a group this session joined.
    pub async fn leave(&self, group: GroupName) -> bool {
        let _state = self.state.read().await;
        let mut memberships = self.memberships.lock().await;
        let before = memberships.len();
        memberships.retain(|g| *g != group);
        if memberships.len() == before {
            return false;
        }
        self.fabric.leave(group, self.id())
    }

    /// `Authenticated → Active`.
    pub async fn activate(&self) -> AppResult<()> {
        let mut state = self.state.write().await;
        if *state != SessionState::Authenticated {
            return Err(AppError::conflict(format!(
                "Cannot activate a {} session",
                *state
            )));
        }
        *state = SessionState::Active;

        info!(
            conn_id = %self.id(),
            user_id = ?self.handle.identity().map(|i| i.id),
            kind = ?self.kind,
            "Session active"
        );
        Ok(())
    }

    /// Tears the session down.
    ///
    /// Returns the state the session was in if this call performed the
    /// teardown, or `None` if it was already closed.
    pub async fn close(&self) -> Option<SessionState> {
        let mut state = self.state.write().await;
        if *state == SessionState::Closed {
            return None;
        }
        let previous = *state;
        *state = SessionState::Closed;

        let recorded = std::mem::take(&mut *self.memberships.lock().await);
        for group in &recorded {
            self.fabric.leave(*group, self.id());
        }
        let stray = self.fabric.memberships(self.id());
        if !stray.is_empty() {
            warn!(conn_id = %self.id(), groups = ?stray, "Connection still in unrecorded groups after teardown");
        }
        self.fabric.detach(self.id());
        self.handle.close();
        self.metrics.connection_closed();

        info!(
            conn_id = %self.id(),
            user_id = ?self.handle.identity().map(|i| i.id),
            from = %previous,
            groups_left = recorded.len(),
            "Session closed"
        );
        Some(previous)
    }

    /// Groups recorded by this session.
    pub async fn memberships(&self) -> Vec<GroupName> {
        self.memberships.lock().await.clone()
    }

    /// Cancelled when the session closes.
    pub fn cancel_token(&self) -> CancellationToken {
        self.handle.cancel_token()
    }

    /// Claims the one online announcement this session may make.
    pub fn claim_online_announcement(&self) -> bool {
        !self.online_announced.swap(true, Ordering::SeqCst)
    }

    /// Gives the claim back after a failed announcement.
    pub fn release_online_announcement(&self) {
        self.online_announced.store(false, Ordering::SeqCst);
    }
}
