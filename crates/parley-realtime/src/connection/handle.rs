//! Delivery endpoint of a single socket.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use parley_core::error::AppError;
use parley_core::result::AppResult;
use parley_core::types::ConnectionId;
use parley_entity::Identity;

use crate::message::types::GroupEvent;

/// A handle to a single connection's outbound event queue.
///
/// The group fabric only ever talks to connections through this handle.
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Unique connection ID
    pub id: ConnectionId,
    /// Authenticated principal, set once
    identity: OnceLock<Identity>,
    /// Sender for group events
    sender: mpsc::Sender<GroupEvent>,
    /// When the socket was opened
    pub connected_at: DateTime<Utc>,
    /// Whether the connection is still alive
    alive: AtomicBool,
    /// Cancelled when the connection is closed
    cancel: CancellationToken,
}

impl ConnectionHandle {
    /// Create a new handle around an event sender
    pub fn new(sender: mpsc::Sender<GroupEvent>) -> Self {
        Self {
            id: ConnectionId::new(),
            identity: OnceLock::new(),
            sender,
            connected_at: Utc::now(),
            alive: AtomicBool::new(true),
            cancel: CancellationToken::new(),
        }
    }

    /// The authenticated identity, if any.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.get()
    }

    /// Attach the identity. Fails if one is already set.
    pub fn set_identity(&self, identity: Identity) -> AppResult<()> {
        self.identity
            .set(identity)
            .map_err(|_| AppError::conflict(format!("Connection {} already authenticated", self.id)))
    }

    /// Queue an event without waiting.
    ///
    /// A full queue drops the event for this connection only.
    pub fn deliver(&self, event: GroupEvent) -> AppResult<()> {
        if !self.is_alive() {
            return Err(AppError::delivery(format!("Connection {} is closed", self.id)));
        }
        match self.sender.try_send(event) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(AppError::delivery(format!(
                "Connection {} send buffer full",
                self.id
            ))),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.mark_dead();
                Err(AppError::delivery(format!(
                    "Connection {} receiver dropped",
                    self.id
                )))
            }
        }
    }

    /// Check if connection is alive
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Mark connection as dead
    pub fn mark_dead(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    /// Token cancelled when the connection closes.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Mark dead and wake everything waiting on this connection.
    pub fn close(&self) {
        self.mark_dead();
        self.cancel.cancel();
    }
}
