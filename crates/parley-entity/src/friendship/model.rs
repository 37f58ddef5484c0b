//! Friendship entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use parley_core::types::UserId;

/// Friend request state. Only accepted friendships affect presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FriendshipStatus {
    /// Request sent, not yet answered.
    Pending,
    /// Both sides are friends.
    Accepted,
    /// Request declined.
    Rejected,
}

/// A friend relation between a requester and an addressee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Friendship {
    /// Who sent the request.
    pub requester: UserId,
    /// Who received it.
    pub addressee: UserId,
    /// Current state.
    pub status: FriendshipStatus,
    /// When the request was made.
    pub created_at: DateTime<Utc>,
}

impl Friendship {
    /// The other side of the relation from `user`'s point of view.
    pub fn counterpart(&self, user: UserId) -> Option<UserId> {
        if self.requester == user {
            Some(self.addressee)
        } else if self.addressee == user {
            Some(self.requester)
        } else {
            None
        }
    }

    /// Whether this relation is accepted.
    pub fn is_accepted(&self) -> bool {
        self.status == FriendshipStatus::Accepted
    }
}
