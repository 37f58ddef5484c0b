//! Chat room entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use parley_core::types::{RoomId, UserId};

/// Kind of chat room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    /// Exactly two participants.
    Direct,
    /// Any number of participants.
    Group,
}

/// A chat room and its participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    /// Unique room identifier.
    pub id: RoomId,
    /// Room kind.
    pub room_type: RoomType,
    /// Participant user IDs in join order.
    pub participants: Vec<UserId>,
    /// When the room was created.
    pub created_at: DateTime<Utc>,
    /// Bumped on every message.
    pub updated_at: DateTime<Utc>,
}

impl Room {
    /// Create a direct room between two users.
    pub fn direct(a: UserId, b: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: RoomId::new(),
            room_type: RoomType::Direct,
            participants: vec![a, b],
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this is a direct room.
    pub fn is_direct(&self) -> bool {
        self.room_type == RoomType::Direct
    }

    /// Whether `user` participates in this room.
    pub fn has_participant(&self, user: UserId) -> bool {
        self.participants.contains(&user)
    }

    /// Every participant except `user`.
    pub fn others(&self, user: UserId) -> impl Iterator<Item = UserId> + '_ {
        self.participants.iter().copied().filter(move |p| *p != user)
    }

    /// The single counterpart of `user` in a direct room.
    pub fn other_participant(&self, user: UserId) -> Option<UserId> {
        self.others(user).next()
    }

    /// Whether this direct room is exactly the pair `{a, b}`.
    pub fn is_pair(&self, a: UserId, b: UserId) -> bool {
        self.is_direct()
            && self.participants.len() == 2
            && self.has_participant(a)
            && self.has_participant(b)
    }
}
