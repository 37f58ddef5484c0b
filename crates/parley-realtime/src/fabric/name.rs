//! Typed group names.

use std::fmt;

use parley_core::types::{RoomId, UserId};

/// The three group classes a connection can join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupName {
    /// Everyone viewing a chat room.
    Room(RoomId),
    /// Every sidebar socket of one user.
    Sidebar(UserId),
    /// Everyone following one user's presence.
    Presence(UserId),
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupName::Room(id) => write!(f, "room:{id}"),
            GroupName::Sidebar(id) => write!(f, "sidebar:{id}"),
            GroupName::Presence(id) => write!(f, "presence:{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let room = RoomId::new();
        let user = UserId::new();
        assert_eq!(GroupName::Room(room).to_string(), format!("room:{room}"));
        assert_eq!(GroupName::Sidebar(user).to_string(), format!("sidebar:{user}"));
        assert_eq!(
            GroupName::Presence(user).to_string(),
            format!("presence:{user}")
        );
    }

    #[test]
    fn test_classes_are_distinct() {
        let user = UserId::new();
        assert_ne!(GroupName::Sidebar(user), GroupName::Presence(user));
    }
}
