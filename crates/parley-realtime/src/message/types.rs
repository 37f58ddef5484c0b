//! Wire frames and in-process group events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use parley_core::result::AppResult;
use parley_core::types::{RoomId, UserId};
use parley_entity::{MessageView, PublicProfile};

/// Frames a client sends on a room session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundRoomFrame {
    /// Send a chat message.
    Message {
        /// Raw, unsanitized content.
        message: String,
    },
    /// The sender changed their avatar.
    ProfileImageUpdated,
}

/// Frames the server sends to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// A persisted chat message.
    Message {
        /// Serialized message.
        message: MessageView,
    },
    /// A failure caused by this client's own request.
    Error {
        /// Human-readable reason.
        message: String,
    },
    /// Public profiles of everyone in the room.
    ParticipantsInfo {
        /// Participant profiles.
        participants: Vec<PublicProfile>,
    },
    /// The caller's direct-room list.
    ChatRoomList {
        /// Rooms, most recently active first.
        rooms: Vec<RoomSummary>,
    },
    /// A friend went online or offline.
    StatusUpdate(StatusUpdate),
}

impl OutboundFrame {
    /// Build an error frame.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Serialize to a JSON text frame.
    pub fn to_json(&self) -> AppResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Online/offline transition of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// User whose presence changed.
    pub user_id: UserId,
    /// Display name.
    pub username: String,
    /// New presence flag.
    pub is_online: bool,
    /// When the change was recorded.
    pub updated_at: DateTime<Utc>,
}

/// One entry of a user's sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    /// Room ID.
    pub id: RoomId,
    /// The other member of the direct room.
    pub other_participant: PublicProfile,
    /// Most recent message, if any.
    pub last_message: Option<MessageView>,
    /// Messages from others not yet read by the viewer.
    pub unread_count: u64,
    /// Last activity in the room.
    pub updated_at: DateTime<Utc>,
}

/// Events published through the group fabric.
///
/// Each session kind decides how an event becomes outbound frames.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupEvent {
    /// A message was persisted in a room.
    ChatMessage(MessageView),
    /// Something in the recipient's room list changed.
    RoomListChanged,
    /// A user's presence changed.
    StatusChanged(StatusUpdate),
    /// A user changed their avatar.
    ProfileImageChanged {
        /// Whose avatar changed.
        user_id: UserId,
    },
}

impl GroupEvent {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ChatMessage(_) => "chat_message",
            Self::RoomListChanged => "room_list_changed",
            Self::StatusChanged(_) => "status_changed",
            Self::ProfileImageChanged { .. } => "profile_image_changed",
        }
    }
}
