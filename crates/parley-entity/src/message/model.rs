//! Chat message entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use parley_core::types::{MessageId, RoomId, UserId};

/// A persisted chat message. `content` is already HTML-escaped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier.
    pub id: MessageId,
    /// Room the message belongs to.
    pub room_id: RoomId,
    /// Sender user ID.
    pub sender_id: UserId,
    /// Sender display name at send time.
    pub sender_name: String,
    /// Sanitized content.
    pub content: String,
    /// Strictly increasing within a room.
    pub created_at: DateTime<Utc>,
    /// Flipped once by a bulk mark-read.
    pub is_read: bool,
}

impl Message {
    /// Wire representation sent to clients.
    pub fn view(&self) -> MessageView {
        MessageView {
            id: self.id,
            sender_id: self.sender_id,
            sender_name: self.sender_name.clone(),
            content: self.content.clone(),
            created_at: self.created_at,
            is_read: self.is_read,
        }
    }
}

/// Serialized message as delivered over the socket and in room lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageView {
    /// Message ID.
    pub id: MessageId,
    /// Sender user ID.
    pub sender_id: UserId,
    /// Sender display name.
    pub sender_name: String,
    /// Sanitized content.
    pub content: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Read flag at serialization time.
    pub is_read: bool,
}
