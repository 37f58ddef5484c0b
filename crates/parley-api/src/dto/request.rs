//! Request DTOs.

use serde::{Deserialize, Serialize};

use parley_core::types::UserId;

/// Body of `POST /api/rooms/direct`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDirectRoomRequest {
    /// The user to chat with.
    pub user_id: UserId,
}
