//! Store trait for pluggable persistence backends.

use async_trait::async_trait;

use parley_core::result::AppResult;
use parley_core::types::{RoomId, UserId};
use parley_entity::{Identity, Message, Room, RoomType, User};

/// Asynchronous persistence capability for rooms, messages and relations.
///
/// Failures surface as `ErrorKind::Persistence` (or `NotFound` for missing
/// rows the caller asked to mutate).
#[async_trait]
pub trait Store: Send + Sync + std::fmt::Debug + 'static {
    /// Look up a user by ID.
    async fn get_user(&self, id: UserId) -> AppResult<Option<User>>;

    /// Persist the online flag of a user.
    async fn set_online(&self, id: UserId, online: bool) -> AppResult<()>;

    /// IDs of every user with an accepted friendship to `id`, in either
    /// direction.
    async fn accepted_friends(&self, id: UserId) -> AppResult<Vec<UserId>>;

    /// Look up a room by ID.
    async fn get_room(&self, id: RoomId) -> AppResult<Option<Room>>;

    /// Find the direct room whose participants are exactly `{a, b}`.
    async fn find_direct_room(&self, a: UserId, b: UserId) -> AppResult<Option<Room>>;

    /// Create a room with the given participants.
    async fn create_room(&self, room_type: RoomType, participants: &[UserId]) -> AppResult<Room>;

    /// Add a participant to a room. Adding an existing participant is a no-op.
    async fn add_participant(&self, room_id: RoomId, user: UserId) -> AppResult<()>;

    /// Persist a new unread message and bump the room's `updated_at`.
    ///
    /// `created_at` is strictly greater than every earlier message in the
    /// same room.
    async fn create_message(
        &self,
        room_id: RoomId,
        sender: &Identity,
        content: &str,
    ) -> AppResult<Message>;

    /// Mark every unread message in the room not sent by `reader` as read.
    /// Returns how many messages changed.
    async fn mark_read(&self, room_id: RoomId, reader: UserId) -> AppResult<u64>;

    /// Rooms of the given type containing `user`, most recently updated first.
    async fn rooms_for_user(&self, user: UserId, room_type: RoomType) -> AppResult<Vec<Room>>;

    /// Most recent message in a room.
    async fn last_message(&self, room_id: RoomId) -> AppResult<Option<Message>>;

    /// Unread messages in the room not sent by `reader`.
    async fn unread_count(&self, room_id: RoomId, reader: UserId) -> AppResult<u64>;

    /// The newest `limit` messages in ascending `created_at` order.
    async fn recent_messages(&self, room_id: RoomId, limit: usize) -> AppResult<Vec<Message>>;
}
