//! In-memory store using DashMap.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use tracing::debug;

use parley_core::error::AppError;
use parley_core::result::AppResult;
use parley_core::types::{MessageId, RoomId, UserId};
use parley_entity::{Friendship, FriendshipStatus, Identity, Message, Room, RoomType, User};

use crate::traits::Store;

/// In-process [`Store`] backend.
///
/// Messages are kept per room in creation order; appends to one room hold
/// that room's shard lock so `created_at` stays strictly increasing.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    /// User ID → user.
    users: Arc<DashMap<UserId, User>>,
    /// Room ID → room.
    rooms: Arc<DashMap<RoomId, Room>>,
    /// Room ID → messages in ascending `created_at`.
    messages: Arc<DashMap<RoomId, Vec<Message>>>,
    /// Ordered user pair → friendship.
    friendships: Arc<DashMap<(UserId, UserId), Friendship>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user. Returns the stored copy.
    pub fn insert_user(&self, user: User) -> User {
        self.users.insert(user.id, user.clone());
        user
    }

    /// Set or clear a user's uploaded avatar.
    pub fn set_avatar(&self, id: UserId, avatar_url: Option<String>) -> AppResult<()> {
        let mut user = self
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("User {id} not found")))?;
        user.avatar_url = avatar_url;
        user.updated_at = Utc::now();
        Ok(())
    }

    /// Record a friendship between two users with the given status.
    pub fn add_friendship(&self, requester: UserId, addressee: UserId, status: FriendshipStatus) {
        self.friendships.insert(
            pair_key(requester, addressee),
            Friendship {
                requester,
                addressee,
                status,
                created_at: Utc::now(),
            },
        );
    }

    /// Number of persisted messages in a room.
    pub fn message_count(&self, room_id: RoomId) -> usize {
        self.messages.get(&room_id).map(|m| m.len()).unwrap_or(0)
    }
}

fn pair_key(a: UserId, b: UserId) -> (UserId, UserId) {
    if a <= b { (a, b) } else { (b, a) }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_user(&self, id: UserId) -> AppResult<Option<User>> {
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn set_online(&self, id: UserId, online: bool) -> AppResult<()> {
        if let Some(mut user) = self.users.get_mut(&id) {
            user.is_online = online;
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn accepted_friends(&self, id: UserId) -> AppResult<Vec<UserId>> {
        Ok(self
            .friendships
            .iter()
            .filter(|entry| entry.value().is_accepted())
            .filter_map(|entry| entry.value().counterpart(id))
            .collect())
    }

    async fn get_room(&self, id: RoomId) -> AppResult<Option<Room>> {
        Ok(self.rooms.get(&id).map(|r| r.value().clone()))
    }

    async fn find_direct_room(&self, a: UserId, b: UserId) -> AppResult<Option<Room>> {
        Ok(self
            .rooms
            .iter()
            .find(|entry| entry.value().is_pair(a, b))
            .map(|entry| entry.value().clone()))
    }

    async fn create_room(&self, room_type: RoomType, participants: &[UserId]) -> AppResult<Room> {
        if room_type == RoomType::Direct && participants.len() != 2 {
            return Err(AppError::validation(
                "A direct room needs exactly two participants",
            ));
        }

        let now = Utc::now();
        let mut members: Vec<UserId> = Vec::with_capacity(participants.len());
        for p in participants {
            if !members.contains(p) {
                members.push(*p);
            }
        }

        let room = Room {
            id: RoomId::new(),
            room_type,
            participants: members,
            created_at: now,
            updated_at: now,
        };
        self.rooms.insert(room.id, room.clone());
        debug!(room_id = %room.id, "Room created");
        Ok(room)
    }

    async fn add_participant(&self, room_id: RoomId, user: UserId) -> AppResult<()> {
        let mut room = self
            .rooms
            .get_mut(&room_id)
            .ok_or_else(|| AppError::not_found(format!("Room {room_id} not found")))?;
        if !room.participants.contains(&user) {
            room.participants.push(user);
        }
        Ok(())
    }

    async fn create_message(
        &self,
        room_id: RoomId,
        sender: &Identity,
        content: &str,
    ) -> AppResult<Message> {
        if !self.rooms.contains_key(&room_id) {
            return Err(AppError::not_found(format!("Room {room_id} not found")));
        }

        let message = {
            let mut log = self.messages.entry(room_id).or_default();
            let mut created_at = Utc::now();
            if let Some(last) = log.last() {
                if created_at <= last.created_at {
                    created_at = last.created_at + Duration::microseconds(1);
                }
            }
            let message = Message {
                id: MessageId::new(),
                room_id,
                sender_id: sender.id,
                sender_name: sender.username.clone(),
                content: content.to_string(),
                created_at,
                is_read: false,
            };
            log.push(message.clone());
            message
        };

        if let Some(mut room) = self.rooms.get_mut(&room_id) {
            if message.created_at > room.updated_at {
                room.updated_at = message.created_at;
            }
        }

        Ok(message)
    }

    async fn mark_read(&self, room_id: RoomId, reader: UserId) -> AppResult<u64> {
        let mut changed = 0u64;
        if let Some(mut log) = self.messages.get_mut(&room_id) {
            for message in log.iter_mut() {
                if !message.is_read && message.sender_id != reader {
                    message.is_read = true;
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }

    async fn rooms_for_user(&self, user: UserId, room_type: RoomType) -> AppResult<Vec<Room>> {
        let mut rooms: Vec<Room> = self
            .rooms
            .iter()
            .filter(|entry| {
                let room = entry.value();
                room.room_type == room_type && room.has_participant(user)
            })
            .map(|entry| entry.value().clone())
            .collect();
        rooms.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(rooms)
    }

    async fn last_message(&self, room_id: RoomId) -> AppResult<Option<Message>> {
        Ok(self
            .messages
            .get(&room_id)
            .and_then(|log| log.last().cloned()))
    }

    async fn unread_count(&self, room_id: RoomId, reader: UserId) -> AppResult<u64> {
        Ok(self
            .messages
            .get(&room_id)
            .map(|log| {
                log.iter()
                    .filter(|m| !m.is_read && m.sender_id != reader)
                    .count() as u64
            })
            .unwrap_or(0))
    }

    async fn recent_messages(&self, room_id: RoomId, limit: usize) -> AppResult<Vec<Message>> {
        Ok(self
            .messages
            .get(&room_id)
            .map(|log| {
                let start = log.len().saturating_sub(limit);
                log[start..].to_vec()
            })
            .unwrap_or_default())
    }
}
