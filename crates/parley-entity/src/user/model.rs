//! User entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use parley_core::types::UserId;

/// A registered user as held by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user identifier.
    pub id: UserId,
    /// Unique display name.
    pub username: String,
    /// Uploaded profile image, if any.
    pub avatar_url: Option<String>,
    /// Last persisted online flag.
    pub is_online: bool,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new offline user without an avatar.
    pub fn new(username: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            username: username.into(),
            avatar_url: None,
            is_online: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// The authenticated principal for this user.
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            username: self.username.clone(),
        }
    }

    /// Public profile with the given online overlay and avatar fallback.
    pub fn public_profile(&self, is_online: bool, default_avatar: &str) -> PublicProfile {
        PublicProfile {
            id: self.id,
            username: self.username.clone(),
            is_online,
            image: self
                .avatar_url
                .clone()
                .unwrap_or_else(|| default_avatar.to_string()),
        }
    }
}

/// Authenticated principal attached to a connection.
///
/// Produced by credential verification and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// User ID.
    pub id: UserId,
    /// Display name at verification time.
    pub username: String,
}

/// The part of a user other participants may see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicProfile {
    /// User ID.
    pub id: UserId,
    /// Display name.
    pub username: String,
    /// Cached presence flag.
    pub is_online: bool,
    /// Avatar URL or the configured placeholder.
    pub image: String,
}
