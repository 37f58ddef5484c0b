//! # parley-entity
//!
//! Domain entity models for Parley. Every struct in this crate represents a
//! stored record or a domain value object; all derive `Debug`, `Clone`,
//! `Serialize` and `Deserialize`.

pub mod friendship;
pub mod message;
pub mod room;
pub mod user;

pub use friendship::{Friendship, FriendshipStatus};
pub use message::{Message, MessageView};
pub use room::{Room, RoomType};
pub use user::{Identity, PublicProfile, User};
