//! Friendship entity.

pub mod model;

pub use model::{Friendship, FriendshipStatus};
