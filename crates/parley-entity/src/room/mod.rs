//! Chat room entity.

pub mod model;

pub use model::{Room, RoomType};
