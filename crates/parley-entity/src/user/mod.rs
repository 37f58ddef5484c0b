//! User entity and its projections.

pub mod model;

pub use model::{Identity, PublicProfile, User};
