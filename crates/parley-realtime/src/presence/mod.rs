//! Presence: cached online flags and friend presence fanout.

pub mod hub;
pub mod tracker;

pub use hub::PresenceHub;
pub use tracker::PresenceTracker;
