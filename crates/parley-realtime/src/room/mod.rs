//! Room-scoped sessions and message fanout.

pub mod gateway;

pub use gateway::RoomGateway;
