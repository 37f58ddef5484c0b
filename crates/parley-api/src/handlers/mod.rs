//! HTTP and WebSocket handlers.

pub mod health;
pub mod room;
pub mod ws;
