//! # parley-api
//!
//! HTTP layer for Parley built on Axum: the three chat WebSocket endpoints,
//! direct-room creation, health checks, extractors and error mapping.

pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use state::AppState;
