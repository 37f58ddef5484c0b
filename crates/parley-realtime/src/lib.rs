//! # parley-realtime
//!
//! Real-time fanout engine for Parley chat. Provides:
//!
//! - A group fabric addressing connections by `room:`, `sidebar:` and
//!   `presence:` group names
//! - Per-socket sessions with an explicit lifecycle and recorded memberships
//! - The room gateway (membership checks, message persistence and fanout)
//! - The presence hub (friend presence groups, online/offline announcements)
//! - The sidebar aggregator (ordered direct-room list with unread counts)

pub mod connection;
pub mod fabric;
pub mod handler;
pub mod message;
pub mod metrics;
pub mod presence;
pub mod room;
pub mod server;
pub mod sidebar;

pub use connection::session::{Session, SessionKind, SessionState};
pub use fabric::{GroupFabric, GroupName};
pub use message::types::{GroupEvent, OutboundFrame};
pub use presence::hub::PresenceHub;
pub use room::gateway::RoomGateway;
pub use server::{LiveSession, RealtimeEngine};
pub use sidebar::aggregator::SidebarAggregator;
