//! Frame and event types plus inbound content validation.

pub mod types;
pub mod validator;

pub use types::{GroupEvent, InboundRoomFrame, OutboundFrame, RoomSummary, StatusUpdate};
