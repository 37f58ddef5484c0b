//! Per-kind session behavior.
//!
//! Each session kind plugs into the engine through [`SessionHandler`];
//! inbound frames and group events are dispatched by matching on their
//! enum variant.

use async_trait::async_trait;
use tracing::warn;

use parley_core::error::AppError;
use parley_core::result::AppResult;
use parley_core::types::RoomId;
use parley_entity::Identity;

use crate::connection::session::{Session, SessionKind, SessionState};
use crate::message::types::{GroupEvent, InboundRoomFrame, OutboundFrame};
use crate::presence::hub::PresenceHub;
use crate::room::gateway::RoomGateway;
use crate::sidebar::aggregator::SidebarAggregator;

const MALFORMED_FRAME: &str = "Invalid message format";

/// Behavior of one session kind across its lifecycle.
#[async_trait]
pub trait SessionHandler: Send + Sync {
    /// Resource check run after the credential is verified and before the
    /// session counts as authenticated.
    async fn precheck(&self, identity: &Identity, kind: SessionKind) -> AppResult<()>;

    /// Joins every group the session needs. Runs before accept.
    async fn subscribe(&self, session: &Session) -> AppResult<()>;

    /// Frames sent right after accept.
    async fn on_active(&self, session: &Session) -> AppResult<Vec<OutboundFrame>>;

    /// Handles one inbound text frame. Errors go back to this client only.
    async fn on_frame(&self, session: &Session, text: &str) -> AppResult<Vec<OutboundFrame>>;

    /// Turns a group event into frames for this client.
    async fn on_event(&self, session: &Session, event: GroupEvent) -> AppResult<Vec<OutboundFrame>>;

    /// Runs once after teardown. `previous` is the state before closing.
    async fn on_close(&self, _identity: &Identity, _previous: SessionState) -> AppResult<()> {
        Ok(())
    }
}

fn room_of(session: &Session) -> AppResult<RoomId> {
    match session.kind() {
        SessionKind::Room(room_id) => Ok(room_id),
        other => Err(AppError::internal(format!(
            "Room handler used for a {other:?} session"
        ))),
    }
}

#[async_trait]
impl SessionHandler for RoomGateway {
    async fn precheck(&self, identity: &Identity, kind: SessionKind) -> AppResult<()> {
        match kind {
            SessionKind::Room(room_id) => self.authorize(identity, room_id).await.map(|_| ()),
            other => Err(AppError::internal(format!(
                "Room handler used for a {other:?} session"
            ))),
        }
    }

    async fn subscribe(&self, session: &Session) -> AppResult<()> {
        self.open_room_session(session, room_of(session)?).await?;
        Ok(())
    }

    async fn on_active(&self, session: &Session) -> AppResult<Vec<OutboundFrame>> {
        let identity = session.identity()?;
        let room = self.authorize(identity, room_of(session)?).await?;

        let mut frames = Vec::new();
        if let Err(e) = self.mark_room_read(identity, room.id).await {
            warn!(conn_id = %session.id(), room_id = %room.id, error = %e, "Mark-read on open failed");
            frames.push(OutboundFrame::error(e.message));
        }
        frames.push(OutboundFrame::ParticipantsInfo {
            participants: self.participants(&room).await?,
        });
        Ok(frames)
    }

    async fn on_frame(&self, session: &Session, text: &str) -> AppResult<Vec<OutboundFrame>> {
        let frame: InboundRoomFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(_) => return Ok(vec![OutboundFrame::error(MALFORMED_FRAME)]),
        };

        let identity = session.identity()?;
        let room_id = room_of(session)?;
        match frame {
            InboundRoomFrame::Message { message } => {
                self.send_message(identity, room_id, &message).await?;
            }
            InboundRoomFrame::ProfileImageUpdated => {
                self.handle_profile_image_changed(identity, room_id).await?;
            }
        }
        Ok(Vec::new())
    }

    async fn on_event(&self, session: &Session, event: GroupEvent) -> AppResult<Vec<OutboundFrame>> {
        match event {
            GroupEvent::ChatMessage(message) => Ok(vec![OutboundFrame::Message { message }]),
            GroupEvent::ProfileImageChanged { .. } => {
                let room = self.authorize(session.identity()?, room_of(session)?).await?;
                Ok(vec![OutboundFrame::ParticipantsInfo {
                    participants: self.participants(&room).await?,
                }])
            }
            GroupEvent::RoomListChanged | GroupEvent::StatusChanged(_) => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl SessionHandler for SidebarAggregator {
    async fn precheck(&self, _identity: &Identity, _kind: SessionKind) -> AppResult<()> {
        Ok(())
    }

    async fn subscribe(&self, session: &Session) -> AppResult<()> {
        self.open_sidebar_session(session).await
    }

    async fn on_active(&self, session: &Session) -> AppResult<Vec<OutboundFrame>> {
        let rooms = self.build_room_list(session.identity()?).await?;
        Ok(vec![OutboundFrame::ChatRoomList { rooms }])
    }

    async fn on_frame(&self, _session: &Session, _text: &str) -> AppResult<Vec<OutboundFrame>> {
        Ok(Vec::new())
    }

    async fn on_event(&self, session: &Session, event: GroupEvent) -> AppResult<Vec<OutboundFrame>> {
        match event {
            GroupEvent::RoomListChanged
            | GroupEvent::StatusChanged(_)
            | GroupEvent::ProfileImageChanged { .. } => self.on_active(session).await,
            GroupEvent::ChatMessage(_) => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl SessionHandler for PresenceHub {
    async fn precheck(&self, _identity: &Identity, _kind: SessionKind) -> AppResult<()> {
        Ok(())
    }

    async fn subscribe(&self, session: &Session) -> AppResult<()> {
        self.open_status_session(session).await.map(|_| ())
    }

    async fn on_active(&self, _session: &Session) -> AppResult<Vec<OutboundFrame>> {
        Ok(Vec::new())
    }

    async fn on_frame(&self, session: &Session, text: &str) -> AppResult<Vec<OutboundFrame>> {
        if serde_json::from_str::<serde_json::Value>(text).is_err() {
            return Ok(vec![OutboundFrame::error(MALFORMED_FRAME)]);
        }
        self.announce_online(session).await?;
        Ok(Vec::new())
    }

    async fn on_event(&self, _session: &Session, event: GroupEvent) -> AppResult<Vec<OutboundFrame>> {
        match event {
            GroupEvent::StatusChanged(update) => Ok(vec![OutboundFrame::StatusUpdate(update)]),
            _ => Ok(Vec::new()),
        }
    }

    async fn on_close(&self, identity: &Identity, previous: SessionState) -> AppResult<()> {
        if previous == SessionState::Active {
            self.announce_offline(identity).await?;
        }
        Ok(())
    }
}
