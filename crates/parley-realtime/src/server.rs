//! Top-level real-time engine that ties together all subsystems.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use parley_auth::Authenticator;
use parley_core::config::RealtimeConfig;
use parley_core::error::AppError;
use parley_core::result::AppResult;
use parley_store::Store;

use crate::connection::manager::SessionManager;
use crate::connection::session::{Session, SessionKind, SessionState};
use crate::fabric::GroupFabric;
use crate::handler::SessionHandler;
use crate::message::types::{GroupEvent, OutboundFrame};
use crate::metrics::{MetricsSnapshot, RealtimeMetrics};
use crate::presence::hub::PresenceHub;
use crate::presence::tracker::PresenceTracker;
use crate::room::gateway::RoomGateway;
use crate::sidebar::aggregator::SidebarAggregator;

/// A session that made it to `Active`, ready to be pumped.
#[derive(Debug)]
pub struct LiveSession {
    /// The session.
    pub session: Arc<Session>,
    /// Group events addressed to this session.
    pub events: mpsc::Receiver<GroupEvent>,
    /// Frames to send before anything else.
    pub greeting: Vec<OutboundFrame>,
}

/// Point-in-time engine counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStats {
    /// Sessions not yet torn down.
    pub sessions: usize,
    /// Connections reachable through the fabric.
    pub connections: usize,
    /// Distinct connected users.
    pub users: usize,
    /// Non-empty groups.
    pub groups: usize,
    /// Users flagged online.
    pub online_users: usize,
    /// Counters.
    pub metrics: MetricsSnapshot,
}

/// Central real-time engine.
#[derive(Clone)]
pub struct RealtimeEngine {
    /// Group fabric.
    pub fabric: Arc<GroupFabric>,
    /// Live sessions.
    pub sessions: Arc<SessionManager>,
    /// Room gateway.
    pub rooms: Arc<RoomGateway>,
    /// Presence hub.
    pub presence: Arc<PresenceHub>,
    /// Sidebar aggregator.
    pub sidebar: Arc<SidebarAggregator>,
    /// Metrics collector.
    pub metrics: Arc<RealtimeMetrics>,
    authenticator: Arc<dyn Authenticator>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for RealtimeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeEngine")
            .field("sessions", &self.sessions.count())
            .finish()
    }
}

impl RealtimeEngine {
    /// Creates a new engine with all subsystems.
    pub fn new(
        config: RealtimeConfig,
        store: Arc<dyn Store>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        let metrics = Arc::new(RealtimeMetrics::new());
        let fabric = Arc::new(GroupFabric::new(metrics.clone()));
        let tracker = Arc::new(PresenceTracker::new(store.clone()));
        let sessions = Arc::new(SessionManager::new(
            config.clone(),
            fabric.clone(),
            metrics.clone(),
        ));
        let rooms = Arc::new(RoomGateway::new(
            store.clone(),
            fabric.clone(),
            tracker.clone(),
            metrics.clone(),
            config.clone(),
        ));
        let presence = Arc::new(PresenceHub::new(store.clone(), fabric.clone(), tracker.clone()));
        let sidebar = Arc::new(SidebarAggregator::new(
            store,
            tracker,
            config.default_avatar_url.clone(),
        ));

        info!("Real-time engine initialized");

        Self {
            fabric,
            sessions,
            rooms,
            presence,
            sidebar,
            metrics,
            authenticator,
            shutdown: CancellationToken::new(),
        }
    }

    /// Handler responsible for a session kind.
    pub fn handler(&self, kind: SessionKind) -> &dyn SessionHandler {
        match kind {
            SessionKind::Room(_) => self.rooms.as_ref(),
            SessionKind::Sidebar => self.sidebar.as_ref(),
            SessionKind::Status => self.presence.as_ref(),
        }
    }

    /// Opens a session and drives it to `Active`.
    ///
    /// Any failure closes the session, leaving whatever it had joined, and
    /// is returned so the transport can refuse the connection.
    pub async fn connect(&self, token: Option<&str>, kind: SessionKind) -> AppResult<LiveSession> {
        if self.shutdown.is_cancelled() {
            return Err(AppError::internal("Real-time engine is shutting down"));
        }

        let (session, events) = self.sessions.open(kind);
        let guard = InitGuard::new(self.clone(), session.clone());
        match self.initialize(&session, token).await {
            Ok(greeting) => {
                guard.defuse();
                Ok(LiveSession {
                    session,
                    events,
                    greeting,
                })
            }
            Err(e) => {
                warn!(conn_id = %session.id(), kind = ?kind, error = %e, "Session rejected");
                self.disconnect(&session).await;
                guard.defuse();
                Err(e)
            }
        }
    }

    async fn initialize(&self, session: &Session, token: Option<&str>) -> AppResult<Vec<OutboundFrame>> {
        let token = token.ok_or_else(|| AppError::authentication("Missing credential"))?;
        let identity = self.authenticator.verify(token).await?;

        let handler = self.handler(session.kind());
        handler.precheck(&identity, session.kind()).await?;
        session.authenticate(identity).await?;
        handler.subscribe(session).await?;
        session.activate().await?;
        handler.on_active(session).await
    }

    /// Handles an inbound text frame. Returns frames for this client only.
    ///
    /// A fatal error (the room vanished or the caller lost access) also
    /// closes the session after the error frame is produced.
    pub async fn handle_frame(&self, session: &Session, text: &str) -> Vec<OutboundFrame> {
        if session.state().await != SessionState::Active {
            return Vec::new();
        }
        match self.handler(session.kind()).on_frame(session, text).await {
            Ok(frames) => frames,
            Err(e) if e.is_fatal_for_session() => {
                warn!(conn_id = %session.id(), error = %e, "Inbound frame failed, closing session");
                self.disconnect(session).await;
                vec![OutboundFrame::error(e.message)]
            }
            Err(e) => {
                warn!(conn_id = %session.id(), error = %e, "Inbound frame failed");
                vec![OutboundFrame::error(e.message)]
            }
        }
    }

    /// Turns a group event into frames for the session's client.
    pub async fn render_event(&self, session: &Session, event: GroupEvent) -> Vec<OutboundFrame> {
        let kind = event.kind();
        match self.handler(session.kind()).on_event(session, event).await {
            Ok(frames) => frames,
            Err(e) => {
                warn!(conn_id = %session.id(), event = kind, error = %e, "Event rendering failed");
                Vec::new()
            }
        }
    }

    /// Closes a session. Safe to call any number of times.
    pub async fn disconnect(&self, session: &Session) {
        self.sessions.remove(&session.id());
        let Some(previous) = session.close().await else {
            return;
        };
        let Ok(identity) = session.identity() else {
            return;
        };
        if let Err(e) = self
            .handler(session.kind())
            .on_close(identity, previous)
            .await
        {
            warn!(conn_id = %session.id(), error = %e, "Session close hook failed");
        }
    }

    /// Cancelled when the engine shuts down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Point-in-time counts for health reporting.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            sessions: self.sessions.count(),
            connections: self.fabric.connection_count(),
            users: self.fabric.user_count(),
            groups: self.fabric.group_count(),
            online_users: self.presence.tracker().online_count(),
            metrics: self.metrics.snapshot(),
        }
    }

    /// Refuses new sessions and closes every live one.
    pub async fn shutdown(&self) {
        info!("Shutting down real-time engine");
        self.shutdown.cancel();

        let sessions = self.sessions.all();
        let count = sessions.len();
        for session in sessions {
            self.disconnect(&session).await;
        }

        info!(closed = count, "Real-time engine shut down");
    }
}

/// Tears down a session whose `connect` never finished.
///
/// Dropping the `connect` future after groups were joined would otherwise
/// leave the session registered and subscribed.
struct InitGuard {
    engine: RealtimeEngine,
    session: Option<Arc<Session>>,
}

impl InitGuard {
    fn new(engine: RealtimeEngine, session: Arc<Session>) -> Self {
        Self {
            engine,
            session: Some(session),
        }
    }

    fn defuse(mut self) {
        self.session = None;
    }
}

impl Drop for InitGuard {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        warn!(conn_id = %session.id(), "Session initialization abandoned");
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let engine = self.engine.clone();
                runtime.spawn(async move { engine.disconnect(&session).await });
            }
            Err(_) => {
                warn!(conn_id = %session.id(), "No runtime to tear down abandoned session");
            }
        }
    }
}
