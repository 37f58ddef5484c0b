//! Application state shared across all handlers.

use std::sync::Arc;

use parley_auth::Authenticator;
use parley_core::config::AppConfig;
use parley_realtime::RealtimeEngine;

/// Shared dependencies, passed to every handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// WebSocket realtime engine
    pub engine: Arc<RealtimeEngine>,
    /// Bearer credential verification for REST routes
    pub authenticator: Arc<dyn Authenticator>,
}

impl AppState {
    /// Bundle the shared dependencies.
    pub fn new(
        config: AppConfig,
        engine: RealtimeEngine,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            engine: Arc::new(engine),
            authenticator,
        }
    }
}
