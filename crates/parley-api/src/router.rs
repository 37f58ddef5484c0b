//! Route definitions for the Parley HTTP and WebSocket surface.

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::cors::build_cors_layer;
use crate::state::AppState;

/// Build the complete Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(health_routes())
        .merge(room_routes());

    let ws_routes = Router::new()
        .route("/ws/chat/sidebar/", get(handlers::ws::sidebar_ws))
        .route("/ws/chat/{room_id}/", get(handlers::ws::room_ws))
        .route("/ws/user/status/", get(handlers::ws::status_ws));

    let cors = build_cors_layer(&state.config.server.cors_allowed_origins);

    Router::new()
        .nest("/api", api_routes)
        .merge(ws_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/health/detailed", get(handlers::health::health_detailed))
}

fn room_routes() -> Router<AppState> {
    Router::new().route("/rooms/direct", post(handlers::room::create_direct_room))
}
