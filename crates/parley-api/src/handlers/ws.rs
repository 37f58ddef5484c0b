//! WebSocket upgrade handlers and the per-socket pump.
//!
//! The session is authenticated, prechecked and subscribed before the
//! upgrade is accepted, so a rejected client never sees an open socket and
//! an accepted one cannot miss fanout published in between.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use parley_core::error::AppError;
use parley_core::types::RoomId;
use parley_realtime::{LiveSession, OutboundFrame, SessionKind};

use crate::error::ApiError;
use crate::extractors::Credential;
use crate::state::AppState;

type WsSink = SplitSink<WebSocket, Message>;

/// GET /ws/chat/{room_id}/
pub async fn room_ws(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Credential(token): Credential,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let room_id: RoomId = room_id
        .parse()
        .map_err(|_| AppError::not_found(format!("Room {room_id} not found")))?;
    upgrade(state, ws, token, SessionKind::Room(room_id)).await
}

/// GET /ws/chat/sidebar/
pub async fn sidebar_ws(
    State(state): State<AppState>,
    Credential(token): Credential,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    upgrade(state, ws, token, SessionKind::Sidebar).await
}

/// GET /ws/user/status/
pub async fn status_ws(
    State(state): State<AppState>,
    Credential(token): Credential,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    upgrade(state, ws, token, SessionKind::Status).await
}

async fn upgrade(
    state: AppState,
    ws: WebSocketUpgrade,
    token: Option<String>,
    kind: SessionKind,
) -> Result<Response, ApiError> {
    let live = state.engine.connect(token.as_deref(), kind).await?;

    let engine = state.engine.clone();
    let session = live.session.clone();
    Ok(ws
        .on_failed_upgrade(move |e| {
            warn!(conn_id = %session.id(), error = %e, "WebSocket upgrade failed");
            tokio::spawn(async move { engine.disconnect(&session).await });
        })
        .on_upgrade(move |socket| pump(state, live, socket)))
}

/// Drives one accepted socket until either side goes away.
async fn pump(state: AppState, live: LiveSession, socket: WebSocket) {
    let LiveSession {
        session,
        mut events,
        greeting,
    } = live;
    let engine = state.engine.clone();
    let conn_id = session.id();
    let (mut ws_tx, mut ws_rx) = socket.split();

    info!(conn_id = %conn_id, kind = ?session.kind(), "WebSocket connection established");

    let cancel = session.cancel_token();
    let shutdown = engine.shutdown_token();
    let period = Duration::from_secs(state.config.realtime.ping_interval_seconds.max(1));
    let mut ping = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

    if send_frames(&mut ws_tx, &greeting).await.is_ok() {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = shutdown.cancelled() => break,
                _ = ping.tick() => {
                    if ws_tx.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
                event = events.recv() => {
                    let Some(event) = event else { break };
                    let work = engine.render_event(&session, event);
                    let Some(frames) = unless_closed(work, &cancel, &shutdown).await else {
                        break;
                    };
                    if send_frames(&mut ws_tx, &frames).await.is_err() {
                        break;
                    }
                }
                inbound = ws_rx.next() => match inbound {
                    Some(Ok(Message::Text(text))) => {
                        let work = engine.handle_frame(&session, text.as_str());
                        let Some(frames) = unless_closed(work, &cancel, &shutdown).await else {
                            break;
                        };
                        if send_frames(&mut ws_tx, &frames).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(conn_id = %conn_id, error = %e, "WebSocket error");
                        break;
                    }
                },
            }
        }
    }

    engine.disconnect(&session).await;
    if ws_tx.send(Message::Close(None)).await.is_err() {
        debug!(conn_id = %conn_id, "Peer gone before close frame");
    }

    info!(conn_id = %conn_id, "WebSocket connection closed");
}

/// Runs `work` unless the session or the engine closes first.
///
/// `work` is polled first, so frames produced by a call that itself closed
/// the session still reach the client.
async fn unless_closed<F: Future>(
    work: F,
    cancel: &CancellationToken,
    shutdown: &CancellationToken,
) -> Option<F::Output> {
    tokio::select! {
        biased;
        output = work => Some(output),
        _ = cancel.cancelled() => None,
        _ = shutdown.cancelled() => None,
    }
}

async fn send_frames(ws_tx: &mut WsSink, frames: &[OutboundFrame]) -> Result<(), axum::Error> {
    for frame in frames {
        match frame.to_json() {
            Ok(json) => ws_tx.send(Message::Text(json.into())).await?,
            Err(e) => warn!(error = %e, "Dropping unserializable frame"),
        }
    }
    Ok(())
}
