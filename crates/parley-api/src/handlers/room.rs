//! Direct room handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use parley_core::error::AppError;
use parley_realtime::message::types::RoomSummary;

use crate::dto::request::CreateDirectRoomRequest;
use crate::dto::response::ApiResponse;
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::state::AppState;

/// POST /api/rooms/direct
///
/// Returns the caller's sidebar entry for the room; 201 when it was just
/// created, 200 when the pair already had one.
pub async fn create_direct_room(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateDirectRoomRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RoomSummary>>), ApiError> {
    let engine = &state.engine;
    let (room, created) = engine.rooms.create_direct_room(&auth, req.user_id).await?;

    let summary = engine
        .sidebar
        .summarize(&auth, &room)
        .await?
        .ok_or_else(|| AppError::internal(format!("Room {} has no counterpart", room.id)))?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(ApiResponse::ok(summary))))
}
