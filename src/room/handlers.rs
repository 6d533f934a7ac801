use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use tracing::{info, instrument};

use super::{
    models::Room,
    types::{require_id, JoinRoomRequest, RoomCreateRequest},
};
use crate::shared::{AppError, AppState};

/// HTTP handler for fetching a room
///
/// GET /room/:id
#[instrument(name = "get_room", skip(state))]
pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<Room>, AppError> {
    info!(room_id = %room_id, "Fetching room");

    let room = state.room_service.get_room(&room_id).await?;

    Ok(Json(room))
}

/// HTTP handler for creating a new room
///
/// POST /room
/// Returns the stored room with its generated ID
#[instrument(name = "create_room", skip(state, payload))]
pub async fn create_room(
    State(state): State<AppState>,
    payload: Result<Json<RoomCreateRequest>, JsonRejection>,
) -> Result<Json<Room>, AppError> {
    let Json(request) = payload?;
    require_id("hostId", &request.host_id)?;

    info!(host_id = %request.host_id, "Creating new room");

    let room = state.room_service.create_room(request.host_id).await?;

    Ok(Json(room))
}

/// HTTP handler for joining a room
///
/// POST /room/:id
/// Joining twice is accepted and leaves the room unchanged
#[instrument(name = "join_room", skip(state, payload))]
pub async fn join_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    payload: Result<Json<JoinRoomRequest>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let Json(request) = payload?;
    require_id("participantId", &request.participant_id)?;

    info!(room_id = %room_id, participant_id = %request.participant_id, "Joining room");

    state
        .room_service
        .join_room(&room_id, &request.participant_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// HTTP handler for deleting a room
///
/// DELETE /room/:id
#[instrument(name = "delete_room", skip(state))]
pub async fn delete_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<StatusCode, AppError> {
    info!(room_id = %room_id, "Deleting room");

    state.room_service.delete_room(&room_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
