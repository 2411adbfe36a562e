use crate::app::AppState;
use crate::error::ApiError;
use axum::Json;
use axum::extract::State;
use sightline_core::{CreateRoomRequest, CreateRoomResponse, JoinRoomRequest, JoinRoomResponse};

/// `POST /api/create-room`
pub async fn create_room(
    State(state): State<AppState>,
    Json(request): Json<CreateRoomRequest>,
) -> Result<Json<CreateRoomResponse>, ApiError> {
    if request.room_id.0.trim().is_empty() {
        return Err(ApiError::BadRequest("roomId must not be empty".to_owned()));
    }
    state.media.create_room(request.room_id.clone()).await?;
    Ok(Json(CreateRoomResponse {
        room_id: request.room_id,
    }))
}

/// `POST /api/join-room`
pub async fn join_room(
    State(state): State<AppState>,
    Json(request): Json<JoinRoomRequest>,
) -> Result<Json<JoinRoomResponse>, ApiError> {
    if request.peer_id.as_str().trim().is_empty() {
        return Err(ApiError::BadRequest("peerId must not be empty".to_owned()));
    }
    let response = state
        .media
        .join_room(&request.room_id, request.peer_id)
        .await?;
    Ok(Json(response))
}
