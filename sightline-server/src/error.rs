use crate::media::MediaError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sightline_core::{ClientId, ErrorResponse, RoomId};
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("no frame stored for client {0}")]
    FrameNotFound(ClientId),
    #[error("room {0} not found")]
    RoomNotFound(RoomId),
    #[error("room {0} already exists")]
    RoomExists(RoomId),
    #[error(transparent)]
    Media(MediaError),
    #[error("failed to store frame: {0}")]
    Storage(#[from] std::io::Error),
}

impl From<MediaError> for ApiError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::RoomNotFound(room) => ApiError::RoomNotFound(room),
            MediaError::RoomExists(room) => ApiError::RoomExists(room),
            other => ApiError::Media(other),
        }
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::FrameNotFound(_) | ApiError::RoomNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RoomExists(_) => StatusCode::CONFLICT,
            ApiError::Media(_) | ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
