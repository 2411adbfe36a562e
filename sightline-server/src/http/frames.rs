use crate::app::AppState;
use crate::error::ApiError;
use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, header};
use axum::response::IntoResponse;
use sightline_core::{ClientId, FrameAck};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

pub const CLIENT_ID_HEADER: &str = "x-client-id";
const FRAME_FIELD: &str = "frame";
const DEFAULT_CLIENT: &str = "default";

/// `POST /frame`: multipart field `frame`, sender in `X-Client-ID`.
pub async fn upload_frame(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<FrameAck>, ApiError> {
    let client_id = client_id_from(&headers);

    let mut frame = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() == Some(FRAME_FIELD) {
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            frame = Some(data);
            break;
        }
    }

    let frame = match frame {
        Some(frame) if !frame.is_empty() => frame,
        Some(_) => return Err(ApiError::BadRequest("frame is empty".to_owned())),
        None => return Err(ApiError::BadRequest("missing multipart field 'frame'".to_owned())),
    };

    let timestamp = unix_millis();
    let size = frame.len();
    let frame_number = state.frames.store(&client_id, frame, timestamp).await?;
    state.signaling.record_frame(&client_id);
    debug!("Frame {} from {} ({} bytes)", frame_number, client_id, size);

    Ok(Json(FrameAck {
        status: "success".to_owned(),
        client_id,
        frame_number,
        timestamp,
    }))
}

/// `GET /frame/{client_id}/latest`
pub async fn latest_frame(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let client_id = ClientId::from(client_id);
    let frame = state
        .frames
        .latest(&client_id)
        .ok_or(ApiError::FrameNotFound(client_id))?;
    Ok(([(header::CONTENT_TYPE, "image/jpeg")], frame))
}

fn client_id_from(headers: &HeaderMap) -> ClientId {
    let raw = headers
        .get(CLIENT_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .unwrap_or_default();
    match raw {
        "" | "undefined" | "null" => ClientId::from(DEFAULT_CLIENT),
        id => ClientId::from(id),
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
