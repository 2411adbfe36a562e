use sightline_core::RoomId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("room {0} not found")]
    RoomNotFound(RoomId),
    #[error("room {0} already exists")]
    RoomExists(RoomId),
    #[error("router {0} not found on its worker")]
    RouterNotFound(String),
    #[error("media worker {0} is not running")]
    WorkerUnavailable(usize),
    #[error("at least one media worker is required")]
    NoWorkers,
    #[error("failed to start media worker: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("webrtc error: {0}")]
    Rtc(#[from] webrtc::Error),
}
