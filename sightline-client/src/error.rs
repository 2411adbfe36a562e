use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("connection attempt timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("failed to connect: {0}")]
    Connect(String),
    #[error("channel closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("peer transport error: {0}")]
    Transport(String),
    #[error("no peer transport is open")]
    NoTransport,
    #[error("no remote peer is known for this session")]
    NoRemotePeer,
    #[error("signaling channel refused the message")]
    SignalingUnavailable,
    #[error("recovery gave up after {0} full restarts")]
    RecoveryExhausted(u32),
    #[error("session is closed")]
    Closed,
}

impl From<webrtc::Error> for SessionError {
    fn from(e: webrtc::Error) -> Self {
        SessionError::Transport(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server rejected frame with status {0}")]
    Status(u16),
    #[error("failed to encode frame: {0}")]
    Encode(#[from] image::ImageError),
    #[error("upload pipeline is closed")]
    Closed,
}
