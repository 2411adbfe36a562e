mod app;
mod config;
mod error;

pub mod http;
pub mod media;
pub mod signaling;

pub use app::{AppState, SightlineServer, router};
pub use config::{MediaConfig, ServerConfig};
pub use error::ApiError;
pub use media::{MediaError, MediaRouter, RouterHandle, WorkerDeath};
pub use signaling::{ConnectionStats, FrameStore, SignalingService};
