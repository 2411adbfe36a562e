mod connection_stats;
mod frame_store;
mod signaling_service;
mod stream_monitor;
mod ws_handler;

pub use connection_stats::{ClientStats, ConnectionStats};
pub use frame_store::FrameStore;
pub use signaling_service::SignalingService;
pub use stream_monitor::spawn_stream_monitor;
pub use ws_handler::{stats_handler, ws_handler};
