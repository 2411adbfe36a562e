use serde::{Deserialize, Serialize};
use sightline_core::ClientId;

/// Body of `GET /ws/stats`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionStats {
    pub active_connections: usize,
    pub uptime_seconds: f64,
    pub clients: Vec<ClientStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientStats {
    pub id: ClientId,
    pub display_name: String,
    /// Seconds, rounded to two decimals.
    pub connected_for: f64,
    pub message_count: u64,
    pub frames_captured: u64,
    pub is_streaming: bool,
}

pub(crate) fn round2(secs: f64) -> f64 {
    (secs * 100.0).round() / 100.0
}
