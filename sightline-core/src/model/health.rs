use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Error,
}

impl HealthStatus {
    pub fn from_workers(alive: usize, total: usize) -> Self {
        if alive == 0 {
            HealthStatus::Error
        } else if alive < total {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub websocket_clients: usize,
    #[serde(default)]
    pub workers_alive: usize,
    #[serde(default)]
    pub workers_total: usize,
    #[serde(default)]
    pub uptime_seconds: u64,
}
