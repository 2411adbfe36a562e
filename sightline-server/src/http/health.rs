use crate::app::AppState;
use axum::Json;
use axum::extract::State;
use sightline_core::{HealthReport, HealthStatus};

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    let workers_alive = state.media.workers_alive();
    let workers_total = state.media.workers_total();
    Json(HealthReport {
        status: HealthStatus::from_workers(workers_alive, workers_total),
        websocket_clients: state.signaling.client_count(),
        workers_alive,
        workers_total,
        uptime_seconds: state.started.elapsed().as_secs(),
    })
}
