use crate::signaling::signaling_service::SignalingService;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Sweeps silent streams every `interval` until the handle is aborted.
pub fn spawn_stream_monitor(service: SignalingService, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let expired = service.sweep_inactive();
            if !expired.is_empty() {
                debug!("Stream monitor flipped {} clients", expired.len());
            }
        }
    })
}
