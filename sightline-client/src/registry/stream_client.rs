use bytes::Bytes;
use sightline_core::metrics::compute_fps;
use sightline_core::{ClientId, MetricsPayload};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamMetrics {
    pub frame_count: u64,
    pub fps: f64,
    pub start_time: Option<Instant>,
    pub last_update_time: Option<Instant>,
}

impl StreamMetrics {
    pub(crate) fn record_frame(&mut self, now: Instant) {
        self.frame_count += 1;
        self.start_time.get_or_insert(now);
        self.last_update_time = Some(now);
        self.refresh_fps(now);
    }

    pub(crate) fn refresh_fps(&mut self, now: Instant) {
        self.fps = match self.start_time {
            Some(start) => compute_fps(self.frame_count, now.duration_since(start)),
            None => 0.0,
        };
    }

    pub(crate) fn reset(&mut self) {
        self.frame_count = 0;
        self.fps = 0.0;
        self.start_time = None;
    }

    pub fn duration(&self, now: Instant, streaming: bool) -> Duration {
        match (streaming, self.start_time) {
            (true, Some(start)) => now.duration_since(start),
            _ => Duration::ZERO,
        }
    }

    pub fn to_payload(&self, now: Instant, streaming: bool) -> MetricsPayload {
        MetricsPayload {
            frame_count: self.frame_count,
            fps: self.fps,
            duration_ms: self.duration(now, streaming).as_millis() as u64,
            is_streaming: streaming,
        }
    }
}

/// One logical stream known to the registry.
#[derive(Debug, Clone)]
pub struct StreamClient {
    pub id: ClientId,
    pub display_name: String,
    pub is_local: bool,
    pub is_streaming: bool,
    pub last_frame: Option<Bytes>,
    pub metrics: StreamMetrics,
}

impl StreamClient {
    pub(crate) fn new(id: ClientId, display_name: String, is_local: bool) -> Self {
        Self {
            id,
            display_name,
            is_local,
            is_streaming: false,
            last_frame: None,
            metrics: StreamMetrics::default(),
        }
    }

    pub(crate) fn remote(id: ClientId) -> Self {
        let display_name = format!("Client {}", id.short());
        Self::new(id, display_name, false)
    }

    pub(crate) fn stop(&mut self) {
        self.is_streaming = false;
        self.last_frame = None;
        self.metrics.reset();
    }
}
