//! Stream metric derivations shared by the client registry and the server monitor.

use std::time::Duration;

/// Frames per second rounded to one decimal place.
pub fn compute_fps(frame_count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if frame_count == 0 || secs <= 0.0 {
        return 0.0;
    }
    ((frame_count as f64 / secs) * 10.0).round() / 10.0
}
