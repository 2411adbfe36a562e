use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Sliding-log limiter: at most `max_per_window` starts in any rolling window.
#[derive(Debug)]
pub struct RateLimiter {
    max_per_window: usize,
    window: Duration,
    starts: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(max_per_window: usize, window: Duration) -> Self {
        let max_per_window = max_per_window.max(1);
        Self {
            max_per_window,
            window,
            starts: VecDeque::with_capacity(max_per_window),
        }
    }

    pub fn per_second(max: usize) -> Self {
        Self::new(max, Duration::from_secs(1))
    }

    /// Waits until another start fits in the window, then records it.
    pub async fn acquire(&mut self) {
        loop {
            let now = Instant::now();
            self.evict(now);
            if self.starts.len() < self.max_per_window {
                self.starts.push_back(now);
                return;
            }
            if let Some(oldest) = self.starts.front() {
                tokio::time::sleep_until(*oldest + self.window).await;
            }
        }
    }

    pub fn in_window(&mut self) -> usize {
        self.evict(Instant::now());
        self.starts.len()
    }

    fn evict(&mut self, now: Instant) {
        while let Some(oldest) = self.starts.front() {
            if now.duration_since(*oldest) >= self.window {
                self.starts.pop_front();
            } else {
                break;
            }
        }
    }
}
