//! Sliding-window quota for Steam Store calls

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Tracks store calls issued within the last `window`.
///
/// At most `limit` calls are ever granted inside any window of that length.
#[derive(Debug)]
pub struct QuotaTracker {
    limit: usize,
    window: Duration,
    issued: VecDeque<Instant>,
}

impl QuotaTracker {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window,
            issued: VecDeque::with_capacity(limit),
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.issued.front() {
            if now.duration_since(oldest) >= self.window {
                self.issued.pop_front();
            } else {
                break;
            }
        }
    }

    /// Calls counted in the current window
    pub fn in_window(&mut self) -> usize {
        self.prune(Instant::now());
        self.issued.len()
    }

    /// Record a call if the window has room
    pub fn try_acquire(&mut self) -> bool {
        let now = Instant::now();
        self.prune(now);
        if self.issued.len() < self.limit {
            self.issued.push_back(now);
            true
        } else {
            false
        }
    }

    /// Time until the oldest call leaves the window, zero when there is room
    pub fn wait_time(&mut self) -> Duration {
        let now = Instant::now();
        self.prune(now);
        if self.issued.len() < self.limit {
            return Duration::ZERO;
        }
        self.issued
            .front()
            .map(|&oldest| (oldest + self.window).saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    /// Wait for room in the window, then record a call
    pub async fn acquire(&mut self) {
        loop {
            if self.try_acquire() {
                return;
            }
            let wait = self.wait_time();
            log::info!("Store quota of {} calls reached, waiting {:?}", self.limit, wait);
            tokio::time::sleep(wait).await;
        }
    }
}
