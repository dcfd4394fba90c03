//! Sliding-window request throttling.
//!
//! WattTime publishes a quota of 3000 requests per rolling five minutes. The
//! limiter keeps the instants of admitted requests in a ring buffer and makes
//! the caller sleep once the window is full.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::util::Clock;

pub const DEFAULT_QUOTA: usize = 3000;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(5 * 60);

pub struct RateLimiter {
    quota: usize,
    window: Duration,
    stamps: VecDeque<Instant>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(quota: usize, window: Duration, clock: Arc<dyn Clock>) -> Self {
        let quota = quota.max(1);
        Self {
            quota,
            window,
            stamps: VecDeque::with_capacity(quota),
            clock,
        }
    }

    pub fn quota(&self) -> usize {
        self.quota
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Blocks until a request may be sent, then records it.
    ///
    /// Returns the total time spent waiting. Never fails.
    pub fn admit(&mut self) -> Duration {
        let mut waited = Duration::ZERO;
        loop {
            let now = self.clock.now();
            self.prune(now);

            if self.stamps.len() < self.quota {
                self.stamps.push_back(now);
                return waited;
            }

            // Full window: the oldest entry leaves at `oldest + window`.
            let Some(&oldest) = self.stamps.front() else {
                continue;
            };
            let wait = wait_until_expiry(oldest, now, self.window);
            tracing::warn!(
                quota = self.quota,
                wait_ms = wait.as_millis() as u64,
                "request quota reached, waiting for the window to advance"
            );
            self.clock.sleep(wait);
            waited = waited.saturating_add(wait);
        }
    }

    /// Number of admitted requests still inside the window.
    pub fn in_window(&mut self) -> usize {
        let now = self.clock.now();
        self.prune(now);
        self.stamps.len()
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&front) = self.stamps.front() {
            if now.saturating_duration_since(front) >= self.window {
                self.stamps.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Time until `oldest` leaves the window; saturates when the expiry is not
/// representable as an `Instant`.
fn wait_until_expiry(oldest: Instant, now: Instant, window: Duration) -> Duration {
    match oldest.checked_add(window) {
        Some(expiry) => expiry.saturating_duration_since(now),
        None => Duration::MAX,
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("quota", &self.quota)
            .field("window", &self.window)
            .field("in_window", &self.stamps.len())
            .finish()
    }
}
