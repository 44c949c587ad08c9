//! Exponential backoff shared by both monitor loops.
//!
//! `on_failure()` hands out the current delay and doubles it for next
//! time (capped); `on_success()` snaps back to the base delay.
//! Sequence from a fresh controller with base 1s / max 30s:
//! 1, 2, 4, 8, 16, 30, 30, …

use std::time::Duration;

/// Backoff state for one monitor.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
    failures: u32,
}

impl Backoff {
    /// Create a controller; `max` below `base` is raised to `base`.
    pub fn new(base: Duration, max: Duration) -> Self {
        let max = max.max(base);
        Self {
            base,
            max,
            current: base,
            failures: 0,
        }
    }

    /// Reset to the base delay after a fully successful tick.
    pub fn on_success(&mut self) {
        self.current = self.base;
        self.failures = 0;
    }

    /// Return the delay to wait now and double the next one.
    pub fn on_failure(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        self.failures = self.failures.saturating_add(1);
        delay
    }

    /// Delay the next failure would return.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Consecutive failures since the last success.
    pub fn failures(&self) -> u32 {
        self.failures
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(30))
    }
}
