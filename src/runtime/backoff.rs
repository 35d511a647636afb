//! # Fibonacci Backoff
//!
//! Retry delays for dispatcher-level errors (status-write conflicts, backend
//! construction failures). These sit outside the reconcile timer's
//! application-level cadence: the timer schedules routine reconciles, this
//! backoff spaces out retries when the dispatcher itself errors.
//!
//! Fibonacci growth backs off more gently than doubling. With a 30s floor
//! and a 600s ceiling the sequence runs 30s, 30s, 60s, 90s, 150s, 240s,
//! 390s, 600s (capped).

use std::time::Duration;

/// Per-resource Fibonacci backoff state
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min: Duration,
    max: Duration,
    prev: Duration,
    current: Duration,
}

impl FibonacciBackoff {
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max,
            prev: Duration::ZERO,
            current: min,
        }
    }

    /// Current delay, advancing the sequence for the next call. Capped at
    /// the maximum once the sequence grows past it.
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current;
        let next = self.prev.saturating_add(self.current);
        self.prev = self.current;
        self.current = next.min(self.max);
        result
    }

    /// Restart the sequence after a successful reconcile
    pub fn reset(&mut self) {
        self.prev = Duration::ZERO;
        self.current = self.min;
    }
}
