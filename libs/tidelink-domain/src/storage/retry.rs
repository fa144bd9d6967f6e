//! Capped exponential backoff for chunk retries

use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};

/// How many times a chunk is attempted and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base: Duration,
    cap: Duration,
}

impl RetryPolicy {
    /// Create a policy; `max_attempts` includes the first attempt and is at least 1
    pub fn new(max_attempts: u32, base: Duration, cap: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base,
            cap: cap.max(base),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delays to wait before each retry, one per retry allowed
    ///
    /// `base`, then doubling, clamped to the cap. No jitter.
    pub fn delays(&self) -> ExponentialBackoff {
        let retries = usize::try_from(self.max_attempts - 1).unwrap_or(usize::MAX);
        ExponentialBuilder::default()
            .with_min_delay(self.base)
            .with_max_delay(self.cap)
            .with_factor(2.0)
            .with_max_times(retries)
            .build()
    }
}
