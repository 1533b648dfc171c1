//! Capped exponential backoff between announce attempts.

use std::time::Duration;

/// Bounds for retry delays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
}

/// Doubling delay sequence starting at `base`, capped at `max`.
#[derive(Debug)]
pub(crate) struct Backoff {
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub(crate) fn new(policy: BackoffPolicy) -> Self {
        Self {
            max: policy.max,
            current: std::cmp::min(policy.base, policy.max),
        }
    }

    pub(crate) fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        let next = self.current.checked_mul(2).unwrap_or(self.max);
        self.current = std::cmp::min(next, self.max);
        delay
    }
}
