use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounded retry schedule for polling fallbacks ("the contract should exist
/// by now"). Finite by construction so a permanent failure still terminates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self { max_attempts, interval }
    }

    /// Delays to wait before each attempt after the first. Empty when only
    /// one attempt is allowed.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        std::iter::repeat(self.interval).take(self.max_attempts.saturating_sub(1) as usize)
    }

    pub fn is_exhausted(&self, attempts_made: u32) -> bool {
        attempts_made >= self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 10, interval: Duration::from_secs(3) }
    }
}
