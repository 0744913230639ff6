//! Connect retry policy for the socket consumer.

use std::time::Duration;

/// Bounded, fixed-delay retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRetry {
    /// Total connect attempts, including the first.
    pub max_attempts: usize,
    /// Pause between attempts.
    pub delay: Duration,
}

impl Default for ConnectRetry {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(1),
        }
    }
}

impl ConnectRetry {
    /// Creates a policy with `max_attempts` attempts `delay` apart.
    #[must_use]
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Sets the number of attempts (at least one).
    #[must_use]
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }
}

/// Tracks attempts against a [`ConnectRetry`] policy.
#[derive(Debug)]
pub struct RetryState {
    policy: ConnectRetry,
    attempts: usize,
}

impl RetryState {
    /// Creates a fresh state for `policy`.
    #[must_use]
    pub fn new(policy: ConnectRetry) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    /// Records a failed attempt and returns the pause before the next one.
    ///
    /// Returns `None` once every attempt is used up.
    pub fn on_failure(&mut self) -> Option<Duration> {
        self.attempts += 1;
        if self.attempts >= self.policy.max_attempts {
            return None;
        }
        Some(self.policy.delay)
    }

    /// Returns the number of failed attempts so far.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Returns true if another attempt is allowed.
    #[must_use]
    pub fn can_retry(&self) -> bool {
        self.attempts < self.policy.max_attempts
    }
}
