//! Bounded exponential backoff for reconnection.
//!
//! The connection manager owns one [`Backoff`] per connect sequence. Each
//! failed attempt asks it for the next delay; once `max_attempts` delays
//! have been handed out it returns `None` and the manager settles.

use std::time::Duration;

/// Reconnection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Whether to reconnect at all after a drop or failed attempt.
    pub enabled: bool,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Maximum number of retries before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(5_000),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// A policy that never retries.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_attempts: 0,
        }
    }

    /// Delay before retry number `attempt` (1-based):
    /// `min(base * 2^(attempt - 1), max)`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Retry counter over a [`ReconnectPolicy`].
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: ReconnectPolicy,
    attempts: u32,
}

impl Backoff {
    /// Starts a fresh sequence.
    #[must_use]
    pub const fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    /// Consumes one retry and returns how long to wait before it, or
    /// `None` when reconnection is disabled or the ceiling is reached.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.policy.enabled || self.attempts >= self.policy.max_attempts {
            return None;
        }
        self.attempts += 1;
        Some(self.policy.delay_for(self.attempts))
    }

    /// Resets after a successful connection.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Retries consumed since the last reset.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Returns `true` once no further retry will be granted.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        !self.policy.enabled || self.attempts >= self.policy.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy {
            enabled: true,
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(5_000),
            max_attempts: 5,
        }
    }

    #[test]
    fn delays_double_up_to_cap() {
        let mut backoff = Backoff::new(policy());
        let delays: Vec<u128> = std::iter::from_fn(|| backoff.next_delay())
            .map(|d| d.as_millis())
            .collect();
        assert_eq!(delays, vec![1_000, 2_000, 4_000, 5_000, 5_000]);
        assert!(backoff.is_exhausted());
        assert_eq!(backoff.attempts(), 5);
    }

    #[test]
    fn reset_restarts_sequence() {
        let mut backoff = Backoff::new(policy());
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(1_000)));
    }

    #[test]
    fn disabled_policy_never_retries() {
        let mut backoff = Backoff::new(ReconnectPolicy::disabled());
        assert!(backoff.is_exhausted());
        assert_eq!(backoff.next_delay(), None);
    }

    #[test]
    fn huge_attempt_numbers_saturate() {
        assert_eq!(policy().delay_for(1_000), Duration::from_millis(5_000));
    }
}
