//! Reconnection Policy
//!
//! Exponential backoff with jitter for feed reconnection, bounded by an
//! attempt budget.
//!
//! The delay for attempt `n` (1-based) is
//! `min(base * 2^(min(n, 8) - 1), max_delay)` plus up to `jitter_factor` of
//! that exponential term, and never more than `max_delay`.

use std::time::Duration;

use rand::Rng;

/// Exponent stops growing after this attempt.
pub const MAX_BACKOFF_EXPONENT_ATTEMPT: u32 = 8;

/// Configuration for reconnection behavior.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Absolute cap on any delay.
    pub max_delay: Duration,
    /// Jitter as a fraction of the exponential term (0.1 = up to +10%).
    pub jitter_factor: f64,
    /// Retries allowed before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter_factor: 0.1,
            max_attempts: 10,
        }
    }
}

/// Reconnection policy with an attempt counter.
///
/// # Example
///
/// ```rust
/// use market_feed_client::infrastructure::feed::reconnect::{ReconnectConfig, ReconnectPolicy};
/// use std::time::Duration;
///
/// let mut policy = ReconnectPolicy::new(ReconnectConfig::default());
///
/// let delay = policy.next_delay().unwrap();
/// assert!(delay >= Duration::from_secs(1));
/// assert_eq!(policy.attempt_count(), 1);
///
/// // Successful connection
/// policy.reset();
/// assert_eq!(policy.attempt_count(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempt_count: u32,
}

impl ReconnectPolicy {
    /// Create a new reconnection policy.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempt_count: 0,
        }
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &ReconnectConfig {
        &self.config
    }

    /// Consume one attempt and return its delay.
    ///
    /// Returns `None` once the attempt budget is spent.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.should_retry() {
            return None;
        }
        self.attempt_count += 1;
        let sample: f64 = rand::rng().random_range(0.0..=1.0);
        Some(self.delay_for_attempt(self.attempt_count, sample))
    }

    /// Delay for a 1-based attempt with a jitter sample in `[0, 1]`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32, jitter_sample: f64) -> Duration {
        let exponent = attempt.clamp(1, MAX_BACKOFF_EXPONENT_ATTEMPT) - 1;
        let exponential = self
            .config
            .base_delay
            .saturating_mul(1 << exponent)
            .min(self.config.max_delay);

        let fraction = (self.config.jitter_factor * jitter_sample.clamp(0.0, 1.0)).max(0.0);
        let jitter = exponential.mul_f64(fraction);

        exponential.saturating_add(jitter).min(self.config.max_delay)
    }

    /// Reset the policy after a successful connection.
    pub const fn reset(&mut self) {
        self.attempt_count = 0;
    }

    /// Get the current attempt count.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Get the attempt budget.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// Check if another retry is allowed.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        self.attempt_count < self.config.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn policy(base_ms: u64, max_ms: u64, jitter: f64, attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy::new(ReconnectConfig {
            base_delay: Duration::from_millis(base_ms),
            max_delay: Duration::from_millis(max_ms),
            jitter_factor: jitter,
            max_attempts: attempts,
        })
    }

    #[test]
    fn default_config_values() {
        let config = ReconnectConfig::default();
        assert_eq!(config.base_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!((config.jitter_factor - 0.1).abs() < f64::EPSILON);
        assert_eq!(config.max_attempts, 10);
    }

    #[test]
    fn exponential_backoff_without_jitter() {
        let p = policy(100, 60_000, 0.0, 10);
        assert_eq!(p.delay_for_attempt(1, 0.0), Duration::from_millis(100));
        assert_eq!(p.delay_for_attempt(2, 0.0), Duration::from_millis(200));
        assert_eq!(p.delay_for_attempt(3, 0.0), Duration::from_millis(400));
        assert_eq!(p.delay_for_attempt(4, 0.0), Duration::from_millis(800));
    }

    #[test]
    fn exponent_stops_at_eighth_attempt() {
        let p = policy(100, 600_000, 0.0, 20);
        let eighth = p.delay_for_attempt(8, 0.0);
        assert_eq!(eighth, Duration::from_millis(12_800));
        assert_eq!(p.delay_for_attempt(9, 0.0), eighth);
        assert_eq!(p.delay_for_attempt(20, 0.0), eighth);
    }

    #[test]
    fn delay_capped_including_jitter() {
        let p = policy(1000, 30_000, 0.1, 10);
        assert_eq!(p.delay_for_attempt(6, 1.0), Duration::from_secs(30));
        assert_eq!(p.delay_for_attempt(8, 1.0), Duration::from_secs(30));
    }

    #[test]
    fn jitter_adds_at_most_ten_percent() {
        let p = policy(1000, 30_000, 0.1, 10);
        assert_eq!(p.delay_for_attempt(1, 0.0), Duration::from_millis(1000));
        assert_eq!(p.delay_for_attempt(1, 1.0), Duration::from_millis(1100));
    }

    #[test]
    fn next_delay_consumes_budget() {
        let mut p = policy(100, 1000, 0.1, 3);
        assert!(p.next_delay().is_some());
        assert!(p.next_delay().is_some());
        assert!(p.next_delay().is_some());
        assert_eq!(p.attempt_count(), 3);
        assert!(p.next_delay().is_none());
        assert!(!p.should_retry());

        p.reset();
        assert!(p.should_retry());
        assert_eq!(p.attempt_count(), 0);
    }

    #[test]
    fn random_jitter_bounds() {
        for _ in 0..100 {
            let mut p = policy(1000, 30_000, 0.1, 1);
            let millis = p.next_delay().unwrap().as_millis();
            assert!((1000..=1100).contains(&millis), "delay {millis}ms out of range");
        }
    }

    proptest! {
        #[test]
        fn delay_monotonic_and_capped(
            base_ms in 1u64..5_000,
            max_ms in 1u64..120_000,
            jitter in 0.0f64..0.5,
            sample in 0.0f64..=1.0,
        ) {
            let p = policy(base_ms, max_ms, jitter, 20);
            let mut previous = Duration::ZERO;
            for attempt in 1..=20 {
                let delay = p.delay_for_attempt(attempt, sample);
                prop_assert!(delay >= previous);
                prop_assert!(delay <= Duration::from_millis(max_ms));
                previous = delay;
            }
        }
    }
}
