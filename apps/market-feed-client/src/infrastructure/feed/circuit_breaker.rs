//! Connection Circuit Breaker
//!
//! Gates connection attempts against a failing endpoint.
//!
//! # State Machine
//!
//! ```text
//! CLOSED → OPEN       (consecutive failures >= threshold)
//! OPEN → HALF_OPEN    (reset window elapsed since last failure; one probe)
//! HALF_OPEN → CLOSED  (probe connects)
//! HALF_OPEN → OPEN    (probe fails; last-failure time refreshed)
//! ```
//!
//! The breaker is a plain state struct. Every transition takes `now`, so it
//! runs against the tokio clock and tests can pause and advance time.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Attempts allowed.
    Closed,
    /// Attempts blocked until the reset window elapses.
    Open,
    /// One probe attempt in flight.
    HalfOpen,
}

impl CircuitState {
    /// Numeric encoding for gauges.
    #[must_use]
    pub const fn as_gauge(&self) -> f64 {
        match self {
            Self::Closed => 0.0,
            Self::Open => 1.0,
            Self::HalfOpen => 2.0,
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// Time since the last failure before a probe is allowed.
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
        }
    }
}

/// Consecutive-failure circuit breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: CircuitState,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
}

impl CircuitBreaker {
    /// Create a closed breaker.
    #[must_use]
    pub const fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure: None,
        }
    }

    /// Get the current state.
    #[must_use]
    pub const fn state(&self) -> CircuitState {
        self.state
    }

    /// Get the consecutive failure count.
    #[must_use]
    pub const fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Check if the breaker is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state == CircuitState::Closed
    }

    /// Time left in the open window, if the breaker is open and the window
    /// has not elapsed.
    #[must_use]
    pub fn remaining_open(&self, now: Instant) -> Option<Duration> {
        if self.state != CircuitState::Open {
            return None;
        }
        let last = self.last_failure?;
        let elapsed = now.saturating_duration_since(last);
        let remaining = self.config.reset_timeout.saturating_sub(elapsed);
        (!remaining.is_zero()).then_some(remaining)
    }

    /// Ask to make a connection attempt.
    ///
    /// Moves `Open` to `HalfOpen` once the reset window has elapsed.
    ///
    /// # Errors
    ///
    /// Returns the time left before an attempt is allowed. A probe already
    /// in flight in `HalfOpen` yields `Duration::ZERO`.
    pub fn try_acquire(&mut self, now: Instant) -> Result<(), Duration> {
        match self.state {
            CircuitState::Closed => Ok(()),
            CircuitState::HalfOpen => Err(Duration::ZERO),
            CircuitState::Open => {
                if let Some(remaining) = self.remaining_open(now) {
                    return Err(remaining);
                }
                tracing::info!("Circuit breaker half-open, allowing probe attempt");
                self.state = CircuitState::HalfOpen;
                Ok(())
            }
        }
    }

    /// Record a successful connection.
    pub fn record_success(&mut self) {
        if self.state != CircuitState::Closed {
            tracing::info!(from = %self.state, "Circuit breaker closed");
        }
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
    }

    /// Abandon an in-flight probe without counting it.
    ///
    /// `HalfOpen` returns to `Open` with the previous failure time, so the
    /// next attempt is allowed immediately.
    pub fn release_probe(&mut self) {
        if self.state == CircuitState::HalfOpen {
            self.state = CircuitState::Open;
        }
    }

    /// Record a failed attempt or a lost connection.
    pub fn record_failure(&mut self, now: Instant) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure = Some(now);

        let should_open = match self.state {
            CircuitState::HalfOpen | CircuitState::Open => true,
            CircuitState::Closed => self.consecutive_failures >= self.config.failure_threshold,
        };
        if should_open && self.state != CircuitState::Open {
            tracing::warn!(
                failures = self.consecutive_failures,
                reset_timeout_secs = self.config.reset_timeout.as_secs(),
                "Circuit breaker opened"
            );
        }
        if should_open {
            self.state = CircuitState::Open;
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
