//! Health Evaluation
//!
//! Turns a snapshot of client state into a [`HealthReport`]. Four checks are
//! evaluated; the status is `healthy` when all pass, `unhealthy` when fewer
//! than half pass, and `degraded` otherwise.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::metrics::FeedMetrics;

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All checks pass.
    Healthy,
    /// At least half of the checks pass.
    Degraded,
    /// Fewer than half of the checks pass.
    Unhealthy,
}

impl HealthStatus {
    /// Get the status name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw inputs to the health checks.
#[derive(Debug, Clone, Copy)]
pub struct HealthInputs {
    /// Connection state is `Connected`.
    pub connected: bool,
    /// Circuit breaker is `Closed`.
    pub breaker_closed: bool,
    /// Moving-average processing latency, if any samples exist.
    pub average_latency: Option<Duration>,
    /// Latency at or above which `lowLatency` fails.
    pub latency_threshold: Duration,
    /// A frame was parsed within the recent-message window.
    pub message_within_window: bool,
}

/// Individual check results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthChecks {
    /// Transport is connected.
    pub connected: bool,
    /// Circuit breaker is closed.
    pub breaker_closed: bool,
    /// Average latency is below the threshold.
    pub low_latency: bool,
    /// Messages are arriving on the live connection.
    pub recent_messages: bool,
}

impl HealthChecks {
    /// Number of checks.
    pub const TOTAL: usize = 4;

    /// Evaluate the checks.
    ///
    /// An empty latency window passes `lowLatency`. Traffic only counts as
    /// recent while connected.
    #[must_use]
    pub fn evaluate(inputs: &HealthInputs) -> Self {
        Self {
            connected: inputs.connected,
            breaker_closed: inputs.breaker_closed,
            low_latency: inputs
                .average_latency
                .is_none_or(|avg| avg < inputs.latency_threshold),
            recent_messages: inputs.connected && inputs.message_within_window,
        }
    }

    /// Number of passing checks.
    #[must_use]
    pub fn passed(&self) -> usize {
        [
            self.connected,
            self.breaker_closed,
            self.low_latency,
            self.recent_messages,
        ]
        .into_iter()
        .filter(|passed| *passed)
        .count()
    }

    /// Roll the checks up into a status.
    #[must_use]
    pub fn status(&self) -> HealthStatus {
        let passed = self.passed();
        if passed == Self::TOTAL {
            HealthStatus::Healthy
        } else if passed * 2 < Self::TOTAL {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Degraded
        }
    }
}

/// Health status with the checks and metrics behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Overall status.
    pub status: HealthStatus,
    /// Individual checks.
    pub checks: HealthChecks,
    /// Metrics snapshot at evaluation time.
    pub metrics: FeedMetrics,
}

impl HealthReport {
    /// Evaluate a report.
    #[must_use]
    pub fn evaluate(inputs: &HealthInputs, metrics: FeedMetrics) -> Self {
        let checks = HealthChecks::evaluate(inputs);
        Self {
            status: checks.status(),
            checks,
            metrics,
        }
    }
}
