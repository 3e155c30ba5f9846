//! Application Services
//!
//! Services that evaluate domain state without touching I/O.
//!
//! - `health`: Rolls connection, breaker, latency and traffic checks into a
//!   single health status.

/// Health evaluation.
pub mod health;

pub use health::{HealthChecks, HealthInputs, HealthReport, HealthStatus};
