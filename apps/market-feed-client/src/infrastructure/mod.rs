//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the feed client itself, the concrete transport
//! adapters for the port defined in the application layer, and the
//! operational surfaces around them.

/// Configuration loading.
pub mod config;

/// Resilient feed client (connection manager, breaker, backoff, routing).
pub mod feed;

/// Health check HTTP endpoint.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// OpenTelemetry tracing integration.
pub mod telemetry;

/// Transport adapters (WebSocket, in-process channel).
pub mod transport;
