//! Domain Layer - Core feed types and business logic.
//!
//! This layer contains the connection state, market data payloads and
//! subscription bookkeeping with no I/O. All types here are pure Rust with
//! serialization support.

/// Connection lifecycle state.
pub mod connection;

/// Message counters and latency window.
pub mod metrics;

/// Market data update types (quotes, trades, depth, news, heartbeats).
pub mod streaming;

/// Subscription canonicalization and registry.
pub mod subscription;
