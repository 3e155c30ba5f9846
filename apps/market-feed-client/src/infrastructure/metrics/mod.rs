//! Prometheus Metrics Module
//!
//! Mirrors the feed client's in-process counters to Prometheus.
//!
//! # Metrics Categories
//!
//! - **Messages**: Inbound frames by type, malformed frames, evicted outbound frames
//! - **Connection**: Connection state, breaker state, reconnect attempts
//! - **Subscriptions**: Registered subscription count
//! - **Latency**: Receipt-to-dispatch processing time
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port. Recording
//! before [`init_metrics`] is a no-op.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::domain::connection::ConnectionState;
use crate::infrastructure::feed::circuit_breaker::CircuitState;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Later calls return the handle installed by the first one.
///
/// # Errors
///
/// Returns an error if the recorder cannot be installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Message counters
    describe_counter!(
        "market_feed_messages_received_total",
        "Inbound frames parsed and dispatched, by message type"
    );
    describe_counter!(
        "market_feed_messages_dropped_total",
        "Inbound frames that failed to parse"
    );
    describe_counter!(
        "market_feed_outbound_dropped_total",
        "Outbound frames evicted from the queue while disconnected"
    );

    // Connection
    describe_gauge!(
        "market_feed_connection_state",
        "Connection state (0=disconnected, 1=connecting, 2=connected, 3=reconnecting, 4=failed)"
    );
    describe_gauge!(
        "market_feed_circuit_breaker_state",
        "Circuit breaker state (0=closed, 1=open, 2=half-open)"
    );
    describe_counter!(
        "market_feed_reconnects_total",
        "Scheduled reconnection attempts"
    );
    describe_counter!(
        "market_feed_connection_failures_total",
        "Failed connects and lost connections, by cause"
    );

    // Subscriptions
    describe_gauge!(
        "market_feed_subscriptions",
        "Registered subscriptions"
    );

    // Latency
    describe_histogram!(
        "market_feed_message_processing_seconds",
        "Time from frame receipt to dispatch completion"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a parsed inbound frame.
pub fn record_message_received(message_type: &'static str) {
    counter!(
        "market_feed_messages_received_total",
        "message_type" => message_type
    )
    .increment(1);
}

/// Record a malformed inbound frame.
pub fn record_message_dropped() {
    counter!("market_feed_messages_dropped_total").increment(1);
}

/// Record an evicted outbound frame.
pub fn record_outbound_dropped() {
    counter!("market_feed_outbound_dropped_total").increment(1);
}

/// Update the connection state gauge.
pub fn set_connection_state(state: ConnectionState) {
    gauge!("market_feed_connection_state").set(state.as_gauge());
}

/// Update the circuit breaker gauge.
pub fn set_circuit_state(state: CircuitState) {
    gauge!("market_feed_circuit_breaker_state").set(state.as_gauge());
}

/// Record a scheduled reconnection attempt.
pub fn record_reconnect() {
    counter!("market_feed_reconnects_total").increment(1);
}

/// Record a connection failure.
pub fn record_connection_failure(cause: &'static str) {
    counter!(
        "market_feed_connection_failures_total",
        "cause" => cause
    )
    .increment(1);
}

/// Update the subscription gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_subscriptions(count: usize) {
    gauge!("market_feed_subscriptions").set(count as f64);
}

/// Record message processing duration.
pub fn record_processing_duration(duration: Duration) {
    histogram!("market_feed_message_processing_seconds").record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_noop() {
        record_message_received("quote");
        record_message_dropped();
        record_outbound_dropped();
        set_connection_state(ConnectionState::Connected);
        set_circuit_state(CircuitState::Open);
        record_reconnect();
        record_connection_failure("timeout");
        set_subscriptions(3);
        record_processing_duration(Duration::from_micros(250));
    }
}
