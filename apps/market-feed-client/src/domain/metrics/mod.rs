//! Feed Metrics
//!
//! Counters and a bounded rolling latency window for the message path,
//! plus the read-only snapshot handed to callers and health checks.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default number of latency samples kept.
pub const DEFAULT_LATENCY_WINDOW: usize = 100;

// =============================================================================
// Latency Window
// =============================================================================

/// Rolling window of the most recent processing-latency samples.
#[derive(Debug, Clone)]
pub struct LatencyWindow {
    samples: VecDeque<Duration>,
    capacity: usize,
    total: Duration,
}

impl LatencyWindow {
    /// Create a window holding at most `capacity` samples.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            total: Duration::ZERO,
        }
    }

    /// Add a sample, evicting the oldest when full.
    pub fn record(&mut self, sample: Duration) {
        if self.samples.len() == self.capacity
            && let Some(evicted) = self.samples.pop_front()
        {
            self.total = self.total.saturating_sub(evicted);
        }
        self.samples.push_back(sample);
        self.total += sample;
    }

    /// Simple moving average over the window.
    #[must_use]
    pub fn average(&self) -> Option<Duration> {
        let count = u32::try_from(self.samples.len()).ok().filter(|n| *n > 0)?;
        Some(self.total / count)
    }

    /// Number of samples held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if no samples have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Default for LatencyWindow {
    fn default() -> Self {
        Self::new(DEFAULT_LATENCY_WINDOW)
    }
}

// =============================================================================
// Message Statistics
// =============================================================================

/// Inbound/outbound message accounting for one client.
#[derive(Debug, Clone, Default)]
pub struct MessageStats {
    received: u64,
    dropped: u64,
    outbound_dropped: u64,
    latency: LatencyWindow,
    last_message: Option<Instant>,
    last_message_at: Option<DateTime<Utc>>,
}

impl MessageStats {
    /// Create empty statistics with the given latency window size.
    #[must_use]
    pub fn new(latency_window: usize) -> Self {
        Self {
            latency: LatencyWindow::new(latency_window),
            ..Self::default()
        }
    }

    /// Count a successfully parsed inbound frame.
    pub fn record_received(&mut self, now: Instant) {
        self.received += 1;
        self.last_message = Some(now);
        self.last_message_at = Some(Utc::now());
    }

    /// Count a malformed inbound frame.
    pub const fn record_dropped(&mut self) {
        self.dropped += 1;
    }

    /// Count an outbound frame evicted from the queue.
    pub const fn record_outbound_dropped(&mut self) {
        self.outbound_dropped += 1;
    }

    /// Record a processing-latency sample.
    pub fn record_latency(&mut self, sample: Duration) {
        self.latency.record(sample);
    }

    /// Average processing latency.
    #[must_use]
    pub fn average_latency(&self) -> Option<Duration> {
        self.latency.average()
    }

    /// Check if a message was received within `window` of `now`.
    #[must_use]
    pub fn received_within(&self, now: Instant, window: Duration) -> bool {
        self.last_message
            .is_some_and(|last| now.saturating_duration_since(last) <= window)
    }

    /// Build a snapshot. Connection-level fields are supplied by the caller.
    #[must_use]
    pub fn snapshot(
        &self,
        reconnect_attempts: u32,
        subscriptions: usize,
        queued_outbound: usize,
    ) -> FeedMetrics {
        FeedMetrics {
            messages_received: self.received,
            messages_dropped: self.dropped,
            outbound_dropped: self.outbound_dropped,
            average_latency_ms: self
                .average_latency()
                .map_or(0.0, |d| d.as_secs_f64() * 1000.0),
            latency_samples: self.latency.len(),
            last_message_at: self.last_message_at,
            reconnect_attempts,
            subscriptions,
            queued_outbound,
        }
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// Point-in-time metrics for one client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedMetrics {
    /// Inbound frames parsed and dispatched.
    pub messages_received: u64,
    /// Inbound frames that failed to parse.
    pub messages_dropped: u64,
    /// Outbound frames evicted from the queue while disconnected.
    pub outbound_dropped: u64,
    /// Moving average of processing latency, in milliseconds.
    pub average_latency_ms: f64,
    /// Number of samples behind the average.
    pub latency_samples: usize,
    /// Wall-clock time of the last parsed frame.
    pub last_message_at: Option<DateTime<Utc>>,
    /// Retry attempts since the last successful connect.
    pub reconnect_attempts: u32,
    /// Registered subscriptions.
    pub subscriptions: usize,
    /// Outbound frames waiting for a connection.
    pub queued_outbound: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_average_tracks_last_samples() {
        let mut window = LatencyWindow::new(3);
        assert!(window.average().is_none());

        window.record(Duration::from_millis(10));
        window.record(Duration::from_millis(20));
        window.record(Duration::from_millis(30));
        assert_eq!(window.average(), Some(Duration::from_millis(20)));

        // Evicts 10ms.
        window.record(Duration::from_millis(40));
        assert_eq!(window.len(), 3);
        assert_eq!(window.average(), Some(Duration::from_millis(30)));
    }

    #[test]
    fn window_never_exceeds_capacity() {
        let mut window = LatencyWindow::new(DEFAULT_LATENCY_WINDOW);
        for i in 0..250 {
            window.record(Duration::from_micros(i));
        }
        assert_eq!(window.len(), DEFAULT_LATENCY_WINDOW);
    }

    #[test]
    fn recent_message_window() {
        let mut stats = MessageStats::new(10);
        let start = Instant::now();
        assert!(!stats.received_within(start, Duration::from_secs(30)));

        stats.record_received(start);
        assert!(stats.received_within(start + Duration::from_secs(30), Duration::from_secs(30)));
        assert!(!stats.received_within(start + Duration::from_secs(31), Duration::from_secs(30)));
    }

    #[test]
    fn snapshot_carries_counters() {
        let mut stats = MessageStats::new(10);
        stats.record_received(Instant::now());
        stats.record_dropped();
        stats.record_outbound_dropped();
        stats.record_latency(Duration::from_millis(2));

        let snapshot = stats.snapshot(3, 2, 1);
        assert_eq!(snapshot.messages_received, 1);
        assert_eq!(snapshot.messages_dropped, 1);
        assert_eq!(snapshot.outbound_dropped, 1);
        assert!((snapshot.average_latency_ms - 2.0).abs() < 1e-9);
        assert_eq!(snapshot.reconnect_attempts, 3);
        assert_eq!(snapshot.subscriptions, 2);
        assert_eq!(snapshot.queued_outbound, 1);
        assert!(snapshot.last_message_at.is_some());
    }
}
