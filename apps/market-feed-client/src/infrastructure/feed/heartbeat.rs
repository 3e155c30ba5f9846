//! Heartbeat Monitor
//!
//! Detects silent connection death. A single deadline is re-armed each
//! time a heartbeat frame arrives; if the deadline passes first, the
//! connection is treated as failed.
//!
//! The monitor owns no task. The connection's session loop sleeps until
//! [`HeartbeatMonitor::deadline`] alongside its inbound reads, so the timer
//! dies with the session.

use std::time::Duration;

use tokio::time::Instant;

/// Close code sent when the heartbeat deadline passes.
pub const HEARTBEAT_TIMEOUT_CLOSE_CODE: u16 = 4000;

/// Close reason sent when the heartbeat deadline passes.
pub const HEARTBEAT_TIMEOUT_REASON: &str = "heartbeat-timeout";

/// Configuration for heartbeat behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Maximum silence between heartbeat frames.
    pub timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

/// Deadline tracker for one connection.
#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    timeout: Duration,
    deadline: Instant,
    beats: u64,
}

impl HeartbeatMonitor {
    /// Start monitoring at `now`.
    #[must_use]
    pub fn start(config: HeartbeatConfig, now: Instant) -> Self {
        Self {
            timeout: config.timeout,
            deadline: now + config.timeout,
            beats: 0,
        }
    }

    /// Record a heartbeat and push the deadline out.
    pub fn record_heartbeat(&mut self, now: Instant) {
        self.beats += 1;
        self.deadline = now + self.timeout;
    }

    /// When the connection is considered dead.
    #[must_use]
    pub const fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Check if the deadline has passed.
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    /// Heartbeats seen on this connection.
    #[must_use]
    pub const fn beats(&self) -> u64 {
        self.beats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_after_timeout_without_beats() {
        let start = Instant::now();
        let monitor = HeartbeatMonitor::start(HeartbeatConfig::default(), start);

        assert!(!monitor.is_expired(start + Duration::from_secs(29)));
        assert!(monitor.is_expired(start + Duration::from_secs(30)));
    }

    #[test]
    fn heartbeat_rearms_deadline() {
        let start = Instant::now();
        let mut monitor = HeartbeatMonitor::start(
            HeartbeatConfig {
                timeout: Duration::from_secs(10),
            },
            start,
        );

        let beat = start + Duration::from_secs(8);
        monitor.record_heartbeat(beat);

        assert_eq!(monitor.deadline(), beat + Duration::from_secs(10));
        assert!(!monitor.is_expired(start + Duration::from_secs(15)));
        assert_eq!(monitor.beats(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_drives_sleep() {
        let monitor = HeartbeatMonitor::start(
            HeartbeatConfig {
                timeout: Duration::from_secs(5),
            },
            Instant::now(),
        );

        tokio::time::sleep_until(monitor.deadline()).await;
        assert!(monitor.is_expired(Instant::now()));
    }
}
