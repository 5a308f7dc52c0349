//! Session Metrics
//!
//! Per-session counters for monitoring framing and login health.
//!
//! Uses atomic counters so a [`Metrics`] can be shared with a task that logs
//! it periodically while the session keeps running.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

#[derive(Debug)]
pub struct Metrics {
    /// Complete messages decoded from the transport
    pub frames_received: AtomicU64,
    /// Messages written to the transport
    pub frames_sent: AtomicU64,
    /// Raw bytes handed to `receive`
    pub bytes_received: AtomicU64,
    /// Raw bytes passed to `io_write`
    pub bytes_sent: AtomicU64,
    pub keepalives_received: AtomicU64,
    pub keepalives_sent: AtomicU64,
    /// State changes reported to the callback
    pub state_transitions: AtomicU64,
    /// Framing and state machine faults
    pub protocol_errors: AtomicU64,
    /// `io_write` failures
    pub write_failures: AtomicU64,
    /// Post-login messages nobody had a route for
    pub unhandled_messages: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            frames_received: AtomicU64::new(0),
            frames_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            keepalives_received: AtomicU64::new(0),
            keepalives_sent: AtomicU64::new(0),
            state_transitions: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            unhandled_messages: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record bytes arriving from the transport
    pub fn bytes_in(&self, byte_count: u64) {
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful write
    pub fn frame_sent(&self, byte_count: u64) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn keepalive_received(&self) {
        self.keepalives_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn keepalive_sent(&self) {
        self.keepalives_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn state_transition(&self) {
        self.state_transitions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn unhandled_message(&self) {
        self.unhandled_messages.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            keepalives_received: self.keepalives_received.load(Ordering::Relaxed),
            keepalives_sent: self.keepalives_sent.load(Ordering::Relaxed),
            state_transitions: self.state_transitions.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            unhandled_messages: self.unhandled_messages.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            frames_received = snapshot.frames_received,
            frames_sent = snapshot.frames_sent,
            bytes_received = snapshot.bytes_received,
            bytes_sent = snapshot.bytes_sent,
            keepalives_received = snapshot.keepalives_received,
            keepalives_sent = snapshot.keepalives_sent,
            state_transitions = snapshot.state_transitions,
            protocol_errors = snapshot.protocol_errors,
            write_failures = snapshot.write_failures,
            unhandled_messages = snapshot.unhandled_messages,
            uptime_seconds = snapshot.uptime_seconds,
            "Session metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub frames_received: u64,
    pub frames_sent: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub keepalives_received: u64,
    pub keepalives_sent: u64,
    pub state_transitions: u64,
    pub protocol_errors: u64,
    pub write_failures: u64,
    pub unhandled_messages: u64,
    pub uptime_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = Metrics::new();
        metrics.frame_sent(20);
        metrics.frame_sent(12);
        metrics.keepalive_sent();
        metrics.bytes_in(7);

        let snap = metrics.snapshot();
        assert_eq!(snap.frames_sent, 2);
        assert_eq!(snap.bytes_sent, 33);
        assert_eq!(snap.keepalives_sent, 1);
        assert_eq!(snap.bytes_received, 7);
        assert_eq!(snap.protocol_errors, 0);
    }
}
