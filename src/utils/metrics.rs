//! Observability and Metrics
//!
//! Counters for multiboot sessions and link traffic.
//!
//! Uses atomic counters so a monitoring thread can read them while a session
//! runs on another thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Global metrics collector for multiboot operations
#[derive(Debug)]
pub struct Metrics {
    /// Sessions started
    pub sessions_total: AtomicU64,
    /// Sessions that reached DONE
    pub sessions_success: AtomicU64,
    /// Sessions that ended with an error
    pub sessions_failed: AtomicU64,
    /// Words exchanged over the link
    pub words_exchanged: AtomicU64,
    /// Exchanges spent inside polling loops
    pub poll_attempts: AtomicU64,
    /// Encrypted payload words sent
    pub payload_words: AtomicU64,
    /// Polling loops that gave up
    pub peer_timeouts: AtomicU64,
    /// Failed exchanges
    pub transport_errors: AtomicU64,
    /// Sessions where the peer echoed a different checksum
    pub checksum_mismatches: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            sessions_total: AtomicU64::new(0),
            sessions_success: AtomicU64::new(0),
            sessions_failed: AtomicU64::new(0),
            words_exchanged: AtomicU64::new(0),
            poll_attempts: AtomicU64::new(0),
            payload_words: AtomicU64::new(0),
            peer_timeouts: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            checksum_mismatches: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn session_started(&self) {
        self.sessions_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_succeeded(&self) {
        self.sessions_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_failed(&self) {
        self.sessions_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn word_exchanged(&self) {
        self.words_exchanged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn poll_attempt(&self) {
        self.poll_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn payload_word(&self) {
        self.payload_words.fetch_add(1, Ordering::Relaxed);
    }

    pub fn peer_timeout(&self) {
        self.peer_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn checksum_mismatch(&self) {
        self.checksum_mismatches.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sessions_total: self.sessions_total.load(Ordering::Relaxed),
            sessions_success: self.sessions_success.load(Ordering::Relaxed),
            sessions_failed: self.sessions_failed.load(Ordering::Relaxed),
            words_exchanged: self.words_exchanged.load(Ordering::Relaxed),
            poll_attempts: self.poll_attempts.load(Ordering::Relaxed),
            payload_words: self.payload_words.load(Ordering::Relaxed),
            peer_timeouts: self.peer_timeouts.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            checksum_mismatches: self.checksum_mismatches.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            sessions_total = snapshot.sessions_total,
            sessions_success = snapshot.sessions_success,
            sessions_failed = snapshot.sessions_failed,
            words_exchanged = snapshot.words_exchanged,
            poll_attempts = snapshot.poll_attempts,
            payload_words = snapshot.payload_words,
            peer_timeouts = snapshot.peer_timeouts,
            transport_errors = snapshot.transport_errors,
            checksum_mismatches = snapshot.checksum_mismatches,
            uptime_seconds = snapshot.uptime_seconds,
            "Multiboot metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub sessions_total: u64,
    pub sessions_success: u64,
    pub sessions_failed: u64,
    pub words_exchanged: u64,
    pub poll_attempts: u64,
    pub payload_words: u64,
    pub peer_timeouts: u64,
    pub transport_errors: u64,
    pub checksum_mismatches: u64,
    pub uptime_seconds: u64,
}

static METRICS: once_cell::sync::Lazy<Metrics> = once_cell::sync::Lazy::new(Metrics::new);

/// Get the global metrics instance
pub fn global_metrics() -> &'static Metrics {
    &METRICS
}

/// Timer for measuring phase duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_ms = duration.as_millis(),
            "Operation completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_snapshot() {
        let metrics = Metrics::new();
        metrics.session_started();
        metrics.word_exchanged();
        metrics.word_exchanged();
        metrics.poll_attempt();
        metrics.payload_word();
        metrics.session_succeeded();

        let snap = metrics.snapshot();
        assert_eq!(snap.sessions_total, 1);
        assert_eq!(snap.sessions_success, 1);
        assert_eq!(snap.sessions_failed, 0);
        assert_eq!(snap.words_exchanged, 2);
        assert_eq!(snap.poll_attempts, 1);
        assert_eq!(snap.payload_words, 1);
    }
}
