//! Request metrics.
//!
//! In-process counters back the /status endpoint; the same events go through
//! the `metrics` facade for Prometheus export.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use metrics::{counter, histogram};
use serde::Serialize;

#[derive(Debug, Default)]
pub struct BotMetrics {
    requests: AtomicU64,
    delivered: AtomicU64,
    failures: AtomicU64,
    retries: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub delivered: u64,
    pub failures: u64,
    pub retries: u64,
}

impl BotMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, product: &'static str) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        counter!("requests_total", "product" => product).increment(1);
    }

    pub fn record_delivered(&self, duration_ms: u64) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        counter!("requests_delivered_total").increment(1);
        histogram!("request_duration_ms").record(duration_ms as f64);
    }

    pub fn record_failure(&self, kind: &'static str) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        counter!("request_failures_total", "kind" => kind).increment(1);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
        counter!("request_retries_total").increment(1);
    }

    pub fn record_render(&self, duration_ms: u64) {
        histogram!("render_duration_ms").record(duration_ms as f64);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }
}

/// Timer guard for measuring operation duration.
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_tracks_events() {
        let metrics = BotMetrics::new();
        metrics.record_request("turbulence");
        metrics.record_request("windshear");
        metrics.record_delivered(125);
        metrics.record_failure("data_timeout");
        metrics.record_retry();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests, 2);
        assert_eq!(snapshot.delivered, 1);
        assert_eq!(snapshot.failures, 1);
        assert_eq!(snapshot.retries, 1);
    }
}
