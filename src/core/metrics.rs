//! Request charge and latency accounting
//!
//! The totals are shared by every operation of a repository, including ones
//! running concurrently, so they are kept in atomics rather than behind a lock.
//! The charge is an `f64` stored as its bit pattern and updated with a
//! compare-and-swap loop.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Running totals for the remote calls made by one repository
#[derive(Debug, Default)]
pub struct RequestMetrics {
    charge_bits: AtomicU64,
    time_nanos: AtomicU64,
    requests: AtomicU64,
}

/// Point-in-time copy of [`RequestMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    /// Request units consumed by successful calls
    pub total_request_charge: f64,

    /// Wall-clock time spent waiting on remote calls
    pub total_request_time: Duration,

    /// Remote calls made, successful or not. A query counts once per page.
    pub request_count: u64,
}

impl RequestMetrics {
    /// Creates zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful call
    pub fn record(&self, request_charge: f64, elapsed: Duration) {
        self.add_charge(request_charge);
        self.add_time(elapsed);
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed call; it costs time but no request units
    pub fn record_failure(&self, elapsed: Duration) {
        self.add_time(elapsed);
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    fn add_charge(&self, request_charge: f64) {
        // Negative or NaN charges would break monotonicity.
        if request_charge.is_nan() || request_charge <= 0.0 {
            return;
        }
        let _ = self
            .charge_bits
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                Some((f64::from_bits(bits) + request_charge).to_bits())
            });
    }

    fn add_time(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        let _ = self
            .time_nanos
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_add(nanos))
            });
    }

    /// Total request units consumed so far
    pub fn total_request_charge(&self) -> f64 {
        f64::from_bits(self.charge_bits.load(Ordering::Acquire))
    }

    /// Total time spent in remote calls so far
    pub fn total_request_time(&self) -> Duration {
        Duration::from_nanos(self.time_nanos.load(Ordering::Acquire))
    }

    /// Number of remote calls made so far
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Copies the current totals
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_request_charge: self.total_request_charge(),
            total_request_time: self.total_request_time(),
            request_count: self.request_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_starts_at_zero() {
        let metrics = RequestMetrics::new();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_record_accumulates() {
        let metrics = RequestMetrics::new();
        metrics.record(5.5, Duration::from_millis(10));
        metrics.record(1.25, Duration::from_millis(5));

        let snapshot = metrics.snapshot();
        assert!((snapshot.total_request_charge - 6.75).abs() < 1e-9);
        assert_eq!(snapshot.total_request_time, Duration::from_millis(15));
        assert_eq!(snapshot.request_count, 2);
    }

    #[test]
    fn test_failure_adds_time_only() {
        let metrics = RequestMetrics::new();
        metrics.record_failure(Duration::from_millis(7));

        assert_eq!(metrics.total_request_charge(), 0.0);
        assert_eq!(metrics.total_request_time(), Duration::from_millis(7));
        assert_eq!(metrics.request_count(), 1);
    }

    #[test]
    fn test_negative_and_nan_charges_ignored() {
        let metrics = RequestMetrics::new();
        metrics.record(-3.0, Duration::ZERO);
        metrics.record(f64::NAN, Duration::ZERO);
        assert_eq!(metrics.total_request_charge(), 0.0);
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let metrics = Arc::new(RequestMetrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        metrics.record(0.5, Duration::from_micros(1));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = metrics.snapshot();
        assert!((snapshot.total_request_charge - 4000.0).abs() < 1e-6);
        assert_eq!(snapshot.total_request_time, Duration::from_millis(8));
        assert_eq!(snapshot.request_count, 8000);
    }
}
