//! Pool counters
//!
//! Shared between submitters, the dispatcher and execution tasks. All counters
//! are atomics; `full_since` is the only field behind a lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::worker::elapsed_since;

#[derive(Debug, Default)]
pub(crate) struct PoolMetrics {
    submitted: AtomicU64,
    assigned: AtomicU64,
    rejected: AtomicU64,
    panicked: AtomicU64,
    full_since: Mutex<Option<DateTime<Utc>>>,
}

impl PoolMetrics {
    pub(crate) fn job_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn job_assigned(&self) {
        self.assigned.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn job_panicked(&self) {
        self.panicked.fetch_add(1, Ordering::SeqCst);
    }

    /// A submission made it into the queue; the pool is no longer full
    pub(crate) fn job_queued(&self) {
        *self.full_since.lock() = None;
    }

    /// A non-blocking submission found the queue full
    pub(crate) fn job_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::SeqCst);
        *self.full_since.lock() = Some(Utc::now());
    }

    pub(crate) fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::SeqCst)
    }

    pub(crate) fn assigned(&self) -> u64 {
        self.assigned.load(Ordering::SeqCst)
    }

    pub(crate) fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::SeqCst)
    }

    pub(crate) fn panicked(&self) -> u64 {
        self.panicked.load(Ordering::SeqCst)
    }

    pub(crate) fn full_since(&self) -> Option<DateTime<Utc>> {
        *self.full_since.lock()
    }

    pub(crate) fn full_duration(&self) -> Duration {
        self.full_since().map(elapsed_since).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let metrics = PoolMetrics::default();
        assert_eq!(metrics.submitted(), 0);
        assert_eq!(metrics.assigned(), 0);
        assert_eq!(metrics.rejected(), 0);
        assert_eq!(metrics.panicked(), 0);
        assert!(metrics.full_since().is_none());
        assert_eq!(metrics.full_duration(), Duration::ZERO);
    }

    #[test]
    fn test_rejection_sets_full_since_until_next_queued_job() {
        let metrics = PoolMetrics::default();

        metrics.job_rejected();
        metrics.job_rejected();
        assert_eq!(metrics.rejected(), 2);
        assert!(metrics.full_since().is_some());

        metrics.job_queued();
        assert!(metrics.full_since().is_none());
        assert_eq!(metrics.rejected(), 2);
    }

    #[test]
    fn test_concurrent_increments() {
        let metrics = std::sync::Arc::new(PoolMetrics::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = std::sync::Arc::clone(&metrics);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        metrics.job_submitted();
                        metrics.job_assigned();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(metrics.submitted(), 8000);
        assert_eq!(metrics.assigned(), 8000);
    }
}
