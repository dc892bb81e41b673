//! Cache statistics and metrics tracking

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Statistics for cache performance monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries currently tracked by the expiry index
    pub tracked: usize,

    /// Lookups that returned a live entry
    pub hits: u64,

    /// Lookups that found nothing, an expired entry, or an unreadable entry
    pub misses: u64,

    /// Successful writes
    pub inserts: u64,

    /// Explicit invalidations
    pub invalidations: u64,

    /// Expired entries removed, lazily or by a sweep
    pub expirations: u64,

    /// Completed sweep passes
    pub sweeps: u64,
}

impl CacheStats {
    /// Calculate hit rate (hits / total lookups)
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_lookups();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Total number of lookups (hits + misses)
    pub fn total_lookups(&self) -> u64 {
        self.hits + self.misses
    }
}

/// Lock-free counters behind [`CacheStats`].
#[derive(Debug, Clone, Default)]
pub(crate) struct MetricsCollector {
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    inserts: Arc<AtomicU64>,
    invalidations: Arc<AtomicU64>,
    expirations: Arc<AtomicU64>,
    sweeps: Arc<AtomicU64>,
}

impl MetricsCollector {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_expirations(&self, count: u64) {
        self.expirations.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_sweep(&self) {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, tracked: usize) -> CacheStats {
        CacheStats {
            tracked,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates the hit rate calculation.
    ///
    /// Assertions:
    /// - Ensures 80 hits out of 100 lookups yields 0.8.
    /// - Confirms an empty snapshot reports 0.0 instead of dividing by zero.
    #[test]
    fn test_hit_rate_calculation() {
        let stats = CacheStats { hits: 80, misses: 20, ..Default::default() };
        assert!((stats.hit_rate() - 0.8).abs() < 1e-10);
        assert_eq!(stats.total_lookups(), 100);
        assert!(CacheStats::default().hit_rate().abs() < f64::EPSILON);
    }

    #[test]
    fn test_collector_snapshot() {
        let collector = MetricsCollector::default();
        collector.record_hit();
        collector.record_miss();
        collector.record_miss();
        collector.record_insert();
        collector.record_expirations(3);
        collector.record_sweep();

        let stats = collector.clone().snapshot(4);
        assert_eq!(stats.tracked, 4);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.inserts, 1);
        assert_eq!(stats.expirations, 3);
        assert_eq!(stats.sweeps, 1);
    }
}
