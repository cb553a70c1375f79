//! Metrics hooks for the cache layer.
//!
//! Implement [`CacheMetrics`] to feed cache behaviour into your monitoring system:
//!
//! ```ignore
//! use modern_kit::observability::CacheMetrics;
//! use std::time::Duration;
//!
//! struct PrometheusMetrics;
//!
//! impl CacheMetrics for PrometheusMetrics {
//!     fn record_hit(&self, _key: &str, _duration: Duration) {
//!         // counter!("cache_hits").inc();
//!     }
//! }
//!
//! let service = CachedCrudService::with_metrics(repo, backend, settings, Box::new(PrometheusMetrics));
//! ```
//!
//! Methods left unimplemented fall back to `log` output at debug/warn level. Services use
//! [`NoOpMetrics`] unless told otherwise. [`CounterMetrics`] keeps in-process counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Trait for cache metrics collection.
pub trait CacheMetrics: Send + Sync {
    /// Record a cache hit.
    fn record_hit(&self, key: &str, duration: Duration) {
        debug!("Cache HIT: {} took {:?}", key, duration);
    }

    /// Record a cache miss.
    fn record_miss(&self, key: &str, duration: Duration) {
        debug!("Cache MISS: {} took {:?}", key, duration);
    }

    /// Record a cache write.
    fn record_set(&self, key: &str, duration: Duration) {
        debug!("Cache SET: {} took {:?}", key, duration);
    }

    /// Record a cache eviction.
    fn record_delete(&self, key: &str, duration: Duration) {
        debug!("Cache DELETE: {} took {:?}", key, duration);
    }

    /// Record a swallowed cache-layer failure.
    fn record_error(&self, key: &str, error: &str) {
        warn!("Cache ERROR for {}: {}", key, error);
    }
}

/// Default metrics implementation (no-op).
#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl CacheMetrics for NoOpMetrics {
    fn record_hit(&self, _key: &str, _duration: Duration) {}
    fn record_miss(&self, _key: &str, _duration: Duration) {}
    fn record_set(&self, _key: &str, _duration: Duration) {}
    fn record_delete(&self, _key: &str, _duration: Duration) {}
    fn record_error(&self, _key: &str, _error: &str) {}
}

/// Point-in-time copy of [`CounterMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub errors: u64,
}

/// Atomic in-process counters. Clones share the same counters.
#[derive(Clone, Default)]
pub struct CounterMetrics {
    counters: Arc<Counters>,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    errors: AtomicU64,
}

impl CounterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let c = &self.counters;
        MetricsSnapshot {
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            sets: c.sets.load(Ordering::Relaxed),
            deletes: c.deletes.load(Ordering::Relaxed),
            errors: c.errors.load(Ordering::Relaxed),
        }
    }
}

impl CacheMetrics for CounterMetrics {
    fn record_hit(&self, _key: &str, _duration: Duration) {
        self.counters.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self, _key: &str, _duration: Duration) {
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_set(&self, _key: &str, _duration: Duration) {
        self.counters.sets.fetch_add(1, Ordering::Relaxed);
    }

    fn record_delete(&self, _key: &str, _duration: Duration) {
        self.counters.deletes.fetch_add(1, Ordering::Relaxed);
    }

    fn record_error(&self, key: &str, error: &str) {
        warn!("Cache ERROR for {}: {}", key, error);
        self.counters.errors.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_metrics() {
        let metrics = NoOpMetrics;
        metrics.record_hit("key", Duration::from_secs(1));
        metrics.record_miss("key", Duration::from_secs(2));
        metrics.record_error("key", "boom");
    }

    #[test]
    fn test_counter_metrics_shared_between_clones() {
        let metrics = CounterMetrics::new();
        let handle = metrics.clone();

        metrics.record_hit("a", Duration::ZERO);
        metrics.record_hit("a", Duration::ZERO);
        handle.record_miss("b", Duration::ZERO);
        handle.record_set("b", Duration::ZERO);
        handle.record_error("b", "corrupt entry");

        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                hits: 2,
                misses: 1,
                sets: 1,
                deletes: 0,
                errors: 1,
            }
        );
    }
}
