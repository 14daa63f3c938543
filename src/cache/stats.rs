//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, and evictions.

use serde::Serialize;

use crate::cache::Strategy;

// == Cache Stats ==
/// Running counters kept by each eviction policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals
    pub misses: u64,
    /// Number of entries evicted to make room for new keys
    pub evictions: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Hit rate as a percentage rounded to two decimals.
    ///
    /// Returns 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            let percent = self.hits as f64 / total as f64 * 100.0;
            (percent * 100.0).round() / 100.0
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    // == Reset ==
    /// Zeroes every counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    // == Metrics ==
    /// Builds the public metrics view for a policy.
    pub fn metrics(&self, strategy: Strategy, capacity: usize, size: usize) -> CacheMetrics {
        CacheMetrics {
            strategy,
            capacity,
            size,
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            hit_rate: self.hit_rate(),
        }
    }
}

// == Cache Metrics ==
/// Point-in-time metrics reported by an eviction store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheMetrics {
    pub strategy: Strategy,
    pub capacity: usize,
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Percentage in `[0, 100]`, two decimals
    pub hit_rate: f64,
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.evictions, 0);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        let stats = CacheStats::new();
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_all_hits() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_hit();
        assert_eq!(stats.hit_rate(), 100.0);
    }

    #[test]
    fn test_hit_rate_rounds_to_two_decimals() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_miss();
        stats.record_miss();
        assert_eq!(stats.hit_rate(), 33.33);

        stats.record_hit();
        stats.record_hit();
        assert_eq!(stats.hit_rate(), 60.0);
    }

    #[test]
    fn test_reset() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_miss();
        stats.record_eviction();
        stats.reset();
        assert_eq!(stats, CacheStats::default());
    }

    #[test]
    fn test_metrics_view() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_eviction();

        let metrics = stats.metrics(Strategy::Lfu, 10, 4);
        assert_eq!(metrics.strategy, Strategy::Lfu);
        assert_eq!(metrics.capacity, 10);
        assert_eq!(metrics.size, 4);
        assert_eq!(metrics.evictions, 1);
        assert_eq!(metrics.hit_rate, 100.0);
    }
}
