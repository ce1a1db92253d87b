//! Cache Statistics Module
//!
//! Tracks get-or-compute outcomes, including early refreshes and failed writes.

use serde::Serialize;

// == Cache Stats ==
/// Counters describing how `get` calls were served.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Calls served from the store without running the provider
    pub hits: u64,
    /// Calls that ran the provider (absent, expired or early refresh)
    pub misses: u64,
    /// Misses on entries that were still live, triggered by early expiration
    pub early_refreshes: u64,
    /// Computed values successfully persisted
    pub writes: u64,
    /// Computed values that could not be persisted
    pub write_failures: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    /// Records a provider run; `early` marks a refresh of a still-live entry.
    pub fn record_miss(&mut self, early: bool) {
        self.misses += 1;
        if early {
            self.early_refreshes += 1;
        }
    }

    pub fn record_write(&mut self) {
        self.writes += 1;
    }

    pub fn record_write_failure(&mut self) {
        self.write_failures += 1;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats, CacheStats::default());
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.write_failures, 0);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        assert_eq!(CacheStats::new().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss(false);
        assert_eq!(stats.hit_rate(), 0.75);
    }

    #[test]
    fn test_early_refresh_counts_as_miss() {
        let mut stats = CacheStats::new();
        stats.record_miss(true);
        stats.record_miss(false);

        assert_eq!(stats.misses, 2);
        assert_eq!(stats.early_refreshes, 1);
    }

    #[test]
    fn test_write_counters() {
        let mut stats = CacheStats::new();
        stats.record_write();
        stats.record_write_failure();
        stats.record_write_failure();

        assert_eq!(stats.writes, 1);
        assert_eq!(stats.write_failures, 2);
    }
}
