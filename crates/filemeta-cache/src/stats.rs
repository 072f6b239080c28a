//! Cache counters

use filemeta_hashtable::TableStats;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache statistics
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    /// Reads that reached the record store
    pub store_reads: AtomicU64,
    /// Successful write-through inserts
    pub writes: AtomicU64,
    pub evictions: AtomicU64,
}

impl CacheStats {
    /// Calculate hit ratio (0.0 to 1.0)
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed) as f64;
        let misses = self.misses.load(Ordering::Relaxed) as f64;
        let total = hits + misses;
        if total == 0.0 { 0.0 } else { hits / total }
    }

    /// Reset all statistics
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.store_reads.store(0, Ordering::Relaxed);
        self.writes.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_store_read(&self) {
        self.store_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters together with table occupancy
    pub fn snapshot(&self, table: TableStats) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            store_reads: self.store_reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            hit_ratio: self.hit_ratio(),
            table,
        }
    }
}

/// Serializable view of [`CacheStats`]
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub store_reads: u64,
    pub writes: u64,
    pub evictions: u64,
    pub hit_ratio: f64,
    pub table: TableStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_ratio() {
        let stats = CacheStats::default();
        assert!(stats.hit_ratio().abs() < f64::EPSILON);

        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        assert!((stats.hit_ratio() - 0.75).abs() < f64::EPSILON);

        stats.reset();
        assert_eq!(stats.hits.load(Ordering::Relaxed), 0);
        assert!(stats.hit_ratio().abs() < f64::EPSILON);
    }

    #[test]
    fn test_snapshot_copies_counters() {
        let stats = CacheStats::default();
        stats.record_store_read();
        stats.record_write();
        stats.record_eviction();

        let snap = stats.snapshot(TableStats::default());
        assert_eq!(snap.store_reads, 1);
        assert_eq!(snap.writes, 1);
        assert_eq!(snap.evictions, 1);
        assert_eq!(snap.table.len, 0);
    }
}
