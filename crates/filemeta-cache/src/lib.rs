//! Filemeta Cache - in-memory index over the record store
//!
//! [`MetadataCache`] keeps a chained hash table keyed by storage path in
//! step with a [`filemeta_store::RecordStore`]. Reads are cache-aside and
//! writes are write-through; the store stays the source of truth.

pub mod cache;
pub mod stats;

pub use cache::{CacheOptions, MetadataCache};
pub use stats::{CacheStats, StatsSnapshot};
