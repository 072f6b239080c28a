//! Metadata cache coordinating the hash table with the record store.
//!
//! The table is keyed by [`StoragePath`] and holds the [`FileMeta`]
//! projection of each active record. All table access goes through one
//! mutex, and the guard is always released before awaiting the store.
//!
//! Store round trips are ordered by a separate async lock. Misses, lookups
//! by id and writes share it; `remove` and `bootstrap` hold it exclusively,
//! so a store read that started before a removal or a reload can never
//! repopulate the table after it.
//!
//! The cache is eventually consistent with the store: a record changed
//! without going through this type is picked up on the next miss for its
//! path or the next [`MetadataCache::bootstrap`].

use crate::stats::{CacheStats, StatsSnapshot};
use filemeta_common::config::CacheConfig;
use filemeta_common::{Error, FileMeta, FileRecord, NewFileRecord, RecordId, Result, StoragePath};
use filemeta_hashtable::{HashTable, TableOptions};
use filemeta_store::RecordStore;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

/// Sizing of the cache table
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CacheOptions {
    pub table: TableOptions,
}

impl From<CacheConfig> for CacheOptions {
    fn from(config: CacheConfig) -> Self {
        Self {
            table: config.into(),
        }
    }
}

/// Write-through, cache-aside metadata cache
pub struct MetadataCache<S: ?Sized = dyn RecordStore> {
    store: Arc<S>,
    table: Mutex<HashTable<StoragePath, FileMeta>>,
    // Shared by populating round trips, exclusive for remove and bootstrap
    round_trips: RwLock<()>,
    stats: CacheStats,
}

impl<S: RecordStore + ?Sized> MetadataCache<S> {
    /// Create an empty cache in front of `store`.
    ///
    /// Call [`Self::bootstrap`] before serving lookups.
    pub fn new(store: Arc<S>, options: CacheOptions) -> Self {
        Self {
            store,
            table: Mutex::new(HashTable::with_options(options.table)),
            round_trips: RwLock::new(()),
            stats: CacheStats::default(),
        }
    }

    /// The backing record store
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Replace the table contents with every active record in the store.
    ///
    /// Returns the number of cached entries. A store failure is a startup
    /// failure and leaves the table as it was. Writes and misses issued
    /// while the reload runs wait for it and land after it.
    pub async fn bootstrap(&self) -> Result<usize> {
        let _exclusive = self.round_trips.write().await;
        let records = self.store.find_all_active().await.map_err(|e| {
            error!("Failed to load records for cache bootstrap: {}", e);
            Error::startup(e)
        })?;

        let count = {
            let mut table = self.table.lock();
            table.clear();
            for record in records {
                table.set(record.storage_path.clone(), FileMeta::from(record))?;
            }
            table.len()
        };

        info!("Loaded {} file records into metadata cache", count);
        Ok(count)
    }

    /// Persist a new record, then cache it under its storage path.
    ///
    /// Nothing is cached if the store rejects the write.
    pub async fn register_write(&self, input: NewFileRecord) -> Result<FileMeta> {
        let _shared = self.round_trips.read().await;
        let path = input.storage_path.clone();
        let record = self.store.create(input).await.map_err(|e| {
            error!("Failed to persist record for '{}': {}", path, e);
            Error::from(e)
        })?;

        let meta = self.populate(&record)?;
        self.stats.record_write();
        debug!("Registered {} at '{}'", meta.id, meta.storage_path);
        Ok(meta)
    }

    /// Look up metadata by storage path, reading the store on a miss
    pub async fn lookup_by_key(&self, path: &StoragePath) -> Result<FileMeta> {
        if let Some(meta) = self.cached_entry(path) {
            return Ok(meta);
        }

        let _shared = self.round_trips.read().await;
        // Populated or evicted while waiting
        if let Some(meta) = self.cached_entry(path) {
            return Ok(meta);
        }

        self.stats.record_miss();
        self.stats.record_store_read();
        debug!("Metadata cache miss for '{}'", path);

        match self.store.find_by_key(path).await? {
            Some(record) => {
                debug!("Populating metadata cache from store for '{}'", path);
                self.populate(&record)
            }
            None => Err(Error::not_found(path.as_str())),
        }
    }

    /// Look up metadata by record id.
    ///
    /// Always reads the store, since the table is keyed by path. Inactive
    /// records are reported as not found.
    pub async fn lookup_by_id(&self, id: RecordId) -> Result<FileMeta> {
        let _shared = self.round_trips.read().await;
        self.stats.record_store_read();
        match self.store.find_by_id(id).await? {
            Some(record) if record.active => self.populate(&record),
            _ => Err(Error::not_found(id.to_string())),
        }
    }

    /// Mark a record inactive and evict its path from the table.
    ///
    /// Returns false if the record is unknown or already inactive.
    pub async fn remove(&self, id: RecordId) -> Result<bool> {
        let _exclusive = self.round_trips.write().await;
        self.stats.record_store_read();
        let Some(record) = self.store.find_by_id(id).await? else {
            return Ok(false);
        };
        if !self.store.mark_inactive(id).await? {
            return Ok(false);
        }

        let evicted = {
            let mut table = self.table.lock();
            let owned = table
                .get(&record.storage_path)
                .is_some_and(|meta| meta.id == id);
            owned && table.delete(&record.storage_path)
        };
        if evicted {
            self.stats.record_eviction();
        }

        debug!("Removed {} at '{}'", id, record.storage_path);
        Ok(true)
    }

    /// Whether `path` is currently cached (no store access)
    pub fn contains(&self, path: &StoragePath) -> bool {
        self.table.lock().has(path)
    }

    /// Snapshot of all cached entries, in table iteration order
    pub fn cached(&self) -> Vec<FileMeta> {
        self.table.lock().values().cloned().collect()
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.lock().is_empty()
    }

    /// Counters for hits, misses, store reads and writes
    pub const fn counters(&self) -> &CacheStats {
        &self.stats
    }

    /// Counters plus table occupancy
    pub fn stats(&self) -> StatsSnapshot {
        let table = self.table.lock().stats();
        self.stats.snapshot(table)
    }

    fn cached_entry(&self, path: &StoragePath) -> Option<FileMeta> {
        let meta = self.table.lock().get(path).cloned()?;
        self.stats.record_hit();
        Some(meta)
    }

    fn populate(&self, record: &FileRecord) -> Result<FileMeta> {
        let meta = FileMeta::from(record);
        self.table
            .lock()
            .set(record.storage_path.clone(), meta.clone())?;
        Ok(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use filemeta_store::{MemoryRecordStore, StoreError, StoreResult};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Record store that counts calls and can be switched to failing
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryRecordStore,
        creates: AtomicUsize,
        find_by_key: AtomicUsize,
        find_all: AtomicUsize,
        find_by_id: AtomicUsize,
        fail: AtomicBool,
    }

    impl CountingStore {
        fn check(&self) -> StoreResult<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StoreError::Io(std::io::Error::other("store unavailable")));
            }
            Ok(())
        }

        fn key_reads(&self) -> usize {
            self.find_by_key.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RecordStore for CountingStore {
        async fn create(&self, input: NewFileRecord) -> StoreResult<FileRecord> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            self.inner.create(input).await
        }

        async fn find_by_key(&self, path: &StoragePath) -> StoreResult<Option<FileRecord>> {
            self.find_by_key.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            self.inner.find_by_key(path).await
        }

        async fn find_all_active(&self) -> StoreResult<Vec<FileRecord>> {
            self.find_all.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            self.inner.find_all_active().await
        }

        async fn find_by_id(&self, id: RecordId) -> StoreResult<Option<FileRecord>> {
            self.find_by_id.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            self.inner.find_by_id(id).await
        }

        async fn mark_inactive(&self, id: RecordId) -> StoreResult<bool> {
            self.check()?;
            self.inner.mark_inactive(id).await
        }
    }

    /// Record store that can hold a key read or a full scan open until
    /// released, after the underlying read has completed
    #[derive(Default)]
    struct GatedStore {
        inner: MemoryRecordStore,
        hold_key_read: AtomicBool,
        hold_scan: AtomicBool,
        reached: Notify,
        release: Notify,
    }

    impl GatedStore {
        async fn pass(&self, gate: &AtomicBool) {
            if gate.swap(false, Ordering::SeqCst) {
                self.reached.notify_one();
                self.release.notified().await;
            }
        }
    }

    #[async_trait]
    impl RecordStore for GatedStore {
        async fn create(&self, input: NewFileRecord) -> StoreResult<FileRecord> {
            self.inner.create(input).await
        }

        async fn find_by_key(&self, path: &StoragePath) -> StoreResult<Option<FileRecord>> {
            let found = self.inner.find_by_key(path).await;
            self.pass(&self.hold_key_read).await;
            found
        }

        async fn find_all_active(&self) -> StoreResult<Vec<FileRecord>> {
            let found = self.inner.find_all_active().await;
            self.pass(&self.hold_scan).await;
            found
        }

        async fn find_by_id(&self, id: RecordId) -> StoreResult<Option<FileRecord>> {
            self.inner.find_by_id(id).await
        }

        async fn mark_inactive(&self, id: RecordId) -> StoreResult<bool> {
            self.inner.mark_inactive(id).await
        }
    }

    fn path(p: &str) -> StoragePath {
        StoragePath::new(p).unwrap()
    }

    fn new_file(p: &str) -> NewFileRecord {
        let path = path(p);
        let name = path.file_name().to_string();
        NewFileRecord::new(name.clone(), name, path, "text/plain", 5)
    }

    fn setup() -> (Arc<CountingStore>, MetadataCache<CountingStore>) {
        let store = Arc::new(CountingStore::default());
        let cache = MetadataCache::new(Arc::clone(&store), CacheOptions::default());
        (store, cache)
    }

    #[tokio::test]
    async fn test_bootstrap_serves_without_key_reads() {
        let (store, cache) = setup();
        store.inner.create(new_file("uploads/x.txt")).await.unwrap();
        store.inner.create(new_file("uploads/y.txt")).await.unwrap();

        assert_eq!(cache.bootstrap().await.unwrap(), 2);
        assert_eq!(store.find_all.load(Ordering::SeqCst), 1);

        let x = cache.lookup_by_key(&path("uploads/x.txt")).await.unwrap();
        assert_eq!(x.storage_path.as_str(), "uploads/x.txt");
        assert_eq!(store.key_reads(), 0);
        assert!(cache.contains(&path("uploads/y.txt")));
    }

    #[tokio::test]
    async fn test_bootstrap_skips_inactive_and_drops_stale_entries() {
        let (store, cache) = setup();
        let x = cache.register_write(new_file("uploads/x.txt")).await.unwrap();
        store.inner.create(new_file("uploads/y.txt")).await.unwrap();

        // Changed behind the cache's back
        store.inner.mark_inactive(x.id).await.unwrap();
        assert!(cache.contains(&x.storage_path));

        assert_eq!(cache.bootstrap().await.unwrap(), 1);
        assert!(!cache.contains(&x.storage_path));
        assert!(cache.contains(&path("uploads/y.txt")));
    }

    #[tokio::test]
    async fn test_bootstrap_failure_is_startup_error() {
        let (store, cache) = setup();
        store.fail.store(true, Ordering::SeqCst);

        let err = cache.bootstrap().await.unwrap_err();
        assert!(matches!(err, Error::Startup(_)));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_cache_aside_populates_on_miss() {
        let (store, cache) = setup();
        cache.bootstrap().await.unwrap();
        store.inner.create(new_file("uploads/late.txt")).await.unwrap();

        let first = cache.lookup_by_key(&path("uploads/late.txt")).await.unwrap();
        let second = cache.lookup_by_key(&path("uploads/late.txt")).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.key_reads(), 1);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.store_reads, 1);
        assert_eq!(stats.table.len, 1);
    }

    #[tokio::test]
    async fn test_write_through_needs_no_reads() {
        let (store, cache) = setup();
        let written = cache.register_write(new_file("uploads/a.txt")).await.unwrap();

        let found = cache.lookup_by_key(&written.storage_path).await.unwrap();
        assert_eq!(found, written);
        assert_eq!(store.key_reads(), 0);
        assert_eq!(store.find_by_id.load(Ordering::SeqCst), 0);
        assert_eq!(cache.stats().writes, 1);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_cache_untouched() {
        let (store, cache) = setup();
        store.fail.store(true, Ordering::SeqCst);

        let err = cache
            .register_write(new_file("uploads/a.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
        assert!(err.is_retryable());
        assert!(cache.is_empty());
        assert_eq!(cache.stats().writes, 0);
    }

    #[tokio::test]
    async fn test_conflicting_write_keeps_existing_entry() {
        let (_store, cache) = setup();
        let first = cache.register_write(new_file("uploads/a.txt")).await.unwrap();

        let err = cache
            .register_write(new_file("uploads/a.txt").with_checksum("other"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));

        let cached = cache.lookup_by_key(&first.storage_path).await.unwrap();
        assert_eq!(cached.id, first.id);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_lookup_missing_is_not_found() {
        let (store, cache) = setup();
        let err = cache
            .lookup_by_key(&path("uploads/none.txt"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(store.key_reads(), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_by_id() {
        let (store, cache) = setup();
        let record = store.inner.create(new_file("uploads/a.txt")).await.unwrap();

        let meta = cache.lookup_by_id(record.id).await.unwrap();
        assert_eq!(meta.id, record.id);
        assert!(cache.contains(&record.storage_path));

        store.inner.mark_inactive(record.id).await.unwrap();
        let err = cache.lookup_by_id(record.id).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(cache.lookup_by_id(RecordId::new()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_remove_evicts_entry() {
        let (store, cache) = setup();
        let meta = cache.register_write(new_file("uploads/a.txt")).await.unwrap();
        cache.register_write(new_file("uploads/b.txt")).await.unwrap();

        assert!(cache.remove(meta.id).await.unwrap());
        assert!(!cache.contains(&meta.storage_path));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().evictions, 1);

        let err = cache.lookup_by_key(&meta.storage_path).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(store.key_reads(), 1);

        assert!(!cache.remove(meta.id).await.unwrap());
        assert!(!cache.remove(RecordId::new()).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_during_miss_stays_removed() {
        let store = Arc::new(GatedStore::default());
        let record = store.inner.create(new_file("uploads/race.txt")).await.unwrap();
        let cache = Arc::new(MetadataCache::new(
            Arc::clone(&store),
            CacheOptions::default(),
        ));
        store.hold_key_read.store(true, Ordering::SeqCst);

        let lookup = tokio::spawn({
            let cache = Arc::clone(&cache);
            let path = record.storage_path.clone();
            async move { cache.lookup_by_key(&path).await }
        });
        // The miss has read the still-active record and is held open
        store.reached.notified().await;

        let remove = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.remove(record.id).await }
        });
        tokio::task::yield_now().await;
        store.release.notify_one();

        assert_eq!(lookup.await.unwrap().unwrap().id, record.id);
        assert!(remove.await.unwrap().unwrap());

        assert!(!cache.contains(&record.storage_path));
        let err = cache.lookup_by_key(&record.storage_path).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_write_during_bootstrap_survives() {
        let store = Arc::new(GatedStore::default());
        store.inner.create(new_file("uploads/x.txt")).await.unwrap();
        let cache = Arc::new(MetadataCache::new(
            Arc::clone(&store),
            CacheOptions::default(),
        ));
        store.hold_scan.store(true, Ordering::SeqCst);

        let bootstrap = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.bootstrap().await }
        });
        store.reached.notified().await;

        let write = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.register_write(new_file("uploads/new.txt")).await }
        });
        tokio::task::yield_now().await;
        store.release.notify_one();

        assert_eq!(bootstrap.await.unwrap().unwrap(), 1);
        let written = write.await.unwrap().unwrap();

        assert!(cache.contains(&written.storage_path));
        assert!(cache.contains(&path("uploads/x.txt")));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_and_reads() {
        let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
        let options = CacheOptions {
            table: TableOptions {
                initial_capacity: 2,
                load_factor: 0.75,
            },
        };
        let cache: Arc<MetadataCache> = Arc::new(MetadataCache::new(store, options));

        let mut handles = Vec::new();
        for i in 0..64 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                let written = cache
                    .register_write(new_file(&format!("bulk/{i}.txt")))
                    .await
                    .unwrap();
                let read = cache.lookup_by_key(&written.storage_path).await.unwrap();
                assert_eq!(read, written);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(cache.len(), 64);
        assert_eq!(cache.cached().len(), 64);
        assert!(cache.stats().table.capacity >= 64);
        assert_eq!(cache.stats().misses, 0);
    }
}
