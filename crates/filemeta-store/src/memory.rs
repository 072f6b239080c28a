//! In-memory record store
//!
//! Same semantics as [`crate::RedbRecordStore`] without durability. Used by
//! tests and `--in-memory` runs.

use crate::record::RecordStore;
use crate::store::{StoreError, StoreResult};
use async_trait::async_trait;
use filemeta_common::{FileRecord, NewFileRecord, RecordId, StoragePath, unix_timestamp};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
struct Inner {
    records: HashMap<RecordId, FileRecord>,
    // active records only
    paths: HashMap<StoragePath, RecordId>,
}

/// Record store kept entirely in process memory
#[derive(Default)]
pub struct MemoryRecordStore {
    inner: RwLock<Inner>,
}

impl MemoryRecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in any state
    pub fn record_count(&self) -> usize {
        self.inner.read().records.len()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create(&self, input: NewFileRecord) -> StoreResult<FileRecord> {
        let mut inner = self.inner.write();
        if inner.paths.contains_key(&input.storage_path) {
            return Err(StoreError::PathConflict(input.storage_path.to_string()));
        }

        let record = input.into_record(RecordId::new(), unix_timestamp());
        inner.paths.insert(record.storage_path.clone(), record.id);
        inner.records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_key(&self, path: &StoragePath) -> StoreResult<Option<FileRecord>> {
        let inner = self.inner.read();
        Ok(inner
            .paths
            .get(path)
            .and_then(|id| inner.records.get(id))
            .filter(|record| record.active)
            .cloned())
    }

    async fn find_all_active(&self) -> StoreResult<Vec<FileRecord>> {
        Ok(self
            .inner
            .read()
            .records
            .values()
            .filter(|record| record.active)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: RecordId) -> StoreResult<Option<FileRecord>> {
        Ok(self.inner.read().records.get(&id).cloned())
    }

    async fn mark_inactive(&self, id: RecordId) -> StoreResult<bool> {
        let mut inner = self.inner.write();
        let Some(record) = inner.records.get_mut(&id) else {
            return Ok(false);
        };
        if !record.active {
            return Ok(false);
        }
        record.active = false;
        record.updated_at = unix_timestamp();
        let path = record.storage_path.clone();

        if inner.paths.get(&path) == Some(&id) {
            inner.paths.remove(&path);
        }
        Ok(true)
    }
}
