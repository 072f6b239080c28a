//! Record store trait

use crate::store::StoreResult;
use async_trait::async_trait;
use filemeta_common::{FileRecord, NewFileRecord, RecordId, StoragePath};

/// Durable persistence for file records.
///
/// Calls may block on I/O; callers that need timeouts or cancellation apply
/// them around these futures.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a new record, assigning its id and timestamps.
    ///
    /// Fails with [`crate::StoreError::PathConflict`] if an active record
    /// already uses the storage path.
    async fn create(&self, input: NewFileRecord) -> StoreResult<FileRecord>;

    /// Find the active record stored at `path`
    async fn find_by_key(&self, path: &StoragePath) -> StoreResult<Option<FileRecord>>;

    /// All active records
    async fn find_all_active(&self) -> StoreResult<Vec<FileRecord>>;

    /// Find a record by id, active or not
    async fn find_by_id(&self, id: RecordId) -> StoreResult<Option<FileRecord>>;

    /// Mark a record inactive.
    ///
    /// Returns false if the record is unknown or already inactive.
    async fn mark_inactive(&self, id: RecordId) -> StoreResult<bool>;
}
