//! Persistent record store backed by redb.
//!
//! Records are bincode-encoded under their id, with a second table mapping
//! storage paths of active records to ids. Every write is one redb write
//! transaction. Transactions are blocking, so each call runs on the tokio
//! blocking pool.

use crate::record::RecordStore;
use crate::tables;
use async_trait::async_trait;
use filemeta_common::{FileRecord, NewFileRecord, RecordId, StoragePath, unix_timestamp};
use redb::{Database, ReadableTable};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Error type for record store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::DatabaseError),
    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("redb transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("storage path already in use: {0}")]
    PathConflict(String),
}

impl From<redb::TransactionError> for StoreError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Transaction(Box::new(e))
    }
}

impl From<StoreError> for filemeta_common::Error {
    fn from(e: StoreError) -> Self {
        Self::persistence(e)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistent record store backed by redb.
pub struct RedbRecordStore {
    db: Arc<Database>,
}

impl RedbRecordStore {
    /// Open (or create) the redb database at the given path.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Create all tables eagerly so later read txns don't fail
        let write_txn = db.begin_write()?;
        {
            let _t = write_txn.open_table(tables::FILES)?;
            let _t = write_txn.open_table(tables::FILE_PATHS)?;
        }
        write_txn.commit()?;

        info!("Opened record store at {}", path.display());
        Ok(Self { db: Arc::new(db) })
    }

    /// Run a blocking closure against the database on the blocking pool
    async fn blocking<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> StoreResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(&db)).await?
    }
}

fn load_record(db: &Database, id: &str) -> StoreResult<Option<FileRecord>> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(tables::FILES)?;
    match table.get(id)? {
        Some(val) => Ok(Some(bincode::deserialize(val.value())?)),
        None => Ok(None),
    }
}

#[async_trait]
impl RecordStore for RedbRecordStore {
    async fn create(&self, input: NewFileRecord) -> StoreResult<FileRecord> {
        self.blocking(move |db| {
            let write_txn = db.begin_write()?;
            let record = {
                let mut paths = write_txn.open_table(tables::FILE_PATHS)?;
                if paths.get(input.storage_path.as_str())?.is_some() {
                    return Err(StoreError::PathConflict(input.storage_path.to_string()));
                }

                let record = input.into_record(RecordId::new(), unix_timestamp());
                let id = record.id.to_string();
                let bytes = bincode::serialize(&record)?;

                let mut files = write_txn.open_table(tables::FILES)?;
                files.insert(id.as_str(), bytes.as_slice())?;
                paths.insert(record.storage_path.as_str(), id.as_str())?;
                record
            };
            write_txn.commit()?;

            debug!("Persisted record {} at '{}'", record.id, record.storage_path);
            Ok(record)
        })
        .await
    }

    async fn find_by_key(&self, path: &StoragePath) -> StoreResult<Option<FileRecord>> {
        let path = path.clone();
        self.blocking(move |db| {
            let id = {
                let read_txn = db.begin_read()?;
                let paths = read_txn.open_table(tables::FILE_PATHS)?;
                paths.get(path.as_str())?.map(|v| v.value().to_string())
            };
            match id {
                Some(id) => Ok(load_record(db, &id)?.filter(|record| record.active)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn find_all_active(&self) -> StoreResult<Vec<FileRecord>> {
        self.blocking(|db| {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(tables::FILES)?;
            let mut result = Vec::new();
            for entry in table.iter()? {
                let entry = entry?;
                let key = entry.0.value().to_string();
                match bincode::deserialize::<FileRecord>(entry.1.value()) {
                    Ok(record) if record.active => result.push(record),
                    Ok(_) => {}
                    Err(e) => error!("Failed to decode file record '{}': {}", key, e),
                }
            }
            Ok(result)
        })
        .await
    }

    async fn find_by_id(&self, id: RecordId) -> StoreResult<Option<FileRecord>> {
        self.blocking(move |db| load_record(db, &id.to_string()))
            .await
    }

    async fn mark_inactive(&self, id: RecordId) -> StoreResult<bool> {
        self.blocking(move |db| {
            let key = id.to_string();
            let write_txn = db.begin_write()?;
            {
                let mut files = write_txn.open_table(tables::FILES)?;
                let existing = files.get(key.as_str())?.map(|v| v.value().to_vec());
                let Some(bytes) = existing else {
                    return Ok(false);
                };

                let mut record: FileRecord = bincode::deserialize(&bytes)?;
                if !record.active {
                    return Ok(false);
                }
                record.active = false;
                record.updated_at = unix_timestamp();
                let bytes = bincode::serialize(&record)?;
                files.insert(key.as_str(), bytes.as_slice())?;

                // Only drop the path index if it still points at this record
                let mut paths = write_txn.open_table(tables::FILE_PATHS)?;
                let indexed = paths
                    .get(record.storage_path.as_str())?
                    .is_some_and(|v| v.value() == key);
                if indexed {
                    paths.remove(record.storage_path.as_str())?;
                }
            }
            write_txn.commit()?;

            debug!("Marked record {} inactive", id);
            Ok(true)
        })
        .await
    }
}
