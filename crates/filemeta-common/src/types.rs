//! Core type definitions for filemeta
//!
//! This module defines the record identifiers, the canonical storage path
//! used as the cache key, and the durable and cached forms of file metadata.

use derive_more::{Display, From, Into};
use filemeta_hashtable::{HashKey, KeyKind};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a file record
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, From, Into)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Generate a new random record ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Canonical location of a stored file, relative to the upload root.
///
/// The durable store and the metadata cache both key records by this path.
/// Separators are normalized to `/` and leading separators are dropped, so
/// `\uploads\a.txt` and `/uploads/a.txt` name the same record.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[serde(transparent)]
#[display("{_0}")]
pub struct StoragePath(String);

impl StoragePath {
    /// Maximum length in bytes
    pub const MAX_LEN: usize = 1024;

    /// Create a normalized storage path
    pub fn new(path: impl AsRef<str>) -> Result<Self, StoragePathError> {
        let normalized = Self::normalize(path.as_ref());
        Self::validate(&normalized)?;
        Ok(Self(normalized))
    }

    /// Create without normalization or validation (internal use only)
    #[must_use]
    pub fn new_unchecked(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Join a folder and a file name
    pub fn join(folder: &str, name: &str) -> Result<Self, StoragePathError> {
        let folder = folder.trim_matches(|c| c == '/' || c == '\\');
        if folder.is_empty() {
            Self::new(name)
        } else {
            Self::new(format!("{folder}/{name}"))
        }
    }

    /// Get the path as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Everything before the last segment, empty for top-level files
    #[must_use]
    pub fn folder(&self) -> &str {
        self.0.rsplit_once('/').map_or("", |(folder, _)| folder)
    }

    fn normalize(path: &str) -> String {
        path.replace('\\', "/")
            .split('/')
            .filter(|segment| !segment.is_empty() && *segment != ".")
            .collect::<Vec<_>>()
            .join("/")
    }

    fn validate(path: &str) -> Result<(), StoragePathError> {
        if path.is_empty() {
            return Err(StoragePathError::Empty);
        }

        if path.len() > Self::MAX_LEN {
            return Err(StoragePathError::TooLong);
        }

        // Paths must stay under the upload root
        if path.split('/').any(|segment| segment == "..") {
            return Err(StoragePathError::ParentSegment);
        }

        Ok(())
    }
}

impl fmt::Debug for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoragePath({:?})", self.0)
    }
}

impl FromStr for StoragePath {
    type Err = StoragePathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl HashKey for StoragePath {
    fn kind(&self) -> KeyKind<'_> {
        KeyKind::Text(Cow::Borrowed(&self.0))
    }
}

/// Errors that can occur when creating a storage path
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoragePathError {
    #[error("storage path cannot be empty")]
    Empty,
    #[error("storage path must be at most 1024 bytes")]
    TooLong,
    #[error("storage path cannot contain '..' segments")]
    ParentSegment,
}

/// Durable file record as held by the record store
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: RecordId,
    /// Optional owner or foreign reference
    pub owner_id: Option<String>,
    /// Name the file was uploaded with
    pub original_name: String,
    /// Name of the file on disk
    pub storage_name: String,
    pub content_type: String,
    pub size: u64,
    pub storage_path: StoragePath,
    pub url: Option<String>,
    /// Hex-encoded SHA-256 of the content
    pub checksum: Option<String>,
    pub metadata: BTreeMap<String, String>,
    /// Unix seconds
    pub created_at: u64,
    /// Unix seconds
    pub updated_at: u64,
    pub active: bool,
}

/// Fields supplied when registering a new file
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFileRecord {
    pub owner_id: Option<String>,
    pub original_name: String,
    pub storage_name: String,
    pub content_type: String,
    pub size: u64,
    pub storage_path: StoragePath,
    pub url: Option<String>,
    pub checksum: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl NewFileRecord {
    /// Create a new record input for an already placed file
    pub fn new(
        original_name: impl Into<String>,
        storage_name: impl Into<String>,
        storage_path: StoragePath,
        content_type: impl Into<String>,
        size: u64,
    ) -> Self {
        Self {
            owner_id: None,
            original_name: original_name.into(),
            storage_name: storage_name.into(),
            content_type: content_type.into(),
            size,
            storage_path,
            url: None,
            checksum: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Set owner reference
    #[must_use]
    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    /// Set public URL
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set content checksum
    #[must_use]
    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }

    /// Add a metadata attribute
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Materialize a durable record with store-assigned fields
    #[must_use]
    pub fn into_record(self, id: RecordId, now: u64) -> FileRecord {
        FileRecord {
            id,
            owner_id: self.owner_id,
            original_name: self.original_name,
            storage_name: self.storage_name,
            content_type: self.content_type,
            size: self.size,
            storage_path: self.storage_path,
            url: self.url,
            checksum: self.checksum,
            metadata: self.metadata,
            created_at: now,
            updated_at: now,
            active: true,
        }
    }
}

/// Cached projection of a [`FileRecord`].
///
/// Never the source of truth; it is rebuilt from the durable record
/// whenever the cache is populated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub id: RecordId,
    pub original_name: String,
    pub storage_name: String,
    pub content_type: String,
    pub size: u64,
    pub storage_path: StoragePath,
    pub url: Option<String>,
    pub checksum: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub created_at: u64,
}

impl From<&FileRecord> for FileMeta {
    fn from(record: &FileRecord) -> Self {
        Self {
            id: record.id,
            original_name: record.original_name.clone(),
            storage_name: record.storage_name.clone(),
            content_type: record.content_type.clone(),
            size: record.size,
            storage_path: record.storage_path.clone(),
            url: record.url.clone(),
            checksum: record.checksum.clone(),
            metadata: record.metadata.clone(),
            created_at: record.created_at,
        }
    }
}

impl From<FileRecord> for FileMeta {
    fn from(record: FileRecord) -> Self {
        Self {
            id: record.id,
            original_name: record.original_name,
            storage_name: record.storage_name,
            content_type: record.content_type,
            size: record.size,
            storage_path: record.storage_path,
            url: record.url,
            checksum: record.checksum,
            metadata: record.metadata,
            created_at: record.created_at,
        }
    }
}

/// Current time as unix seconds
#[must_use]
pub fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use filemeta_hashtable::default_hash;

    #[test]
    fn test_record_id_roundtrip_string() {
        let id = RecordId::new();
        let parsed: RecordId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<RecordId>().is_err());
    }

    #[test]
    fn test_storage_path_normalization() {
        let a = StoragePath::new("/uploads/a.txt").unwrap();
        let b = StoragePath::new("uploads\\a.txt").unwrap();
        let c = StoragePath::new("uploads//./a.txt").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.as_str(), "uploads/a.txt");
        assert_eq!(a.file_name(), "a.txt");
        assert_eq!(a.folder(), "uploads");
    }

    #[test]
    fn test_storage_path_validation() {
        assert_eq!(StoragePath::new(""), Err(StoragePathError::Empty));
        assert_eq!(StoragePath::new("///"), Err(StoragePathError::Empty));
        assert_eq!(
            StoragePath::new("uploads/../etc/passwd"),
            Err(StoragePathError::ParentSegment)
        );
        assert_eq!(
            StoragePath::new("a".repeat(2000)),
            Err(StoragePathError::TooLong)
        );
    }

    #[test]
    fn test_storage_path_join() {
        let path = StoragePath::join("/images/", "cat.png").unwrap();
        assert_eq!(path.as_str(), "images/cat.png");
        let top = StoragePath::join("", "cat.png").unwrap();
        assert_eq!(top.as_str(), "cat.png");
        assert_eq!(top.folder(), "");
    }

    #[test]
    fn test_storage_path_hashes_as_text() {
        let path = StoragePath::new("uploads/x.txt").unwrap();
        assert_eq!(default_hash(&path), default_hash("uploads/x.txt"));
    }

    #[test]
    fn test_new_record_into_record() {
        let path = StoragePath::new("uploads/x.txt").unwrap();
        let input = NewFileRecord::new("x.txt", "abc-x.txt", path.clone(), "text/plain", 12)
            .with_owner("user-1")
            .with_checksum("deadbeef")
            .with_metadata("source", "cli");

        let id = RecordId::new();
        let record = input.into_record(id, 1_700_000_000);
        assert_eq!(record.id, id);
        assert_eq!(record.storage_path, path);
        assert_eq!(record.created_at, record.updated_at);
        assert!(record.active);
        assert_eq!(record.metadata.get("source").map(String::as_str), Some("cli"));

        let meta = FileMeta::from(&record);
        assert_eq!(meta.id, id);
        assert_eq!(meta.checksum.as_deref(), Some("deadbeef"));
        assert_eq!(meta, FileMeta::from(record));
    }
}
