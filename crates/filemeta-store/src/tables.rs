//! Redb table definitions for persistent file records.

use redb::TableDefinition;

// Key: record id, Value: bincode-encoded FileRecord (active and inactive)
pub const FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("files");

// Key: storage path, Value: record id. Only active records are indexed.
pub const FILE_PATHS: TableDefinition<&str, &str> = TableDefinition::new("file_paths");
