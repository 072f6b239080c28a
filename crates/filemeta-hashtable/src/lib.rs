//! Filemeta HashTable - chained hash table
//!
//! This crate provides the associative container that backs the metadata
//! cache: a bucket array of singly linked chains that doubles its capacity
//! once the load factor is exceeded. Hashing and key equality are
//! pluggable; keys implementing [`HashKey`] get a default hash derived from
//! their category (integer, text, boolean or structured).

pub mod hash;
pub mod table;

pub use hash::{HashKey, Json, KeyKind, default_hash};
pub use table::{HashTable, Iter, TableBuilder, TableOptions, TableStats};

/// Errors returned by [`HashTable`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("invalid key: the absent key cannot be stored")]
    InvalidKey,
}
