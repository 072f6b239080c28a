//! Filemeta Store - durable file records
//!
//! The record store is the source of truth for file metadata. The cache in
//! `filemeta-cache` sits in front of any [`RecordStore`].

pub mod memory;
pub mod record;
pub mod store;
pub mod tables;

// Re-exports
pub use memory::MemoryRecordStore;
pub use record::RecordStore;
pub use store::{RedbRecordStore, StoreError, StoreResult};
