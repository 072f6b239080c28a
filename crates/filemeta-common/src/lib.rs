//! Filemeta Common - Shared types and utilities
//!
//! This crate provides the record types, error definitions, configuration
//! and checksum utilities used across all filemeta components.

pub mod checksum;
pub mod config;
pub mod error;
pub mod types;

pub use checksum::{Checksum, ChecksumCalculator};
pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
