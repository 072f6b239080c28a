//! Configuration types for filemeta
//!
//! Configuration is read from a TOML file. Every section and field has a
//! default, so a missing file or a partial file is valid.

use crate::error::{Error, Result};
use filemeta_hashtable::TableOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration for filemeta
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Durable record store
    pub store: StoreConfig,
    /// In-memory metadata cache
    pub cache: CacheConfig,
    /// Upload placement
    pub uploads: UploadConfig,
    /// Logging
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults when
    /// the file does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
            .map_err(|e| Error::Configuration(format!("{}: {}", path.display(), e)))
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Configuration(e.to_string()))
    }
}

/// Durable store configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the redb database file
    pub path: PathBuf,
    /// Keep records in memory only (nothing survives a restart)
    pub in_memory: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./filemeta-data/meta.redb"),
            in_memory: false,
        }
    }
}

/// Metadata cache configuration
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Initial bucket count of the cache table
    pub initial_capacity: usize,
    /// Load factor that triggers table growth
    pub load_factor: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let options = TableOptions::default();
        Self {
            initial_capacity: options.initial_capacity,
            load_factor: options.load_factor,
        }
    }
}

impl From<CacheConfig> for TableOptions {
    fn from(config: CacheConfig) -> Self {
        Self {
            initial_capacity: config.initial_capacity,
            load_factor: config.load_factor,
        }
    }
}

/// Upload placement configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Directory that storage paths are relative to
    pub root: PathBuf,
    /// Folder used when an upload names none
    pub default_folder: String,
    /// Base URL prepended to storage paths, if files are served publicly
    pub public_base_url: Option<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./uploads"),
            default_folder: "files".to_string(),
            public_base_url: None,
        }
    }
}

/// Logging configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.cache.initial_capacity, 16);
        assert!((config.cache.load_factor - 0.75).abs() < f64::EPSILON);
        assert_eq!(config.uploads.default_folder, "files");
        assert!(!config.store.in_memory);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml(
            r#"
            [cache]
            initial_capacity = 1024

            [uploads]
            root = "/srv/uploads"
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.initial_capacity, 1024);
        assert!((config.cache.load_factor - 0.75).abs() < f64::EPSILON);
        assert_eq!(config.uploads.root, PathBuf::from("/srv/uploads"));
        assert_eq!(config.store, StoreConfig::default());
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::from_toml("[cache]\ninitial_capacity = \"lots\"").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filemeta.toml");
        std::fs::write(&path, "[store]\nin_memory = true\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert!(config.store.in_memory);
    }

    #[test]
    fn test_cache_config_into_table_options() {
        let options = TableOptions::from(CacheConfig {
            initial_capacity: 4,
            load_factor: 0.5,
        });
        assert_eq!(options.initial_capacity, 4);
        assert!((options.load_factor - 0.5).abs() < f64::EPSILON);
    }
}
