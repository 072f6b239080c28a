//! Filemeta CLI - file metadata administration
//!
//! Opens the record store, bootstraps the metadata cache from it and runs
//! one command. Output is JSON on stdout.

mod ingest;
mod tree;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use filemeta_cache::MetadataCache;
use filemeta_common::{Checksum, Config, RecordId, StoragePath};
use filemeta_store::{MemoryRecordStore, RecordStore, RedbRecordStore};
use ingest::{IngestRequest, Ingestor};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "filemeta-cli")]
#[command(about = "Filemeta admin CLI")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "filemeta.toml", env = "FILEMETA_CONFIG")]
    config: PathBuf,

    /// Log level (overrides config file)
    #[arg(long)]
    log_level: Option<String>,

    /// Record store database path (overrides config file)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Upload root directory (overrides config file)
    #[arg(long)]
    uploads: Option<PathBuf>,

    /// Keep records in memory only
    #[arg(long)]
    in_memory: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Copy a file under the upload root and register it
    Put {
        /// Source file
        source: PathBuf,
        /// Destination folder
        #[arg(short, long)]
        folder: Option<String>,
        /// Original name to record (defaults to the source file name)
        #[arg(short, long)]
        name: Option<String>,
        /// Content type (guessed from the extension by default)
        #[arg(short = 't', long)]
        content_type: Option<String>,
        /// Owner reference
        #[arg(long)]
        owner: Option<String>,
        /// Extra metadata as key=value, repeatable
        #[arg(short, long = "meta", value_parser = parse_key_value)]
        metadata: Vec<(String, String)>,
    },
    /// Look up a file by storage path
    Get {
        /// Storage path relative to the upload root
        path: String,
    },
    /// Look up a file by record id
    Show {
        /// Record ID
        id: String,
    },
    /// List all cached files
    List,
    /// Mark a file record inactive
    Rm {
        /// Record ID
        id: String,
        /// Also delete the placed file
        #[arg(long)]
        purge: bool,
    },
    /// Print the directory tree under the upload root
    Tree {
        /// Directory to walk (defaults to the upload root)
        root: Option<PathBuf>,
    },
    /// Recompute a placed file's checksum and compare with its record
    Verify {
        /// Storage path relative to the upload root
        path: String,
    },
    /// Show cache statistics
    Stats,
}

#[derive(Serialize)]
struct VerifyReport<'a> {
    storage_path: &'a StoragePath,
    expected: Option<&'a str>,
    actual: String,
    ok: bool,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{s}'"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load config file if it exists
    let mut config = Config::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    // Merge CLI args with config file (CLI takes precedence)
    if let Some(db) = args.db {
        config.store.path = db;
    }
    if let Some(uploads) = args.uploads {
        config.uploads.root = uploads;
    }
    if args.in_memory {
        config.store.in_memory = true;
    }
    let log_level = args.log_level.unwrap_or_else(|| config.logging.level.clone());

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    debug!("Config file: {}", args.config.display());

    let store: Arc<dyn RecordStore> = if config.store.in_memory {
        warn!("Using in-memory record store, nothing will be persisted");
        Arc::new(MemoryRecordStore::new())
    } else {
        Arc::new(
            RedbRecordStore::open(&config.store.path)
                .with_context(|| format!("opening {}", config.store.path.display()))?,
        )
    };

    let cache = MetadataCache::new(store, config.cache.into());
    let loaded = cache.bootstrap().await?;
    info!("Metadata cache ready with {} entries", loaded);

    match args.command {
        Commands::Put {
            source,
            folder,
            name,
            content_type,
            owner,
            metadata,
        } => {
            let request = IngestRequest {
                source,
                folder,
                name,
                content_type,
                owner,
                metadata: metadata.into_iter().collect::<BTreeMap<_, _>>(),
            };
            let meta = Ingestor::new(&cache, &config.uploads)
                .ingest(request)
                .await?;
            print_json(&meta)?;
        }
        Commands::Get { path } => {
            let path = StoragePath::new(&path)?;
            print_json(&cache.lookup_by_key(&path).await?)?;
        }
        Commands::Show { id } => {
            let id: RecordId = id.parse().context("invalid record id")?;
            print_json(&cache.lookup_by_id(id).await?)?;
        }
        Commands::List => {
            let mut files = cache.cached();
            files.sort_by(|a, b| a.storage_path.cmp(&b.storage_path));
            print_json(&files)?;
        }
        Commands::Rm { id, purge } => {
            let id: RecordId = id.parse().context("invalid record id")?;
            let meta = if purge {
                Some(cache.lookup_by_id(id).await?)
            } else {
                None
            };
            let removed = cache.remove(id).await?;
            if let Some(meta) = meta.filter(|_| removed) {
                let placed = config.uploads.root.join(meta.storage_path.as_str());
                tokio::fs::remove_file(&placed)
                    .await
                    .with_context(|| format!("deleting {}", placed.display()))?;
            }
            print_json(&serde_json::json!({ "id": id.to_string(), "removed": removed }))?;
        }
        Commands::Tree { root } => {
            let root = root.unwrap_or_else(|| config.uploads.root.clone());
            let tree = tree::build_tree(&root)
                .with_context(|| format!("walking {}", root.display()))?;
            print_json(&tree)?;
        }
        Commands::Verify { path } => {
            let path = StoragePath::new(&path)?;
            let meta = cache.lookup_by_key(&path).await?;
            let placed = config.uploads.root.join(path.as_str());
            let data = tokio::fs::read(&placed)
                .await
                .with_context(|| format!("reading {}", placed.display()))?;
            let actual = Checksum::compute(&data);
            let ok = meta
                .checksum
                .as_deref()
                .is_some_and(|expected| actual.matches_hex(expected));
            print_json(&VerifyReport {
                storage_path: &path,
                expected: meta.checksum.as_deref(),
                actual: actual.to_hex(),
                ok,
            })?;
        }
        Commands::Stats => {
            print_json(&cache.stats())?;
        }
    }

    Ok(())
}
