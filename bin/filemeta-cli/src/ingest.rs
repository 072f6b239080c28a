//! Upload ingestion
//!
//! Places a source file under the upload root and registers its metadata
//! through the cache. The storage path is `<folder>/<uuid>-<name>`, so two
//! uploads of the same name never collide.

use filemeta_cache::MetadataCache;
use filemeta_common::config::UploadConfig;
use filemeta_common::{ChecksumCalculator, Error, FileMeta, NewFileRecord, Result, StoragePath};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const COPY_BUFFER_SIZE: usize = 64 * 1024;
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// One file to ingest
#[derive(Clone, Debug, Default)]
pub struct IngestRequest {
    pub source: PathBuf,
    /// Destination folder; the configured default when unset
    pub folder: Option<String>,
    /// Declared original name; the source file name when unset
    pub name: Option<String>,
    /// Declared content type; guessed from the extension when unset
    pub content_type: Option<String>,
    pub owner: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

/// Copies uploads into place and registers them
pub struct Ingestor<'a> {
    cache: &'a MetadataCache,
    config: &'a UploadConfig,
}

impl<'a> Ingestor<'a> {
    pub const fn new(cache: &'a MetadataCache, config: &'a UploadConfig) -> Self {
        Self { cache, config }
    }

    /// Place the file and register it.
    ///
    /// The placed copy is removed again if registration fails.
    pub async fn ingest(&self, request: IngestRequest) -> Result<FileMeta> {
        let original_name = match request.name {
            Some(name) => name,
            None => request
                .source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    Error::invalid_argument(format!(
                        "{} has no file name",
                        request.source.display()
                    ))
                })?,
        };

        let storage_name = storage_name(&original_name);
        let folder = request
            .folder
            .as_deref()
            .unwrap_or(&self.config.default_folder);
        let storage_path = StoragePath::join(folder, &storage_name)?;
        let target = self.config.root.join(storage_path.as_str());

        let source = request.source.clone();
        let placed = target.clone();
        let (size, checksum) = tokio::task::spawn_blocking(move || copy_with_checksum(&source, &placed))
            .await
            .map_err(|e| Error::internal(format!("copy task failed: {e}")))??;
        debug!("Placed {} bytes at {}", size, target.display());

        let content_type = request
            .content_type
            .unwrap_or_else(|| guess_content_type(&original_name).to_string());

        let mut input = NewFileRecord::new(
            original_name,
            storage_name,
            storage_path.clone(),
            content_type,
            size,
        );
        input.checksum = Some(checksum);
        input.owner_id = request.owner;
        input.metadata = request.metadata;
        if let Some(base) = &self.config.public_base_url {
            input.url = Some(format!("{}/{}", base.trim_end_matches('/'), storage_path));
        }

        match self.cache.register_write(input).await {
            Ok(meta) => {
                info!("Ingested {} as '{}'", meta.original_name, meta.storage_path);
                Ok(meta)
            }
            Err(e) => {
                if let Err(remove_err) = tokio::fs::remove_file(&target).await {
                    warn!(
                        "Failed to remove {} after failed registration: {}",
                        target.display(),
                        remove_err
                    );
                }
                Err(e)
            }
        }
    }
}

/// Copy `source` to a new file at `target`, returning the size and the
/// hex SHA-256 of the copied bytes.
///
/// A partially written target is removed when the copy fails.
fn copy_with_checksum(source: &Path, target: &Path) -> Result<(u64, String)> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let reader = File::open(source)?;
    let writer = File::create_new(target)?;

    let copied = copy_into(reader, writer);
    if copied.is_err() {
        if let Err(e) = std::fs::remove_file(target) {
            warn!("Failed to remove partial copy {}: {}", target.display(), e);
        }
    }
    copied
}

fn copy_into(mut reader: impl Read, mut writer: File) -> Result<(u64, String)> {
    let mut calculator = ChecksumCalculator::new();
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        calculator.update(&buf[..n]);
        writer.write_all(&buf[..n])?;
    }
    writer.sync_all()?;

    Ok((calculator.bytes(), calculator.finalize().to_hex()))
}

/// `<uuid>-<sanitized name>`
pub fn storage_name(original: &str) -> String {
    format!("{}-{}", uuid::Uuid::new_v4(), sanitize_name(original))
}

/// Keep ASCII alphanumerics, `.`, `-` and `_`; replace everything else
pub fn sanitize_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = sanitized.trim_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Content type from the file extension
pub fn guess_content_type(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());
    match ext.as_deref() {
        Some("txt" | "log") => "text/plain",
        Some("md") => "text/markdown",
        Some("html" | "htm") => "text/html",
        Some("css") => "text/css",
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("mp4") => "video/mp4",
        Some("mp3") => "audio/mpeg",
        _ => DEFAULT_CONTENT_TYPE,
    }
}
