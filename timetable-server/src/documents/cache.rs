//! Disk-based cache for timetable documents.
//!
//! One document per route code, stored as `<stem>.pdf` with a JSON sidecar
//! `<stem>.json` recording when and how it arrived. Entries never expire:
//! the upstream is often unreachable, so a stale timetable beats none.
//! Eviction is always explicit.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::error::CacheError;

const DOCUMENT_EXTENSION: &str = "pdf";
const METADATA_EXTENSION: &str = "json";

/// How a cached document arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSource {
    Downloaded,
    Imported,
}

/// Sidecar metadata for a cached document.
#[derive(Debug, Serialize, Deserialize)]
struct DocumentMeta {
    route_code: String,
    /// Unix timestamp when the document was written.
    stored_at_secs: u64,
    source: DocumentSource,
}

/// One row of `DocumentCache::status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntryStatus {
    pub route_code: String,
    pub byte_size: u64,
    pub stored_at: DateTime<Utc>,
    /// `None` if the sidecar is missing or unreadable.
    pub source: Option<DocumentSource>,
}

/// Persistent document cache keyed by route code.
///
/// Writes land in a temporary file and are renamed into place, so a reader
/// never sees a partial document. A per-code lock serializes readers and
/// writers of the same code; different codes proceed independently.
#[derive(Debug)]
pub struct DocumentCache {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<RwLock<()>>>>,
}

impl DocumentCache {
    /// Create a cache rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Get the cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read the cached document for a route, or `None` if absent.
    pub async fn get(&self, route_code: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let path = self.document_path(route_code)?;
        let lock = self.lock_for(route_code);
        let _guard = lock.read().await;

        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(route_code, e)),
        }
    }

    /// Store a document, replacing any previous one for the route.
    ///
    /// Returns the size of the replaced document, or 0 if there was none.
    pub async fn put(
        &self,
        route_code: &str,
        bytes: &[u8],
        source: DocumentSource,
    ) -> Result<u64, CacheError> {
        let path = self.document_path(route_code)?;
        let meta_path = path.with_extension(METADATA_EXTENSION);

        let stored_at_secs = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map_err(|_| CacheError::Metadata {
                message: "system time before unix epoch".to_string(),
            })?
            .as_secs();
        let meta = DocumentMeta {
            route_code: route_code.to_string(),
            stored_at_secs,
            source,
        };
        let meta_json = serde_json::to_vec_pretty(&meta).map_err(|e| CacheError::Metadata {
            message: format!("failed to serialize metadata: {}", e),
        })?;

        let lock = self.lock_for(route_code);
        let _guard = lock.write().await;

        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| io_error(route_code, e))?;

        let previous = match fs::metadata(&path).await {
            Ok(m) => m.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => 0,
            Err(e) => return Err(io_error(route_code, e)),
        };

        replace_pair((&path, bytes), (&meta_path, &meta_json))
            .await
            .map_err(|e| io_error(route_code, e))?;

        info!(
            route_code,
            bytes = bytes.len(),
            previous,
            ?source,
            "cached timetable document"
        );

        Ok(previous)
    }

    /// Remove one route's document, or every document when `route_code` is `None`.
    ///
    /// Returns the number of documents removed. Clearing an absent route is
    /// not an error.
    pub async fn clear(&self, route_code: Option<&str>) -> Result<usize, CacheError> {
        match route_code {
            Some(code) => self.clear_one(code).await.map(usize::from),
            None => {
                let mut removed = 0;
                for code in self.cached_codes().await? {
                    if self.clear_one(&code).await? {
                        removed += 1;
                    }
                }
                info!(removed, "cleared timetable cache");
                Ok(removed)
            }
        }
    }

    /// List cached documents ordered by route code.
    pub async fn status(&self) -> Result<Vec<CacheEntryStatus>, CacheError> {
        let mut codes = self.cached_codes().await?;
        codes.sort();

        let mut entries = Vec::with_capacity(codes.len());
        for code in codes {
            let path = self.document_path(&code)?;
            let lock = self.lock_for(&code);
            let _guard = lock.read().await;

            let metadata = match fs::metadata(&path).await {
                Ok(m) => m,
                // Removed between listing and locking
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(io_error(&code, e)),
            };

            let sidecar = read_meta(&path.with_extension(METADATA_EXTENSION)).await;
            let stored_at = sidecar
                .as_ref()
                .and_then(|m| DateTime::<Utc>::from_timestamp(m.stored_at_secs as i64, 0))
                .or_else(|| metadata.modified().ok().map(DateTime::<Utc>::from))
                .unwrap_or_else(Utc::now);

            entries.push(CacheEntryStatus {
                route_code: code,
                byte_size: metadata.len(),
                stored_at,
                source: sidecar.map(|m| m.source),
            });
        }

        Ok(entries)
    }

    /// Import a local file as the document for a route.
    ///
    /// Returns the number of bytes imported.
    pub async fn import(&self, route_code: &str, file: &Path) -> Result<u64, CacheError> {
        let bytes = fs::read(file).await.map_err(|source| CacheError::Read {
            path: file.to_path_buf(),
            source,
        })?;

        if !bytes.starts_with(b"%PDF") {
            warn!(
                route_code,
                path = %file.display(),
                "imported file does not look like a PDF; extraction will treat it as text"
            );
        }

        self.put(route_code, &bytes, DocumentSource::Imported).await?;

        Ok(bytes.len() as u64)
    }

    async fn clear_one(&self, route_code: &str) -> Result<bool, CacheError> {
        let path = self.document_path(route_code)?;
        let lock = self.lock_for(route_code);
        let _guard = lock.write().await;

        let removed = match fs::remove_file(&path).await {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(io_error(route_code, e)),
        };

        match fs::remove_file(path.with_extension(METADATA_EXTENSION)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(io_error(route_code, e)),
        }

        if removed {
            debug!(route_code, "removed cached timetable document");
        }

        Ok(removed)
    }

    /// Route codes that currently have a document on disk.
    async fn cached_codes(&self) -> Result<Vec<String>, CacheError> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error("*", e)),
        };

        let mut codes = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(|e| io_error("*", e))? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some(DOCUMENT_EXTENSION) {
                continue;
            }
            if let Some(code) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(route_code_from_stem)
            {
                codes.push(code);
            }
        }

        Ok(codes)
    }

    fn document_path(&self, route_code: &str) -> Result<PathBuf, CacheError> {
        if route_code.is_empty() {
            return Err(CacheError::InvalidRouteCode(route_code.to_string()));
        }
        Ok(self
            .root
            .join(format!("{}.{}", file_stem(route_code), DOCUMENT_EXTENSION)))
    }

    fn lock_for(&self, route_code: &str) -> Arc<RwLock<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(route_code.to_string()).or_default().clone()
    }
}

fn io_error(route_code: &str, source: std::io::Error) -> CacheError {
    CacheError::Io {
        route_code: route_code.to_string(),
        source,
    }
}

/// Replace a document and its sidecar.
///
/// Both are written to `.partial` files before either is renamed into
/// place. The sidecar is renamed first; if the document rename then fails
/// the new sidecar is removed, so metadata never describes bytes that are
/// not on disk.
async fn replace_pair(
    (document, bytes): (&Path, &[u8]),
    (sidecar, meta): (&Path, &[u8]),
) -> std::io::Result<()> {
    let document_tmp = partial_path(document);
    let sidecar_tmp = partial_path(sidecar);

    let staged = async {
        fs::write(&document_tmp, bytes).await?;
        fs::write(&sidecar_tmp, meta).await?;
        fs::rename(&sidecar_tmp, sidecar).await
    }
    .await;
    if let Err(e) = staged {
        let _ = fs::remove_file(&document_tmp).await;
        let _ = fs::remove_file(&sidecar_tmp).await;
        return Err(e);
    }

    if let Err(e) = fs::rename(&document_tmp, document).await {
        let _ = fs::remove_file(&document_tmp).await;
        let _ = fs::remove_file(sidecar).await;
        return Err(e);
    }
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".partial");
    PathBuf::from(tmp)
}

async fn read_meta(path: &Path) -> Option<DocumentMeta> {
    let contents = fs::read(path).await.ok()?;
    serde_json::from_slice(&contents).ok()
}

/// Deterministic, reversible file stem for a route code.
///
/// Bytes outside `[A-Za-z0-9_-]` are escaped as `%XX`.
fn file_stem(route_code: &str) -> String {
    let mut stem = String::with_capacity(route_code.len());
    for b in route_code.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
            stem.push(b as char);
        } else {
            let _ = write!(stem, "%{:02X}", b);
        }
    }
    stem
}

fn route_code_from_stem(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = stem.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
