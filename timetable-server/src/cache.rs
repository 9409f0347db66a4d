//! In-memory memo of extracted schedules.
//!
//! Extraction reads the whole document, so the result is kept per route
//! code. Documents never change behind our back: the memo only has to be
//! invalidated when this process imports or clears a document, so entries
//! have no TTL.
//!
//! A load holds its code's lock from fetch to memo insert, and imports and
//! clears of that code wait for it. A schedule extracted from replaced
//! bytes therefore cannot land in the memo after the invalidation.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use moka::future::Cache as MokaCache;
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tracing::debug;

use crate::documents::{CacheEntryStatus, CacheError, DocumentCache, DocumentFetcher, FetchError};
use crate::domain::Schedule;
use crate::extract::extract;
use crate::registry::RouteEntry;

/// Configuration for the schedule memo.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of memoized schedules.
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_capacity: 256 }
    }
}

/// An extracted schedule and the size of the document it came from.
#[derive(Debug)]
pub struct Timetable {
    pub schedule: Schedule,
    pub document_bytes: usize,
}

/// Document fetcher with memoized extraction.
///
/// Wraps a `DocumentFetcher`. Cache mutations go through here so the memo
/// never serves a schedule for a document that has been replaced.
pub struct CachedTimetables {
    fetcher: DocumentFetcher,
    schedules: MokaCache<String, Arc<Timetable>>,
    /// Orders loads of a code against imports and clears of it
    loads: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    /// Held exclusively while every document is cleared
    clear_all: RwLock<()>,
}

impl CachedTimetables {
    pub fn new(fetcher: DocumentFetcher, config: &CacheConfig) -> Self {
        let schedules = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .build();

        Self {
            fetcher,
            schedules,
            loads: Mutex::new(HashMap::new()),
            clear_all: RwLock::new(()),
        }
    }

    /// The on-disk document cache.
    pub fn documents(&self) -> &DocumentCache {
        self.fetcher.cache()
    }

    /// Fetch and extract the timetable for a route, using the memo if
    /// available.
    pub async fn timetable(&self, entry: &RouteEntry) -> Result<Arc<Timetable>, FetchError> {
        if let Some(cached) = self.schedules.get(entry.route_code.as_str()).await {
            return Ok(cached);
        }

        let _all = self.clear_all.read().await;
        let lock = self.load_lock(&entry.route_code);
        let _guard = lock.lock().await;

        // Loaded by whoever held the lock before us
        if let Some(cached) = self.schedules.get(entry.route_code.as_str()).await {
            return Ok(cached);
        }

        let bytes = self.fetcher.fetch_entry(entry).await?;
        let timetable = Arc::new(Timetable {
            schedule: extract(&entry.route_code, &bytes),
            document_bytes: bytes.len(),
        });

        self.schedules
            .insert(entry.route_code.clone(), timetable.clone())
            .await;

        Ok(timetable)
    }

    /// Import a local file as a route's document.
    pub async fn import(&self, route_code: &str, file: &Path) -> Result<u64, CacheError> {
        let _all = self.clear_all.read().await;
        let lock = self.load_lock(route_code);
        let _guard = lock.lock().await;

        let imported = self.documents().import(route_code, file).await?;
        self.schedules.invalidate(route_code).await;
        Ok(imported)
    }

    /// Remove one route's document, or all of them.
    pub async fn clear(&self, route_code: Option<&str>) -> Result<usize, CacheError> {
        let removed = match route_code {
            Some(code) => {
                let _all = self.clear_all.read().await;
                let lock = self.load_lock(code);
                let _guard = lock.lock().await;
                let removed = self.documents().clear(Some(code)).await?;
                self.schedules.invalidate(code).await;
                removed
            }
            None => {
                let _all = self.clear_all.write().await;
                let removed = self.documents().clear(None).await?;
                self.schedules.invalidate_all();
                removed
            }
        };
        debug!(?route_code, removed, "invalidated memoized schedules");
        Ok(removed)
    }

    pub async fn status(&self) -> Result<Vec<CacheEntryStatus>, CacheError> {
        self.documents().status().await
    }

    fn load_lock(&self, route_code: &str) -> Arc<AsyncMutex<()>> {
        let mut loads = self.loads.lock().unwrap_or_else(PoisonError::into_inner);
        loads.entry(route_code.to_string()).or_default().clone()
    }
}
