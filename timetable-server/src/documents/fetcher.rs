//! Cache-or-download retrieval of timetable documents.

use tracing::debug;

use crate::registry::{RouteEntry, RouteRegistry};

use super::cache::{DocumentCache, DocumentSource};
use super::client::TimetableClient;
use super::error::FetchError;

/// Fetches timetable documents, preferring the cache.
///
/// A cached document is authoritative: it is returned without contacting the
/// upstream and is never revalidated. Only a cache miss triggers a download,
/// and only a successful download touches the cache.
#[derive(Debug)]
pub struct DocumentFetcher {
    client: TimetableClient,
    cache: DocumentCache,
}

impl DocumentFetcher {
    pub fn new(client: TimetableClient, cache: DocumentCache) -> Self {
        Self { client, cache }
    }

    /// Access the underlying cache for inspection, eviction and import.
    pub fn cache(&self) -> &DocumentCache {
        &self.cache
    }

    /// Resolve a route code and fetch its document.
    pub async fn fetch(
        &self,
        registry: &RouteRegistry,
        route_code: &str,
    ) -> Result<Vec<u8>, FetchError> {
        let entry = registry
            .resolve(route_code)
            .ok_or_else(|| FetchError::NotRegistered(route_code.to_string()))?;
        self.fetch_entry(entry).await
    }

    /// Fetch the document for an already-resolved route.
    pub async fn fetch_entry(&self, entry: &RouteEntry) -> Result<Vec<u8>, FetchError> {
        if let Some(bytes) = self.cache.get(&entry.route_code).await? {
            debug!(
                route_code = entry.route_code.as_str(),
                bytes = bytes.len(),
                "using cached timetable document"
            );
            return Ok(bytes);
        }

        let bytes = self.client.download(entry).await?;
        self.cache
            .put(&entry.route_code, &bytes, DocumentSource::Downloaded)
            .await?;

        Ok(bytes)
    }
}
