//! Timetable documents: download, local cache and manual import.

mod cache;
mod client;
mod error;
mod fetcher;

pub use cache::{CacheEntryStatus, DocumentCache, DocumentSource};
pub use client::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT, TimetableClient, TimetableClientConfig};
pub use error::{CacheError, FetchError, MANUAL_IMPORT_HINT};
pub use fetcher::DocumentFetcher;
