//! Document cache and fetch error types.

use std::path::PathBuf;

/// Errors from the on-disk document cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A local file given for import could not be read
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading or writing the cache directory failed
    #[error("cache I/O error for route {route_code}: {source}")]
    Io {
        route_code: String,
        #[source]
        source: std::io::Error,
    },

    /// Route code cannot be stored
    #[error("invalid route code: {0:?}")]
    InvalidRouteCode(String),

    /// Failed to encode document metadata
    #[error("cache metadata error: {message}")]
    Metadata { message: String },
}

/// Guidance attached to every network failure.
pub const MANUAL_IMPORT_HINT: &str = "the RTA site may be unreachable from this network; \
download the timetable PDF manually and import it into the cache";

/// Errors from fetching a timetable document.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Route code is not in the registry
    #[error("route {0} is not registered")]
    NotRegistered(String),

    /// Download did not complete within the configured timeout
    #[error("timed out downloading timetable for route {route_code}; {hint}")]
    Timeout {
        route_code: String,
        hint: &'static str,
    },

    /// Connection failed or the transfer broke off
    #[error("could not reach the timetable service for route {route_code}: {message}; {hint}")]
    Unreachable {
        route_code: String,
        message: String,
        hint: &'static str,
    },

    /// Upstream answered, but not with a usable document
    #[error("timetable service rejected route {route_code}: {message}; {hint}")]
    UpstreamRejected {
        route_code: String,
        status: Option<u16>,
        message: String,
        hint: &'static str,
    },

    /// Cache operation failed
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl FetchError {
    pub(crate) fn timeout(route_code: &str) -> Self {
        FetchError::Timeout {
            route_code: route_code.to_string(),
            hint: MANUAL_IMPORT_HINT,
        }
    }

    pub(crate) fn unreachable(route_code: &str, message: impl Into<String>) -> Self {
        FetchError::Unreachable {
            route_code: route_code.to_string(),
            message: message.into(),
            hint: MANUAL_IMPORT_HINT,
        }
    }

    pub(crate) fn rejected(
        route_code: &str,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        FetchError::UpstreamRejected {
            route_code: route_code.to_string(),
            status,
            message: message.into(),
            hint: MANUAL_IMPORT_HINT,
        }
    }

    /// Returns true for failures of the network download.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            FetchError::Timeout { .. }
                | FetchError::Unreachable { .. }
                | FetchError::UpstreamRejected { .. }
        )
    }
}
