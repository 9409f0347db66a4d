//! RTA timetable download client.

use std::fmt::Write as _;
use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use tracing::{info, warn};

use crate::registry::RouteEntry;

use super::error::FetchError;

/// Default base URL of the RTA timetable download servlet.
pub const DEFAULT_BASE_URL: &str =
    "https://www.rta.ae/wps/PA_JourneyPlanner/DownloadTimetableServlet";

/// Default request timeout. The servlet is slow and often far away.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(90);

/// Bodies shorter than this are error pages, not timetables.
const MIN_DOCUMENT_BYTES: usize = 100;

const USER_AGENT: &str = concat!("dubai-timetables/", env!("CARGO_PKG_VERSION"));

/// Configuration for the timetable client.
#[derive(Debug, Clone)]
pub struct TimetableClientConfig {
    /// Base URL of the download endpoint
    pub base_url: String,
    /// Bound on the whole request, including the body
    pub timeout: Duration,
    /// Skip TLS certificate validation
    pub accept_invalid_certs: bool,
}

impl TimetableClientConfig {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            accept_invalid_certs: false,
        }
    }

    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Accept invalid TLS certificates from the upstream.
    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }
}

impl Default for TimetableClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP client for the timetable download endpoint.
#[derive(Debug, Clone)]
pub struct TimetableClient {
    http: reqwest::Client,
    base_url: String,
}

impl TimetableClient {
    pub fn new(config: TimetableClientConfig) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/pdf"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url,
        })
    }

    /// Download the timetable document for a route.
    ///
    /// One attempt, no retries. Nothing is cached here.
    pub async fn download(&self, entry: &RouteEntry) -> Result<Vec<u8>, FetchError> {
        let route_code = entry.route_code.as_str();
        info!(route_code, "downloading timetable document");

        let response = self
            .http
            .get(download_url(&self.base_url, entry))
            .send()
            .await
            .map_err(|e| classify(route_code, e))?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let preview: String = body.chars().take(200).collect();
            return Err(FetchError::rejected(
                route_code,
                Some(status.as_u16()),
                format!("HTTP {}: {}", status.as_u16(), preview.trim()),
            ));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let body = response.bytes().await.map_err(|e| classify(route_code, e))?;

        if body.is_empty() {
            return Err(FetchError::rejected(
                route_code,
                Some(status.as_u16()),
                "empty response body",
            ));
        }

        if body.len() < MIN_DOCUMENT_BYTES {
            return Err(FetchError::rejected(
                route_code,
                Some(status.as_u16()),
                format!("response too small to be a timetable ({} bytes)", body.len()),
            ));
        }

        if !content_type.contains("pdf") && !body.starts_with(b"%PDF") {
            warn!(
                route_code,
                content_type = %content_type,
                "response does not look like a PDF; keeping it anyway"
            );
        }

        Ok(body.to_vec())
    }
}

/// The download URL for a route.
fn download_url(base_url: &str, entry: &RouteEntry) -> String {
    let separator = if base_url.contains('?') { '&' } else { '?' };
    format!(
        "{base_url}{separator}lineId={}&lineName={}",
        encode_query_value(&entry.line_id),
        encode_query_value(&entry.line_name),
    )
}

/// Percent-encode a query value. Spaces become `%20`: the servlet does not
/// read `+` as a space. Colons stay literal, as in the RTA's own links.
fn encode_query_value(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for b in value.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~' | b':') {
            encoded.push(b as char);
        } else {
            let _ = write!(encoded, "%{:02X}", b);
        }
    }
    encoded
}

/// Map a transport error onto the fetch error taxonomy.
fn classify(route_code: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        warn!(route_code, "timetable download timed out");
        FetchError::timeout(route_code)
    } else {
        warn!(route_code, error = %err, "timetable service unreachable");
        FetchError::unreachable(route_code, err.to_string())
    }
}
