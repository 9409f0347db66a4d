//! Data transfer objects for web requests and responses.

use serde::{Deserialize, Serialize};

use crate::documents::{CacheEntryStatus, DocumentSource};
use crate::domain::{DayType, DepartureTime, Schedule, StopKey};
use crate::next_departure::UpcomingDeparture;
use crate::registry::RouteEntry;

/// Characters of raw text returned when extraction found no departures.
pub const RAW_TEXT_EXCERPT_CHARS: usize = 1500;

/// A route in the registry.
#[derive(Debug, Serialize)]
pub struct RouteResult {
    pub route_code: String,
    pub line_id: String,
    pub line_name: String,
}

impl RouteResult {
    pub fn from_entry(entry: &RouteEntry) -> Self {
        Self {
            route_code: entry.route_code.clone(),
            line_id: entry.line_id.clone(),
            line_name: entry.line_name.clone(),
        }
    }
}

/// Response listing routes.
#[derive(Debug, Serialize)]
pub struct RouteListResponse {
    pub routes: Vec<RouteResult>,
}

/// Request to register a custom route.
#[derive(Debug, Deserialize)]
pub struct RegisterRouteRequest {
    pub route_code: String,
    pub line_id: String,
    pub line_name: String,
}

/// Response to a registration.
#[derive(Debug, Serialize)]
pub struct RegisterRouteResponse {
    pub route_code: String,
    /// An existing entry was replaced; its cached document was kept
    pub replaced: bool,
}

/// A departure in a schedule listing.
#[derive(Debug, Serialize)]
pub struct DepartureResult {
    /// Time in HH:MM format
    pub time: String,
    /// Section the departure came from (`saturday_to_thursday`, `friday`,
    /// ...), or absent for every day
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_type: Option<DayType>,
}

impl DepartureResult {
    pub fn from_departure(departure: &DepartureTime) -> Self {
        Self {
            time: departure.to_string(),
            day_type: departure.day_type(),
        }
    }
}

/// Departures recorded for one stop.
#[derive(Debug, Serialize)]
pub struct StopDeparturesResult {
    /// Stop name, or absent for departures not tied to a stop
    pub stop: Option<String>,
    pub departures: Vec<DepartureResult>,
}

/// Response for a route's schedule.
#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    pub route_code: String,
    /// Which extraction stage produced the data
    pub stage: &'static str,
    /// No departures were recognised; see `raw_text_excerpt`
    pub weak: bool,
    pub stops: Vec<String>,
    pub departures: Vec<StopDeparturesResult>,
    pub departure_count: usize,
    pub document_bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text_excerpt: Option<String>,
}

impl ScheduleResponse {
    pub fn from_schedule(schedule: &Schedule, document_bytes: usize) -> Self {
        // Stop order first, then anything not tied to a stop
        let mut departures: Vec<StopDeparturesResult> = Vec::new();
        for stop in schedule.stops() {
            if departures
                .iter()
                .any(|d| d.stop.as_deref() == Some(stop.as_str()))
            {
                continue;
            }
            if let Some(times) = schedule.departures_at(stop) {
                departures.push(StopDeparturesResult {
                    stop: Some(stop.clone()),
                    departures: times.iter().map(DepartureResult::from_departure).collect(),
                });
            }
        }
        if let Some(times) = schedule.departures().get(&StopKey::RouteLevel) {
            departures.push(StopDeparturesResult {
                stop: None,
                departures: times.iter().map(DepartureResult::from_departure).collect(),
            });
        }

        let weak = schedule.is_weak();
        Self {
            route_code: schedule.route_code().to_string(),
            stage: schedule.stage().as_str(),
            weak,
            stops: schedule.stops().to_vec(),
            departures,
            departure_count: schedule.departure_count(),
            document_bytes,
            raw_text_excerpt: weak.then(|| excerpt(schedule.raw_text(), RAW_TEXT_EXCERPT_CHARS)),
        }
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Query parameters for next departures.
#[derive(Debug, Default, Deserialize)]
pub struct NextDeparturesQuery {
    /// Reference time in HH:MM, HH.MM or HHMM (defaults to now in Dubai)
    pub time: Option<String>,
    /// Stop name to restrict to
    pub stop: Option<String>,
    /// Day of the week (`friday`) or day type (`weekend`); defaults to today
    pub day: Option<String>,
}

/// An upcoming departure.
#[derive(Debug, Serialize)]
pub struct UpcomingResult {
    pub time: String,
    pub countdown_minutes: i64,
    pub next_day: bool,
}

impl UpcomingResult {
    pub fn from_upcoming(upcoming: &UpcomingDeparture) -> Self {
        Self {
            time: upcoming.time.format("%H:%M").to_string(),
            countdown_minutes: upcoming.countdown_minutes(),
            next_day: upcoming.next_day,
        }
    }
}

/// Response for next departures.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NextDeparturesResponse {
    Upcoming {
        route_code: String,
        reference_time: String,
        /// The day asked about: a weekday name or a day type
        day: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        stop: Option<String>,
        departures: Vec<UpcomingResult>,
    },
    /// The timetable yielded no departures for the selection
    NoScheduleData { route_code: String },
}

/// A cached document.
#[derive(Debug, Serialize)]
pub struct CacheEntryResult {
    pub route_code: String,
    pub byte_size: u64,
    /// RFC 3339 timestamp
    pub stored_at: String,
    pub source: Option<DocumentSource>,
}

impl CacheEntryResult {
    pub fn from_status(status: &CacheEntryStatus) -> Self {
        Self {
            route_code: status.route_code.clone(),
            byte_size: status.byte_size,
            stored_at: status.stored_at.to_rfc3339(),
            source: status.source,
        }
    }
}

/// Response for cache status.
#[derive(Debug, Serialize)]
pub struct CacheStatusResponse {
    pub cache_root: String,
    pub total_bytes: u64,
    pub entries: Vec<CacheEntryResult>,
}

/// Response to a cache clear.
#[derive(Debug, Serialize)]
pub struct ClearCacheResponse {
    pub removed: usize,
}

/// Request to import a local document.
#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub route_code: String,
    /// Path on the server's filesystem
    pub path: String,
}

/// Response to an import.
#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub route_code: String,
    pub bytes: u64,
    /// The route was unknown and has been registered with derived identifiers
    pub registered: bool,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
