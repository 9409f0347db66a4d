//! HTTP route handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use chrono::{NaiveTime, Timelike};
use tracing::{error, info, warn};

use crate::documents::{CacheError, FetchError};
use crate::domain::{ServiceDay, dubai_now, parse_time_token};
use crate::next_departure::{NextDepartures, default_day_type, find_next};
use crate::registry::{Registered, RouteEntry};

use super::dto::*;
use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/routes", get(list_routes).post(register_route))
        .route("/routes/:code/schedule", get(route_schedule))
        .route("/routes/:code/next", get(next_departures))
        .route("/cache", get(cache_status).delete(clear_cache))
        .route("/cache/import", post(import_document))
        .route("/cache/:code", delete(clear_route_cache))
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// List every known route.
async fn list_routes(State(state): State<AppState>) -> Json<RouteListResponse> {
    let registry = state.registry.read().await;
    let routes = registry.list().iter().map(RouteResult::from_entry).collect();
    Json(RouteListResponse { routes })
}

/// Register a custom route or replace an existing one.
async fn register_route(
    State(state): State<AppState>,
    Json(req): Json<RegisterRouteRequest>,
) -> Result<Json<RegisterRouteResponse>, AppError> {
    let route_code = req.route_code.trim();
    if route_code.is_empty() || req.line_id.trim().is_empty() || req.line_name.trim().is_empty()
    {
        return Err(AppError::BadRequest {
            message: "route_code, line_id and line_name must not be empty".to_string(),
        });
    }

    let outcome = state
        .registry
        .write()
        .await
        .register(route_code, req.line_id, req.line_name);
    info!(route_code, ?outcome, "registered route");

    Ok(Json(RegisterRouteResponse {
        route_code: route_code.to_string(),
        replaced: outcome == Registered::Replaced,
    }))
}

/// Extracted schedule for a route, fetching the document if needed.
async fn route_schedule(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<ScheduleResponse>, AppError> {
    let entry = route_entry(&state, &code).await?;
    let timetable = state.timetables.timetable(&entry).await?;

    Ok(Json(ScheduleResponse::from_schedule(
        &timetable.schedule,
        timetable.document_bytes,
    )))
}

/// Next departures for a route.
async fn next_departures(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(query): Query<NextDeparturesQuery>,
) -> Result<Json<NextDeparturesResponse>, AppError> {
    let now = dubai_now();

    let reference = match query.time.as_deref() {
        Some(token) => parse_time_token(token).map_err(|e| AppError::BadRequest {
            message: format!("Invalid time {token:?}: {e}"),
        })?,
        None => to_minute(now.time()),
    };

    let day = match query.day.as_deref() {
        Some(day) => day.parse::<ServiceDay>().map_err(|e| AppError::BadRequest {
            message: e.to_string(),
        })?,
        None => default_day_type(now.date_naive()),
    };

    let entry = route_entry(&state, &code).await?;
    let timetable = state.timetables.timetable(&entry).await?;
    let schedule = &timetable.schedule;

    // Report the stop only when its own list was used
    let stop = query
        .stop
        .as_deref()
        .map(str::trim)
        .filter(|name| schedule.departures_at(name).is_some());

    let response = match find_next(schedule, reference, stop, Some(day)) {
        NextDepartures::Empty => NextDeparturesResponse::NoScheduleData {
            route_code: entry.route_code,
        },
        NextDepartures::Upcoming(upcoming) => NextDeparturesResponse::Upcoming {
            route_code: entry.route_code,
            reference_time: reference.format("%H:%M").to_string(),
            day: day.to_string(),
            stop: stop.map(str::to_string),
            departures: upcoming.iter().map(UpcomingResult::from_upcoming).collect(),
        },
    };

    Ok(Json(response))
}

/// Cached documents with their sizes.
async fn cache_status(
    State(state): State<AppState>,
) -> Result<Json<CacheStatusResponse>, AppError> {
    let entries = state.timetables.status().await?;

    Ok(Json(CacheStatusResponse {
        cache_root: state.timetables.documents().root().display().to_string(),
        total_bytes: entries.iter().map(|e| e.byte_size).sum(),
        entries: entries.iter().map(CacheEntryResult::from_status).collect(),
    }))
}

/// Remove every cached document.
async fn clear_cache(
    State(state): State<AppState>,
) -> Result<Json<ClearCacheResponse>, AppError> {
    let removed = state.timetables.clear(None).await?;
    Ok(Json(ClearCacheResponse { removed }))
}

/// Remove one route's cached document.
async fn clear_route_cache(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<ClearCacheResponse>, AppError> {
    let removed = state.timetables.clear(Some(&code)).await?;
    Ok(Json(ClearCacheResponse { removed }))
}

/// Import a document from the server's filesystem.
///
/// Unknown route codes are registered with derived identifiers so the
/// imported timetable can be queried straight away.
async fn import_document(
    State(state): State<AppState>,
    Json(req): Json<ImportRequest>,
) -> Result<Json<ImportResponse>, AppError> {
    let route_code = req.route_code.trim();
    if route_code.is_empty() {
        return Err(AppError::BadRequest {
            message: "route_code must not be empty".to_string(),
        });
    }

    let bytes = state
        .timetables
        .import(route_code, std::path::Path::new(&req.path))
        .await?;

    let registered = {
        let mut registry = state.registry.write().await;
        if registry.resolve(route_code).is_some() {
            false
        } else {
            let entry = RouteEntry::derived(route_code);
            registry.register(entry.route_code, entry.line_id, entry.line_name);
            true
        }
    };
    if registered {
        info!(route_code, "registered imported route with derived identifiers");
    }

    Ok(Json(ImportResponse {
        route_code: route_code.to_string(),
        bytes,
        registered,
    }))
}

async fn route_entry(state: &AppState, code: &str) -> Result<RouteEntry, AppError> {
    state
        .route(code)
        .await
        .ok_or_else(|| FetchError::NotRegistered(code.to_string()).into())
}

fn to_minute(time: NaiveTime) -> NaiveTime {
    time.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(time)
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    NotFound { message: String },
    /// The upstream timetable service failed
    BadGateway { message: String },
    Internal { message: String },
}

impl From<FetchError> for AppError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::Cache(err) => err.into(),
            err @ FetchError::NotRegistered(_) => AppError::NotFound {
                message: err.to_string(),
            },
            err => AppError::BadGateway {
                message: err.to_string(),
            },
        }
    }
}

impl From<CacheError> for AppError {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::Read { .. } | CacheError::InvalidRouteCode(_) => AppError::BadRequest {
                message: e.to_string(),
            },
            CacheError::Io { .. } | CacheError::Metadata { .. } => AppError::Internal {
                message: e.to_string(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, message),
            AppError::BadGateway { message } => (StatusCode::BAD_GATEWAY, message),
            AppError::Internal { message } => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        if status.is_server_error() {
            error!(%status, "{message}");
        } else {
            warn!(%status, "{message}");
        }

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use serde_json::{Value, json};
    use tempfile::{TempDir, tempdir};

    use super::*;
    use crate::cache::{CacheConfig, CachedTimetables};
    use crate::documents::{DocumentCache, DocumentFetcher, TimetableClient, TimetableClientConfig};
    use crate::registry::RouteRegistry;
    use crate::test_helpers::{sample_timetable_pdf, spawn_server, unused_local_url};

    /// A server whose upstream is unreachable, so only imports provide data.
    async fn offline_server() -> (SocketAddr, TempDir) {
        let dir = tempdir().unwrap();
        let config = TimetableClientConfig::new()
            .with_base_url(unused_local_url().await)
            .with_timeout(Duration::from_millis(500));
        let fetcher = DocumentFetcher::new(
            TimetableClient::new(config).unwrap(),
            DocumentCache::new(dir.path().join("cache")),
        );
        let timetables = CachedTimetables::new(fetcher, &CacheConfig::default());
        let state = AppState::new(RouteRegistry::new(), timetables);

        (spawn_server(create_router(state)).await, dir)
    }

    async fn get(addr: SocketAddr, path: &str) -> (StatusCode, Value) {
        let response = reqwest::get(format!("http://{addr}{path}")).await.unwrap();
        let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
        (status, response.json().await.unwrap())
    }

    async fn post(addr: SocketAddr, path: &str, body: Value) -> (StatusCode, Value) {
        let response = reqwest::Client::new()
            .post(format!("http://{addr}{path}"))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
        (status, response.json().await.unwrap())
    }

    async fn delete(addr: SocketAddr, path: &str) -> (StatusCode, Value) {
        let response = reqwest::Client::new()
            .delete(format!("http://{addr}{path}"))
            .send()
            .await
            .unwrap();
        let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
        (status, response.json().await.unwrap())
    }

    async fn import(addr: SocketAddr, dir: &TempDir, code: &str, contents: &[u8]) -> Value {
        let file = dir.path().join(format!("{code}.upload"));
        std::fs::write(&file, contents).unwrap();
        let (status, body) = post(
            addr,
            "/cache/import",
            json!({ "route_code": code, "path": file.display().to_string() }),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body
    }

    #[tokio::test]
    async fn health_and_route_list() {
        let (addr, _dir) = offline_server().await;

        let health = reqwest::get(format!("http://{addr}/health")).await.unwrap();
        assert_eq!(health.text().await.unwrap(), "ok");

        let (status, body) = get(addr, "/routes").await;
        assert_eq!(status, StatusCode::OK);
        let routes = body["routes"].as_array().unwrap();
        assert_eq!(routes.len(), 8);
        assert_eq!(routes[0]["route_code"], "SH1");
        assert_eq!(routes[0]["line_id"], "dub:01SH1: :H:y08");
    }

    #[tokio::test]
    async fn register_reports_replacement() {
        let (addr, _dir) = offline_server().await;
        let route = json!({
            "route_code": "X28",
            "line_id": "dub:01X28: :H:y08",
            "line_name": "bus X28",
        });

        let (status, body) = post(addr, "/routes", route.clone()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "route_code": "X28", "replaced": false }));

        let (_, body) = post(addr, "/routes", route).await;
        assert_eq!(body["replaced"], true);

        let (_, body) = get(addr, "/routes").await;
        let codes: Vec<&str> = body["routes"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|r| r["route_code"].as_str())
            .collect();
        assert_eq!(codes.iter().filter(|c| **c == "X28").count(), 1);

        let (status, _) = post(
            addr,
            "/routes",
            json!({ "route_code": " ", "line_id": "x", "line_name": "y" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let (addr, _dir) = offline_server().await;

        let (status, body) = get(addr, "/routes/NOPE/schedule").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("not registered"));

        // Codes are case-sensitive
        let (status, _) = get(addr, "/routes/sh1/next?time=08:00").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unreachable_upstream_is_bad_gateway_with_guidance() {
        let (addr, _dir) = offline_server().await;

        let (status, body) = get(addr, "/routes/SH1/schedule").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("import"));

        let (_, body) = get(addr, "/cache").await;
        assert!(body["entries"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn import_then_query() {
        let (addr, dir) = offline_server().await;
        let pdf = sample_timetable_pdf();

        let body = import(addr, &dir, "X9", &pdf).await;
        assert_eq!(body["registered"], true);
        assert_eq!(body["bytes"], pdf.len() as u64);

        let (status, schedule) = get(addr, "/routes/X9/schedule").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(schedule["stage"], "table");
        assert_eq!(schedule["weak"], false);
        assert_eq!(schedule["stops"], json!(["Al Ghubaiba", "Union", "Dubai Mall"]));
        assert_eq!(schedule["departure_count"], 9);
        assert!(schedule.get("raw_text_excerpt").is_none());

        let (status, next) = get(addr, "/routes/X9/next?time=06:10&stop=Union&day=weekday").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(next["status"], "upcoming");
        assert_eq!(next["stop"], "Union");
        assert_eq!(next["reference_time"], "06:10");
        assert_eq!(next["day"], "weekday");
        assert_eq!(
            next["departures"],
            json!([
                { "time": "06:15", "countdown_minutes": 5, "next_day": false },
                { "time": "23:30", "countdown_minutes": 1040, "next_day": false },
                { "time": "05:45", "countdown_minutes": 1415, "next_day": true },
            ])
        );

        let (_, next) = get(addr, "/routes/X9/next?time=06:10&stop=Union&day=Fri").await;
        assert_eq!(next["day"], "friday");
        assert_eq!(next["departures"][0]["time"], "06:15");

        // Compact token, unknown stop falls back to every departure
        let (_, next) = get(addr, "/routes/X9/next?time=2340&stop=Nowhere").await;
        assert!(next.get("stop").is_none());
        assert_eq!(next["departures"][0]["time"], "23:50");

        let (_, status) = get(addr, "/cache").await;
        assert_eq!(status["entries"][0]["route_code"], "X9");
        assert_eq!(status["entries"][0]["source"], "imported");
        assert_eq!(status["total_bytes"], pdf.len() as u64);

        // Importing again keeps the existing registration
        let body = import(addr, &dir, "X9", &pdf).await;
        assert_eq!(body["registered"], false);

        let (_, body) = delete(addr, "/cache/X9").await;
        assert_eq!(body["removed"], 1);
        let (_, body) = delete(addr, "/cache").await;
        assert_eq!(body["removed"], 0);

        let (status, _) = get(addr, "/routes/X9/schedule").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn document_without_times_has_no_schedule_data() {
        let (addr, dir) = offline_server().await;
        let text = b"Timetable temporarily unavailable\nPlease check back later\n";
        import(addr, &dir, "C10", text).await;

        let (_, schedule) = get(addr, "/routes/C10/schedule").await;
        assert_eq!(schedule["weak"], true);
        assert_eq!(schedule["stage"], "raw_text_only");
        assert!(
            schedule["raw_text_excerpt"]
                .as_str()
                .unwrap()
                .contains("temporarily unavailable")
        );

        let (status, next) = get(addr, "/routes/C10/next?time=08:00").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(next, json!({ "status": "no_schedule_data", "route_code": "C10" }));
    }

    #[tokio::test]
    async fn bad_input_is_bad_request() {
        let (addr, dir) = offline_server().await;

        let (status, body) = get(addr, "/routes/SH1/next?time=25:61").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("25:61"));

        let (status, _) = get(addr, "/routes/SH1/next?time=08:00&day=holiday").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let missing = dir.path().join("missing.pdf");
        let (status, body) = post(
            addr,
            "/cache/import",
            json!({ "route_code": "X1", "path": missing.display().to_string() }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("missing.pdf"));

        // A failed import registers nothing
        let (status, _) = get(addr, "/routes/X1/schedule").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
