//! Web layer for the timetable engine.
//!
//! Provides HTTP endpoints for route management, schedules, next
//! departures, and the document cache.

mod dto;
mod routes;
mod state;

pub use dto::*;
pub use routes::create_router;
pub use state::AppState;
