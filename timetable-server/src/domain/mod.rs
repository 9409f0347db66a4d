//! Domain types for the timetable engine.
//!
//! Departure times are validated at construction, so code holding a
//! `DepartureTime` can trust the hour and minute are in range.

mod day_type;
mod schedule;
mod time;

pub use day_type::{DayType, InvalidDayType, ServiceDay};
pub use schedule::{ExtractionStage, Schedule, StopKey};
pub use time::{DepartureTime, TimeError, dubai_now, is_time_token, parse_time_token};
