//! Departure time handling for RTA timetables.
//!
//! Timetable documents print times in several styles depending on the
//! printing run: "08:05", "08.05" or "0805". This module normalizes all of
//! them to a time of day in Dubai local time (fixed UTC+4, no DST).

use chrono::{DateTime, FixedOffset, NaiveTime, Offset, Timelike, Utc};
use std::fmt;

use super::{DayType, ServiceDay};

/// Dubai's fixed offset from UTC, in seconds.
const DUBAI_OFFSET_SECS: i32 = 4 * 60 * 60;

/// Error returned when a token is not a usable time of day.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time: {reason}")]
pub struct TimeError {
    reason: &'static str,
}

impl TimeError {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// Parse a single timetable token into a time of day.
///
/// Formats are tried in order: `HH:MM`, `HH.MM`, then `HHMM` (exactly four
/// digits). The separator forms also accept a one-digit hour. Leading and
/// trailing non-digit characters (brackets, footnote marks) are ignored.
///
/// Out-of-range values are rejected rather than wrapped.
///
/// # Examples
///
/// ```
/// use timetable_server::domain::parse_time_token;
///
/// let t = parse_time_token("08:05").unwrap();
/// assert_eq!(t, parse_time_token("08.05").unwrap());
/// assert_eq!(t, parse_time_token("0805").unwrap());
///
/// assert!(parse_time_token("25:61").is_err());
/// assert!(parse_time_token("9999").is_err());
/// ```
pub fn parse_time_token(token: &str) -> Result<NaiveTime, TimeError> {
    let trimmed = token.trim_matches(|c: char| !c.is_ascii_digit());
    if trimmed.is_empty() {
        return Err(TimeError::new("no digits"));
    }

    let (hour, minute) = if let Some((h, m)) = trimmed.split_once(':') {
        split_pair(h, m)?
    } else if let Some((h, m)) = trimmed.split_once('.') {
        split_pair(h, m)?
    } else if trimmed.len() == 4 {
        let bytes = trimmed.as_bytes();
        let hour =
            parse_two_digits(&bytes[0..2]).ok_or_else(|| TimeError::new("invalid hour digits"))?;
        let minute = parse_two_digits(&bytes[2..4])
            .ok_or_else(|| TimeError::new("invalid minute digits"))?;
        (hour, minute)
    } else {
        return Err(TimeError::new("expected HH:MM, HH.MM or HHMM"));
    };

    if hour > 23 {
        return Err(TimeError::new("hour must be 0-23"));
    }
    if minute > 59 {
        return Err(TimeError::new("minute must be 0-59"));
    }

    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| TimeError::new("invalid time"))
}

/// Split an hour/minute pair around a separator. Hours take one or two
/// digits, minutes exactly two.
fn split_pair(hour: &str, minute: &str) -> Result<(u32, u32), TimeError> {
    let hour = match hour.as_bytes() {
        [d] => (*d as char).to_digit(10),
        digits @ [_, _] => parse_two_digits(digits),
        _ => None,
    }
    .ok_or_else(|| TimeError::new("invalid hour digits"))?;

    let minute = parse_two_digits(minute.as_bytes())
        .ok_or_else(|| TimeError::new("invalid minute digits"))?;

    Ok((hour, minute))
}

/// Parse two ASCII digit bytes into a u32.
fn parse_two_digits(bytes: &[u8]) -> Option<u32> {
    if bytes.len() != 2 {
        return None;
    }
    let d1 = (bytes[0] as char).to_digit(10)?;
    let d2 = (bytes[1] as char).to_digit(10)?;
    Some(d1 * 10 + d2)
}

/// Returns true if the token normalizes to a time.
pub fn is_time_token(token: &str) -> bool {
    parse_time_token(token).is_ok()
}

/// The current wall-clock time in Dubai.
pub fn dubai_now() -> DateTime<FixedOffset> {
    // The offset is a constant well inside chrono's accepted range.
    let offset = FixedOffset::east_opt(DUBAI_OFFSET_SECS).unwrap_or_else(|| Utc.fix());
    Utc::now().with_timezone(&offset)
}

/// A scheduled departure: a time of day, optionally restricted to a day type.
///
/// Ordering is by time first, then day type, so an ordered set of departures
/// reads chronologically.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DepartureTime {
    time: NaiveTime,
    day_type: Option<DayType>,
}

impl DepartureTime {
    /// Create a departure that applies to every day.
    pub fn new(time: NaiveTime) -> Self {
        Self {
            time,
            day_type: None,
        }
    }

    /// Create a departure restricted to a day type (or every day if `None`).
    pub fn with_day_type(time: NaiveTime, day_type: Option<DayType>) -> Self {
        Self { time, day_type }
    }

    /// Convenience constructor from hour and minute.
    pub fn at(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self::new)
    }

    /// Returns the time of day.
    pub fn time(&self) -> NaiveTime {
        self.time
    }

    /// Returns the day type restriction, if any.
    pub fn day_type(&self) -> Option<DayType> {
        self.day_type
    }

    /// Returns true if this departure runs on a queried day.
    ///
    /// Untagged departures run every day.
    pub fn runs_on(&self, day: ServiceDay) -> bool {
        self.day_type.is_none_or(|day_type| day.includes(day_type))
    }

    /// Returns the hour (0-23).
    pub fn hour(&self) -> u32 {
        self.time.hour()
    }

    /// Returns the minute (0-59).
    pub fn minute(&self) -> u32 {
        self.time.minute()
    }
}

impl fmt::Debug for DepartureTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.day_type {
            Some(day) => write!(f, "DepartureTime({} {})", self, day),
            None => write!(f, "DepartureTime({})", self),
        }
    }
}

impl fmt::Display for DepartureTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}
