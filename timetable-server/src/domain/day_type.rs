//! Day-type partitioning of timetables.
//!
//! A section heading names a set of days (`DayType`). Queries ask about a
//! `ServiceDay`: one day of the week, or any day of a day type. A section
//! runs for a query when the two share at least one day.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate, Weekday};
use regex::Regex;
use serde::Serialize;

/// Heading patterns in match order. "Monday to Friday" must be tried
/// before the lone "Friday" pattern.
static MARKERS: LazyLock<Vec<(Regex, DayType)>> = LazyLock::new(|| {
    [
        (
            r"(?i)\bsat(urday)?\s*(-|–|to)\s*thu(rsday)?\b",
            DayType::SaturdayToThursday,
        ),
        (
            r"(?i)\b(weekdays?|mon(day)?\s*(-|–|to)\s*fri(day)?)\b",
            DayType::Weekday,
        ),
        (
            r"(?i)\b(weekends?|sat(urday)?\s*(-|–|&|and|to)\s*sun(day)?)\b",
            DayType::Weekend,
        ),
        (r"(?i)\b(fridays?|fri)\b", DayType::Friday),
    ]
    .into_iter()
    .map(|(pattern, day_type)| {
        (
            Regex::new(pattern).expect("day marker regex is valid"),
            day_type,
        )
    })
    .collect()
});

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// The days a timetable section applies to, as named by its heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DayType {
    /// Monday to Friday
    Weekday,
    /// Saturday and Sunday
    Weekend,
    /// Saturday to Thursday, the working week of older timetables
    SaturdayToThursday,
    /// Friday only
    Friday,
}

impl DayType {
    /// Detect a day-type section marker in a line of timetable text.
    ///
    /// # Examples
    ///
    /// ```
    /// use timetable_server::domain::DayType;
    ///
    /// assert_eq!(DayType::detect("Saturday to Thursday"), Some(DayType::SaturdayToThursday));
    /// assert_eq!(DayType::detect("Monday to Friday"), Some(DayType::Weekday));
    /// assert_eq!(DayType::detect("Friday"), Some(DayType::Friday));
    /// assert_eq!(DayType::detect("Al Ghubaiba Bus Station"), None);
    /// ```
    pub fn detect(line: &str) -> Option<Self> {
        MARKERS
            .iter()
            .find(|(pattern, _)| pattern.is_match(line))
            .map(|&(_, day_type)| day_type)
    }

    /// Returns true if sections of this type run on `day`.
    pub fn covers(&self, day: Weekday) -> bool {
        let weekend = matches!(day, Weekday::Sat | Weekday::Sun);
        match self {
            DayType::Weekday => !weekend,
            DayType::Weekend => weekend,
            DayType::SaturdayToThursday => day != Weekday::Fri,
            DayType::Friday => day == Weekday::Fri,
        }
    }

    /// Returns true if the two types share at least one day.
    pub fn overlaps(&self, other: DayType) -> bool {
        WEEK.iter().any(|&day| self.covers(day) && other.covers(day))
    }

    /// Returns the name used in query strings and responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            DayType::Weekday => "weekday",
            DayType::Weekend => "weekend",
            DayType::SaturdayToThursday => "saturday_to_thursday",
            DayType::Friday => "friday",
        }
    }
}

impl fmt::Display for DayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown day type or day name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "unknown day {0:?}: expected a day of the week, \"weekday\", \"weekend\" \
     or \"saturday_to_thursday\""
)]
pub struct InvalidDayType(String);

impl FromStr for DayType {
    type Err = InvalidDayType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weekday" | "weekdays" => Ok(DayType::Weekday),
            "weekend" | "weekends" => Ok(DayType::Weekend),
            "saturday_to_thursday" | "sat-thu" => Ok(DayType::SaturdayToThursday),
            "friday" => Ok(DayType::Friday),
            _ => Err(InvalidDayType(s.to_string())),
        }
    }
}

/// The days a next-departure query asks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceDay {
    /// One day of the week
    On(Weekday),
    /// Any day of a day type
    Within(DayType),
}

impl ServiceDay {
    /// The day of the week of a calendar date.
    pub fn for_date(date: NaiveDate) -> Self {
        ServiceDay::On(date.weekday())
    }

    /// Returns true if a section tagged `day_type` runs on a queried day.
    pub fn includes(&self, day_type: DayType) -> bool {
        match self {
            ServiceDay::On(day) => day_type.covers(*day),
            ServiceDay::Within(queried) => queried.overlaps(day_type),
        }
    }
}

impl fmt::Display for ServiceDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceDay::On(day) => f.write_str(day_name(*day)),
            ServiceDay::Within(day_type) => f.write_str(day_type.as_str()),
        }
    }
}

impl FromStr for ServiceDay {
    type Err = InvalidDayType;

    /// Day names ("saturday", "fri") select one day; anything else must
    /// name a day type.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().parse::<Weekday>() {
            Ok(day) => Ok(ServiceDay::On(day)),
            Err(_) => s.parse().map(ServiceDay::Within),
        }
    }
}

fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}
