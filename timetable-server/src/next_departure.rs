//! Next-departure lookup against an extracted schedule.
//!
//! Times are compared as times of day in Dubai. When nothing is left today
//! the search wraps once to the start of the timetable, and those entries
//! are flagged as next-day.

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveTime, TimeDelta};

use crate::domain::{Schedule, ServiceDay};

/// Maximum number of departures returned.
pub const LOOKAHEAD: usize = 5;

/// A departure after the reference time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpcomingDeparture {
    pub time: NaiveTime,
    /// Time from the reference until departure
    pub countdown: TimeDelta,
    /// Departs after midnight, from the start of the timetable
    pub next_day: bool,
}

impl UpcomingDeparture {
    /// Whole minutes until departure.
    pub fn countdown_minutes(&self) -> i64 {
        self.countdown.num_minutes()
    }
}

/// Result of a next-departure query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextDepartures {
    /// No departure data for the selection. Not the same as "none left
    /// today": that case wraps to tomorrow.
    Empty,
    /// Up to `LOOKAHEAD` departures in the order they leave.
    Upcoming(Vec<UpcomingDeparture>),
}

impl NextDepartures {
    pub fn departures(&self) -> &[UpcomingDeparture] {
        match self {
            NextDepartures::Empty => &[],
            NextDepartures::Upcoming(departures) => departures,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, NextDepartures::Empty)
    }
}

/// The day to assume for a date when the caller gives none: that date's
/// day of the week, so each section is matched on the days it names.
pub fn default_day_type(date: NaiveDate) -> ServiceDay {
    ServiceDay::for_date(date)
}

/// Find the next departures at or after `reference`.
///
/// `stop` selects one stop's departures when the schedule has it; otherwise
/// every departure of the route is considered. `day` drops departures from
/// sections that do not run on that day; untagged departures always apply.
///
/// # Examples
///
/// ```
/// use chrono::NaiveTime;
/// use timetable_server::domain::{DepartureTime, Schedule, StopKey};
/// use timetable_server::next_departure::find_next;
///
/// let mut schedule = Schedule::new("SH1", "");
/// schedule.add_departures(
///     StopKey::RouteLevel,
///     [(5, 30), (6, 0), (23, 45)]
///         .into_iter()
///         .filter_map(|(h, m)| DepartureTime::at(h, m)),
/// );
///
/// let at = NaiveTime::from_hms_opt(23, 50, 0).unwrap();
/// let next = find_next(&schedule, at, None, None);
/// let first = next.departures()[0];
/// assert_eq!(first.time, NaiveTime::from_hms_opt(5, 30, 0).unwrap());
/// assert!(first.next_day);
/// assert_eq!(first.countdown_minutes(), 340);
/// ```
pub fn find_next(
    schedule: &Schedule,
    reference: NaiveTime,
    stop: Option<&str>,
    day: Option<ServiceDay>,
) -> NextDepartures {
    let selected = match stop.and_then(|name| schedule.departures_at(name)) {
        Some(departures) => departures.clone(),
        None => schedule.all_departures(),
    };

    let times: BTreeSet<NaiveTime> = selected
        .iter()
        .filter(|d| day.is_none_or(|day| d.runs_on(day)))
        .map(|d| d.time())
        .collect();

    if times.is_empty() {
        return NextDepartures::Empty;
    }

    let today = times.range(reference..).map(|&t| (t, false));
    let tomorrow = times.range(..reference).map(|&t| (t, true));

    let upcoming = today
        .chain(tomorrow)
        .take(LOOKAHEAD)
        .map(|(time, next_day)| {
            let until = time - reference;
            UpcomingDeparture {
                time,
                countdown: if next_day {
                    until + TimeDelta::days(1)
                } else {
                    until
                },
                next_day,
            }
        })
        .collect();

    NextDepartures::Upcoming(upcoming)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::domain::{DepartureTime, StopKey};
    use proptest::prelude::*;

    prop_compose! {
        fn arb_time()(hour in 0u32..24, minute in 0u32..60) -> NaiveTime {
            NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
        }
    }

    prop_compose! {
        fn arb_times_and_shuffle()(times in prop::collection::vec(arb_time(), 1..30))
            (shuffled in Just(times.clone()).prop_shuffle(), times in Just(times))
            -> (Vec<NaiveTime>, Vec<NaiveTime>)
        {
            (times, shuffled)
        }
    }

    fn schedule_of(times: &[NaiveTime]) -> Schedule {
        let mut schedule = Schedule::new("P", "");
        schedule.add_departures(
            StopKey::RouteLevel,
            times.iter().copied().map(DepartureTime::new),
        );
        schedule
    }

    proptest! {
        /// Input order does not matter
        #[test]
        fn permutation_invariant(
            (times, shuffled) in arb_times_and_shuffle(),
            reference in arb_time(),
        ) {
            prop_assert_eq!(
                find_next(&schedule_of(&times), reference, None, None),
                find_next(&schedule_of(&shuffled), reference, None, None)
            );
        }

        /// Countdowns increase, stay under a day, and never repeat a time
        #[test]
        fn countdowns_are_ordered(
            times in prop::collection::vec(arb_time(), 1..30),
            reference in arb_time(),
        ) {
            let next = find_next(&schedule_of(&times), reference, None, None);
            let departures = next.departures();

            prop_assert!(!departures.is_empty());
            prop_assert!(departures.len() <= LOOKAHEAD);
            for pair in departures.windows(2) {
                prop_assert!(pair[0].countdown < pair[1].countdown);
                // Once wrapped, stays wrapped
                prop_assert!(pair[0].next_day <= pair[1].next_day);
            }
            for d in departures {
                prop_assert!(d.countdown >= TimeDelta::zero());
                prop_assert!(d.countdown < TimeDelta::days(1));
                prop_assert_eq!(d.next_day, d.time < reference);
            }
        }
    }
}
