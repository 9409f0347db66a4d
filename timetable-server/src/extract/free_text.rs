//! Free-text pass for documents without a usable table.
//!
//! Each line is scanned for runs of consecutive time tokens. The text at the
//! start of a line, in front of its first run, may name the stop the times
//! belong to. Everything else is kept at route level: later runs on the
//! line, and labels that read as prose ("then", "every 30 minutes until").

use crate::domain::{DayType, DepartureTime, Schedule, StopKey, is_time_token, parse_time_token};

use super::layout::Layout;
use super::{day_marker, tokenize};

/// Minimum letters for a label to name a stop.
const MIN_LABEL_LETTERS: usize = 2;

/// Words that mark a label as a sentence about times rather than a place.
const CONNECTIVES: &[&str] = &[
    "after", "and", "at", "before", "every", "from", "hourly", "min", "mins", "minutes", "or",
    "then", "till", "to", "until",
];

/// Scan every line for time runs. Returns true if any departure was found.
pub(crate) fn extract_runs(layout: &Layout, schedule: &mut Schedule) -> bool {
    let mut day_type = None;
    let mut found = false;

    for line in layout.pages.iter().flatten() {
        if let Some(marker) = day_marker(line) {
            day_type = Some(marker);
            continue;
        }

        let text = line.text();
        let tokens = tokenize(&text);
        for (i, run) in time_runs(&tokens).into_iter().enumerate() {
            record_run(schedule, run, i == 0, day_type);
            found = true;
        }
    }

    found
}

/// A run of times and the text in front of it.
#[derive(Debug, PartialEq)]
struct Run<'a> {
    label: String,
    times: Vec<&'a str>,
}

fn time_runs<'a>(tokens: &[&'a str]) -> Vec<Run<'a>> {
    let mut runs = Vec::new();
    let mut label: Vec<&str> = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        if !is_time_token(tokens[i]) {
            label.push(tokens[i]);
            i += 1;
            continue;
        }

        let start = i;
        while i < tokens.len() && is_time_token(tokens[i]) {
            i += 1;
        }
        let times = &tokens[start..i];

        // A lone separator-less number is more likely a year or a count
        if let [single] = times
            && !single.contains([':', '.'])
        {
            label.push(*single);
            continue;
        }

        runs.push(Run {
            label: label.join(" "),
            times: times.to_vec(),
        });
        label.clear();
    }

    runs
}

fn record_run(
    schedule: &mut Schedule,
    run: Run<'_>,
    leads_line: bool,
    day_type: Option<DayType>,
) {
    let label = run
        .label
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_string();

    let (key, day_type) = if let Some(marker) = DayType::detect(&label) {
        // "Fridays: 09:00 10:00" tags the run instead of naming a stop
        (StopKey::RouteLevel, Some(marker))
    } else if leads_line && names_stop(&label) {
        if !schedule.stops().contains(&label) {
            schedule.push_stop(label.clone());
        }
        (StopKey::Stop(label), day_type)
    } else {
        (StopKey::RouteLevel, day_type)
    };

    let times = run
        .times
        .iter()
        .filter_map(|t| parse_time_token(t).ok())
        .map(|t| DepartureTime::with_day_type(t, day_type));
    schedule.add_departures(key, times);
}

fn names_stop(label: &str) -> bool {
    label.chars().filter(|c| c.is_alphabetic()).count() >= MIN_LABEL_LETTERS
        && !label.chars().any(|c| c.is_ascii_digit())
        && !label
            .split_whitespace()
            .any(|word| CONNECTIVES.contains(&word.to_lowercase().as_str()))
}
