//! Extracted schedule for a single route.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::DepartureTime;

/// Key of a departure list: a named stop, or the whole route when times
/// could not be attributed to a stop.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StopKey {
    Stop(String),
    RouteLevel,
}

impl fmt::Display for StopKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopKey::Stop(name) => f.write_str(name),
            StopKey::RouteLevel => f.write_str("(all stops)"),
        }
    }
}

/// Which extraction stage produced the structured part of a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStage {
    /// Stops and times came from a table.
    Table,
    /// Times came from runs of time tokens in running text.
    FreeText,
    /// Nothing structured was recovered; only the text is available.
    RawTextOnly,
}

impl ExtractionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStage::Table => "table",
            ExtractionStage::FreeText => "free_text",
            ExtractionStage::RawTextOnly => "raw_text_only",
        }
    }
}

/// A normalized timetable for one route.
///
/// Derived from a cached document on demand; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    route_code: String,
    stops: Vec<String>,
    departures: BTreeMap<StopKey, BTreeSet<DepartureTime>>,
    raw_text: String,
    stage: ExtractionStage,
}

impl Schedule {
    /// Create a schedule with no structured data.
    pub fn new(route_code: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            route_code: route_code.into(),
            stops: Vec::new(),
            departures: BTreeMap::new(),
            raw_text: raw_text.into(),
            stage: ExtractionStage::RawTextOnly,
        }
    }

    /// Append a stop in route order. Repeated stops (loops) are kept.
    pub fn push_stop(&mut self, name: impl Into<String>) {
        self.stops.push(name.into());
    }

    /// Add departures for a key; the set keeps them sorted and deduplicated.
    pub fn add_departures(
        &mut self,
        key: StopKey,
        times: impl IntoIterator<Item = DepartureTime>,
    ) {
        self.departures.entry(key).or_default().extend(times);
    }

    pub fn set_stage(&mut self, stage: ExtractionStage) {
        self.stage = stage;
    }

    pub fn route_code(&self) -> &str {
        &self.route_code
    }

    pub fn stops(&self) -> &[String] {
        &self.stops
    }

    pub fn departures(&self) -> &BTreeMap<StopKey, BTreeSet<DepartureTime>> {
        &self.departures
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn stage(&self) -> ExtractionStage {
        self.stage
    }

    /// Departures recorded for a named stop.
    pub fn departures_at(&self, stop: &str) -> Option<&BTreeSet<DepartureTime>> {
        self.departures.get(&StopKey::Stop(stop.to_string()))
    }

    /// Union of every departure list.
    pub fn all_departures(&self) -> BTreeSet<DepartureTime> {
        self.departures.values().flatten().copied().collect()
    }

    /// Total number of departures across all keys.
    pub fn departure_count(&self) -> usize {
        self.departures.values().map(BTreeSet::len).sum()
    }

    pub fn has_departures(&self) -> bool {
        self.departures.values().any(|set| !set.is_empty())
    }

    /// A partial result: no departures recovered, but text is available for
    /// manual inspection.
    pub fn is_weak(&self) -> bool {
        !self.has_departures() && !self.raw_text.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(h: u32, m: u32) -> DepartureTime {
        DepartureTime::at(h, m).unwrap()
    }

    #[test]
    fn departures_are_sorted_and_deduplicated() {
        let mut schedule = Schedule::new("SH1", "");
        let key = StopKey::Stop("Ibn Battuta".into());
        schedule.add_departures(key.clone(), [dep(9, 0), dep(6, 30), dep(9, 0)]);
        schedule.add_departures(key.clone(), [dep(7, 15)]);

        let times: Vec<String> = schedule.departures()[&key]
            .iter()
            .map(|d| d.to_string())
            .collect();
        assert_eq!(times, vec!["06:30", "07:15", "09:00"]);
    }

    #[test]
    fn union_across_stops() {
        let mut schedule = Schedule::new("SH1", "");
        schedule.add_departures(StopKey::Stop("A".into()), [dep(6, 0), dep(7, 0)]);
        schedule.add_departures(StopKey::Stop("B".into()), [dep(6, 10), dep(7, 0)]);

        assert_eq!(schedule.all_departures().len(), 3);
        assert_eq!(schedule.departure_count(), 4);
        assert!(schedule.departures_at("A").is_some());
        assert!(schedule.departures_at("C").is_none());
    }

    #[test]
    fn weak_when_only_text() {
        let schedule = Schedule::new("SH1", "Route SH1");
        assert!(schedule.is_weak());
        assert_eq!(schedule.stage(), ExtractionStage::RawTextOnly);

        let empty = Schedule::new("SH1", "  ");
        assert!(!empty.is_weak());

        let mut parsed = Schedule::new("SH1", "Route SH1");
        parsed.add_departures(StopKey::RouteLevel, [dep(5, 0)]);
        assert!(!parsed.is_weak());
    }

    #[test]
    fn repeated_stops_are_kept() {
        let mut schedule = Schedule::new("C01", "");
        schedule.push_stop("Satwa");
        schedule.push_stop("Karama");
        schedule.push_stop("Satwa");
        assert_eq!(schedule.stops(), ["Satwa", "Karama", "Satwa"]);
    }
}
