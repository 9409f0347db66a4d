//! Route registry: route code → upstream timetable identifiers.
//!
//! The registry starts with the RTA routes known to publish timetables and
//! can be extended at runtime. Identifiers are not validated on registration;
//! a bad identifier surfaces as a fetch error on first use.

use serde::Serialize;

/// Built-in routes: (route code, line id, line name).
const BUILT_IN_ROUTES: &[(&str, &str, &str)] = &[
    ("SH1", "dub:01SH1: :H:y08", "bus SH1"),
    ("D03", "dub:01D03: :H:y08", "bus D03"),
    ("E411", "dub:10411: :H:y08", "bus E411"),
    ("F62", "dub:12F62: :H:y08", "bus F62"),
    ("8", "dub:00008: :H:y08", "bus 8"),
    ("11", "dub:00011: :H:y08", "bus 11"),
    ("C01", "dub:01C01: :H:y08", "bus C01"),
    ("C10", "dub:01C10: :H:y08", "bus C10"),
];

/// Identifiers needed to request a route's timetable document.
///
/// `line_id` and `line_name` are stored unencoded; they are URL-encoded when
/// the download request is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteEntry {
    pub route_code: String,
    pub line_id: String,
    pub line_name: String,
}

impl RouteEntry {
    pub fn new(
        route_code: impl Into<String>,
        line_id: impl Into<String>,
        line_name: impl Into<String>,
    ) -> Self {
        Self {
            route_code: route_code.into(),
            line_id: line_id.into(),
            line_name: line_name.into(),
        }
    }

    /// Build an entry using the RTA's conventional identifier scheme.
    ///
    /// Used for routes that arrive by manual import without registration.
    ///
    /// # Examples
    ///
    /// ```
    /// use timetable_server::registry::RouteEntry;
    ///
    /// let entry = RouteEntry::derived("X28");
    /// assert_eq!(entry.line_id, "dub:01X28: :H:y08");
    /// assert_eq!(entry.line_name, "bus X28");
    /// ```
    pub fn derived(route_code: &str) -> Self {
        Self::new(
            route_code,
            format!("dub:01{route_code}: :H:y08"),
            format!("bus {route_code}"),
        )
    }
}

/// Outcome of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registered {
    /// The code was new.
    Added,
    /// An existing entry with the same code was replaced in place.
    ///
    /// Any cached document for the code is kept; clear it explicitly if the
    /// identifiers now point at a different timetable.
    Replaced,
}

/// Route registry.
///
/// Route codes are case-sensitive and matched exactly.
#[derive(Debug, Clone)]
pub struct RouteRegistry {
    /// Built-ins first, then custom entries in registration order.
    entries: Vec<RouteEntry>,
}

impl RouteRegistry {
    /// Create a registry holding the built-in routes.
    pub fn new() -> Self {
        let entries = BUILT_IN_ROUTES
            .iter()
            .map(|(code, line_id, line_name)| RouteEntry::new(*code, *line_id, *line_name))
            .collect();
        Self { entries }
    }

    /// Look up a route by code.
    pub fn resolve(&self, route_code: &str) -> Option<&RouteEntry> {
        self.entries.iter().find(|e| e.route_code == route_code)
    }

    /// Register a route, replacing any entry with the same code.
    pub fn register(
        &mut self,
        route_code: impl Into<String>,
        line_id: impl Into<String>,
        line_name: impl Into<String>,
    ) -> Registered {
        let entry = RouteEntry::new(route_code, line_id, line_name);

        match self
            .entries
            .iter_mut()
            .find(|e| e.route_code == entry.route_code)
        {
            Some(existing) => {
                *existing = entry;
                Registered::Replaced
            }
            None => {
                self.entries.push(entry);
                Registered::Added
            }
        }
    }

    /// All routes in stable order.
    pub fn list(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for RouteRegistry {
    fn default() -> Self {
        Self::new()
    }
}
