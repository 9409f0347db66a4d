//! Application state for the web layer.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::cache::CachedTimetables;
use crate::registry::{RouteEntry, RouteRegistry};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Known routes, including ones registered at runtime
    pub registry: Arc<RwLock<RouteRegistry>>,

    /// Document fetcher with memoized extraction
    pub timetables: Arc<CachedTimetables>,
}

impl AppState {
    /// Create a new app state.
    pub fn new(registry: RouteRegistry, timetables: CachedTimetables) -> Self {
        Self {
            registry: Arc::new(RwLock::new(registry)),
            timetables: Arc::new(timetables),
        }
    }

    /// Look up a route, releasing the registry lock before returning.
    pub async fn route(&self, route_code: &str) -> Option<RouteEntry> {
        self.registry.read().await.resolve(route_code).cloned()
    }
}
