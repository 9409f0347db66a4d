use std::error::Error;

use tracing::info;
use tracing_subscriber::EnvFilter;

use timetable_server::cache::{CacheConfig, CachedTimetables};
use timetable_server::config::ServerConfig;
use timetable_server::documents::{DocumentCache, DocumentFetcher, TimetableClient};
use timetable_server::registry::RouteRegistry;
use timetable_server::web::{AppState, create_router};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;

    let client = TimetableClient::new(config.client.clone())?;
    let documents = DocumentCache::new(&config.cache_dir);
    let fetcher = DocumentFetcher::new(client, documents);
    let timetables = CachedTimetables::new(fetcher, &CacheConfig::default());

    let registry = RouteRegistry::new();
    info!(
        routes = registry.len(),
        cache_dir = %config.cache_dir.display(),
        base_url = %config.client.base_url,
        "starting timetable server"
    );

    let state = AppState::new(registry, timetables);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!("listening on http://{}", config.bind);
    info!("  GET    /health");
    info!("  GET    /routes              POST /routes");
    info!("  GET    /routes/:code/schedule");
    info!("  GET    /routes/:code/next?time=HH:MM&stop=..&day=friday|weekend");
    info!("  GET    /cache               DELETE /cache[/:code]");
    info!("  POST   /cache/import");

    axum::serve(listener, app).await?;
    Ok(())
}
