use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};
use translation_api::api::{create_router, AppState};
use translation_api::cache::MemoryCache;
use translation_api::config::Config;
use translation_api::db::Database;
use translation_api::service::TranslationService;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored when absent)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("translation_api=info".parse()?),
        )
        .init();

    info!("Starting translation API");

    let config = Config::from_env()?;
    if config.api_token.is_none() {
        warn!("API_TOKEN is not set, /api/v1 routes are unauthenticated");
    }

    let db = Database::new(&config.database_url).await?;
    info!("✓ Database ready at {}", config.database_url);

    let cache = MemoryCache::new();
    spawn_cache_sweeper(cache.clone(), config.cache_ttl());

    let service = TranslationService::new(db, Arc::new(cache), config.cache_ttl());
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = create_router(AppState::new(service, config));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind {}", addr))?;
    info!("✓ Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

/// Periodically drop expired entries that were never read again
fn spawn_cache_sweeper(cache: MemoryCache, period: std::time::Duration) {
    if period.is_zero() {
        return;
    }
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = cache.cleanup_expired().await;
            debug!("Swept {} expired cache entries", removed);
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
