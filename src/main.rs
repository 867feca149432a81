use anyhow::Result;
use std::sync::Arc;

use homesprint_backend::services::{sms, RedisCache};
use homesprint_backend::store::{MemoryStore, PgStore, Store};
use homesprint_backend::{app, config, db, logging};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let settings = config::Settings::from_env()?;

    logging::init_logging(&settings.env);

    tracing::info!(
        env = ?settings.env,
        server_addr = %settings.server_addr,
        "Starting HomeSprint backend"
    );

    let store: Arc<dyn Store> = match &settings.database_url {
        Some(url) => Arc::new(PgStore::new(db::create_pool(&settings, url).await?)),
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    // Redis is optional; the service runs uncached without it
    let cache = match &settings.redis_url {
        Some(url) => match RedisCache::new(url, settings.redis_cache_ttl_seconds).await {
            Ok(cache) => cache,
            Err(e) => {
                tracing::warn!(error = %e, "Redis unavailable, caching disabled");
                RedisCache::disabled()
            }
        },
        None => {
            tracing::info!("REDIS_URL not set, caching disabled");
            RedisCache::disabled()
        }
    };

    let sms = sms::from_provider(&settings.sms_provider)?;

    let state = app::AppState::new(settings.clone(), store, cache, sms);
    let app = app::create_app(state);

    let listener = tokio::net::TcpListener::bind(&settings.server_addr).await?;
    tracing::info!("Listening on {}", settings.server_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
