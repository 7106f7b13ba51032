pub mod cache;
pub mod clock;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod models;
pub mod redis_client;
pub mod services;
pub mod store;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::clock::SystemClock;
use crate::services::InventoryService;
use crate::store::PgInventoryStore;

// Shared state for every handler
#[derive(Clone)]
pub struct AppState {
    pub inventory: InventoryService,
    pub config: config::Config,
}

impl AppState {
    /// Connects to Postgres (required) and Redis (optional) and runs migrations.
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let db = database::Database::connect(&config.database).await?;
        db.run_migrations().await?;

        let cache = match &config.redis.url {
            Some(url) => match redis_client::RedisClient::connect(url).await {
                Ok(redis) => {
                    info!("Redis connected, seat maps cached for {}s", config.redis.seat_cache_ttl_seconds);
                    Some(cache::CacheService::new(redis, config.redis.seat_cache_ttl_seconds))
                }
                Err(e) => {
                    warn!("Redis unavailable, running without seat cache: {:?}", e);
                    None
                }
            },
            None => None,
        };

        let inventory = InventoryService::new(
            Arc::new(PgInventoryStore::new(&db)),
            cache,
            Arc::new(SystemClock),
            config.holds.clone(),
            config.queue.clone(),
        );
        Ok(Arc::new(Self { inventory, config }))
    }

    /// State around an already built service, e.g. one over the in-memory store.
    pub fn with_inventory(inventory: InventoryService, config: config::Config) -> Arc<Self> {
        Arc::new(Self { inventory, config })
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
