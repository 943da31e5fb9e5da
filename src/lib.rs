pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod layout;
pub mod models;
pub mod redis_client;
pub mod search;
pub mod services;
pub mod session;
pub mod spreadsheet;
pub mod storage;

use std::sync::Arc;
use tracing::{info, warn};

use config::{Config, StorageBackend};
use services::SeatingService;
use storage::{DynStorage, MemoryStore, PgStore, SheetsStore};

// Shared state для всего приложения
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub seating: Arc<SeatingService>,
    pub cache: cache::CacheService,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Arc<Self>> {
        let store = open_storage(&config).await?;

        let redis = match redis_client::RedisClient::connect_optional(config.redis.url.as_deref()).await {
            Ok(redis) => redis,
            Err(e) => {
                // без Redis сервис работает, просто без кеша схемы
                warn!(error = %e, "Redis unavailable, layout cache disabled");
                None
            }
        };
        let cache = cache::CacheService::new(redis, config.redis.layout_ttl_seconds);

        let seating = Arc::new(SeatingService::new(store, &config.seating));
        seating.spawn_eviction(config.seating.eviction_interval(), config.seating.session_idle());

        Ok(Arc::new(Self { config, seating, cache }))
    }

    /// Состояние поверх готового хранилища, без Redis и фоновых задач.
    pub fn with_storage(config: Config, store: DynStorage) -> Arc<Self> {
        let seating = Arc::new(SeatingService::new(store, &config.seating));
        Arc::new(Self { config, seating, cache: cache::CacheService::disabled() })
    }
}

async fn open_storage(config: &Config) -> anyhow::Result<DynStorage> {
    let store: DynStorage = match config.storage.backend {
        StorageBackend::Postgres => {
            let url = config
                .database
                .url
                .as_deref()
                .ok_or(config::ConfigError::Missing("DATABASE_URL"))?;
            let db = database::Database::new(url, config.database.pool_size).await?;
            db.run_migrations().await?;
            Arc::new(PgStore::new(&db))
        }
        StorageBackend::Sheets => Arc::new(SheetsStore::new(&config.sheets, &config.circuit_breaker)?),
        StorageBackend::Memory => {
            warn!("Using in-memory storage, data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };
    info!(backend = ?config.storage.backend, "Storage ready");
    Ok(store)
}
