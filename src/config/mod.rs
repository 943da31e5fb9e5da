use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub storage: StorageConfig,
    pub sheets: SheetsConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub seating: SeatingConfig,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

// Настройки базы данных; без DATABASE_URL Postgres не используется
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub pool_size: u32,
}

// Настройки Redis; без REDIS_URL кеш схемы зала отключён
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: Option<String>,
    pub layout_ttl_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Sheets,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

// Настройки Google Sheets
#[derive(Debug, Clone, Deserialize)]
pub struct SheetsConfig {
    pub base_url: String,
    pub spreadsheet_id: Option<String>,
    pub access_token: Option<String>,
    pub timeout_seconds: u64,
}

// Настройки Circuit Breaker
#[derive(Debug, Clone, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub timeout_seconds: u64,
}

// Настройки сессий рассадки
#[derive(Debug, Clone, Deserialize)]
pub struct SeatingConfig {
    /// Откатывать локальное изменение, если запись в хранилище не удалась.
    pub rollback_on_persist_failure: bool,
    pub command_log_capacity: usize,
    pub max_grid_cells: u64,
    pub session_idle_seconds: u64,
    pub eviction_interval_seconds: u64,
}

impl SeatingConfig {
    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_seconds)
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval_seconds)
    }
}

impl Default for SeatingConfig {
    fn default() -> Self {
        Self {
            rollback_on_persist_failure: false,
            command_log_capacity: 256,
            max_grid_cells: 20_000,
            session_idle_seconds: 1800,
            eviction_interval_seconds: 60,
        }
    }
}

/// Обёртка над источником переменных: окружение в проде, замыкание в тестах.
struct Vars<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn string(&self, key: &'static str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn optional(&self, key: &'static str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn parse<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.optional(key) {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { key, value }),
            None => Ok(default),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };
        let defaults = SeatingConfig::default();

        let log_format = match vars.string("LOG_FORMAT", "text").to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "text" | "pretty" => LogFormat::Text,
            other => return Err(ConfigError::Invalid { key: "LOG_FORMAT", value: other.to_string() }),
        };

        let database_url = vars.optional("DATABASE_URL");
        let sheets_id = vars.optional("GOOGLE_SHEETS_ID");

        // по умолчанию берём то хранилище, для которого есть настройки
        let default_backend = if database_url.is_some() {
            "postgres"
        } else if sheets_id.is_some() {
            "sheets"
        } else {
            "memory"
        };
        let backend = match vars.string("STORAGE_BACKEND", default_backend).to_ascii_lowercase().as_str() {
            "postgres" => StorageBackend::Postgres,
            "sheets" => StorageBackend::Sheets,
            "memory" => StorageBackend::Memory,
            other => return Err(ConfigError::Invalid { key: "STORAGE_BACKEND", value: other.to_string() }),
        };

        if backend == StorageBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }
        if backend == StorageBackend::Sheets && sheets_id.is_none() {
            return Err(ConfigError::Missing("GOOGLE_SHEETS_ID"));
        }

        Ok(Config {
            app: AppConfig {
                host: vars.string("HOST", "0.0.0.0"),
                port: vars.parse("PORT", 8000)?,
                environment: vars.string("ENVIRONMENT", "development"),
                rust_log: vars.string("RUST_LOG", "protocol_seating=debug,tower_http=debug"),
                log_format,
            },
            database: DatabaseConfig {
                url: database_url,
                pool_size: vars.parse("DB_POOL_SIZE", 20)?,
            },
            redis: RedisConfig {
                url: vars.optional("REDIS_URL"),
                layout_ttl_seconds: vars.parse("LAYOUT_CACHE_TTL_SECONDS", 300)?,
            },
            storage: StorageConfig { backend },
            sheets: SheetsConfig {
                base_url: vars.string("GOOGLE_SHEETS_BASE_URL", "https://sheets.googleapis.com"),
                spreadsheet_id: sheets_id,
                access_token: vars.optional("GOOGLE_SHEETS_ACCESS_TOKEN"),
                timeout_seconds: vars.parse("GOOGLE_SHEETS_TIMEOUT_SECONDS", 10)?,
            },
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: vars.parse("CIRCUIT_BREAKER_FAILURE_THRESHOLD", 5)?,
                timeout_seconds: vars.parse("CIRCUIT_BREAKER_TIMEOUT_SECONDS", 60)?,
            },
            seating: SeatingConfig {
                rollback_on_persist_failure: vars
                    .parse("SEATING_ROLLBACK_ON_PERSIST_FAILURE", defaults.rollback_on_persist_failure)?,
                command_log_capacity: vars.parse("SEATING_COMMAND_LOG_CAPACITY", defaults.command_log_capacity)?,
                max_grid_cells: vars.parse("SEATING_MAX_GRID_CELLS", defaults.max_grid_cells)?,
                session_idle_seconds: vars.parse("SEATING_SESSION_IDLE_SECONDS", defaults.session_idle_seconds)?,
                eviction_interval_seconds: vars
                    .parse("SEATING_EVICTION_INTERVAL_SECONDS", defaults.eviction_interval_seconds)?,
            },
        })
    }
}
