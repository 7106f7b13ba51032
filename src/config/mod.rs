use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}

// Top-level configuration, one section per concern
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub holds: HoldConfig,
    pub queue: QueueConfig,
    pub reclaimer: ReclaimerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

// Redis only backs the seat-map cache; without it every read goes to Postgres
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: Option<String>,
    pub seat_cache_ttl_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HoldConfig {
    pub default_ttl_minutes: u32,
    pub max_ttl_minutes: u32,
    /// Lifetime of a freshly opened cart before its first hold.
    pub cart_ttl_minutes: u32,
    pub max_seats_per_hold: usize,
}

impl Default for HoldConfig {
    fn default() -> Self {
        Self {
            default_ttl_minutes: 10,
            max_ttl_minutes: 60,
            cart_ttl_minutes: 15,
            max_seats_per_hold: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// How many entries of one scope may be ADMITTED at the same time.
    pub admission_capacity: i64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            admission_capacity: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReclaimerConfig {
    pub enabled: bool,
    pub interval_seconds: u64,
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn parsed_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let holds_default = HoldConfig::default();
        let queue_default = QueueConfig::default();

        Ok(Config {
            app: AppConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parsed_or("PORT", 8000)?,
                environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
                rust_log: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "seat_inventory=debug,tower_http=debug".to_string()),
            },
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                pool_size: parsed_or("DB_POOL_SIZE", 20)?,
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
                seat_cache_ttl_seconds: parsed_or("SEAT_CACHE_TTL_SECONDS", 5)?,
            },
            holds: HoldConfig {
                default_ttl_minutes: parsed_or("HOLD_TTL_MINUTES", holds_default.default_ttl_minutes)?,
                max_ttl_minutes: parsed_or("HOLD_MAX_TTL_MINUTES", holds_default.max_ttl_minutes)?,
                cart_ttl_minutes: parsed_or("CART_TTL_MINUTES", holds_default.cart_ttl_minutes)?,
                max_seats_per_hold: parsed_or("MAX_SEATS_PER_HOLD", holds_default.max_seats_per_hold)?,
            },
            queue: QueueConfig {
                admission_capacity: parsed_or("QUEUE_ADMISSION_CAPACITY", queue_default.admission_capacity)?,
            },
            reclaimer: ReclaimerConfig {
                enabled: parsed_or("ENABLE_RECLAIMER", true)?,
                interval_seconds: parsed_or("RECLAIM_INTERVAL_SECS", 60)?,
            },
        })
    }

    /// Configuration for running without external services (tests, local demos).
    pub fn local() -> Self {
        Config {
            app: AppConfig {
                host: "127.0.0.1".to_string(),
                port: 8000,
                environment: "test".to_string(),
                rust_log: "seat_inventory=debug".to_string(),
            },
            database: DatabaseConfig {
                url: String::new(),
                pool_size: 1,
            },
            redis: RedisConfig {
                url: None,
                seat_cache_ttl_seconds: 5,
            },
            holds: HoldConfig::default(),
            queue: QueueConfig::default(),
            reclaimer: ReclaimerConfig {
                enabled: false,
                interval_seconds: 60,
            },
        }
    }
}
