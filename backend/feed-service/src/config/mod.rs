/// Configuration management for the feed service
///
/// Everything is read from environment variables (a `.env` file is loaded by
/// the binary first). Missing values fall back to development defaults,
/// except where running in production makes a default unsafe.
use s3_utils::S3Config;
use serde::{Deserialize, Serialize};

use crate::services::enrichment::EnrichmentPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub identity: IdentityConfig,
    pub geocoding: GeocodingConfig,
    pub feed: FeedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// Apply embedded migrations on startup
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub s3: S3Config,
    /// Key prefix for post media
    pub media_folder: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Base URL of the identity provider's user API
    pub base_url: String,
    /// Machine-to-machine bearer token
    #[serde(skip_serializing)]
    pub api_token: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingConfig {
    /// Place details endpoint
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
    /// Minimum like count for the trending feed when the caller gives none
    pub trending_threshold: i64,
    pub enrichment_policy: EnrichmentPolicy,
    /// Followers read per page during fan-out
    pub fanout_batch_size: u32,
    /// Concurrent feed-entry inserts per fan-out
    pub fanout_concurrency: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
            trending_threshold: 20,
            enrichment_policy: EnrichmentPolicy::Drop,
            fanout_batch_size: 500,
            fanout_concurrency: 16,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let production = app_env.eq_ignore_ascii_case("production");

        let feed_defaults = FeedConfig::default();

        Ok(Config {
            app: AppConfig {
                env: app_env.clone(),
                host: std::env::var("FEED_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or_default("FEED_SERVICE_PORT", 8080)?,
                log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            },
            database: DatabaseConfig {
                url: match std::env::var("DATABASE_URL") {
                    Ok(url) => url,
                    Err(_) if production => {
                        return Err("DATABASE_URL must be set in production".to_string())
                    }
                    Err(_) => "postgresql://localhost/nova_feed".to_string(),
                },
                max_connections: parse_env_or_default("DATABASE_MAX_CONNECTIONS", 16)?,
                run_migrations: parse_env_or_default("DATABASE_RUN_MIGRATIONS", !production)?,
            },
            storage: StorageConfig {
                s3: S3Config::from_env(),
                media_folder: std::env::var("MEDIA_FOLDER")
                    .map(|folder| folder.trim_matches('/').to_string())
                    .unwrap_or_else(|_| "posts".to_string()),
            },
            identity: {
                let api_token = std::env::var("IDENTITY_API_TOKEN").unwrap_or_default();
                if production && api_token.trim().is_empty() {
                    return Err("IDENTITY_API_TOKEN must be set in production".to_string());
                }
                IdentityConfig {
                    base_url: std::env::var("IDENTITY_BASE_URL")
                        .unwrap_or_else(|_| "http://localhost:8083/api/v1".to_string()),
                    api_token,
                    timeout_ms: parse_env_or_default("IDENTITY_TIMEOUT_MS", 2_000)?,
                }
            },
            geocoding: {
                let api_key = std::env::var("GEOCODING_API_KEY").unwrap_or_default();
                if production && api_key.trim().is_empty() {
                    return Err("GEOCODING_API_KEY must be set in production".to_string());
                }
                GeocodingConfig {
                    base_url: std::env::var("GEOCODING_BASE_URL").unwrap_or_else(|_| {
                        "https://maps.googleapis.com/maps/api/place/details/json".to_string()
                    }),
                    api_key,
                    timeout_ms: parse_env_or_default("GEOCODING_TIMEOUT_MS", 2_000)?,
                }
            },
            feed: FeedConfig {
                default_page_size: parse_env_or_default(
                    "FEED_DEFAULT_PAGE_SIZE",
                    feed_defaults.default_page_size,
                )?,
                max_page_size: parse_env_or_default(
                    "FEED_MAX_PAGE_SIZE",
                    feed_defaults.max_page_size,
                )?,
                trending_threshold: parse_env_or_default(
                    "FEED_TRENDING_THRESHOLD",
                    feed_defaults.trending_threshold,
                )?,
                enrichment_policy: parse_env_or_default(
                    "FEED_ENRICHMENT_POLICY",
                    feed_defaults.enrichment_policy,
                )?,
                fanout_batch_size: parse_env_or_default(
                    "FEED_FANOUT_BATCH_SIZE",
                    feed_defaults.fanout_batch_size,
                )?,
                fanout_concurrency: parse_env_or_default(
                    "FEED_FANOUT_CONCURRENCY",
                    feed_defaults.fanout_concurrency,
                )?,
            },
        })
    }
}

fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(val) => val
            .parse()
            .map_err(|e| format!("Failed to parse {}='{}': {}", key, val, e)),
        Err(_) => Ok(default),
    }
}
