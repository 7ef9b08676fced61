use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_MESSAGE_QUEUE_BACKEND: &str = "in-memory";
const DEFAULT_MESSAGE_QUEUE_NAMESPACE: &str = "crewdeck:mq";
const DEV_DEFAULT_JWT_SECRET: &str =
    "this_is_a_development_secret_key_that_is_at_least_64_characters_long_for_testing";

/// Application configuration with validation
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Redis connection URL
    pub redis_url: String,

    /// JWT secret key used to verify externally issued tokens
    #[validate(length(min = 32))]
    pub jwt_secret: String,

    /// Expected JWT issuer
    #[serde(default = "default_jwt_issuer")]
    pub jwt_issuer: String,

    /// Expected JWT audience
    #[serde(default = "default_jwt_audience")]
    pub jwt_audience: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Max attempts for the booking-approval transaction (transient errors only)
    #[validate(range(min = 1, max = 10))]
    #[serde(default = "default_booking_tx_max_attempts")]
    pub booking_tx_max_attempts: u32,

    /// Max attempts for the post-commit event-bus publish
    #[validate(range(min = 1, max = 10))]
    #[serde(default = "default_event_publish_max_attempts")]
    pub event_publish_max_attempts: u32,

    /// Fixed delay between publish attempts (milliseconds)
    #[serde(default = "default_event_publish_retry_delay_ms")]
    pub event_publish_retry_delay_ms: u64,

    /// Message queue backend: "in-memory" or "redis"
    #[serde(default = "default_message_queue_backend")]
    pub message_queue_backend: String,

    /// Key namespace for the redis message queue
    #[serde(default = "default_message_queue_namespace")]
    pub message_queue_namespace: String,

    /// TTL for cached kit template lists (seconds)
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_jwt_issuer() -> String {
    "crewdeck-auth".to_string()
}
fn default_jwt_audience() -> String {
    "crewdeck-api".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}
fn default_booking_tx_max_attempts() -> u32 {
    3
}
fn default_event_publish_max_attempts() -> u32 {
    3
}
fn default_event_publish_retry_delay_ms() -> u64 {
    200
}
fn default_message_queue_backend() -> String {
    DEFAULT_MESSAGE_QUEUE_BACKEND.to_string()
}
fn default_message_queue_namespace() -> String {
    DEFAULT_MESSAGE_QUEUE_NAMESPACE.to_string()
}
fn default_cache_ttl_secs() -> u64 {
    300
}

impl AppConfig {
    /// Construct a configuration programmatically (primarily for tests).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        database_url: String,
        redis_url: String,
        jwt_secret: String,
        host: String,
        port: u16,
        environment: String,
    ) -> Self {
        Self {
            database_url,
            redis_url,
            jwt_secret,
            jwt_issuer: default_jwt_issuer(),
            jwt_audience: default_jwt_audience(),
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            booking_tx_max_attempts: default_booking_tx_max_attempts(),
            event_publish_max_attempts: default_event_publish_max_attempts(),
            event_publish_retry_delay_ms: default_event_publish_retry_delay_ms(),
            message_queue_backend: default_message_queue_backend(),
            message_queue_namespace: default_message_queue_namespace(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development" || self.environment == "test"
    }
}

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
    #[error("{0}")]
    Missing(String),
}

/// Load configuration from built-in defaults, `config/{env}.toml` files and
/// `APP__`-prefixed environment variables, then validate it.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let builder = Config::builder()
        .set_default("database_url", "sqlite://crewdeck.db?mode=rwc")?
        .set_default("redis_url", "redis://localhost:6379")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false));

    let config = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    // jwt_secret has no production default; the development fallback keeps
    // local startup friction low but is rejected outside development.
    let mut cfg: AppConfig = match config.get_string("jwt_secret") {
        Ok(_) => config.try_deserialize()?,
        Err(_) if run_env == "development" || run_env == "test" => {
            let with_secret = Config::builder()
                .add_source(config)
                .set_override("jwt_secret", DEV_DEFAULT_JWT_SECRET)?
                .build()?;
            with_secret.try_deserialize()?
        }
        Err(_) => {
            return Err(AppConfigError::Missing(
                "jwt_secret must be set via APP__JWT_SECRET or a config file".to_string(),
            ))
        }
    };

    if cfg.environment.is_empty() {
        cfg.environment = run_env;
    }

    cfg.validate()?;
    Ok(cfg)
}

/// Initialize the tracing subscriber with an env-filter and optional JSON output.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("crewdeck_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::try_new(filter_directive).unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".to_string(),
            "redis://127.0.0.1:6379".to_string(),
            "a_test_secret_key_that_is_long_enough_for_validation".to_string(),
            "127.0.0.1".to_string(),
            18080,
            "test".to_string(),
        )
    }

    #[test]
    fn programmatic_config_passes_validation() {
        let cfg = test_config();
        assert!(cfg.validate().is_ok());
        assert!(cfg.is_development());
    }

    #[test]
    fn short_jwt_secret_is_rejected() {
        let mut cfg = test_config();
        cfg.jwt_secret = "too-short".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn retry_bounds_are_validated() {
        let mut cfg = test_config();
        cfg.booking_tx_max_attempts = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn shipped_defaults_agree_with_code_defaults() {
        // Tokens verified under the built-in issuer/audience must stay valid
        // when config/default.toml is picked up, and vice versa.
        let file = Config::builder()
            .add_source(File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .build()
            .expect("shipped default.toml must parse");
        assert_eq!(file.get_string("jwt_issuer").unwrap(), default_jwt_issuer());
        assert_eq!(
            file.get_string("jwt_audience").unwrap(),
            default_jwt_audience()
        );
    }
}
