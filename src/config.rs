use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_CACHE_BACKEND: &str = "in-memory";
const DEFAULT_CACHE_NAMESPACE: &str = "storefront";
const DEFAULT_IMAGE_DIR: &str = "images";

/// SMTP settings for order and invoice notifications
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SmtpConfig {
    #[validate(length(min = 1))]
    pub host: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// One configured image size, e.g. `thumb` at 100x100.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSizeConfig {
    pub shortname: String,
    pub width: u32,
    pub height: u32,
    /// Manual uploads must match these dimensions exactly.
    #[serde(default)]
    pub exact: bool,
}

impl ImageSizeConfig {
    pub fn new(shortname: &str, width: u32, height: u32, exact: bool) -> Self {
        Self {
            shortname: shortname.to_string(),
            width,
            height,
            exact,
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "validate_page_sizes"))]
pub struct AppConfig {
    /// Database connection URL
    #[validate(length(min = 1))]
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,

    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,

    /// Secret used to verify admin bearer tokens
    #[validate(length(min = 32))]
    pub jwt_secret: String,

    /// Expected `iss` claim of admin tokens
    #[serde(default = "default_jwt_issuer")]
    pub jwt_issuer: String,

    /// Cache backend: "in-memory" or "redis"
    #[serde(default = "default_cache_backend")]
    #[validate(custom = "validate_cache_backend")]
    pub cache_backend: String,

    /// Redis URL, used when `cache_backend` is "redis"
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Key prefix for cache namespaces
    #[serde(default = "default_cache_namespace")]
    pub cache_namespace: String,

    /// SMTP relay; notifications are only logged when absent
    #[serde(default)]
    #[validate]
    pub smtp: Option<SmtpConfig>,

    /// Sender address for notifications
    #[serde(default = "default_mail_from")]
    pub mail_from: String,

    /// Directory image files are written to
    #[serde(default = "default_image_dir")]
    pub image_dir: PathBuf,

    /// Image sizes generated for categories and products
    #[serde(default = "default_image_sizes")]
    #[validate(custom = "validate_image_sizes")]
    pub image_sizes: Vec<ImageSizeConfig>,

    /// Default currency code for locales created without one
    #[serde(default = "default_currency")]
    #[validate(length(equal = 3))]
    pub default_currency: String,

    #[serde(default = "default_page_size")]
    #[validate(range(min = 1))]
    pub api_default_page_size: u64,

    #[serde(default = "default_max_page_size")]
    #[validate(range(min = 1))]
    pub api_max_page_size: u64,
}

impl AppConfig {
    /// Creates a configuration with defaults for everything but the essentials
    pub fn new(database_url: String, jwt_secret: String, environment: String) -> Self {
        Self {
            database_url,
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            jwt_secret,
            jwt_issuer: default_jwt_issuer(),
            cache_backend: default_cache_backend(),
            redis_url: None,
            cache_namespace: default_cache_namespace(),
            smtp: None,
            mail_from: default_mail_from(),
            image_dir: default_image_dir(),
            image_sizes: default_image_sizes(),
            default_currency: default_currency(),
            api_default_page_size: default_page_size(),
            api_max_page_size: default_max_page_size(),
        }
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn uses_redis_cache(&self) -> bool {
        self.cache_backend.eq_ignore_ascii_case("redis")
    }

    /// Clamp a requested page size to the configured bounds.
    pub fn page_size(&self, requested: Option<u64>) -> u64 {
        requested
            .unwrap_or(self.api_default_page_size)
            .clamp(1, self.api_max_page_size.max(1))
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    16
}
fn default_db_min_connections() -> u32 {
    2
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}

fn default_jwt_issuer() -> String {
    "storefront-admin".to_string()
}

fn default_cache_backend() -> String {
    DEFAULT_CACHE_BACKEND.to_string()
}

fn default_cache_namespace() -> String {
    DEFAULT_CACHE_NAMESPACE.to_string()
}

fn default_mail_from() -> String {
    "orders@storefront.example".to_string()
}

fn default_image_dir() -> PathBuf {
    PathBuf::from(DEFAULT_IMAGE_DIR)
}

pub fn default_image_sizes() -> Vec<ImageSizeConfig> {
    vec![
        ImageSizeConfig::new("thumb", 100, 100, true),
        ImageSizeConfig::new("small", 240, 240, false),
        ImageSizeConfig::new("large", 600, 600, false),
    ]
}

fn default_currency() -> String {
    "CAD".to_string()
}

fn default_page_size() -> u64 {
    50
}

fn default_max_page_size() -> u64 {
    500
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_cache_backend(value: &str) -> Result<(), ValidationError> {
    match value.to_ascii_lowercase().as_str() {
        "in-memory" | "redis" => Ok(()),
        _ => {
            let mut err = ValidationError::new("cache_backend");
            err.message = Some("Must be one of: in-memory, redis".into());
            Err(err)
        }
    }
}

fn validate_image_sizes(sizes: &Vec<ImageSizeConfig>) -> Result<(), ValidationError> {
    if sizes.is_empty() {
        let mut err = ValidationError::new("image_sizes");
        err.message = Some("At least one image size is required".into());
        return Err(err);
    }
    if sizes.iter().any(|s| s.width == 0 || s.height == 0) {
        let mut err = ValidationError::new("image_sizes");
        err.message = Some("Image dimensions must be positive".into());
        return Err(err);
    }
    let mut names: Vec<&str> = sizes.iter().map(|s| s.shortname.as_str()).collect();
    names.sort_unstable();
    names.dedup();
    if names.len() != sizes.len() {
        let mut err = ValidationError::new("image_sizes");
        err.message = Some("Image size shortnames must be unique".into());
        return Err(err);
    }
    Ok(())
}

fn validate_page_sizes(cfg: &AppConfig) -> Result<(), ValidationError> {
    if cfg.api_default_page_size > cfg.api_max_page_size {
        let mut err = ValidationError::new("api_default_page_size");
        err.message = Some("Default page size cannot exceed the maximum page size".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("storefront_admin={},tower_http=info", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. config/default.toml
/// 3. config/{RUN_ENV}.toml
/// 4. Environment variables (APP__*)
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

    let config = Config::builder()
        .set_default("database_url", "sqlite://storefront.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if config.get_string("jwt_secret").is_err() {
        error!("JWT secret is not configured. Set APP__JWT_SECRET (minimum 32 characters).");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret is required but not configured".into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            "a_jwt_secret_that_is_comfortably_longer_than_32".into(),
            "test".into(),
        )
    }

    #[test]
    fn defaults_validate() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn short_jwt_secret_is_rejected() {
        let mut cfg = base_config();
        cfg.jwt_secret = "short".into();
        let errors = cfg.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("jwt_secret"));
    }

    #[test]
    fn unknown_cache_backend_is_rejected() {
        let mut cfg = base_config();
        cfg.cache_backend = "memcache".into();
        let errors = cfg.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("cache_backend"));
    }

    #[test]
    fn duplicate_image_sizes_are_rejected() {
        let mut cfg = base_config();
        cfg.image_sizes.push(ImageSizeConfig::new("thumb", 50, 50, true));
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn page_size_bounds_are_validated() {
        let mut cfg = base_config();
        cfg.api_max_page_size = 0;
        let errors = cfg.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("api_max_page_size"));
        // an unvalidated zero maximum still clamps instead of panicking
        assert_eq!(cfg.page_size(Some(20)), 1);

        let mut cfg = base_config();
        cfg.api_default_page_size = 600;
        let errors = cfg.validate().unwrap_err();
        assert!(errors.errors().contains_key("__all__"));
    }

    #[test]
    fn page_size_is_clamped() {
        let cfg = base_config();
        assert_eq!(cfg.page_size(None), 50);
        assert_eq!(cfg.page_size(Some(0)), 1);
        assert_eq!(cfg.page_size(Some(10_000)), 500);
    }
}
