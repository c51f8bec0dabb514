use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use validator::{Validate, ValidationError};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";

/// Application configuration structure with validation.
///
/// Operational knobs that the booking engine depends on (hold grace window,
/// rate-adjustment band, sync retry policy) are explicit fields here rather
/// than literals scattered through the services.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

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

    /// Whether to create missing tables on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Shared secret for verifying payment provider callbacks; unset means
    /// every webhook is rejected
    #[serde(default)]
    pub payment_webhook_secret: Option<String>,

    /// Webhook timestamp tolerance (seconds)
    #[serde(default = "default_webhook_tolerance_secs")]
    pub payment_webhook_tolerance_secs: u64,

    /// Minutes an unpaid pending booking may hold inventory before the
    /// auto-cancellation sweep expires it
    #[serde(default = "default_hold_grace_minutes")]
    pub booking_hold_grace_minutes: i64,

    /// Interval between auto-cancellation sweeps (seconds)
    #[serde(default = "default_expiry_sweep_interval_secs")]
    pub expiry_sweep_interval_secs: u64,

    /// Interval between scheduled channel sync cycles (seconds)
    #[serde(default = "default_sync_interval_secs")]
    pub channel_sync_interval_secs: u64,

    /// How many days ahead rates/availability are pushed to channels
    #[serde(default = "default_sync_horizon_days")]
    pub sync_horizon_days: i64,

    /// Max attempts per channel adapter call
    #[serde(default = "default_sync_retry_attempts")]
    pub sync_retry_attempts: u32,

    /// Base backoff between retries (milliseconds), doubled per attempt
    #[serde(default = "default_sync_retry_backoff_ms")]
    pub sync_retry_backoff_ms: u64,

    /// Per-call timeout for channel adapters (seconds)
    #[serde(default = "default_adapter_timeout_secs")]
    pub channel_adapter_timeout_secs: u64,

    /// Demand multiplier applied to rates pushed to channels
    #[serde(default = "default_multiplier")]
    #[validate(custom = "validate_multiplier")]
    pub rate_demand_multiplier: f64,

    /// Extra multiplier applied to Friday/Saturday nights
    #[serde(default = "default_multiplier")]
    #[validate(custom = "validate_multiplier")]
    pub rate_weekend_multiplier: f64,

    /// Lower clamp bound, as a factor of the resolved base rate
    #[serde(default = "default_rate_min_factor")]
    #[validate(custom = "validate_multiplier")]
    pub rate_min_factor: f64,

    /// Upper clamp bound, as a factor of the resolved base rate
    #[serde(default = "default_rate_max_factor")]
    #[validate(custom = "validate_multiplier")]
    pub rate_max_factor: f64,

    /// TTL for the in-process pricing-rule cache (seconds)
    #[serde(default = "default_pricing_cache_ttl_secs")]
    pub pricing_cache_ttl_secs: u64,

    /// Event channel capacity for async event processing
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
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
fn default_db_acquire_timeout_secs() -> u64 {
    8
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_webhook_tolerance_secs() -> u64 {
    300
}
fn default_hold_grace_minutes() -> i64 {
    30
}
fn default_expiry_sweep_interval_secs() -> u64 {
    60
}
fn default_sync_interval_secs() -> u64 {
    900
}
fn default_sync_horizon_days() -> i64 {
    30
}
fn default_sync_retry_attempts() -> u32 {
    3
}
fn default_sync_retry_backoff_ms() -> u64 {
    500
}
fn default_adapter_timeout_secs() -> u64 {
    10
}
fn default_multiplier() -> f64 {
    1.0
}
fn default_rate_min_factor() -> f64 {
    0.5
}
fn default_rate_max_factor() -> f64 {
    2.0
}
fn default_pricing_cache_ttl_secs() -> u64 {
    60
}
fn default_event_channel_capacity() -> usize {
    1024
}

fn validate_multiplier(value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        let mut err = ValidationError::new("multiplier_out_of_range");
        err.message = Some("rate multipliers must be finite and positive".into());
        Err(err)
    }
}

impl AppConfig {
    /// Minimal constructor used by tests.
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            cors_allowed_origins: None,
            payment_webhook_secret: None,
            payment_webhook_tolerance_secs: default_webhook_tolerance_secs(),
            booking_hold_grace_minutes: default_hold_grace_minutes(),
            expiry_sweep_interval_secs: default_expiry_sweep_interval_secs(),
            channel_sync_interval_secs: default_sync_interval_secs(),
            sync_horizon_days: default_sync_horizon_days(),
            sync_retry_attempts: default_sync_retry_attempts(),
            sync_retry_backoff_ms: default_sync_retry_backoff_ms(),
            channel_adapter_timeout_secs: default_adapter_timeout_secs(),
            rate_demand_multiplier: default_multiplier(),
            rate_weekend_multiplier: default_multiplier(),
            rate_min_factor: default_rate_min_factor(),
            rate_max_factor: default_rate_max_factor(),
            pricing_cache_ttl_secs: default_pricing_cache_ttl_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development") || self.environment.eq_ignore_ascii_case("dev")
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

/// Loads configuration from layered sources: `config/default.toml`, then
/// `config/{environment}.toml`, then `APP__`-prefixed environment variables.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let environment = env::var("APP_ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let mut builder = Config::builder();

    let default_path = Path::new(CONFIG_DIR).join("default.toml");
    if default_path.exists() {
        builder = builder.add_source(File::from(default_path));
    }
    let env_path = Path::new(CONFIG_DIR).join(format!("{environment}.toml"));
    if env_path.exists() {
        builder = builder.add_source(File::from(env_path));
    }

    let settings = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .set_default("environment", environment)?
        .build()?;

    let cfg: AppConfig = settings.try_deserialize()?;
    cfg.validate()
        .map_err(|e| ConfigError::Message(format!("invalid configuration: {e}")))?;
    Ok(cfg)
}

/// Initializes the global tracing subscriber from the configured level.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = AppConfig::new(
            "sqlite::memory:".into(),
            "127.0.0.1".into(),
            8080,
            "test".into(),
        );
        assert_eq!(cfg.booking_hold_grace_minutes, 30);
        assert_eq!(cfg.sync_retry_attempts, 3);
        assert!(cfg.rate_min_factor < cfg.rate_max_factor);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_multiplier() {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".into(),
            "127.0.0.1".into(),
            8080,
            "test".into(),
        );
        cfg.rate_demand_multiplier = 0.0;
        assert!(cfg.validate().is_err());

        cfg.rate_demand_multiplier = 1.0;
        cfg.rate_weekend_multiplier = f64::NAN;
        assert!(cfg.validate().is_err());
    }
}
