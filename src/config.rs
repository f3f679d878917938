use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";

/// Shipping carrier collaborator configuration.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct CarrierConfig {
    /// Carrier API base URL
    pub base_url: String,
    /// Carrier API token
    pub token: String,
    /// Origin (pickup) address fields used on every booking
    pub origin_address: String,
    pub origin_ward_code: String,
    pub origin_district_id: i32,
    /// Request timeout in seconds
    #[serde(default = "default_carrier_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_carrier_timeout_secs() -> u64 {
    10
}

/// Hosted payment gateway configuration.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct GatewayConfig {
    /// Gateway hosted-payment base URL
    pub base_url: String,
    /// Merchant terminal code issued by the gateway
    pub merchant_code: String,
    /// HMAC secret used to sign the redirect query and verify callbacks
    #[validate(length(min = 16))]
    pub hash_secret: String,
    /// URL the gateway redirects the buyer back to
    pub return_url: String,
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
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
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to create missing tables on startup (SQLite/dev only)
    #[serde(default)]
    pub auto_migrate: bool,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// Shipping carrier collaborator
    #[validate]
    pub carrier: CarrierConfig,

    /// Payment gateway collaborator
    #[validate]
    pub gateway: GatewayConfig,
}

fn default_port() -> u16 {
    DEFAULT_PORT
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

impl AppConfig {
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

/// Loads configuration from `config/default`, an environment-specific file,
/// and `APP__`-prefixed environment variables (highest precedence).
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
        .set_default("database_url", "sqlite://marketplace.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;
    app_config.validate()?;
    Ok(app_config)
}

/// Initializes the tracing subscriber. `RUST_LOG` takes precedence over the
/// configured level.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("marketplace_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".into(),
            host: "127.0.0.1".into(),
            port: 8080,
            environment: "test".into(),
            log_level: "debug".into(),
            log_json: false,
            auto_migrate: true,
            db_max_connections: 5,
            db_min_connections: 1,
            carrier: CarrierConfig {
                base_url: "http://localhost:9000".into(),
                token: "token".into(),
                origin_address: "1 Warehouse Way".into(),
                origin_ward_code: "21211".into(),
                origin_district_id: 1444,
                timeout_secs: 10,
            },
            gateway: GatewayConfig {
                base_url: "http://localhost:9001/pay".into(),
                merchant_code: "MKT0001".into(),
                hash_secret: "0123456789abcdef0123456789abcdef".into(),
                return_url: "http://localhost:8080/payments/return".into(),
            },
        }
    }

    #[test]
    fn sample_config_validates() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn short_hash_secret_is_rejected() {
        let mut cfg = sample_config();
        cfg.gateway.hash_secret = "short".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn bind_addr_joins_host_and_port() {
        assert_eq!(sample_config().bind_addr(), "127.0.0.1:8080");
    }
}
