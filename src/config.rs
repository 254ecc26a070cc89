use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use validator::Validate;

const DEFAULT_ENV: &str = "development";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_RETURN_WINDOW_DAYS: i64 = 7;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_DB_MIN_CONNECTIONS: u32 = 1;
const CONFIG_DIR: &str = "config";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for the order lifecycle core. Loaded from
/// `config/orders.toml` (optional) overlaid with `ORDERS_`-prefixed
/// environment variables, e.g. `ORDERS_DATABASE_URL`,
/// `ORDERS_RETURN_WINDOW_DAYS`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct OrdersConfig {
    /// Database connection URL (Postgres in production, SQLite in
    /// tests).
    #[validate(length(min = 1, message = "database_url must not be empty"))]
    pub database_url: String,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// Days after delivery during which a return request is accepted.
    #[serde(default = "default_return_window_days")]
    #[validate(range(min = 1, max = 365, message = "return_window_days must be 1..=365"))]
    pub return_window_days: i64,

    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_db_max_connections() -> u32 {
    DEFAULT_DB_MAX_CONNECTIONS
}

fn default_db_min_connections() -> u32 {
    DEFAULT_DB_MIN_CONNECTIONS
}

fn default_return_window_days() -> i64 {
    DEFAULT_RETURN_WINDOW_DAYS
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl OrdersConfig {
    /// Loads configuration from the `config/` directory and the
    /// environment, then validates it.
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("ORDERS_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());

        let cfg: OrdersConfig = Config::builder()
            .add_source(File::with_name(&format!("{CONFIG_DIR}/orders")).required(false))
            .add_source(
                File::with_name(&format!("{CONFIG_DIR}/orders.{environment}")).required(false),
            )
            .add_source(Environment::with_prefix("ORDERS"))
            .build()?
            .try_deserialize()?;

        cfg.validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(cfg)
    }

    /// A config pointing at the given database with defaults everywhere
    /// else. Used by tests and simple embeddings.
    pub fn for_database(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            db_min_connections: DEFAULT_DB_MIN_CONNECTIONS,
            return_window_days: DEFAULT_RETURN_WINDOW_DAYS,
            environment: "test".to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }

    pub fn return_window(&self) -> chrono::Duration {
        chrono::Duration::days(self.return_window_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_applied() {
        let cfg = OrdersConfig::for_database("sqlite::memory:");
        assert_eq!(cfg.return_window_days, 7);
        assert_eq!(cfg.return_window(), chrono::Duration::days(7));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn out_of_range_return_window_fails_validation() {
        let mut cfg = OrdersConfig::for_database("sqlite::memory:");
        cfg.return_window_days = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn empty_database_url_fails_validation() {
        let cfg = OrdersConfig::for_database("");
        assert!(cfg.validate().is_err());
    }
}
