//! # Application Configuration
//!
//! Settings read from the environment at startup.
//!
//! | Variable                          | Default          |
//! |-----------------------------------|------------------|
//! | `ILUMINARTE_DB_PATH`              | `iluminarte.db`  |
//! | `ILUMINARTE_MAX_CONNECTIONS`      | `5`              |
//! | `ILUMINARTE_BUSY_TIMEOUT_MS`      | `5000`           |
//! | `ILUMINARTE_LOW_STOCK_THRESHOLD`  | `5`              |
//! | `ILUMINARTE_CURRENCY_SYMBOL`      | `$`              |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use iluminarte_core::reporting::DashboardOptions;
use iluminarte_core::LOW_STOCK_THRESHOLD;
use thiserror::Error;

use crate::pool::DbConfig;

pub const ENV_DB_PATH: &str = "ILUMINARTE_DB_PATH";
pub const ENV_MAX_CONNECTIONS: &str = "ILUMINARTE_MAX_CONNECTIONS";
pub const ENV_BUSY_TIMEOUT_MS: &str = "ILUMINARTE_BUSY_TIMEOUT_MS";
pub const ENV_LOW_STOCK_THRESHOLD: &str = "ILUMINARTE_LOW_STOCK_THRESHOLD";
pub const ENV_CURRENCY_SYMBOL: &str = "ILUMINARTE_CURRENCY_SYMBOL";

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has invalid value '{value}': {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
}

// =============================================================================
// Ledger
// =============================================================================

/// Retry policy for ledger transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Attempts per operation when SQLite reports busy/locked. At least 1.
    pub max_attempts: u32,

    /// Pause before the second attempt, doubled for each further one.
    pub retry_backoff: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            max_attempts: 3,
            retry_backoff: Duration::from_millis(25),
        }
    }
}

// =============================================================================
// App Config
// =============================================================================

/// Process-wide settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub max_connections: u32,
    pub busy_timeout: Duration,
    pub low_stock_threshold: i64,
    pub currency_symbol: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database_path: PathBuf::from("iluminarte.db"),
            max_connections: 5,
            busy_timeout: Duration::from_millis(5000),
            low_stock_threshold: LOW_STOCK_THRESHOLD,
            currency_symbol: "$".to_string(),
        }
    }
}

impl AppConfig {
    /// Reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`; unset or empty keys keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = AppConfig::default();

        if let Some(path) = get(ENV_DB_PATH) {
            config.database_path = PathBuf::from(path.trim());
        }

        if let Some(raw) = get(ENV_MAX_CONNECTIONS) {
            let max: u32 = parse(ENV_MAX_CONNECTIONS, &raw)?;
            if max == 0 {
                return Err(invalid(ENV_MAX_CONNECTIONS, &raw, "must be at least 1"));
            }
            config.max_connections = max;
        }

        if let Some(raw) = get(ENV_BUSY_TIMEOUT_MS) {
            config.busy_timeout = Duration::from_millis(parse(ENV_BUSY_TIMEOUT_MS, &raw)?);
        }

        if let Some(raw) = get(ENV_LOW_STOCK_THRESHOLD) {
            let threshold: i64 = parse(ENV_LOW_STOCK_THRESHOLD, &raw)?;
            if threshold < 0 {
                return Err(invalid(ENV_LOW_STOCK_THRESHOLD, &raw, "must not be negative"));
            }
            config.low_stock_threshold = threshold;
        }

        if let Some(symbol) = get(ENV_CURRENCY_SYMBOL) {
            config.currency_symbol = symbol;
        }

        Ok(config)
    }

    /// Database settings derived from this configuration.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database_path)
            .max_connections(self.max_connections)
            .busy_timeout(self.busy_timeout)
    }

    pub fn dashboard_options(&self) -> DashboardOptions {
        DashboardOptions::default().with_low_stock_threshold(self.low_stock_threshold)
    }
}

fn parse<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| invalid(var, raw, &e.to_string()))
}

fn invalid(var: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
