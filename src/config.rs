//! Configuration loader for the `assethealth` service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). By consolidating configuration logic here, we
//! avoid scattering `env::var` calls throughout the codebase.
//!
use std::env;

use anyhow::{anyhow, Result};

use crate::engine::EngineSettings;

/// Parse an optional environment variable of type `$ty` with a default value.
macro_rules! parse_env {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// PostgreSQL connection string.
    pub db_url: String,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// Port the HTTP server listens on.
    pub http_port: u16,

    /// Readings fetched per risk or anomaly calculation.
    pub reading_window: u32,

    /// Risk score swing that flags a recalculation for notification.
    pub risk_change_alert_delta: f64,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `DATABASE_URL` – PostgreSQL connection string
///
/// Optional:
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `HTTP_PORT` – listen port (default: 8080)
/// - `READING_WINDOW` – readings per calculation (default: 100)
/// - `RISK_CHANGE_ALERT_DELTA` – notify threshold in score points (default: 20)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let defaults = EngineSettings::default();

    let db_url = require_env!("DATABASE_URL");
    let db_pool_max = parse_env!("DB_POOL_MAX", u32, 5);
    let http_port = parse_env!("HTTP_PORT", u16, 8080);
    let reading_window = parse_env!("READING_WINDOW", u32, defaults.reading_window);
    let risk_change_alert_delta = parse_env!(
        "RISK_CHANGE_ALERT_DELTA",
        f64,
        defaults.risk_change_alert_delta
    );

    if reading_window == 0 {
        return Err(anyhow!("Invalid READING_WINDOW: must be at least 1"));
    }

    Ok(Config {
        db_url,
        db_pool_max,
        http_port,
        reading_window,
        risk_change_alert_delta,
    })
}

impl Config {
    /// Engine tunables carried by this configuration.
    pub fn engine_settings(&self) -> EngineSettings {
        // ---
        EngineSettings {
            reading_window: self.reading_window,
            risk_change_alert_delta: self.risk_change_alert_delta,
        }
    }

    /// Database URL with the password replaced by `****`.
    pub fn masked_db_url(&self) -> String {
        // ---
        if let Some(at_pos) = self.db_url.rfind('@') {
            if let Some(colon_pos) = self.db_url[..at_pos].rfind(':') {
                return format!(
                    "{}:****{}",
                    &self.db_url[..colon_pos],
                    &self.db_url[at_pos..]
                );
            }
        }
        self.db_url.clone()
    }

    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks sensitive information like database passwords while showing
    /// all configuration values that were loaded.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE_URL            : {}", self.masked_db_url());
        tracing::info!("  DB_POOL_MAX             : {}", self.db_pool_max);
        tracing::info!("  HTTP_PORT               : {}", self.http_port);
        tracing::info!("  READING_WINDOW          : {}", self.reading_window);
        tracing::info!("  RISK_CHANGE_ALERT_DELTA : {}", self.risk_change_alert_delta);
    }
}
