//! Application settings loaded from config.toml
//!
//! Every section is optional. A missing file means "run with defaults", which is
//! what tests and a fresh checkout get.

use crate::{
    config::catalog::SchoolSeed,
    core::{availability::BookingPolicy, retry::RetryPolicy},
    errors::{Error, Result},
};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,
    /// Booking rules
    pub booking: BookingPolicy,
    /// Retry policy for idempotent reads
    pub retry: RetryPolicy,
    /// Schools, classes and schedules to seed on startup
    pub schools: Vec<SchoolSeed>,
}

/// HTTP server settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on
    pub bind_address: String,
    /// How many weeks of sessions to materialize for seeded classes
    pub seed_weeks: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            seed_weeks: 8,
        }
    }
}

/// Loads configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A field has the wrong type
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads configuration from `CONFIG_PATH`, or ./config.toml
///
/// Falls back to defaults when the file does not exist.
pub fn load_default_config() -> Result<Config> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    if !Path::new(&path).exists() {
        info!(path = %path, "No config file found, using defaults");
        return Ok(Config::default());
    }
    load_config(&path)
}
