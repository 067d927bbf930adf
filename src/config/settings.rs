//! Application settings loading from config.toml
//!
//! Every field has a serde default, so an empty or missing file still yields a
//! usable configuration. The file location can be overridden with `TRIPBOOK_CONFIG`.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::{collections::HashMap, path::Path, time::Duration};
use tracing::{info, warn};

/// Environment variable naming an alternative config file.
pub const CONFIG_PATH_ENV: &str = "TRIPBOOK_CONFIG";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Region code appended to license plates entered without one
    pub plate_region: String,
    /// Booking cutoff applied when a trip is created without one
    pub default_cutoff_minutes: i32,
    /// Cache lifetimes
    pub cache: CacheSettings,
    /// Known streets per city, used to resolve pickup and dropoff addresses
    pub streets: Vec<CityStreets>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            plate_region: "125".to_string(),
            default_cutoff_minutes: 60,
            cache: CacheSettings::default(),
            streets: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Street directory keyed by lowercase city name.
    #[must_use]
    pub fn street_directory(&self) -> HashMap<String, Vec<String>> {
        let mut directory: HashMap<String, Vec<String>> = HashMap::new();
        for entry in &self.streets {
            directory
                .entry(entry.city.trim().to_lowercase())
                .or_default()
                .extend(entry.names.iter().map(|n| n.trim().to_string()));
        }
        directory
    }
}

/// Cache lifetimes in seconds
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Resolved addresses; misses are cached for a quarter of this
    pub address_ttl_secs: u64,
    /// Per-user detailed bookings listing
    pub detailed_bookings_ttl_secs: u64,
    /// City list
    pub cities_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            address_ttl_secs: 86_400,
            detailed_bookings_ttl_secs: 300,
            cities_ttl_secs: 3_600,
        }
    }
}

impl CacheSettings {
    /// Address cache lifetime.
    #[must_use]
    pub const fn address_ttl(&self) -> Duration {
        Duration::from_secs(self.address_ttl_secs)
    }

    /// Detailed bookings cache lifetime.
    #[must_use]
    pub const fn detailed_bookings_ttl(&self) -> Duration {
        Duration::from_secs(self.detailed_bookings_ttl_secs)
    }

    /// City list cache lifetime.
    #[must_use]
    pub const fn cities_ttl(&self) -> Duration {
        Duration::from_secs(self.cities_ttl_secs)
    }
}

/// Streets of one city
#[derive(Debug, Clone, Deserialize)]
pub struct CityStreets {
    /// City name as stored in the cities table
    pub city: String,
    /// Street names without the street type, e.g. `"Светланская"`
    pub names: Vec<String>,
}

/// Loads application configuration from a TOML file
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML is invalid.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads configuration from `TRIPBOOK_CONFIG` or `./config.toml`.
///
/// A missing default file is not an error; defaults are used instead.
pub fn load_default_config() -> Result<AppConfig> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        info!(path = %path, "Loading configuration");
        return load_config(path);
    }

    if Path::new("config.toml").exists() {
        load_config("config.toml")
    } else {
        warn!("config.toml not found, using default settings");
        Ok(AppConfig::default())
    }
}
