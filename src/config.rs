use std::collections::HashSet;
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::ConfigError;
use crate::models::array::{ArrayDescriptor, Location};

pub const CONFIG_PATH_ENV: &str = "SOLAR_FORECAST_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

fn default_base_url() -> String { "https://api.open-meteo.com/v1/forecast".to_string() }
fn default_timeout_secs() -> u64 { 30 }
fn default_forecast_days() -> u32 { 7 }
fn default_model() -> String { "gfs_seamless".to_string() }
fn default_update_interval_secs() -> u64 { 3600 }
fn default_business_timezone() -> String { "Europe/London".to_string() }

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default = "default_update_interval_secs")]
    pub update_interval_secs: u64,
    /// Zone that anchors "today", "tomorrow" and hour windows
    #[serde(default = "default_business_timezone")]
    pub business_timezone: String,
    pub systems: Vec<SystemConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_forecast_days")]
    pub forecast_days: u32,
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            forecast_days: default_forecast_days(),
            model: default_model(),
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// One configured installation: a location and its arrays.
#[derive(Debug, Deserialize, Serialize, Clone, ToSchema)]
pub struct SystemConfig {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub arrays: Vec<ArrayDescriptor>,
}

impl SystemConfig {
    pub fn location(&self) -> Location {
        Location { latitude: self.latitude, longitude: self.longitude }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Path from `SOLAR_FORECAST_CONFIG`, else `config.json`.
    pub fn path_from_env() -> String {
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
    }

    pub fn business_tz(&self) -> Result<Tz, ConfigError> {
        self.business_timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::UnknownTimezone(self.business_timezone.clone()))
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.business_tz()?;

        if self.provider.timeout_secs == 0 {
            return Err(ConfigError::Invalid("provider.timeout_secs must be positive".into()));
        }
        if self.provider.forecast_days == 0 {
            return Err(ConfigError::Invalid("provider.forecast_days must be positive".into()));
        }
        if self.update_interval_secs == 0 {
            return Err(ConfigError::Invalid("update_interval_secs must be positive".into()));
        }

        let mut ids = HashSet::new();
        for system in &self.systems {
            if !ids.insert(system.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate system id '{}'", system.id)));
            }
            validate_system(system)?;
        }
        Ok(())
    }
}

fn validate_system(system: &SystemConfig) -> Result<(), ConfigError> {
    let invalid = |msg: String| ConfigError::Invalid(format!("system '{}': {}", system.id, msg));

    if !(-90.0..=90.0).contains(&system.latitude) {
        return Err(invalid(format!("latitude {} outside -90..=90", system.latitude)));
    }
    if !(-180.0..=180.0).contains(&system.longitude) {
        return Err(invalid(format!("longitude {} outside -180..=180", system.longitude)));
    }
    if system.arrays.is_empty() {
        return Err(invalid("at least one array is required".into()));
    }

    let mut names = HashSet::new();
    for array in &system.arrays {
        if array.name.trim().is_empty() {
            return Err(invalid("array name must not be empty".into()));
        }
        if !names.insert(array.name.as_str()) {
            return Err(invalid(format!("duplicate array name '{}'", array.name)));
        }
        check_range(&array.name, "declination", array.declination_deg, 0.0, 90.0).map_err(invalid)?;
        check_range(&array.name, "azimuth", array.azimuth_deg, 0.0, 360.0).map_err(invalid)?;
        check_range(&array.name, "kwp", array.peak_power_kwp, 0.1, 1000.0).map_err(invalid)?;
        check_range(&array.name, "damping", array.damping, 0.0, 1.0).map_err(invalid)?;
    }
    Ok(())
}

fn check_range(array: &str, field: &str, value: f64, min: f64, max: f64) -> Result<(), String> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(format!("array '{}' {} {} outside {}..={}", array, field, value, min, max))
    }
}
