//! Configuration management for the air quality engine
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings. The resulting
//! [`AqiConfig`] is built once and handed to every component at construction.

use crate::AqiError;
use crate::models::Parameter;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AqiConfig {
    /// Upstream data providers
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Aggregation behaviour
    #[serde(default)]
    pub aggregation: AggregationConfig,
    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Forecast generation
    #[serde(default)]
    pub forecast: ForecastConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings for every upstream client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "default_openaq")]
    pub openaq: ProviderConfig,
    #[serde(default = "default_tempo")]
    pub tempo: ProviderConfig,
    #[serde(default = "default_openweather")]
    pub openweather: ProviderConfig,
}

/// Connection settings for a single upstream client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Whether the client takes part in the fallback chain
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Base URL of the upstream API
    #[serde(default)]
    pub base_url: String,
    /// API key, injected into the client at construction
    pub api_key: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_provider_timeout")]
    pub timeout_seconds: u32,
    /// Maximum number of retries for transient failures
    #[serde(default = "default_provider_max_retries")]
    pub max_retries: u32,
}

impl ProviderConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.timeout_seconds))
    }
}

/// How the provider chain is queried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    /// Providers are tried one after another in priority order
    #[default]
    Sequential,
    /// All providers are queried at once, results merged in priority order
    Concurrent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    #[serde(default)]
    pub mode: AggregationMode,
    /// Parameters every bundle must contain
    #[serde(default = "default_parameters")]
    pub parameters: Vec<Parameter>,
}

/// Cache configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_current_ttl")]
    pub current_ttl_seconds: u64,
    #[serde(default = "default_forecast_ttl")]
    pub forecast_ttl_seconds: u64,
    #[serde(default = "default_history_ttl")]
    pub history_ttl_seconds: u64,
    /// Decimal places kept when rounding coordinates into cache keys
    #[serde(default = "default_coordinate_precision")]
    pub coordinate_precision: u32,
}

impl CacheConfig {
    #[must_use]
    pub fn current_ttl(&self) -> Duration {
        Duration::from_secs(self.current_ttl_seconds)
    }

    #[must_use]
    pub fn forecast_ttl(&self) -> Duration {
        Duration::from_secs(self.forecast_ttl_seconds)
    }

    #[must_use]
    pub fn history_ttl(&self) -> Duration {
        Duration::from_secs(self.history_ttl_seconds)
    }
}

/// Source of the pseudo-random perturbation used by mock and forecast data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SeedMode {
    /// Seeded by location (and day offset) only; fully reproducible
    #[default]
    Location,
    /// Additionally mixes in the current UTC day
    WallClock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    #[serde(default = "default_horizon_days")]
    pub default_horizon_days: u32,
    #[serde(default)]
    pub seed_mode: SeedMode,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_enabled() -> bool {
    true
}

fn default_provider_timeout() -> u32 {
    10
}

fn default_provider_max_retries() -> u32 {
    2
}

fn provider(base_url: &str) -> ProviderConfig {
    ProviderConfig {
        enabled: default_enabled(),
        base_url: base_url.to_string(),
        api_key: None,
        timeout_seconds: default_provider_timeout(),
        max_retries: default_provider_max_retries(),
    }
}

fn default_openaq() -> ProviderConfig {
    provider("https://api.openaq.org/v2")
}

fn default_tempo() -> ProviderConfig {
    provider("https://tempo.si.edu/api")
}

fn default_openweather() -> ProviderConfig {
    provider("https://api.openweathermap.org/data/2.5")
}

fn default_parameters() -> Vec<Parameter> {
    vec![Parameter::No2, Parameter::O3, Parameter::Pm25, Parameter::Pm10]
}

fn default_current_ttl() -> u64 {
    5 * 60
}

fn default_forecast_ttl() -> u64 {
    30 * 60
}

fn default_history_ttl() -> u64 {
    60 * 60
}

fn default_coordinate_precision() -> u32 {
    2
}

fn default_horizon_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            openaq: default_openaq(),
            tempo: default_tempo(),
            openweather: default_openweather(),
        }
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            mode: AggregationMode::default(),
            parameters: default_parameters(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            current_ttl_seconds: default_current_ttl(),
            forecast_ttl_seconds: default_forecast_ttl(),
            history_ttl_seconds: default_history_ttl(),
            coordinate_precision: default_coordinate_precision(),
        }
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            default_horizon_days: default_horizon_days(),
            seed_mode: SeedMode::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for AqiConfig {
    fn default() -> Self {
        Self {
            providers: ProvidersConfig::default(),
            aggregation: AggregationConfig::default(),
            cache: CacheConfig::default(),
            forecast: ForecastConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AqiConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // AQI__CACHE__CURRENT_TTL_SECONDS=60 style overrides
        builder = builder.add_source(
            Environment::with_prefix("AQI")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: AqiConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("aqi-engine").join("config.toml"))
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        for (client, fallback) in [
            (&mut self.providers.openaq, default_openaq()),
            (&mut self.providers.tempo, default_tempo()),
            (&mut self.providers.openweather, default_openweather()),
        ] {
            if client.base_url.is_empty() {
                client.base_url = fallback.base_url;
            }
            if client.timeout_seconds == 0 {
                client.timeout_seconds = default_provider_timeout();
            }
        }
        if self.aggregation.parameters.is_empty() {
            self.aggregation.parameters = default_parameters();
        }
        if self.cache.current_ttl_seconds == 0 {
            self.cache.current_ttl_seconds = default_current_ttl();
        }
        if self.cache.forecast_ttl_seconds == 0 {
            self.cache.forecast_ttl_seconds = default_forecast_ttl();
        }
        if self.cache.history_ttl_seconds == 0 {
            self.cache.history_ttl_seconds = default_history_ttl();
        }
        if self.forecast.default_horizon_days == 0 {
            self.forecast.default_horizon_days = default_horizon_days();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_api_keys()?;
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    fn named_providers(&self) -> [(&'static str, &ProviderConfig); 3] {
        [
            ("openaq", &self.providers.openaq),
            ("tempo", &self.providers.tempo),
            ("openweather", &self.providers.openweather),
        ]
    }

    /// Validate API keys and credentials
    pub fn validate_api_keys(&self) -> Result<()> {
        for (name, client) in self.named_providers() {
            if let Some(api_key) = &client.api_key {
                if api_key.trim().is_empty() {
                    return Err(AqiError::config(format!(
                        "{name} API key cannot be empty if provided. Either remove it or provide a valid key."
                    ))
                    .into());
                }
                if api_key.len() > 200 {
                    return Err(AqiError::config(format!(
                        "{name} API key appears to be invalid (too long). Please check your API key."
                    ))
                    .into());
                }
            }
        }
        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        for (name, client) in self.named_providers() {
            if client.timeout_seconds > 60 {
                return Err(AqiError::config(format!(
                    "{name} timeout cannot exceed 60 seconds"
                ))
                .into());
            }
            if client.max_retries > 10 {
                return Err(AqiError::config(format!(
                    "{name} max retries cannot exceed 10"
                ))
                .into());
            }
        }

        if self.cache.coordinate_precision > 6 {
            return Err(
                AqiError::config("Cache coordinate precision cannot exceed 6 decimals").into(),
            );
        }

        if self.forecast.default_horizon_days > 30 {
            return Err(AqiError::config("Default forecast horizon cannot exceed 30 days").into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(AqiError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "compact", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(AqiError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        for (name, client) in self.named_providers() {
            if !client.base_url.starts_with("http://") && !client.base_url.starts_with("https://")
            {
                return Err(AqiError::config(format!(
                    "{name} base URL must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AqiConfig::default();
        assert_eq!(config.providers.openaq.base_url, "https://api.openaq.org/v2");
        assert_eq!(config.providers.openaq.timeout_seconds, 10);
        assert_eq!(config.cache.current_ttl_seconds, 300);
        assert_eq!(config.cache.forecast_ttl_seconds, 1800);
        assert_eq!(config.cache.history_ttl_seconds, 3600);
        assert_eq!(config.forecast.default_horizon_days, 7);
        assert_eq!(config.forecast.seed_mode, SeedMode::Location);
        assert_eq!(config.aggregation.mode, AggregationMode::Sequential);
        assert_eq!(config.aggregation.parameters.len(), 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_empty_api_key() {
        let mut config = AqiConfig::default();
        config.providers.tempo.api_key = Some("  ".to_string());
        let result = config.validate_api_keys();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("tempo API key"));
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = AqiConfig::default();
        config.logging.level = "invalid".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_config_validation_numeric_ranges() {
        let mut config = AqiConfig::default();
        config.providers.openweather.timeout_seconds = 500;
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("timeout cannot exceed"));
    }

    #[test]
    fn test_apply_defaults_fills_zeroes() {
        let mut config = AqiConfig::default();
        config.cache.current_ttl_seconds = 0;
        config.providers.openaq.base_url.clear();
        config.aggregation.parameters.clear();
        config.apply_defaults();
        assert_eq!(config.cache.current_ttl_seconds, 300);
        assert_eq!(config.providers.openaq.base_url, "https://api.openaq.org/v2");
        assert_eq!(config.aggregation.parameters.len(), 4);
    }

    #[test]
    fn test_load_from_toml_file() {
        let path = std::env::temp_dir().join(format!("aqi-engine-test-{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[cache]
current_ttl_seconds = 60

[forecast]
seed_mode = "wall_clock"

[aggregation]
mode = "concurrent"
parameters = ["pm25", "no2"]

[providers.tempo]
base_url = "https://tempo.example.org"
api_key = "tempo_key_123"
"#
        )
        .unwrap();

        let config = AqiConfig::load_from_path(Some(path.clone())).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.cache.current_ttl_seconds, 60);
        assert_eq!(config.cache.forecast_ttl_seconds, 1800);
        assert_eq!(config.forecast.seed_mode, SeedMode::WallClock);
        assert_eq!(config.aggregation.mode, AggregationMode::Concurrent);
        assert_eq!(config.aggregation.parameters, vec![Parameter::Pm25, Parameter::No2]);
        assert_eq!(config.providers.tempo.api_key.as_deref(), Some("tempo_key_123"));
        assert_eq!(config.providers.openaq.base_url, "https://api.openaq.org/v2");
    }

    #[test]
    fn test_config_path_generation() {
        if let Some(path) = AqiConfig::get_config_path() {
            assert!(path.to_string_lossy().contains("aqi-engine"));
            assert!(path.to_string_lossy().contains("config.toml"));
        }
    }
}
