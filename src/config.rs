//! Configuration management for `rainwatch`
//!
//! Handles loading configuration from an optional TOML file and environment
//! variables, resolves the observation credential and validates all settings.

use crate::RainwatchError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable holding the Frost client id
pub const CREDENTIAL_VAR: &str = "FROST_CLIENT_ID";

/// Environment variable pointing at the config file
pub const CONFIG_PATH_VAR: &str = "RAINWATCH_CONFIG";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RainwatchConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub places: PlacesConfig,
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub observation: ObservationConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound for one page load, upstream calls included
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    pub tls: Option<TlsConfig>,
}

/// PEM files for serving HTTPS
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacesConfig {
    /// JSON file listing the places
    #[serde(default = "default_places_file")]
    pub file: PathBuf,
}

/// MET Norway Locationforecast settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    #[serde(default = "default_forecast_base_url")]
    pub base_url: String,
    /// MET Norway refuses requests without an identifying user agent
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_client_timeout")]
    pub timeout_seconds: u64,
    /// Length of the forecast window
    #[serde(default = "default_forecast_hours")]
    pub hours: u32,
}

/// Frost observation API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationConfig {
    #[serde(default = "default_observation_base_url")]
    pub base_url: String,
    /// Frost client id; falls back to `FROST_CLIENT_ID`
    pub client_id: Option<String>,
    #[serde(default = "default_client_timeout")]
    pub timeout_seconds: u64,
    /// Number of past days to show
    #[serde(default = "default_observation_days")]
    pub days: u32,
    /// How many nearby stations to ask for
    #[serde(default = "default_station_search")]
    pub station_search: u32,
    /// How many reporting stations to keep per day
    #[serde(default = "default_stations_per_day")]
    pub stations_per_day: usize,
    #[serde(default = "default_preferred_offset")]
    pub preferred_offset: String,
}

/// Presentation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// IANA timezone used for all displayed times
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Map centre; the centroid of the places when unset
    pub center_latitude: Option<f64>,
    pub center_longitude: Option<f64>,
    #[serde(default = "default_zoom")]
    pub zoom: u8,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty, compact or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_request_timeout() -> u64 {
    60
}

fn default_places_file() -> PathBuf {
    PathBuf::from("places.json")
}

fn default_forecast_base_url() -> String {
    "https://api.met.no/weatherapi/locationforecast/2.0".to_string()
}

fn default_user_agent() -> String {
    format!("rainwatch/{}", env!("CARGO_PKG_VERSION"))
}

fn default_client_timeout() -> u64 {
    30
}

fn default_forecast_hours() -> u32 {
    24
}

fn default_observation_base_url() -> String {
    "https://frost.met.no".to_string()
}

fn default_observation_days() -> u32 {
    3
}

fn default_station_search() -> u32 {
    15
}

fn default_stations_per_day() -> usize {
    3
}

fn default_preferred_offset() -> String {
    "PT6H".to_string()
}

fn default_timezone() -> String {
    "Europe/Oslo".to_string()
}

fn default_zoom() -> u8 {
    11
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
            tls: None,
        }
    }
}

/// Time kept back from the request timeout for aggregating and rendering
const RENDER_MARGIN: Duration = Duration::from_millis(500);

impl ServerConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// How long one upstream call may take before its cells turn unavailable,
    /// so a page is always answered inside the request timeout
    #[must_use]
    pub fn upstream_budget(&self) -> Duration {
        self.request_timeout().saturating_sub(RENDER_MARGIN)
    }
}

impl Default for PlacesConfig {
    fn default() -> Self {
        Self {
            file: default_places_file(),
        }
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            base_url: default_forecast_base_url(),
            user_agent: default_user_agent(),
            timeout_seconds: default_client_timeout(),
            hours: default_forecast_hours(),
        }
    }
}

impl Default for ObservationConfig {
    fn default() -> Self {
        Self {
            base_url: default_observation_base_url(),
            client_id: None,
            timeout_seconds: default_client_timeout(),
            days: default_observation_days(),
            station_search: default_station_search(),
            stations_per_day: default_stations_per_day(),
            preferred_offset: default_preferred_offset(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            center_latitude: None,
            center_longitude: None,
            zoom: default_zoom(),
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

impl RainwatchConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        let path = std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from);
        Self::load_from_path(path)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path()
                .filter(|p| p.exists())
                .unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // RAINWATCH_SERVER__PORT=8080 overrides server.port
        builder = builder.add_source(
            Environment::with_prefix("RAINWATCH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: RainwatchConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.resolve_credential(|name| std::env::var(name).ok());
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("rainwatch").join("config.toml"))
    }

    /// Fill the observation credential from the environment when the file has none.
    /// Blank values count as absent.
    pub fn resolve_credential(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let configured = self
            .observation
            .client_id
            .take()
            .filter(|id| !id.trim().is_empty());
        self.observation.client_id =
            configured.or_else(|| lookup(CREDENTIAL_VAR).filter(|id| !id.trim().is_empty()));
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(RainwatchError::config("Server port cannot be 0").into());
        }

        for (name, seconds) in [
            ("Request", self.server.request_timeout_seconds),
            ("Forecast API", self.forecast.timeout_seconds),
            ("Observation API", self.observation.timeout_seconds),
        ] {
            if seconds == 0 || seconds > 300 {
                return Err(RainwatchError::config(format!(
                    "{name} timeout must be between 1 and 300 seconds"
                ))
                .into());
            }
        }

        if self.forecast.hours == 0 || self.forecast.hours > 48 {
            return Err(
                RainwatchError::config("Forecast hours must be between 1 and 48").into(),
            );
        }

        if self.observation.days == 0 || self.observation.days > 10 {
            return Err(
                RainwatchError::config("Observation days must be between 1 and 10").into(),
            );
        }

        if self.observation.stations_per_day == 0
            || self.observation.stations_per_day > self.observation.station_search as usize
        {
            return Err(RainwatchError::config(
                "Stations per day must be between 1 and the station search count",
            )
            .into());
        }

        if self.display.zoom > 18 {
            return Err(RainwatchError::config("Map zoom cannot exceed 18").into());
        }

        match (self.display.center_latitude, self.display.center_longitude) {
            (Some(lat), Some(lon)) => {
                if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                    return Err(RainwatchError::config("Map centre is out of range").into());
                }
            }
            (None, None) => {}
            _ => {
                return Err(RainwatchError::config(
                    "Map centre needs both center_latitude and center_longitude",
                )
                .into());
            }
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(RainwatchError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "compact", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(RainwatchError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        for (name, url) in [
            ("Forecast", &self.forecast.base_url),
            ("Observation", &self.observation.base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(RainwatchError::config(format!(
                    "{name} API base URL must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        if self.forecast.user_agent.trim().is_empty() {
            return Err(RainwatchError::config("Forecast user agent cannot be empty").into());
        }

        self.display
            .timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|e| RainwatchError::config(format!("Invalid timezone: {e}")))?;

        Ok(())
    }
}
