//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the
//! `mirror-config.toml` file. It provides a centralized way to configure the
//! light thresholds, polling cadence, weather location and display layout.
//!
//! Every section and every field may be omitted; missing values take the
//! defaults below. A file that fails to parse or validate is ignored with a
//! warning and the defaults are used instead, so a typo never leaves the
//! mirror dark.

use crate::display::{TextSize, MAX_DIMENSION};
use crate::weather::MAX_HOURLY_ENTRIES;
use crate::{Location, Units};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_PATH: &str = "mirror-config.toml";

/// Configuration problems detected while loading or saving.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config format: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config serialization: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Application configuration loaded from mirror-config.toml
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Light and gesture sensor configuration
    pub sensor: SensorConfig,
    /// Weather service configuration
    pub weather: WeatherConfig,
    /// Display panel and layout configuration
    pub display: DisplayConfig,
}

/// Ambient light / gesture sensor configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Wake the display at or above this light level
    pub high_threshold: i32,
    /// Put the display to sleep at or below this light level
    pub low_threshold: i32,
    /// Interval between light/gesture polls in milliseconds
    pub gesture_poll_ms: u64,
    /// I2C bus device for the hardware sensor
    pub i2c_bus: String,
    /// 7-bit I2C address of the hardware sensor
    pub i2c_address: u8,
}

/// Weather service configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub latitude: f64,
    pub longitude: f64,
    pub units: Units,
    /// Interval between weather refreshes in milliseconds
    pub poll_ms: u64,
    /// Rows shown in the hourly forecast view
    pub max_hourly_entries: usize,
    /// OpenWeatherMap API key; empty selects the built-in canned data
    pub api_key: String,
    pub base_url: String,
    /// HTTP request timeout in seconds
    pub timeout_secs: u64,
}

/// Display and layout configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Linux framebuffer device used by the hardware build
    pub framebuffer: String,
    pub width: u32,
    pub height: u32,
    pub time_row: u16,
    pub time_col: u16,
    pub time_size: TextSize,
    pub body_row: u16,
    pub body_col: u16,
    pub body_size: TextSize,
    /// Text colour as RGB
    pub foreground: [u8; 3],
    /// Background colour as RGB
    pub background: [u8; 3],
}

impl Default for SensorConfig {
    fn default() -> Self {
        SensorConfig {
            high_threshold: 100,
            low_threshold: 50,
            gesture_poll_ms: 200,
            i2c_bus: "/dev/i2c-1".to_string(),
            i2c_address: 0x39,
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        WeatherConfig {
            latitude: 40.0150,
            longitude: -105.2705,
            units: Units::Imperial,
            poll_ms: 20_000,
            max_hourly_entries: 4,
            api_key: String::new(),
            base_url: "https://api.openweathermap.org/data/2.5".to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            framebuffer: "/dev/fb1".to_string(),
            width: 320,
            height: 240,
            time_row: 0,
            time_col: 0,
            time_size: TextSize::Medium,
            body_row: 2,
            body_col: 0,
            body_size: TextSize::Medium,
            foreground: [255, 255, 255],
            background: [0, 0, 0],
        }
    }
}

impl SensorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.gesture_poll_ms)
    }
}

impl WeatherConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    pub fn location(&self) -> Location {
        Location {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

impl Config {
    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::try_load_from_path(path) {
            Ok(config) => {
                log::info!(
                    "Loaded configuration from {} ({:.4}, {:.4})",
                    path.display(),
                    config.weather.latitude,
                    config.weather.longitude
                );
                config
            }
            Err(ConfigError::Io(_)) => {
                log::info!(
                    "No config file at {}, using default configuration",
                    path.display()
                );
                Self::default()
            }
            Err(e) => {
                log::warn!("{e}");
                log::warn!("Using default configuration");
                Self::default()
            }
        }
    }

    /// Strict variant of [`Config::load_from_path`] that reports every problem.
    pub fn try_load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.sensor;
        if s.high_threshold <= s.low_threshold {
            return Err(ConfigError::Invalid(format!(
                "high_threshold ({}) must be greater than low_threshold ({})",
                s.high_threshold, s.low_threshold
            )));
        }
        if s.gesture_poll_ms == 0 || self.weather.poll_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll intervals must be non-zero".to_string(),
            ));
        }
        let w = &self.weather;
        if !(1..=MAX_HOURLY_ENTRIES).contains(&w.max_hourly_entries) {
            return Err(ConfigError::Invalid(format!(
                "max_hourly_entries must be between 1 and {MAX_HOURLY_ENTRIES}, got {}",
                w.max_hourly_entries
            )));
        }
        if !(-90.0..=90.0).contains(&w.latitude) || !(-180.0..=180.0).contains(&w.longitude) {
            return Err(ConfigError::Invalid(format!(
                "coordinates out of range: {}, {}",
                w.latitude, w.longitude
            )));
        }
        let d = &self.display;
        if !(1..=MAX_DIMENSION).contains(&d.width) || !(1..=MAX_DIMENSION).contains(&d.height) {
            return Err(ConfigError::Invalid(format!(
                "display size {}x{} must be between 1 and {MAX_DIMENSION} on each edge",
                d.width, d.height
            )));
        }
        Ok(())
    }

    /// Save current configuration as a TOML file
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(&path, contents)?;
        log::info!("Configuration saved to {}", path.as_ref().display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sensor.high_threshold, 100);
        assert_eq!(config.sensor.low_threshold, 50);
        assert_eq!(config.sensor.gesture_poll_ms, 200);
        assert_eq!(config.weather.poll_ms, 20_000);
        assert_eq!(config.weather.max_hourly_entries, 4);
        assert_eq!(config.weather.units, Units::Imperial);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let file = NamedTempFile::new().unwrap();
        let config = Config::default();
        config.save_to_path(file.path()).unwrap();
        let parsed = Config::try_load_from_path(file.path()).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[sensor]\nhigh_threshold = 2000\nlow_threshold = 1500\n\n[weather]\nunits = \"metric\""
        )
        .unwrap();

        let config = Config::try_load_from_path(file.path()).unwrap();
        assert_eq!(config.sensor.high_threshold, 2000);
        assert_eq!(config.sensor.low_threshold, 1500);
        assert_eq!(config.sensor.gesture_poll_ms, 200);
        assert_eq!(config.weather.units, Units::Metric);
        assert_eq!(config.display, DisplayConfig::default());
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let mut config = Config::default();
        config.sensor.high_threshold = 40;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.sensor.high_threshold = config.sensor.low_threshold;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_entry_count_bounds() {
        let mut config = Config::default();
        config.weather.max_hourly_entries = 0;
        assert!(config.validate().is_err());

        config.weather.max_hourly_entries = MAX_HOURLY_ENTRIES;
        assert!(config.validate().is_ok());

        config.weather.max_hourly_entries = usize::MAX;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_display_size_bounds() {
        let mut config = Config::default();
        config.display.width = 0;
        assert!(config.validate().is_err());

        config.display.width = 320;
        config.display.height = u32::MAX;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.display.height = MAX_DIMENSION;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_file_falls_back_to_default() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[sensor]\nhigh_threshold = 10\nlow_threshold = 20").unwrap();
        let config = Config::load_from_path(file.path());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_nonexistent_file() {
        let config = Config::load_from_path("/nonexistent/path");
        assert_eq!(config, Config::default());
    }
}
