//! # Weather Service Port
//!
//! The poll loop asks for "the weather for this view at these coordinates"
//! and gets back a structured [`WeatherSnapshot`] or a [`WeatherError`].
//! How the provider encodes its answer is the adapter's business.
//!
//! ## Adapters
//! - [`crate::openweather::OpenWeatherClient`]: HTTP client for OpenWeatherMap
//! - [`CannedWeather`]: fixed data for offline development, the weather
//!   equivalent of a test pattern
//!
//! ## Error Handling
//! Every failure, network or decode, surfaces as a [`WeatherError`]. The
//! scheduler logs it, leaves the previous pane on screen and simply tries
//! again on the next periodic tick. There is no backoff.

use crate::{
    CurrentWeather, HourlyEntry, HourlyForecast, Location, Units, ViewKind, WeatherSnapshot,
};
use async_trait::async_trait;
use chrono::{Duration, DurationRound, Utc};
use thiserror::Error;

/// Failures while fetching weather data.
#[derive(Error, Debug)]
pub enum WeatherError {
    /// Transport failure (DNS, TLS, timeout, connection reset)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status
    #[error("weather service returned status {0}")]
    Status(u16),

    /// The response did not have the expected shape
    #[error("unexpected weather response: {0}")]
    Parse(String),
}

/// Most forecast rows the service returns in one response.
pub const MAX_HOURLY_ENTRIES: usize = 40;

/// Everything a fetch needs besides the view.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeatherRequest {
    pub location: Location,
    pub units: Units,
    pub max_hourly_entries: usize,
}

/// Capability the scheduler needs from the weather service.
#[async_trait]
pub trait WeatherPort: Send + Sync {
    async fn fetch_current(
        &self,
        location: Location,
        units: Units,
    ) -> Result<CurrentWeather, WeatherError>;

    async fn fetch_hourly(
        &self,
        location: Location,
        units: Units,
        max_entries: usize,
    ) -> Result<HourlyForecast, WeatherError>;
}

/// Fetch the dataset shown by `view`.
pub async fn fetch_view<W: WeatherPort + ?Sized>(
    port: &W,
    view: ViewKind,
    request: WeatherRequest,
) -> Result<WeatherSnapshot, WeatherError> {
    match view {
        ViewKind::Current => port
            .fetch_current(request.location, request.units)
            .await
            .map(WeatherSnapshot::Current),
        ViewKind::Hourly => port
            .fetch_hourly(request.location, request.units, request.max_hourly_entries)
            .await
            .map(WeatherSnapshot::Hourly),
    }
}

/// Static weather used when no API key is configured.
pub struct CannedWeather {
    city: String,
}

impl CannedWeather {
    pub fn new(city: impl Into<String>) -> Self {
        Self { city: city.into() }
    }
}

impl Default for CannedWeather {
    fn default() -> Self {
        Self::new("Boulder")
    }
}

fn canned_temp(fahrenheit: f32, units: Units) -> f32 {
    match units {
        Units::Imperial => fahrenheit,
        Units::Metric => ((fahrenheit - 32.0) * 5.0 / 9.0 * 10.0).round() / 10.0,
    }
}

#[async_trait]
impl WeatherPort for CannedWeather {
    async fn fetch_current(
        &self,
        _location: Location,
        units: Units,
    ) -> Result<CurrentWeather, WeatherError> {
        Ok(CurrentWeather {
            city: self.city.clone(),
            temp_value: canned_temp(72.4, units),
            temp_unit: units.temp_suffix().to_string(),
            description: "Clear".to_string(),
            wind_speed: 5.0,
            wind_dir: 315,
            high_temp: canned_temp(75.0, units),
            low_temp: canned_temp(58.0, units),
        })
    }

    async fn fetch_hourly(
        &self,
        _location: Location,
        units: Units,
        max_entries: usize,
    ) -> Result<HourlyForecast, WeatherError> {
        let max_entries = max_entries.min(MAX_HOURLY_ENTRIES);
        let now = Utc::now();
        let top_of_hour = now.duration_trunc(Duration::hours(1)).unwrap_or(now);
        let entries = (1..=max_entries as i64)
            .map(|i| HourlyEntry {
                time: top_of_hour + Duration::hours(i),
                temp: canned_temp(72.0 - 2.0 * i as f32, units),
                wind_speed: 4.0 + i as f32,
                wind_dir: 300,
            })
            .collect();
        Ok(HourlyForecast::new(self.city.clone(), entries, max_entries))
    }
}
