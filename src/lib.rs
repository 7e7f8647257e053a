//! # Ambient Mirror Core Library
//!
//! This library drives a small ambient weather display: an ambient-light and
//! gesture sensor decides when the screen wakes up, swipe gestures switch
//! between weather views, and a remote weather service supplies the data.
//!
//! ## Design Philosophy
//!
//! ### Narrow Ports
//! The sensor, the display panel and the weather service are reached only
//! through three small traits ([`sensor::SensorPort`], [`display::DisplayPort`]
//! and [`weather::WeatherPort`]). The interesting logic, the display state
//! machine, the diffed renderer and the poll scheduler, never sees a bus,
//! a pixel or an HTTP response.
//!
//! ### Minimal Redraws
//! The display only ever shows two strings: a clock line and a body block.
//! [`render::RenderCache`] remembers what is on the glass and touches a pane
//! only when its text actually changed, erasing the old text by redrawing it
//! in the background colour.
//!
//! ### Data Flow
//! 1. **Sensor tick** (every `gesture_poll_ms`): read light, consume one gesture
//! 2. **State machine**: wake / sleep / switch view
//! 3. **Weather tick** (every `poll_ms`, restarted on wake and view change):
//!    fetch the data for the current view
//! 4. **Format**: snapshot → `(time, body)` strings
//! 5. **Render**: diff against the cached pane and draw what changed
//!
//! ## Core Types
//! - [`LightLevel`]: raw ambient brightness
//! - [`GestureEvent`]: at most one swipe per sensor tick
//! - [`ViewKind`]: which weather dataset is on screen
//! - [`WeatherSnapshot`]: the structured result of one weather fetch

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "hardware")]
pub mod apds9960;
pub mod config;
pub mod display;
pub mod format;
pub mod openweather;
pub mod render;
pub mod scheduler;
pub mod sensor;
pub mod state;
pub mod weather;

/// Ambient brightness in raw sensor units.
pub type LightLevel = i32;

/// A gesture consumed during one sensor tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GestureEvent {
    None,
    SwipeLeft,
    SwipeRight,
}

/// The weather dataset shown while the display is awake.
///
/// Views form a ring in the order of [`ViewKind::ALL`]. Adding a view only
/// means adding a variant and listing it there; swipes walk the ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewKind {
    Current,
    Hourly,
}

impl ViewKind {
    /// Ring order used by swipe navigation.
    pub const ALL: [ViewKind; 2] = [ViewKind::Current, ViewKind::Hourly];

    fn position(self) -> usize {
        Self::ALL
            .iter()
            .position(|v| *v == self)
            .unwrap_or_default()
    }

    /// The view a right swipe moves to.
    pub fn next(self) -> Self {
        Self::ALL[(self.position() + 1) % Self::ALL.len()]
    }

    /// The view a left swipe moves to.
    pub fn prev(self) -> Self {
        let len = Self::ALL.len();
        Self::ALL[(self.position() + len - 1) % len]
    }
}

/// Measurement system requested from the weather service.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    Metric,
    #[default]
    Imperial,
}

impl Units {
    /// Temperature suffix appended to values ("72.4F").
    pub fn temp_suffix(self) -> &'static str {
        match self {
            Units::Metric => "C",
            Units::Imperial => "F",
        }
    }

    /// Wind speed unit label.
    pub fn speed_suffix(self) -> &'static str {
        match self {
            Units::Metric => "m/s",
            Units::Imperial => "mph",
        }
    }

    /// Query parameter value understood by the weather service.
    pub fn as_query(self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }
}

/// Coordinates the weather is fetched for.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// Current conditions at the configured location.
#[derive(Clone, Debug, PartialEq)]
pub struct CurrentWeather {
    pub city: String,
    pub temp_value: f32,
    /// Temperature unit label, e.g. "F"
    pub temp_unit: String,
    pub description: String,
    pub wind_speed: f32,
    /// Wind direction in degrees, meteorological convention (0 = from north)
    pub wind_dir: u16,
    pub high_temp: f32,
    pub low_temp: f32,
}

/// One row of the hourly forecast.
#[derive(Clone, Debug, PartialEq)]
pub struct HourlyEntry {
    pub time: DateTime<Utc>,
    pub temp: f32,
    pub wind_speed: f32,
    pub wind_dir: u16,
}

/// Upcoming forecast rows, at most `max_entries` of them, in time order.
#[derive(Clone, Debug, PartialEq)]
pub struct HourlyForecast {
    pub city: String,
    pub entries: Vec<HourlyEntry>,
    pub max_entries: usize,
}

impl HourlyForecast {
    /// Build a forecast, keeping only the first `max_entries` rows.
    pub fn new(city: impl Into<String>, mut entries: Vec<HourlyEntry>, max_entries: usize) -> Self {
        entries.truncate(max_entries);
        Self {
            city: city.into(),
            entries,
            max_entries,
        }
    }
}

/// The result of one weather fetch.
#[derive(Clone, Debug, PartialEq)]
pub enum WeatherSnapshot {
    Current(CurrentWeather),
    Hourly(HourlyForecast),
}

impl WeatherSnapshot {
    /// The view this snapshot belongs to.
    pub fn view(&self) -> ViewKind {
        match self {
            WeatherSnapshot::Current(_) => ViewKind::Current,
            WeatherSnapshot::Hourly(_) => ViewKind::Hourly,
        }
    }
}
