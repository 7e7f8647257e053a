//! Text formatting for the two display panes.
//!
//! Turns a [`WeatherSnapshot`] and the current wall-clock time into the
//! `(time, body)` pair handed to [`crate::render::RenderCache::apply`].
//! Everything here is pure so the exact strings can be asserted in tests.

use crate::{CurrentWeather, HourlyForecast, Units, WeatherSnapshot};
use chrono::{DateTime, TimeZone};
use std::fmt::{Display, Write};

const COMPASS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// 16-point compass label for a wind direction in degrees.
pub fn compass(degrees: u16) -> &'static str {
    let index = ((degrees % 360) as f32 / 22.5 + 0.5) as usize % COMPASS.len();
    COMPASS[index]
}

/// Clock line, e.g. `10:30 AM`.
pub fn time_text<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    now.format("%-I:%M %p").to_string()
}

/// Body block for the current-conditions view.
pub fn current_body(weather: &CurrentWeather, units: Units) -> String {
    let unit = &weather.temp_unit;
    format!(
        "{}\n{:.1}{unit} {}\nWind {:.1} {} {}\nH {:.1}{unit}  L {:.1}{unit}",
        weather.city,
        weather.temp_value,
        weather.description,
        weather.wind_speed,
        units.speed_suffix(),
        compass(weather.wind_dir),
        weather.high_temp,
        weather.low_temp,
    )
}

/// Body block for the hourly view, forecast times shown in `now`'s timezone.
pub fn hourly_body<Tz: TimeZone>(forecast: &HourlyForecast, units: Units, now: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    let temp_unit = units.temp_suffix();
    let tz = now.timezone();
    let mut body = forecast.city.clone();
    for entry in forecast.entries.iter().take(forecast.max_entries) {
        let local = entry.time.with_timezone(&tz);
        // Writing into a String cannot fail.
        let _ = write!(
            body,
            "\n{:>4} {:.0}{temp_unit} {:.0} {} {}",
            local.format("%-I%p").to_string(),
            entry.temp,
            entry.wind_speed,
            units.speed_suffix(),
            compass(entry.wind_dir),
        );
    }
    body
}

/// Format a snapshot into `(time text, body text)`.
///
/// Hourly entries carry no unit of their own, so `units` supplies it.
pub fn format_snapshot<Tz: TimeZone>(
    snapshot: &WeatherSnapshot,
    units: Units,
    now: &DateTime<Tz>,
) -> (String, String)
where
    Tz::Offset: Display,
{
    let body = match snapshot {
        WeatherSnapshot::Current(current) => current_body(current, units),
        WeatherSnapshot::Hourly(forecast) => hourly_body(forecast, units, now),
    };
    (time_text(now), body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HourlyEntry;
    use chrono::{FixedOffset, Utc};

    fn boulder() -> CurrentWeather {
        CurrentWeather {
            city: "Boulder".to_string(),
            temp_value: 72.4,
            temp_unit: "F".to_string(),
            description: "Clear".to_string(),
            wind_speed: 5.8,
            wind_dir: 315,
            high_temp: 75.0,
            low_temp: 58.2,
        }
    }

    fn mountain_time() -> DateTime<FixedOffset> {
        FixedOffset::west_opt(6 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 16, 10, 30, 0)
            .unwrap()
    }

    #[test]
    fn compass_points() {
        assert_eq!(compass(0), "N");
        assert_eq!(compass(11), "N");
        assert_eq!(compass(12), "NNE");
        assert_eq!(compass(90), "E");
        assert_eq!(compass(315), "NW");
        assert_eq!(compass(350), "N");
        assert_eq!(compass(720), "N");
    }

    #[test]
    fn time_is_twelve_hour_clock() {
        assert_eq!(time_text(&mountain_time()), "10:30 AM");
    }

    #[test]
    fn current_body_contains_city_temp_and_description() {
        let body = current_body(&boulder(), Units::Imperial);
        assert_eq!(
            body,
            "Boulder\n72.4F Clear\nWind 5.8 mph NW\nH 75.0F  L 58.2F"
        );
        assert!(body.contains("Boulder") && body.contains("72.4F") && body.contains("Clear"));
    }

    #[test]
    fn metric_wind_uses_metres_per_second() {
        let mut weather = boulder();
        weather.temp_unit = "C".to_string();
        let body = current_body(&weather, Units::Metric);
        assert!(body.contains("\n72.4C Clear\n"));
        assert!(body.contains("Wind 5.8 m/s NW"));
    }

    #[test]
    fn hourly_body_lists_entries_in_local_time() {
        let now = mountain_time();
        let start = Utc.with_ymd_and_hms(2024, 6, 16, 17, 0, 0).unwrap();
        let entries = (0..3)
            .map(|i| HourlyEntry {
                time: start + chrono::Duration::hours(i * 3),
                temp: 70.0 - i as f32,
                wind_speed: 4.2,
                wind_dir: 90,
            })
            .collect();
        let forecast = HourlyForecast::new("Boulder", entries, 4);

        let body = hourly_body(&forecast, Units::Imperial, &now);
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "Boulder");
        assert_eq!(lines[1], "11AM 70F 4 mph E");
        assert_eq!(lines[2], " 2PM 69F 4 mph E");
    }

    #[test]
    fn format_snapshot_pairs_time_and_body() {
        let now = mountain_time();
        let (time, body) = format_snapshot(&WeatherSnapshot::Current(boulder()), Units::Imperial, &now);
        assert_eq!(time, "10:30 AM");
        assert!(body.starts_with("Boulder\n"));
    }
}
