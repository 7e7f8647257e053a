//! # OpenWeatherMap Client
//!
//! Fetches current conditions from the `weather` endpoint and the short-term
//! forecast from the `forecast` endpoint, then maps the JSON into the crate's
//! own weather types. The response structs below only name the fields the
//! mirror displays; anything missing or malformed becomes
//! [`WeatherError::Parse`] instead of reaching the poll loop.

use crate::weather::{WeatherError, WeatherPort, MAX_HOURLY_ENTRIES};
use crate::{CurrentWeather, HourlyEntry, HourlyForecast, Location, Units};
use async_trait::async_trait;
use chrono::DateTime;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

pub struct OpenWeatherClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct Conditions {
    #[serde(default)]
    main: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Default, Deserialize)]
struct Wind {
    #[serde(default)]
    speed: f32,
    #[serde(default)]
    deg: f32,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f32,
    #[serde(default)]
    temp_min: Option<f32>,
    #[serde(default)]
    temp_max: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    name: String,
    main: MainReadings,
    weather: Vec<Conditions>,
    #[serde(default)]
    wind: Wind,
}

#[derive(Debug, Deserialize)]
struct ForecastCity {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ForecastItem {
    dt: i64,
    main: MainReadings,
    #[serde(default)]
    wind: Wind,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    city: ForecastCity,
    list: Vec<ForecastItem>,
}

fn compass_degrees(deg: f32) -> u16 {
    (deg.rem_euclid(360.0).round() as u16) % 360
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, WeatherError> {
    serde_json::from_str(body).map_err(|e| WeatherError::Parse(e.to_string()))
}

fn current_from_response(resp: CurrentResponse, units: Units) -> Result<CurrentWeather, WeatherError> {
    let conditions = resp
        .weather
        .first()
        .ok_or_else(|| WeatherError::Parse("no weather conditions".to_string()))?;
    let description = if conditions.main.is_empty() {
        conditions.description.clone()
    } else {
        conditions.main.clone()
    };

    Ok(CurrentWeather {
        city: resp.name,
        temp_value: resp.main.temp,
        temp_unit: units.temp_suffix().to_string(),
        description,
        wind_speed: resp.wind.speed,
        wind_dir: compass_degrees(resp.wind.deg),
        high_temp: resp.main.temp_max.unwrap_or(resp.main.temp),
        low_temp: resp.main.temp_min.unwrap_or(resp.main.temp),
    })
}

fn hourly_from_response(
    resp: ForecastResponse,
    max_entries: usize,
) -> Result<HourlyForecast, WeatherError> {
    let entries = resp
        .list
        .into_iter()
        .take(max_entries)
        .map(|item| {
            let time = DateTime::from_timestamp(item.dt, 0)
                .ok_or_else(|| WeatherError::Parse(format!("bad timestamp {}", item.dt)))?;
            Ok(HourlyEntry {
                time,
                temp: item.main.temp,
                wind_speed: item.wind.speed,
                wind_dir: compass_degrees(item.wind.deg),
            })
        })
        .collect::<Result<Vec<_>, WeatherError>>()?;

    Ok(HourlyForecast::new(resp.city.name, entries, max_entries))
}

impl OpenWeatherClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, WeatherError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    async fn get(
        &self,
        endpoint: &str,
        location: Location,
        units: Units,
        extra: &[(&str, String)],
    ) -> Result<String, WeatherError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let mut query = vec![
            ("lat", location.latitude.to_string()),
            ("lon", location.longitude.to_string()),
            ("units", units.as_query().to_string()),
            ("appid", self.api_key.clone()),
        ];
        query.extend(extra.iter().map(|(k, v)| (*k, v.clone())));

        let resp = self.http.get(&url).query(&query).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(WeatherError::Status(status.as_u16()));
        }
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl WeatherPort for OpenWeatherClient {
    async fn fetch_current(
        &self,
        location: Location,
        units: Units,
    ) -> Result<CurrentWeather, WeatherError> {
        let body = self.get("weather", location, units, &[]).await?;
        current_from_response(decode(&body)?, units)
    }

    async fn fetch_hourly(
        &self,
        location: Location,
        units: Units,
        max_entries: usize,
    ) -> Result<HourlyForecast, WeatherError> {
        let max_entries = max_entries.min(MAX_HOURLY_ENTRIES);
        let extra = [("cnt", max_entries.to_string())];
        let body = self.get("forecast", location, units, &extra).await?;
        hourly_from_response(decode(&body)?, max_entries)
    }
}
