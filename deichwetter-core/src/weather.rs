//! Weather client backed by the Open-Meteo forecast API.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::fmt::Debug;

use crate::{
    config::Config,
    http::{build_client, fetch_json},
    model::{Coordinates, CurrentWeather, HourlySample, HourlySeries, TimestampMs},
};

const HOURLY_FIELDS: &str = "temperature_2m,precipitation_probability";

#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    async fn current(&self, coordinates: Coordinates) -> Result<CurrentWeather>;

    async fn hourly(&self, coordinates: Coordinates) -> Result<HourlySeries>;
}

#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    base_url: String,
    http: Client,
}

impl OpenMeteoClient {
    pub fn new(base_url: impl Into<String>, user_agent: &str) -> Result<Self> {
        Ok(Self { base_url: base_url.into(), http: build_client(user_agent)? })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.endpoints.open_meteo.as_str(), &config.endpoints.user_agent)
    }

    fn coordinate_params(coordinates: Coordinates) -> [(&'static str, String); 2] {
        [
            ("latitude", coordinates.latitude.to_string()),
            ("longitude", coordinates.longitude.to_string()),
        ]
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    async fn current(&self, coordinates: Coordinates) -> Result<CurrentWeather> {
        let request = self
            .http
            .get(&self.base_url)
            .query(&Self::coordinate_params(coordinates))
            .query(&[("current_weather", "true")]);

        let parsed: OmCurrentResponse = fetch_json(request, "Open-Meteo (current weather)").await?;

        let cw = parsed
            .current_weather
            .ok_or_else(|| anyhow!("Open-Meteo response contained no current_weather block"))?;

        let observation_time = parse_open_meteo_time(&cw.time)
            .map(|ms| DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_else(Utc::now))
            .unwrap_or_else(|e| {
                tracing::debug!("Unparseable current_weather time '{}': {e:#}", cw.time);
                Utc::now()
            });

        Ok(CurrentWeather {
            temperature_c: cw.temperature,
            wind_speed_kmh: cw.windspeed,
            wind_direction_deg: cw.winddirection,
            weather_code: cw.weathercode,
            is_day: cw.is_day.unwrap_or(1) != 0,
            observation_time,
        })
    }

    async fn hourly(&self, coordinates: Coordinates) -> Result<HourlySeries> {
        let request = self
            .http
            .get(&self.base_url)
            .query(&Self::coordinate_params(coordinates))
            .query(&[("hourly", HOURLY_FIELDS)]);

        let parsed: OmHourlyResponse = fetch_json(request, "Open-Meteo (hourly forecast)").await?;

        let hourly = parsed
            .hourly
            .ok_or_else(|| anyhow!("Open-Meteo response contained no hourly block"))?;

        let series = hourly.into_series()?;
        tracing::debug!(%coordinates, samples = series.len(), "fetched hourly series");
        Ok(series)
    }
}

/// Open-Meteo reports GMT wall-clock times without an offset (`2024-05-01T13:00`).
pub fn parse_open_meteo_time(s: &str) -> Result<TimestampMs> {
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .with_context(|| format!("Invalid Open-Meteo timestamp '{s}'"))?;
    Ok(naive.and_utc().timestamp_millis())
}

#[derive(Debug, Deserialize)]
struct OmCurrentWeather {
    time: String,
    temperature: f64,
    windspeed: f64,
    winddirection: f64,
    weathercode: i32,
    is_day: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct OmCurrentResponse {
    current_weather: Option<OmCurrentWeather>,
}

#[derive(Debug, Deserialize)]
struct OmHourly {
    time: Vec<String>,
    temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_probability: Vec<Option<f64>>,
}

impl OmHourly {
    fn into_series(self) -> Result<HourlySeries> {
        if self.temperature_2m.len() != self.time.len() {
            return Err(anyhow!(
                "Open-Meteo hourly arrays differ in length: {} times, {} temperatures",
                self.time.len(),
                self.temperature_2m.len()
            ));
        }

        let mut samples = Vec::with_capacity(self.time.len());
        for (i, (time, temperature)) in self.time.iter().zip(&self.temperature_2m).enumerate() {
            // Hours without a temperature are useless on a temperature chart.
            let Some(temperature_c) = *temperature else {
                continue;
            };
            samples.push(HourlySample {
                timestamp: parse_open_meteo_time(time)?,
                temperature_c,
                precipitation_probability: self.precipitation_probability.get(i).copied().flatten(),
            });
        }

        Ok(HourlySeries::new(samples))
    }
}

#[derive(Debug, Deserialize)]
struct OmHourlyResponse {
    hourly: Option<OmHourly>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HOUR_MS;

    #[test]
    fn parses_minute_and_second_precision() {
        let a = parse_open_meteo_time("2024-05-01T13:00").expect("minute precision");
        let b = parse_open_meteo_time("2024-05-01T13:00:00").expect("second precision");

        assert_eq!(a, b);
        assert_eq!(a, 1_714_568_400_000);
    }

    #[test]
    fn rejects_garbage_time() {
        let err = parse_open_meteo_time("yesterday").unwrap_err();
        assert!(err.to_string().contains("Invalid Open-Meteo timestamp"));
    }

    #[test]
    fn hourly_block_skips_missing_temperatures() {
        let hourly = OmHourly {
            time: vec!["2024-05-01T00:00".into(), "2024-05-01T01:00".into(), "2024-05-01T02:00".into()],
            temperature_2m: vec![Some(10.0), None, Some(12.0)],
            precipitation_probability: vec![Some(5.0), Some(10.0), None],
        };

        let series = hourly.into_series().expect("valid block");

        assert_eq!(series.len(), 2);
        assert_eq!(series.samples()[0].precipitation_probability, Some(5.0));
        assert_eq!(series.samples()[1].precipitation_probability, None);
        assert_eq!(series.samples()[1].timestamp - series.samples()[0].timestamp, 2 * HOUR_MS);
    }

    #[test]
    fn hourly_block_without_precipitation_is_accepted() {
        let hourly: OmHourly = serde_json::from_value(serde_json::json!({
            "time": ["2024-05-01T00:00"],
            "temperature_2m": [7.5]
        }))
        .expect("valid json");

        let series = hourly.into_series().expect("valid block");
        assert_eq!(series.samples()[0].precipitation_probability, None);
    }

    #[test]
    fn mismatched_arrays_are_an_error() {
        let hourly = OmHourly {
            time: vec!["2024-05-01T00:00".into()],
            temperature_2m: vec![],
            precipitation_probability: vec![],
        };

        let err = hourly.into_series().unwrap_err();
        assert!(err.to_string().contains("differ in length"));
    }
}
