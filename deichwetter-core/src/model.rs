use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unix epoch milliseconds, the unit every chart and viewport bound uses.
pub type TimestampMs = i64;

pub const HOUR_MS: TimestampMs = 60 * 60 * 1000;
pub const DAY_MS: TimestampMs = 24 * HOUR_MS;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// Structured address as returned with `addressdetails=1`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub city: Option<String>,
    pub town: Option<String>,
    pub village: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

/// One geocoding hit, produced per search and discarded on selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationCandidate {
    pub place_id: Option<u64>,
    pub display_name: String,
    pub coordinates: Coordinates,
    pub address: Option<Address>,
}

/// Current conditions as reported by `current_weather=true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub temperature_c: f64,
    pub wind_speed_kmh: f64,
    pub wind_direction_deg: f64,
    pub weather_code: i32,
    pub is_day: bool,
    pub observation_time: DateTime<Utc>,
}

impl CurrentWeather {
    pub fn condition(&self) -> WeatherCondition {
        WeatherCondition::from_wmo_code(self.weather_code)
    }

    pub fn wind_compass(&self) -> &'static str {
        wind_direction_to_compass(self.wind_direction_deg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HourlySample {
    pub timestamp: TimestampMs,
    pub temperature_c: f64,
    pub precipitation_probability: Option<f64>,
}

/// Ordered hourly forecast. Immutable once fetched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HourlySeries {
    samples: Vec<HourlySample>,
}

impl HourlySeries {
    /// Samples are sorted by timestamp on construction.
    pub fn new(mut samples: Vec<HourlySample>) -> Self {
        samples.sort_by_key(|s| s.timestamp);
        Self { samples }
    }

    pub fn samples(&self) -> &[HourlySample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn timestamps(&self) -> Vec<TimestampMs> {
        self.samples.iter().map(|s| s.timestamp).collect()
    }

    pub fn first_timestamp(&self) -> Option<TimestampMs> {
        self.samples.first().map(|s| s.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<TimestampMs> {
        self.samples.last().map(|s| s.timestamp)
    }
}

/// Weather condition categories mapped from WMO codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    Clear,
    PartlyCloudy,
    Cloudy,
    Fog,
    Drizzle,
    Rain,
    Snow,
    Showers,
    Thunderstorm,
    Unknown,
}

impl WeatherCondition {
    /// See <https://open-meteo.com/en/docs#weathervariables>
    pub fn from_wmo_code(code: i32) -> Self {
        match code {
            0 => Self::Clear,
            1 | 2 => Self::PartlyCloudy,
            3 => Self::Cloudy,
            45 | 48 => Self::Fog,
            51..=57 => Self::Drizzle,
            61..=67 => Self::Rain,
            71..=77 | 85 | 86 => Self::Snow,
            80..=82 => Self::Showers,
            95..=99 => Self::Thunderstorm,
            _ => Self::Unknown,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Clear => "Clear Sky",
            Self::PartlyCloudy => "Partly Cloudy",
            Self::Cloudy => "Cloudy",
            Self::Fog => "Fog",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::Snow => "Snow",
            Self::Showers => "Showers",
            Self::Thunderstorm => "Thunderstorm",
            Self::Unknown => "Unknown Condition",
        }
    }

    /// Short glyph for terminal output.
    pub fn icon(&self, is_day: bool) -> &'static str {
        match self {
            Self::Clear if is_day => "☀",
            Self::Clear => "☾",
            Self::PartlyCloudy => "⛅",
            Self::Cloudy => "☁",
            Self::Fog => "≋",
            Self::Drizzle | Self::Rain | Self::Showers => "☂",
            Self::Snow => "❄",
            Self::Thunderstorm => "⚡",
            Self::Unknown => "?",
        }
    }
}

/// Eight-point compass name for a wind direction in degrees.
pub fn wind_direction_to_compass(degrees: f64) -> &'static str {
    if !degrees.is_finite() {
        return "";
    }
    let deg = degrees.rem_euclid(360.0);
    const NAMES: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];
    let sector = ((deg + 22.5) / 45.0) as usize % 8;
    NAMES[sector]
}
