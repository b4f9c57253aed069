//! Core library for the `deichwetter` terminal weather dashboard.
//!
//! This crate defines:
//! - Configuration handling
//! - Location search and reverse geocoding (Nominatim)
//! - Current and hourly weather retrieval (Open-Meteo)
//! - Initial position detection
//! - The scrollable chart viewport and the chart model
//!
//! It is used by `deichwetter-cli`, but has no terminal dependencies of its own.

pub mod chart;
pub mod config;
pub mod dashboard;
pub mod geocode;
pub mod geolocate;
mod http;
pub mod model;
pub mod search;
pub mod viewport;
pub mod weather;

pub use chart::{ChartFrame, DayBand};
pub use config::{ChartSettings, Config, GeolocationMode, HomeLocation};
pub use dashboard::{Dashboard, LoadOutcome, PendingLoad, SelectedLocation};
pub use geocode::{Geocoder, NominatimGeocoder};
pub use geolocate::{Geolocator, LocationError, Position};
pub use model::{
    Coordinates, CurrentWeather, HourlySample, HourlySeries, LocationCandidate, TimestampMs,
    WeatherCondition,
};
pub use search::{SearchBox, SuggestionFeed, SuggestionUpdate};
pub use viewport::{ScrollKey, Viewport, ViewportController};
pub use weather::{OpenMeteoClient, WeatherSource};
