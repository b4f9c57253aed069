//! Location resolver backed by Nominatim (OpenStreetMap).
//!
//! Free-text queries become ranked [`LocationCandidate`]s; coordinates become
//! a short display name.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::fmt::Debug;

use crate::{
    config::Config,
    http::{build_client, fetch_json},
    model::{Address, Coordinates, LocationCandidate},
};

pub const UNKNOWN_LOCATION: &str = "Unknown location";

#[async_trait]
pub trait Geocoder: Send + Sync + Debug {
    /// Candidates for a free-text query, best match first.
    async fn search(&self, query: &str) -> Result<Vec<LocationCandidate>>;

    /// Human-readable name for a coordinate.
    async fn reverse(&self, coordinates: Coordinates) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    base_url: String,
    limit: u32,
    http: Client,
}

impl NominatimGeocoder {
    pub fn new(base_url: impl Into<String>, user_agent: &str, limit: u32) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            limit,
            http: build_client(user_agent)?,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.endpoints.nominatim.as_str(),
            &config.endpoints.user_agent,
            config.chart.suggestion_limit,
        )
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn search(&self, query: &str) -> Result<Vec<LocationCandidate>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!(query, "searching locations");

        let limit = self.limit.to_string();
        let request = self.http.get(format!("{}/search", self.base_url)).query(&[
            ("q", query),
            ("format", "json"),
            ("addressdetails", "1"),
            ("limit", limit.as_str()),
        ]);

        let places: Vec<NominatimPlace> = fetch_json(request, "Nominatim search").await?;

        let candidates = places
            .into_iter()
            .filter_map(|place| match place.into_candidate() {
                Ok(candidate) => Some(candidate),
                Err(e) => {
                    tracing::warn!("Skipping unusable search result: {e:#}");
                    None
                }
            })
            .collect::<Vec<_>>();

        tracing::debug!(query, count = candidates.len(), "search finished");
        Ok(candidates)
    }

    async fn reverse(&self, coordinates: Coordinates) -> Result<String> {
        let lat = coordinates.latitude.to_string();
        let lon = coordinates.longitude.to_string();
        let request = self.http.get(format!("{}/reverse", self.base_url)).query(&[
            ("lat", lat.as_str()),
            ("lon", lon.as_str()),
            ("format", "json"),
            ("addressdetails", "1"),
        ]);

        let body: NominatimReverse = fetch_json(request, "Nominatim reverse").await?;

        if let Some(error) = body.error {
            return Err(anyhow!("Nominatim could not resolve {coordinates}: {error}"));
        }

        let name = body
            .address
            .as_ref()
            .map(format_place_name)
            .unwrap_or_else(|| UNKNOWN_LOCATION.to_string());

        tracing::info!("Reverse geocoded {coordinates} to: {name}");
        Ok(name)
    }
}

/// Pick the most specific populated part of an address.
pub fn format_place_name(address: &Address) -> String {
    [
        &address.city,
        &address.town,
        &address.village,
        &address.state,
        &address.country,
    ]
    .into_iter()
    .flatten()
    .find(|s| !s.trim().is_empty())
    .cloned()
    .unwrap_or_else(|| UNKNOWN_LOCATION.to_string())
}

/// `"Husum, Nordfriesland, Schleswig-Holstein"` -> `"Husum"`.
pub fn short_name(display_name: &str) -> &str {
    display_name.split(',').next().unwrap_or_default().trim()
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    place_id: Option<u64>,
    lat: String,
    lon: String,
    display_name: String,
    address: Option<Address>,
}

impl NominatimPlace {
    fn into_candidate(self) -> Result<LocationCandidate> {
        let latitude: f64 = self
            .lat
            .parse()
            .with_context(|| format!("Invalid latitude '{}'", self.lat))?;
        let longitude: f64 = self
            .lon
            .parse()
            .with_context(|| format!("Invalid longitude '{}'", self.lon))?;

        Ok(LocationCandidate {
            place_id: self.place_id,
            display_name: self.display_name,
            coordinates: Coordinates::new(latitude, longitude),
            address: self.address,
        })
    }
}

#[derive(Debug, Deserialize)]
struct NominatimReverse {
    address: Option<Address>,
    error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> Address {
        Address {
            city: None,
            town: Some("Husum".into()),
            village: Some("Schobüll".into()),
            state: Some("Schleswig-Holstein".into()),
            country: Some("Deutschland".into()),
        }
    }

    #[test]
    fn place_name_prefers_city_then_town() {
        let mut addr = address();
        assert_eq!(format_place_name(&addr), "Husum");

        addr.city = Some("Hamburg".into());
        assert_eq!(format_place_name(&addr), "Hamburg");
    }

    #[test]
    fn place_name_falls_back_to_state_and_country() {
        let addr = Address {
            state: Some("Schleswig-Holstein".into()),
            country: Some("Deutschland".into()),
            ..Default::default()
        };
        assert_eq!(format_place_name(&addr), "Schleswig-Holstein");

        let addr = Address { country: Some("Deutschland".into()), ..Default::default() };
        assert_eq!(format_place_name(&addr), "Deutschland");
    }

    #[test]
    fn place_name_skips_blank_parts() {
        let addr = Address { city: Some("  ".into()), village: Some("Pellworm".into()), ..Default::default() };
        assert_eq!(format_place_name(&addr), "Pellworm");
    }

    #[test]
    fn place_name_unknown_when_empty() {
        assert_eq!(format_place_name(&Address::default()), UNKNOWN_LOCATION);
    }

    #[test]
    fn short_name_takes_first_segment() {
        assert_eq!(short_name("Husum, Nordfriesland, Schleswig-Holstein"), "Husum");
        assert_eq!(short_name("  Sylt  "), "Sylt");
        assert_eq!(short_name(""), "");
    }

    #[test]
    fn place_with_bad_coordinates_is_rejected() {
        let place = NominatimPlace {
            place_id: Some(1),
            lat: "north".into(),
            lon: "9.0".into(),
            display_name: "Nowhere".into(),
            address: None,
        };

        let err = place.into_candidate().unwrap_err();
        assert!(err.to_string().contains("Invalid latitude"));
    }
}
