//! Initial position detection.
//!
//! A terminal has no browser geolocation, so the position comes from the
//! configured home location or from an IP lookup against ipinfo.io.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::fmt::Debug;

use crate::{
    config::{Config, GeolocationMode, HomeLocation},
    http::build_client,
    model::Coordinates,
};

#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("No home location configured")]
    NoHomeLocation,
    #[error("Location service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("Location service returned invalid coordinates '{0}'")]
    InvalidCoordinates(String),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// A detected position, optionally with a name the source already knows.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub coordinates: Coordinates,
    pub name: Option<String>,
}

#[async_trait]
pub trait Geolocator: Send + Sync + Debug {
    async fn locate(&self) -> Result<Position, LocationError>;
}

/// Always answers with the saved home location.
#[derive(Debug, Clone)]
pub struct FixedGeolocator {
    home: Option<HomeLocation>,
}

impl FixedGeolocator {
    pub fn new(home: Option<HomeLocation>) -> Self {
        Self { home }
    }
}

#[async_trait]
impl Geolocator for FixedGeolocator {
    async fn locate(&self) -> Result<Position, LocationError> {
        let home = self.home.as_ref().ok_or(LocationError::NoHomeLocation)?;
        Ok(Position { coordinates: home.coordinates(), name: Some(home.name.clone()) })
    }
}

#[derive(Debug, Clone)]
pub struct IpGeolocator {
    url: String,
    http: Client,
}

impl IpGeolocator {
    pub fn new(url: impl Into<String>, http: Client) -> Self {
        Self { url: url.into(), http }
    }
}

#[derive(Debug, Deserialize)]
struct IpInfoResponse {
    city: Option<String>,
    /// `"latitude,longitude"`
    loc: Option<String>,
}

/// Parse ipinfo's `"53.5511,9.9937"` form.
pub fn parse_loc(loc: &str) -> Result<Coordinates, LocationError> {
    let invalid = || LocationError::InvalidCoordinates(loc.to_string());

    let (lat, lon) = loc.split_once(',').ok_or_else(invalid)?;
    let latitude: f64 = lat.trim().parse().map_err(|_| invalid())?;
    let longitude: f64 = lon.trim().parse().map_err(|_| invalid())?;

    let coordinates = Coordinates::new(latitude, longitude);
    if !coordinates.is_valid() {
        return Err(invalid());
    }
    Ok(coordinates)
}

#[async_trait]
impl Geolocator for IpGeolocator {
    async fn locate(&self) -> Result<Position, LocationError> {
        let res = self.http.get(&self.url).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(LocationError::ServiceUnavailable(format!("status {status}")));
        }

        let body: IpInfoResponse = res.json().await?;
        let loc = body
            .loc
            .ok_or_else(|| LocationError::ServiceUnavailable("response has no 'loc'".into()))?;

        let coordinates = parse_loc(&loc)?;
        tracing::info!(%coordinates, "located via IP lookup");

        Ok(Position { coordinates, name: body.city.filter(|c| !c.trim().is_empty()) })
    }
}

/// `auto` mode: the home location if there is one, otherwise IP lookup.
#[derive(Debug)]
pub struct AutoGeolocator {
    home: FixedGeolocator,
    ip: IpGeolocator,
}

#[async_trait]
impl Geolocator for AutoGeolocator {
    async fn locate(&self) -> Result<Position, LocationError> {
        match self.home.locate().await {
            Ok(position) => Ok(position),
            Err(LocationError::NoHomeLocation) => self.ip.locate().await,
            Err(e) => Err(e),
        }
    }
}

/// Construct the geolocator selected by `config.geolocation`.
pub fn geolocator_from_config(config: &Config) -> anyhow::Result<Box<dyn Geolocator>> {
    let fixed = FixedGeolocator::new(config.home.clone());

    let boxed: Box<dyn Geolocator> = match config.geolocation {
        GeolocationMode::Home => Box::new(fixed),
        GeolocationMode::Ip => Box::new(IpGeolocator::new(
            config.endpoints.ipinfo.as_str(),
            build_client(&config.endpoints.user_agent)?,
        )),
        GeolocationMode::Auto => Box::new(AutoGeolocator {
            home: fixed,
            ip: IpGeolocator::new(
                config.endpoints.ipinfo.as_str(),
                build_client(&config.endpoints.user_agent)?,
            ),
        }),
    };

    Ok(boxed)
}
