use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::model::{Coordinates, HOUR_MS, TimestampMs};

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_OPEN_METEO_URL: &str = "https://api.open-meteo.com/v1/forecast";
pub const DEFAULT_IPINFO_URL: &str = "https://ipinfo.io/json";
pub const DEFAULT_USER_AGENT: &str = concat!("deichwetter/", env!("CARGO_PKG_VERSION"));

/// How the initial position is determined when no location is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GeolocationMode {
    /// Use `home` if set, otherwise look up the public IP.
    #[default]
    Auto,
    /// Only ever use `home`.
    Home,
    /// Always look up the public IP.
    Ip,
}

impl GeolocationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeolocationMode::Auto => "auto",
            GeolocationMode::Home => "home",
            GeolocationMode::Ip => "ip",
        }
    }

    pub const fn all() -> &'static [GeolocationMode] {
        &[GeolocationMode::Auto, GeolocationMode::Home, GeolocationMode::Ip]
    }
}

impl std::fmt::Display for GeolocationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for GeolocationMode {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "auto" => Ok(GeolocationMode::Auto),
            "home" => Ok(GeolocationMode::Home),
            "ip" => Ok(GeolocationMode::Ip),
            _ => Err(anyhow!(
                "Unknown geolocation mode '{value}'. Supported modes: auto, home, ip."
            )),
        }
    }
}

/// A saved location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeLocation {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl HomeLocation {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// Remote endpoints. Overridable so tests and self-hosted instances can point elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub nominatim: String,
    pub open_meteo: String,
    pub ipinfo: String,
    pub user_agent: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            nominatim: DEFAULT_NOMINATIM_URL.to_string(),
            open_meteo: DEFAULT_OPEN_METEO_URL.to_string(),
            ipinfo: DEFAULT_IPINFO_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Chart window and search tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartSettings {
    pub visible_range_hours: u32,
    pub scroll_step_hours: u32,
    pub debounce_ms: u64,
    pub suggestion_limit: u32,
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            visible_range_hours: 24,
            scroll_step_hours: 2,
            debounce_ms: 300,
            suggestion_limit: 10,
        }
    }
}

impl ChartSettings {
    pub fn visible_range_ms(&self) -> TimestampMs {
        TimestampMs::from(self.visible_range_hours.max(1)) * HOUR_MS
    }

    pub fn scroll_step_ms(&self) -> TimestampMs {
        TimestampMs::from(self.scroll_step_hours.max(1)) * HOUR_MS
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// geolocation = "auto"
///
/// [home]
/// name = "Husum"
/// latitude = 54.48
/// longitude = 9.05
///
/// [chart]
/// visible_range_hours = 24
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub geolocation: GeolocationMode,
    pub home: Option<HomeLocation>,
    pub chart: ChartSettings,
    pub endpoints: Endpoints,
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("de", "deichwetter", "deichwetter")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn set_home(&mut self, name: impl Into<String>, coordinates: Coordinates) {
        self.home = Some(HomeLocation {
            name: name.into(),
            latitude: coordinates.latitude,
            longitude: coordinates.longitude,
        });
    }

    pub fn clear_home(&mut self) {
        self.home = None;
        if self.geolocation == GeolocationMode::Home {
            self.geolocation = GeolocationMode::Auto;
        }
    }
}
