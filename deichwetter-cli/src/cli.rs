use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use deichwetter_core::{
    Config, Coordinates, Dashboard, GeolocationMode, Geocoder, NominatimGeocoder, PendingLoad,
    geocode::short_name,
};
use inquire::{Confirm, CustomType, Select, Text};
use ratatui::{buffer::Buffer, layout::Rect, widgets::Block};

use crate::{browse, render};

const CHART_WIDTH: u16 = 80;
const CHART_HEIGHT: u16 = 16;

const KEEP_HOME: &str = "Keep it";
const CHANGE_HOME: &str = "Choose another";
const REMOVE_HOME: &str = "Remove it";

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "deichwetter", version, about = "Current conditions and hourly forecast in the terminal")]
pub struct Cli {
    /// How to find the starting position for this run: auto, home or ip.
    #[arg(long, global = true, value_name = "MODE", value_parser = parse_geolocation_mode)]
    pub locate: Option<GeolocationMode>,

    #[command(subcommand)]
    pub command: Command,
}

fn parse_geolocation_mode(value: &str) -> Result<GeolocationMode, String> {
    GeolocationMode::try_from(value).map_err(|e| e.to_string())
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive setup: home location, position detection, chart window.
    Configure,

    /// List locations matching a search text.
    Search {
        /// Place name, address or postcode.
        query: String,
    },

    /// Print current conditions and the next hours for a location.
    Show {
        /// Place to look up; the detected position is used when absent.
        address: Option<String>,

        /// Latitude (decimal), used together with --lon.
        #[arg(long, allow_negative_numbers = true, requires = "lon", conflicts_with = "address")]
        lat: Option<f64>,

        /// Longitude (decimal), used together with --lat.
        #[arg(long, allow_negative_numbers = true, requires = "lat")]
        lon: Option<f64>,
    },

    /// Full-screen dashboard with type-ahead search and a scrollable chart.
    Browse {
        /// Place to open with; the detected position is used when absent.
        address: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let mut config = Config::load()?;
        if let Some(mode) = self.locate {
            config.geolocation = mode;
        }

        match self.command {
            Command::Configure => configure(config).await,
            Command::Search { query } => search(&config, &query).await,
            Command::Show { address, lat, lon } => {
                let coordinates = lat.zip(lon).map(|(lat, lon)| Coordinates::new(lat, lon));
                show(&config, address, coordinates).await
            }
            Command::Browse { address } => {
                let mut dashboard = Dashboard::from_config(&config)?;
                let initial = start_initial(&mut dashboard, address, None).await?;
                browse::run(dashboard, &config, initial).await
            }
        }
    }
}

async fn search(config: &Config, query: &str) -> anyhow::Result<()> {
    let geocoder = NominatimGeocoder::from_config(config)?;
    let candidates = geocoder.search(query).await?;

    if candidates.is_empty() {
        println!("No locations found for '{query}'.");
        return Ok(());
    }

    for (i, c) in candidates.iter().enumerate() {
        println!("{:>2}. {}  ({})", i + 1, c.display_name, c.coordinates);
    }
    Ok(())
}

async fn show(config: &Config, address: Option<String>, coordinates: Option<Coordinates>) -> anyhow::Result<()> {
    let mut dashboard = Dashboard::from_config(config)?;
    let pending = start_initial(&mut dashboard, address, coordinates).await?;
    dashboard.complete(pending).await;

    for line in render::render_current(dashboard.location(), dashboard.current()) {
        println!("{line}");
    }
    println!();

    match dashboard.frame() {
        Some(frame) => {
            let mut buf = Buffer::empty(Rect::new(0, 0, CHART_WIDTH, CHART_HEIGHT));
            render::render_chart(&frame, buf.area, &mut buf, Block::bordered().title(" Hourly forecast "));
            for line in render::buffer_lines(&buf) {
                println!("{line}");
            }
        }
        None => println!("No hourly forecast available."),
    }

    Ok(())
}

/// Start loading an explicit place, or the detected position.
async fn start_initial(
    dashboard: &mut Dashboard,
    address: Option<String>,
    coordinates: Option<Coordinates>,
) -> anyhow::Result<PendingLoad> {
    if let Some(coordinates) = coordinates {
        if !coordinates.is_valid() {
            return Err(anyhow!("Coordinates out of range: {coordinates}"));
        }
        let name = match dashboard.geocoder().reverse(coordinates).await {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!("Reverse geocoding failed: {e:#}");
                coordinates.to_string()
            }
        };
        return Ok(dashboard.start_load(coordinates, name));
    }

    if let Some(address) = address {
        let candidates = dashboard
            .geocoder()
            .search(&address)
            .await
            .with_context(|| format!("Failed to look up '{address}'"))?;
        dashboard.search_box_mut().set_suggestions(candidates);
        return dashboard.start_select(0).ok_or_else(|| {
            anyhow!("No location found for '{address}'.\nHint: try `deichwetter search {address}`.")
        });
    }

    Ok(dashboard.start_locate())
}

async fn configure(mut config: Config) -> anyhow::Result<()> {
    let mode = Select::new("How should your position be detected?", GeolocationMode::all().to_vec())
        .with_starting_cursor(
            GeolocationMode::all().iter().position(|m| *m == config.geolocation).unwrap_or(0),
        )
        .with_help_message("auto: home location if set, otherwise IP lookup")
        .prompt()?;
    config.geolocation = mode;

    let home_action = match config.home.as_ref() {
        Some(home) => {
            let message = format!("Home location is {}.", home.name);
            Select::new(&message, vec![KEEP_HOME, CHANGE_HOME, REMOVE_HOME]).prompt()?
        }
        None => {
            let wants_home = Confirm::new("Set a home location?")
                .with_default(mode == GeolocationMode::Home)
                .prompt()?;
            if wants_home { CHANGE_HOME } else { KEEP_HOME }
        }
    };

    match home_action {
        CHANGE_HOME => {
            let geocoder = NominatimGeocoder::from_config(&config)?;
            loop {
                let query = Text::new("Search for your home location:").prompt()?;
                let candidates = geocoder.search(&query).await?;
                if candidates.is_empty() {
                    println!("Nothing found for '{query}', try again.");
                    continue;
                }

                let labels: Vec<String> = candidates.iter().map(|c| c.display_name.clone()).collect();
                let chosen = Select::new("Which one?", labels).raw_prompt()?;
                let candidate = &candidates[chosen.index];
                config.set_home(short_name(&candidate.display_name), candidate.coordinates);
                break;
            }
        }
        REMOVE_HOME => config.clear_home(),
        _ => {}
    }

    if config.geolocation == GeolocationMode::Home && config.home.is_none() {
        println!("No home location set; falling back to automatic detection.");
        config.geolocation = GeolocationMode::Auto;
    }

    config.chart.visible_range_hours = CustomType::<u32>::new("Visible chart range (hours):")
        .with_default(config.chart.visible_range_hours)
        .with_validator(|v: &u32| {
            Ok(if (1..=24 * 16).contains(v) {
                inquire::validator::Validation::Valid
            } else {
                inquire::validator::Validation::Invalid("between 1 and 384 hours".into())
            })
        })
        .prompt()?;

    config.chart.scroll_step_hours = CustomType::<u32>::new("Scroll step (hours):")
        .with_default(config.chart.scroll_step_hours)
        .with_validator(|v: &u32| {
            Ok(if *v >= 1 {
                inquire::validator::Validation::Valid
            } else {
                inquire::validator::Validation::Invalid("at least one hour".into())
            })
        })
        .prompt()?;

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}
