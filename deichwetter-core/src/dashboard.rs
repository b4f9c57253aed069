//! Orchestration: location -> weather -> viewport.
//!
//! Failures never escape from here. They are logged and the only visible
//! effect is that the loading flag drops again.

use std::sync::Arc;

use chrono::Utc;

use crate::{
    chart::{ChartFrame, DayBand, alternating_day_bands},
    config::Config,
    geocode::{Geocoder, NominatimGeocoder, short_name},
    geolocate::{Geolocator, geolocator_from_config},
    model::{Coordinates, CurrentWeather, HourlySeries, TimestampMs},
    search::SearchBox,
    viewport::{ScrollKey, Viewport, ViewportController},
    weather::{OpenMeteoClient, WeatherSource},
};

/// The place whose weather is on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedLocation {
    pub name: String,
    pub coordinates: Coordinates,
}

fn system_now() -> TimestampMs {
    Utc::now().timestamp_millis()
}

#[derive(Debug)]
enum Target {
    Position,
    Place(SelectedLocation),
}

/// A started load that has not talked to any service yet.
///
/// It owns handles to the services, so it can be driven on another task
/// while the dashboard keeps serving input. Hand the result of
/// [`PendingLoad::run`] back to [`Dashboard::apply`].
#[derive(Debug)]
#[must_use = "a pending load does nothing until it is run"]
pub struct PendingLoad {
    generation: u64,
    target: Target,
    geocoder: Arc<dyn Geocoder>,
    weather: Arc<dyn WeatherSource>,
    geolocator: Arc<dyn Geolocator>,
}

/// What a finished [`PendingLoad`] brings back.
#[derive(Debug)]
pub struct LoadOutcome {
    generation: u64,
    fetched: Option<Fetched>,
}

#[derive(Debug)]
struct Fetched {
    location: SelectedLocation,
    current: Option<CurrentWeather>,
    series: Option<HourlySeries>,
}

impl PendingLoad {
    /// Talk to the services. Failures are logged, never returned.
    pub async fn run(self) -> LoadOutcome {
        let location = match self.target {
            Target::Place(location) => Some(location),
            Target::Position => resolve_position(&*self.geolocator, &*self.geocoder).await,
        };

        let fetched = match location {
            Some(location) => Some(fetch_weather(&*self.weather, location).await),
            None => None,
        };

        LoadOutcome { generation: self.generation, fetched }
    }
}

async fn resolve_position(geolocator: &dyn Geolocator, geocoder: &dyn Geocoder) -> Option<SelectedLocation> {
    let position = match geolocator.locate().await {
        Ok(position) => position,
        Err(e) => {
            tracing::warn!("Could not determine position: {e}");
            return None;
        }
    };

    let name = match position.name {
        Some(name) => name,
        None => match geocoder.reverse(position.coordinates).await {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!("Reverse geocoding failed: {e:#}");
                position.coordinates.to_string()
            }
        },
    };

    Some(SelectedLocation { name, coordinates: position.coordinates })
}

async fn fetch_weather(weather: &dyn WeatherSource, location: SelectedLocation) -> Fetched {
    let (current, hourly) = tokio::join!(
        weather.current(location.coordinates),
        weather.hourly(location.coordinates),
    );

    let current = current
        .inspect_err(|e| tracing::warn!("Loading current weather for {} failed: {e:#}", location.name))
        .ok();
    let series = hourly
        .inspect_err(|e| tracing::warn!("Loading hourly forecast for {} failed: {e:#}", location.name))
        .ok();

    Fetched { location, current, series }
}

#[derive(Debug)]
pub struct Dashboard {
    geocoder: Arc<dyn Geocoder>,
    weather: Arc<dyn WeatherSource>,
    geolocator: Arc<dyn Geolocator>,
    controller: ViewportController,
    search: SearchBox,
    clock: fn() -> TimestampMs,

    location: Option<SelectedLocation>,
    current: Option<CurrentWeather>,
    series: HourlySeries,
    bands: Vec<DayBand>,
    /// Bumped by every started load; only the newest one may apply.
    generation: u64,
    loading: bool,
    pointer_over_chart: bool,
}

impl Dashboard {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        weather: Arc<dyn WeatherSource>,
        geolocator: Box<dyn Geolocator>,
        controller: ViewportController,
    ) -> Self {
        Self {
            geocoder,
            weather,
            geolocator: Arc::from(geolocator),
            controller,
            search: SearchBox::new(),
            clock: system_now,
            location: None,
            current: None,
            series: HourlySeries::default(),
            bands: Vec::new(),
            generation: 0,
            loading: false,
            pointer_over_chart: true,
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let controller = ViewportController::new(
            config.chart.visible_range_ms(),
            config.chart.scroll_step_ms(),
        );

        Ok(Self::new(
            Arc::new(NominatimGeocoder::from_config(config)?),
            Arc::new(OpenMeteoClient::from_config(config)?),
            geolocator_from_config(config)?,
            controller,
        ))
    }

    /// Replace the wall clock, e.g. with a fixed instant.
    pub fn with_clock(mut self, clock: fn() -> TimestampMs) -> Self {
        self.clock = clock;
        self
    }

    pub fn geocoder(&self) -> Arc<dyn Geocoder> {
        Arc::clone(&self.geocoder)
    }

    /// True from the start of a load until its outcome is applied.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn location(&self) -> Option<&SelectedLocation> {
        self.location.as_ref()
    }

    pub fn current(&self) -> Option<&CurrentWeather> {
        self.current.as_ref()
    }

    pub fn series(&self) -> &HourlySeries {
        &self.series
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.controller.window()
    }

    pub fn search_box(&self) -> &SearchBox {
        &self.search
    }

    pub fn search_box_mut(&mut self) -> &mut SearchBox {
        &mut self.search
    }

    fn begin(&mut self, target: Target) -> PendingLoad {
        self.generation += 1;
        self.loading = true;

        PendingLoad {
            generation: self.generation,
            target,
            geocoder: Arc::clone(&self.geocoder),
            weather: Arc::clone(&self.weather),
            geolocator: Arc::clone(&self.geolocator),
        }
    }

    /// Start finding out where we are, then load the weather there.
    pub fn start_locate(&mut self) -> PendingLoad {
        self.begin(Target::Position)
    }

    /// Start loading the weather for a known place.
    pub fn start_load(&mut self, coordinates: Coordinates, name: impl Into<String>) -> PendingLoad {
        self.begin(Target::Place(SelectedLocation { name: name.into(), coordinates }))
    }

    /// Pick a suggestion from the search box and start loading its weather.
    ///
    /// `None` when `index` is out of range; the search box is left as it was.
    pub fn start_select(&mut self, index: usize) -> Option<PendingLoad> {
        let candidate = self.search.select(index)?;
        tracing::info!("Selected location: {}", candidate.display_name);

        let name = short_name(&candidate.display_name).to_string();
        Some(self.start_load(candidate.coordinates, name))
    }

    /// Take over a finished load and reset the viewport.
    ///
    /// Returns whether position, current conditions and the hourly series all
    /// arrived. Each part that did load is kept. Outcomes of loads that a
    /// newer one superseded are dropped and keep the loading flag as it is.
    pub fn apply(&mut self, outcome: LoadOutcome) -> bool {
        if outcome.generation != self.generation {
            tracing::debug!(
                stale = outcome.generation,
                current = self.generation,
                "dropping superseded load"
            );
            return false;
        }
        self.loading = false;

        let Some(fetched) = outcome.fetched else {
            return false;
        };

        let complete = fetched.current.is_some() && fetched.series.is_some();
        self.location = Some(fetched.location);
        self.current = fetched.current;

        match fetched.series {
            Some(series) => {
                let timestamps = series.timestamps();
                self.bands = alternating_day_bands(&timestamps);
                self.controller.load(&timestamps, (self.clock)());
                self.series = series;
            }
            None => {
                self.series = HourlySeries::default();
                self.bands.clear();
                self.controller.load(&[], (self.clock)());
            }
        }

        complete
    }

    /// Run a started load on the current task and apply its outcome.
    pub async fn complete(&mut self, pending: PendingLoad) -> bool {
        let outcome = pending.run().await;
        self.apply(outcome)
    }

    pub fn scroll(&mut self, delta: TimestampMs) -> Option<Viewport> {
        self.controller.scroll(delta, (self.clock)())
    }

    pub fn scroll_key(&mut self, key: ScrollKey) -> Option<Viewport> {
        self.controller.scroll_key(key, (self.clock)())
    }

    /// Wheel events only count while the pointer is over the chart.
    pub fn scroll_wheel(&mut self, delta_y: f64) -> Option<Viewport> {
        if !self.pointer_over_chart {
            return self.controller.window();
        }
        self.controller.scroll_wheel(delta_y, (self.clock)())
    }

    pub fn set_pointer_over_chart(&mut self, over: bool) {
        self.pointer_over_chart = over;
    }

    pub fn frame(&self) -> Option<ChartFrame> {
        let viewport = self.controller.window()?;
        Some(ChartFrame::build(&self.series, &self.bands, viewport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geolocate::{LocationError, Position},
        model::{HOUR_MS, HourlySample, LocationCandidate},
    };
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    // 2024-05-01T00:00:00Z
    const MAY_1: TimestampMs = 1_714_521_600_000;

    fn fixed_now() -> TimestampMs {
        MAY_1 + 5 * HOUR_MS
    }

    #[derive(Debug)]
    struct StubGeocoder {
        reverse_ok: bool,
    }

    #[async_trait]
    impl Geocoder for StubGeocoder {
        async fn search(&self, query: &str) -> Result<Vec<LocationCandidate>> {
            Ok(vec![LocationCandidate {
                place_id: Some(1),
                display_name: format!("{query}, Nordfriesland, Deutschland"),
                coordinates: Coordinates::new(54.48, 9.05),
                address: None,
            }])
        }

        async fn reverse(&self, _coordinates: Coordinates) -> Result<String> {
            if self.reverse_ok { Ok("Husum".into()) } else { Err(anyhow!("rate limited")) }
        }
    }

    #[derive(Debug)]
    struct StubWeather {
        current_ok: bool,
        hourly_ok: bool,
    }

    #[async_trait]
    impl WeatherSource for StubWeather {
        async fn current(&self, _coordinates: Coordinates) -> Result<CurrentWeather> {
            if !self.current_ok {
                return Err(anyhow!("timeout"));
            }
            Ok(CurrentWeather {
                temperature_c: 11.5,
                wind_speed_kmh: 30.0,
                wind_direction_deg: 270.0,
                weather_code: 3,
                is_day: true,
                observation_time: Utc::now(),
            })
        }

        async fn hourly(&self, _coordinates: Coordinates) -> Result<HourlySeries> {
            if !self.hourly_ok {
                return Err(anyhow!("bad gateway"));
            }
            Ok(HourlySeries::new(
                (0..7 * 24)
                    .map(|h| HourlySample {
                        timestamp: MAY_1 + h * HOUR_MS,
                        temperature_c: 10.0 + (h % 24) as f64 / 4.0,
                        precipitation_probability: Some(20.0),
                    })
                    .collect(),
            ))
        }
    }

    #[derive(Debug)]
    struct StubGeolocator(Option<Position>);

    #[async_trait]
    impl Geolocator for StubGeolocator {
        async fn locate(&self) -> Result<Position, LocationError> {
            self.0.clone().ok_or_else(|| LocationError::ServiceUnavailable("denied".into()))
        }
    }

    fn dashboard(weather: StubWeather, position: Option<Position>, reverse_ok: bool) -> Dashboard {
        Dashboard::new(
            Arc::new(StubGeocoder { reverse_ok }),
            Arc::new(weather),
            Box::new(StubGeolocator(position)),
            ViewportController::new(24 * HOUR_MS, 2 * HOUR_MS),
        )
        .with_clock(fixed_now)
    }

    fn healthy() -> StubWeather {
        StubWeather { current_ok: true, hourly_ok: true }
    }

    async fn load(db: &mut Dashboard) -> bool {
        let pending = db.start_load(Coordinates::new(54.48, 9.05), "Husum");
        db.complete(pending).await
    }

    async fn locate(db: &mut Dashboard) -> bool {
        let pending = db.start_locate();
        db.complete(pending).await
    }

    /// Holds every request until the test hands out permits.
    #[derive(Debug)]
    struct GatedWeather {
        gate: Arc<Semaphore>,
        inner: StubWeather,
    }

    #[async_trait]
    impl WeatherSource for GatedWeather {
        async fn current(&self, coordinates: Coordinates) -> Result<CurrentWeather> {
            let _permit = self.gate.acquire().await?;
            self.inner.current(coordinates).await
        }

        async fn hourly(&self, coordinates: Coordinates) -> Result<HourlySeries> {
            let _permit = self.gate.acquire().await?;
            self.inner.hourly(coordinates).await
        }
    }

    #[tokio::test]
    async fn loading_flag_stays_up_while_requests_are_pending() {
        let gate = Arc::new(Semaphore::new(0));
        let mut db = Dashboard::new(
            Arc::new(StubGeocoder { reverse_ok: true }),
            Arc::new(GatedWeather { gate: Arc::clone(&gate), inner: healthy() }),
            Box::new(StubGeolocator(None)),
            ViewportController::new(24 * HOUR_MS, 2 * HOUR_MS),
        )
        .with_clock(fixed_now);

        let pending = db.start_load(Coordinates::new(54.48, 9.05), "Husum");
        let task = tokio::spawn(pending.run());
        tokio::task::yield_now().await;

        assert!(db.is_loading());
        assert!(!task.is_finished());
        assert!(db.location().is_none());

        gate.add_permits(2);
        let outcome = task.await.expect("load task");

        assert!(db.apply(outcome));
        assert!(!db.is_loading());
        assert_eq!(db.location().map(|l| l.name.as_str()), Some("Husum"));
    }

    #[tokio::test]
    async fn superseded_load_is_dropped() {
        let mut db = dashboard(healthy(), None, true);

        let first = db.start_load(Coordinates::new(54.48, 9.05), "Husum");
        let second = db.start_load(Coordinates::new(54.91, 8.31), "Sylt");

        let stale = first.run().await;
        assert!(!db.apply(stale));
        assert!(db.is_loading());
        assert!(db.location().is_none());

        let latest = second.run().await;
        assert!(db.apply(latest));
        assert!(!db.is_loading());
        assert_eq!(db.location().map(|l| l.name.as_str()), Some("Sylt"));
    }

    #[test]
    fn out_of_range_selection_starts_nothing() {
        let mut db = dashboard(healthy(), None, true);

        assert!(db.start_select(0).is_none());
        assert!(!db.is_loading());
    }

    #[tokio::test]
    async fn load_initialises_viewport_from_now() {
        let mut db = dashboard(healthy(), None, true);

        assert!(load(&mut db).await);

        assert!(!db.is_loading());
        assert_eq!(db.location().map(|l| l.name.as_str()), Some("Husum"));
        assert_eq!(db.viewport(), Some(Viewport { min: fixed_now(), max: fixed_now() + 24 * HOUR_MS }));
        assert!(db.current().is_some());

        let frame = db.frame().expect("frame after load");
        assert_eq!(frame.samples.len(), 25);
        assert_eq!(frame.bands.len(), 1);
    }

    #[tokio::test]
    async fn failed_hourly_request_only_stops_loading() {
        let mut db = dashboard(StubWeather { current_ok: true, hourly_ok: false }, None, true);

        assert!(!load(&mut db).await);

        assert!(!db.is_loading());
        assert!(db.current().is_some());
        assert!(db.series().is_empty());
        assert_eq!(db.viewport(), None);
        assert_eq!(db.scroll(2 * HOUR_MS), None);
    }

    #[tokio::test]
    async fn failed_current_request_keeps_chart() {
        let mut db = dashboard(StubWeather { current_ok: false, hourly_ok: true }, None, true);

        assert!(!load(&mut db).await);
        assert!(db.current().is_none());
        assert!(db.viewport().is_some());
    }

    #[tokio::test]
    async fn locate_uses_reverse_geocoded_name() {
        let position = Position { coordinates: Coordinates::new(54.48, 9.05), name: None };
        let mut db = dashboard(healthy(), Some(position), true);

        assert!(locate(&mut db).await);
        assert_eq!(db.location().map(|l| l.name.as_str()), Some("Husum"));
    }

    #[tokio::test]
    async fn locate_falls_back_to_coordinates_when_reverse_fails() {
        let position = Position { coordinates: Coordinates::new(54.48, 9.05), name: None };
        let mut db = dashboard(healthy(), Some(position), false);

        assert!(locate(&mut db).await);
        assert_eq!(db.location().map(|l| l.name.as_str()), Some("54.4800, 9.0500"));
    }

    #[tokio::test]
    async fn denied_geolocation_leaves_dashboard_empty() {
        let mut db = dashboard(healthy(), None, true);

        assert!(!locate(&mut db).await);
        assert!(!db.is_loading());
        assert!(db.location().is_none());
        assert_eq!(db.viewport(), None);
    }

    #[tokio::test]
    async fn selecting_suggestion_clears_search_and_loads() {
        let mut db = dashboard(healthy(), None, true);
        let candidates = db.geocoder().search("Husum").await.expect("stub search");
        "Husum".chars().for_each(|c| db.search_box_mut().push_char(c));
        db.search_box_mut().set_suggestions(candidates);

        let pending = db.start_select(0).expect("suggestion in range");
        assert!(db.complete(pending).await);

        assert!(db.search_box().suggestions().is_empty());
        assert_eq!(db.search_box().text(), "");
        assert_eq!(db.location().map(|l| l.name.as_str()), Some("Husum"));
        assert!(db.viewport().is_some());
    }

    #[tokio::test]
    async fn wheel_is_ignored_when_pointer_is_elsewhere() {
        let mut db = dashboard(healthy(), None, true);
        load(&mut db).await;
        let before = db.viewport();

        db.set_pointer_over_chart(false);
        assert_eq!(db.scroll_wheel(50.0), before);

        db.set_pointer_over_chart(true);
        let after = db.scroll_wheel(50.0).expect("window");
        assert_eq!(after.min, fixed_now() + 2 * HOUR_MS);
    }

    #[tokio::test]
    async fn keys_are_clamped_to_the_data() {
        let mut db = dashboard(healthy(), None, true);
        load(&mut db).await;

        let end = db.series().last_timestamp().expect("data");
        assert_eq!(db.scroll_key(ScrollKey::End).map(|w| w.max), Some(end));
        assert_eq!(db.scroll_key(ScrollKey::Start).map(|w| w.min), Some(fixed_now()));
    }
}
