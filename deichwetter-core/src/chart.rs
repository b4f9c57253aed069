//! Chart model: what the renderer needs to draw one frame.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    model::{DAY_MS, HourlySample, HourlySeries, TimestampMs},
    viewport::Viewport,
};

const SAMPLES_PER_DAY: usize = 24;

/// Shaded background span marking a whole UTC day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayBand {
    pub start: TimestampMs,
    pub end: TimestampMs,
}

impl DayBand {
    pub fn overlaps(&self, viewport: &Viewport) -> bool {
        self.start < viewport.max && self.end > viewport.min
    }
}

/// Every other day (the 2nd, 4th, ...) gets a band from UTC midnight to the next.
///
/// Days are counted in blocks of 24 samples, so the series is expected to be
/// hourly.
pub fn alternating_day_bands(timestamps: &[TimestampMs]) -> Vec<DayBand> {
    timestamps
        .iter()
        .step_by(SAMPLES_PER_DAY)
        .enumerate()
        .filter(|(day, _)| day % 2 == 1)
        .filter_map(|(_, &ts)| {
            let start = utc_midnight(ts)?;
            Some(DayBand { start, end: start + DAY_MS })
        })
        .collect()
}

fn utc_midnight(ts: TimestampMs) -> Option<TimestampMs> {
    let date = DateTime::<Utc>::from_timestamp_millis(ts)?.date_naive();
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
}

/// Everything visible in one viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartFrame {
    pub viewport: Viewport,
    pub samples: Vec<HourlySample>,
    pub bands: Vec<DayBand>,
    /// Min/max temperature over the visible samples.
    pub temperature_range: Option<(f64, f64)>,
}

impl ChartFrame {
    pub fn build(series: &HourlySeries, bands: &[DayBand], viewport: Viewport) -> Self {
        let samples: Vec<HourlySample> = series
            .samples()
            .iter()
            .filter(|s| viewport.contains(s.timestamp))
            .copied()
            .collect();

        let temperature_range = samples.iter().map(|s| s.temperature_c).fold(None, |acc, t| {
            Some(match acc {
                None => (t, t),
                Some((lo, hi)) => (f64::min(lo, t), f64::max(hi, t)),
            })
        });

        Self {
            viewport,
            samples,
            bands: bands.iter().filter(|b| b.overlaps(&viewport)).copied().collect(),
            temperature_range,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
