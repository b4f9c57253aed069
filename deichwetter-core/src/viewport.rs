//! Sliding time window over the hourly series.
//!
//! The window is advanced by discrete user input (wheel ticks, arrow keys,
//! paging) and always stays inside `[effective_start, data_end]`, where the
//! effective start is the later of the first sample and "now": the chart
//! never scrolls into the past.

use serde::{Deserialize, Serialize};

use crate::model::TimestampMs;

/// Visible `[min, max]` range of the chart, epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub min: TimestampMs,
    pub max: TimestampMs,
}

impl Viewport {
    pub fn width(&self) -> TimestampMs {
        self.max - self.min
    }

    pub fn contains(&self, ts: TimestampMs) -> bool {
        (self.min..=self.max).contains(&ts)
    }
}

/// Discrete navigation requests coming from the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollKey {
    StepBack,
    StepForward,
    PageBack,
    PageForward,
    Start,
    End,
}

#[derive(Debug, Clone)]
pub struct ViewportController {
    visible_range: TimestampMs,
    scroll_step: TimestampMs,
    first: Option<TimestampMs>,
    last: Option<TimestampMs>,
    window: Option<Viewport>,
}

impl ViewportController {
    pub fn new(visible_range: TimestampMs, scroll_step: TimestampMs) -> Self {
        Self {
            visible_range: visible_range.max(1),
            scroll_step: scroll_step.max(1),
            first: None,
            last: None,
            window: None,
        }
    }

    pub fn window(&self) -> Option<Viewport> {
        self.window
    }

    /// Take the bounds of freshly loaded data and place the window at
    /// `[max(now, first), +visible_range]`.
    ///
    /// `timestamps` must be sorted ascending. An empty slice clears the window.
    pub fn load(&mut self, timestamps: &[TimestampMs], now: TimestampMs) -> Option<Viewport> {
        let (Some(&first), Some(&last)) = (timestamps.first(), timestamps.last()) else {
            self.first = None;
            self.last = None;
            self.window = None;
            return None;
        };

        self.first = Some(first);
        self.last = Some(last);

        let min = now.max(first);
        self.window = Some(self.clamp(min, min + self.visible_range, now));
        self.window
    }

    /// Shift both bounds by `delta` and clamp to the data.
    ///
    /// Without loaded data this does nothing.
    pub fn scroll(&mut self, delta: TimestampMs, now: TimestampMs) -> Option<Viewport> {
        let current = self.window?;
        let moved = self.clamp(
            current.min.saturating_add(delta),
            current.max.saturating_add(delta),
            now,
        );

        if moved != current {
            tracing::trace!(delta, min = moved.min, max = moved.max, "viewport moved");
        }

        self.window = Some(moved);
        self.window
    }

    /// Wheel input: the sign picks the direction; fast flicks move further
    /// than slow ticks.
    pub fn scroll_wheel(&mut self, delta_y: f64, now: TimestampMs) -> Option<Viewport> {
        let delta = self.wheel_delta(delta_y);
        if delta == 0 {
            return self.window;
        }
        self.scroll(delta, now)
    }

    pub fn scroll_key(&mut self, key: ScrollKey, now: TimestampMs) -> Option<Viewport> {
        match key {
            ScrollKey::StepBack => self.scroll(-self.scroll_step, now),
            ScrollKey::StepForward => self.scroll(self.scroll_step, now),
            ScrollKey::PageBack => self.scroll(-self.visible_range, now),
            ScrollKey::PageForward => self.scroll(self.visible_range, now),
            // Moving by more than the whole data span pins the window to an edge.
            ScrollKey::Start => self.scroll(TimestampMs::MIN / 2, now),
            ScrollKey::End => self.scroll(TimestampMs::MAX / 2, now),
        }
    }

    /// Map a wheel delta to a signed time offset.
    ///
    /// |delta| > 100 moves 1.5 steps, |delta| < 10 half a step, anything else one step.
    pub fn wheel_delta(&self, delta_y: f64) -> TimestampMs {
        if delta_y == 0.0 || !delta_y.is_finite() {
            return 0;
        }

        let magnitude = delta_y.abs();
        let multiplier = if magnitude > 100.0 {
            1.5
        } else if magnitude < 10.0 {
            0.5
        } else {
            1.0
        };

        let offset = (self.scroll_step as f64 * multiplier).round() as TimestampMs;
        if delta_y < 0.0 { -offset } else { offset }
    }

    /// Later of first sample and `now`, but never past the last sample.
    fn effective_start(&self, now: TimestampMs) -> Option<TimestampMs> {
        let (first, last) = (self.first?, self.last?);
        Some(first.max(now).min(last))
    }

    fn clamp(&self, min: TimestampMs, max: TimestampMs, now: TimestampMs) -> Viewport {
        let (Some(start), Some(end)) = (self.effective_start(now), self.last) else {
            return Viewport { min, max };
        };

        // Not enough data left for a full window: show what there is.
        if end - start <= self.visible_range {
            return Viewport { min: start, max: end };
        }

        let mut window = Viewport { min, max };
        if window.min < start {
            window.min = start;
            window.max = start + self.visible_range;
        }
        if window.max > end {
            window.max = end;
            window.min = end - self.visible_range;
        }
        window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HOUR_MS;

    const RANGE: TimestampMs = 24 * HOUR_MS;
    const STEP: TimestampMs = 2 * HOUR_MS;

    /// One sample per hour for `hours` hours starting at `start`.
    fn hourly(start: TimestampMs, hours: i64) -> Vec<TimestampMs> {
        (0..hours).map(|h| start + h * HOUR_MS).collect()
    }

    fn loaded(times: &[TimestampMs], now: TimestampMs) -> ViewportController {
        let mut vc = ViewportController::new(RANGE, STEP);
        vc.load(times, now);
        vc
    }

    fn assert_in_bounds(vc: &ViewportController, times: &[TimestampMs], now: TimestampMs) {
        let w = vc.window().expect("window after load");
        let start = times[0].max(now);
        let end = *times.last().expect("non-empty");
        assert!(w.min >= start, "{w:?} starts before {start}");
        assert!(w.max <= end, "{w:?} ends after {end}");
    }

    #[test]
    fn load_starts_at_now_when_data_begins_earlier() {
        let times = hourly(0, 7 * 24);
        let now = 30 * HOUR_MS + 17;
        let vc = loaded(&times, now);

        assert_eq!(vc.window(), Some(Viewport { min: now, max: now + RANGE }));
    }

    #[test]
    fn load_starts_at_first_sample_when_data_is_in_the_future() {
        let times = hourly(10 * HOUR_MS, 7 * 24);
        let vc = loaded(&times, 0);

        assert_eq!(vc.window(), Some(Viewport { min: 10 * HOUR_MS, max: 10 * HOUR_MS + RANGE }));
    }

    #[test]
    fn load_with_empty_data_has_no_window() {
        let mut vc = ViewportController::new(RANGE, STEP);
        assert_eq!(vc.load(&[], 0), None);
        assert_eq!(vc.scroll(STEP, 0), None);
        assert_eq!(vc.scroll_key(ScrollKey::End, 0), None);
    }

    #[test]
    fn reload_with_empty_data_clears_previous_window() {
        let mut vc = loaded(&hourly(0, 48), 0);
        assert!(vc.window().is_some());

        vc.load(&[], 0);
        assert_eq!(vc.window(), None);
    }

    #[test]
    fn scroll_shifts_both_bounds() {
        let times = hourly(0, 7 * 24);
        let mut vc = loaded(&times, 0);

        let w = vc.scroll(STEP, 0).expect("window");
        assert_eq!(w, Viewport { min: STEP, max: STEP + RANGE });

        let w = vc.scroll(-STEP / 2, 0).expect("window");
        assert_eq!(w, Viewport { min: HOUR_MS, max: HOUR_MS + RANGE });
    }

    #[test]
    fn scroll_back_past_start_reanchors_at_start() {
        let times = hourly(0, 7 * 24);
        let now = 5 * HOUR_MS;
        let mut vc = loaded(&times, now);

        let w = vc.scroll(-10 * STEP, now).expect("window");
        assert_eq!(w, Viewport { min: now, max: now + RANGE });
    }

    #[test]
    fn scroll_forward_past_end_reanchors_at_end() {
        let times = hourly(0, 3 * 24);
        let end = *times.last().expect("non-empty");
        let mut vc = loaded(&times, 0);

        let w = vc.scroll(100 * STEP, 0).expect("window");
        assert_eq!(w, Viewport { min: end - RANGE, max: end });
    }

    #[test]
    fn start_bound_follows_the_clock() {
        let times = hourly(0, 7 * 24);
        let mut vc = loaded(&times, 0);

        // An hour later the window may no longer begin at the first sample.
        let later = HOUR_MS;
        let w = vc.scroll(-STEP, later).expect("window");
        assert_eq!(w.min, later);
        assert_eq!(w.width(), RANGE);
    }

    #[test]
    fn short_data_shows_everything_that_is_left() {
        let times = hourly(0, 10);
        let now = 2 * HOUR_MS;
        let mut vc = loaded(&times, now);

        let w = vc.window().expect("window");
        assert_eq!(w, Viewport { min: now, max: 9 * HOUR_MS });

        let w = vc.scroll(STEP, now).expect("window");
        assert_eq!(w, Viewport { min: now, max: 9 * HOUR_MS });
        assert_in_bounds(&vc, &times, now);
    }

    #[test]
    fn stale_data_collapses_onto_last_sample() {
        let times = hourly(0, 48);
        let now = 100 * HOUR_MS;
        let vc = loaded(&times, now);

        assert_eq!(vc.window(), Some(Viewport { min: 47 * HOUR_MS, max: 47 * HOUR_MS }));
    }

    #[test]
    fn width_and_bounds_hold_across_arbitrary_scrolling() {
        let times = hourly(0, 7 * 24);
        let now = 13 * HOUR_MS + 1234;
        let mut vc = loaded(&times, now);

        let deltas = [STEP, -3 * STEP, 50 * STEP, -STEP, -200 * STEP, RANGE, RANGE / 3, -7, 13];
        for delta in deltas.iter().cycle().take(200) {
            vc.scroll(*delta, now);
            let w = vc.window().expect("window");
            assert_eq!(w.width(), RANGE, "width changed after delta {delta}");
            assert_in_bounds(&vc, &times, now);
        }
    }

    #[test]
    fn keys_step_page_and_jump() {
        let times = hourly(0, 7 * 24);
        let end = *times.last().expect("non-empty");
        let mut vc = loaded(&times, 0);

        assert_eq!(vc.scroll_key(ScrollKey::StepForward, 0).map(|w| w.min), Some(STEP));
        assert_eq!(vc.scroll_key(ScrollKey::PageForward, 0).map(|w| w.min), Some(STEP + RANGE));
        assert_eq!(vc.scroll_key(ScrollKey::PageBack, 0).map(|w| w.min), Some(STEP));
        assert_eq!(vc.scroll_key(ScrollKey::StepBack, 0).map(|w| w.min), Some(0));
        assert_eq!(vc.scroll_key(ScrollKey::End, 0), Some(Viewport { min: end - RANGE, max: end }));
        assert_eq!(vc.scroll_key(ScrollKey::Start, 0), Some(Viewport { min: 0, max: RANGE }));
    }

    #[test]
    fn wheel_delta_scales_with_speed() {
        let vc = ViewportController::new(RANGE, STEP);

        assert_eq!(vc.wheel_delta(50.0), STEP);
        assert_eq!(vc.wheel_delta(-50.0), -STEP);
        assert_eq!(vc.wheel_delta(150.0), 3 * HOUR_MS);
        assert_eq!(vc.wheel_delta(-150.0), -3 * HOUR_MS);
        assert_eq!(vc.wheel_delta(3.0), HOUR_MS);
        assert_eq!(vc.wheel_delta(-3.0), -HOUR_MS);
        assert_eq!(vc.wheel_delta(0.0), 0);
        assert_eq!(vc.wheel_delta(f64::NAN), 0);
    }

    #[test]
    fn wheel_scroll_moves_window() {
        let times = hourly(0, 7 * 24);
        let mut vc = loaded(&times, 0);

        let w = vc.scroll_wheel(120.0, 0).expect("window");
        assert_eq!(w.min, 3 * HOUR_MS);

        let w = vc.scroll_wheel(0.0, 0).expect("window");
        assert_eq!(w.min, 3 * HOUR_MS);
    }
}
