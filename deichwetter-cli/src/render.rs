//! Widgets for current conditions and the hourly chart.

use chrono::{DateTime, Utc};
use deichwetter_core::{ChartFrame, CurrentWeather, SelectedLocation, TimestampMs, model::HOUR_MS};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Rect},
    style::{Modifier, Style, Stylize},
    symbols::Marker,
    text::Line,
    widgets::{Axis, Block, Chart, Dataset, GraphType, Paragraph, Widget},
};

mod colors {
    use ratatui::style::Color;

    pub const TEMPERATURE: Color = Color::Yellow;
    pub const PRECIPITATION: Color = Color::Blue;
    pub const BAND: Color = Color::DarkGray;
    pub const AXIS: Color = Color::Gray;
}

pub fn format_time(ts: TimestampMs, fmt: &str) -> String {
    DateTime::<Utc>::from_timestamp_millis(ts)
        .map(|t| t.format(fmt).to_string())
        .unwrap_or_else(|| "--".to_string())
}

pub fn render_current(location: Option<&SelectedLocation>, current: Option<&CurrentWeather>) -> Vec<String> {
    let mut lines = Vec::new();

    match location {
        Some(loc) => lines.push(format!("{}  ({})", loc.name, loc.coordinates)),
        None => lines.push("No location selected".to_string()),
    }

    if let Some(cw) = current {
        let condition = cw.condition();
        lines.push(format!(
            "{} {}  {:.1}°C",
            condition.icon(cw.is_day),
            condition.description(),
            cw.temperature_c
        ));
        lines.push(format!(
            "Wind {:.0} km/h {}  ·  observed {}",
            cw.wind_speed_kmh,
            cw.wind_compass(),
            cw.observation_time.format("%d %b %H:%M UTC")
        ));
    }

    lines
}

pub fn current_paragraph(location: Option<&SelectedLocation>, current: Option<&CurrentWeather>) -> Paragraph<'static> {
    let lines: Vec<Line> = render_current(location, current).into_iter().map(Line::from).collect();
    Paragraph::new(lines)
}

/// Plot points for one frame. x is epoch milliseconds, y is °C.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartData {
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
    pub temperature: Vec<(f64, f64)>,
    /// Precipitation probability laid over the temperature scale: 0 % at the
    /// bottom edge, 100 % at the top.
    pub precipitation: Vec<(f64, f64)>,
    /// Background dots filling the shaded day bands.
    pub bands: Vec<(f64, f64)>,
}

impl ChartData {
    /// `None` when no sample is in view. `columns` and `rows` set how densely
    /// the day bands are filled.
    pub fn build(frame: &ChartFrame, columns: u16, rows: u16) -> Option<Self> {
        let (lo, hi) = frame.temperature_range?;
        // Pad the scale so a flat line never sits on the frame.
        let (lo, hi) = if (hi - lo).abs() < f64::EPSILON { (lo - 1.0, hi + 1.0) } else { (lo, hi) };

        let viewport = frame.viewport;
        // A window collapsed onto the last sample still gets an hour of room.
        let (x_min, x_max) = if viewport.width() == 0 {
            (viewport.min - HOUR_MS / 2, viewport.max + HOUR_MS / 2)
        } else {
            (viewport.min, viewport.max)
        };

        let on_scale = |percent: f64| lo + percent.clamp(0.0, 100.0) / 100.0 * (hi - lo);

        let temperature = frame.samples.iter().map(|s| (s.timestamp as f64, s.temperature_c)).collect();
        let precipitation = frame
            .samples
            .iter()
            .map(|s| (s.timestamp as f64, on_scale(s.precipitation_probability.unwrap_or(0.0))))
            .collect();

        let columns = i64::from(columns.max(1));
        let rows = rows.max(1);
        let mut bands = Vec::new();
        for col in 0..=columns {
            let t = x_min + (x_max - x_min) * col / columns;
            if frame.bands.iter().any(|b| t >= b.start && t < b.end) {
                bands.extend((0..=rows).map(|row| (t as f64, lo + (hi - lo) * f64::from(row) / f64::from(rows))));
            }
        }

        Some(Self {
            x_bounds: [x_min as f64, x_max as f64],
            y_bounds: [lo, hi],
            temperature,
            precipitation,
            bands,
        })
    }
}

fn hourly_chart(data: &ChartData) -> Chart<'_> {
    let [x_min, x_max] = data.x_bounds;
    let [lo, hi] = data.y_bounds;

    let datasets = vec![
        Dataset::default()
            .marker(Marker::Dot)
            .graph_type(GraphType::Scatter)
            .style(Style::default().fg(colors::BAND))
            .data(&data.bands),
        Dataset::default()
            .name("rain %")
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(colors::PRECIPITATION))
            .data(&data.precipitation),
        Dataset::default()
            .name("°C")
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(colors::TEMPERATURE).add_modifier(Modifier::BOLD))
            .data(&data.temperature),
    ];

    let x_labels = vec![
        format_time(x_min as TimestampMs, "%d %b %H:%M"),
        format_time(((x_min + x_max) / 2.0) as TimestampMs, "%H:%M"),
        format_time(x_max as TimestampMs, "%d %b %H:%M"),
    ];
    let y_labels = vec![format!("{lo:.1}°C"), format!("{:.1}", (lo + hi) / 2.0), format!("{hi:.1}°C")];

    Chart::new(datasets)
        .x_axis(
            Axis::default()
                .style(Style::default().fg(colors::AXIS))
                .bounds([x_min, x_max])
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(colors::AXIS))
                .bounds([lo, hi])
                .labels(y_labels),
        )
        .hidden_legend_constraints((Constraint::Ratio(1, 2), Constraint::Ratio(1, 2)))
}

/// Temperature line over precipitation probability, alternate days shaded.
pub fn render_chart(frame: &ChartFrame, area: Rect, buf: &mut Buffer, block: Block<'_>) {
    let inner = block.inner(area);
    match ChartData::build(frame, inner.width, inner.height) {
        Some(data) => hourly_chart(&data).block(block).render(area, buf),
        None => Paragraph::new("No forecast data in view".italic()).block(block).render(area, buf),
    }
}

/// Plain text of a rendered buffer, one string per row, trailing blanks cut.
pub fn buffer_lines(buf: &Buffer) -> Vec<String> {
    let area = buf.area;
    (area.top()..area.bottom())
        .map(|y| {
            let row: String = (area.left()..area.right()).map(|x| buf[(x, y)].symbol()).collect();
            row.trim_end().to_string()
        })
        .collect()
}
