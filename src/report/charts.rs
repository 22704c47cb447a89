//! SVG chart rendering for the daily report document.
//!
//! Charts are rendered with the plotters SVG backend so the agent carries
//! no raster or font dependencies. A chart with no underlying data is
//! skipped entirely; the document notes the missing section instead of
//! embedding an empty image.

use crate::report::parse::UsageEntry;
use plotters::element::Pie;
use plotters::prelude::*;
use std::path::Path;

const BAR_COLOR: RGBColor = RGBColor(135, 206, 235);
const ACTIVE_COLOR: RGBColor = RGBColor(76, 175, 80);
const IDLE_COLOR: RGBColor = RGBColor(244, 67, 54);

/// Chart rendering errors.
#[derive(Debug, thiserror::Error)]
#[error("chart rendering failed: {0}")]
pub struct ChartError(String);

impl ChartError {
    fn from_draw<E: std::fmt::Display>(e: E) -> Self {
        Self(e.to_string())
    }
}

/// Active/idle percentages with one decimal, forced to sum to 100.0.
///
/// Both values derive from the same rounded integer so the chart labels
/// and the document text can never disagree by a rounding step. Returns
/// None when there is no activity data at all.
pub fn split_percentages(active_secs: u64, idle_secs: u64) -> Option<(f64, f64)> {
    let total = active_secs + idle_secs;
    if total == 0 {
        return None;
    }
    let active_tenths = ((active_secs as f64 / total as f64) * 1000.0).round() as u64;
    Some((
        active_tenths as f64 / 10.0,
        (1000 - active_tenths) as f64 / 10.0,
    ))
}

/// Shorten a label for chart readability, keeping head and tail.
pub fn shorten_label(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        return text.to_string();
    }
    let head: String = text.chars().take(20).collect();
    let tail: String = text
        .chars()
        .rev()
        .take(15)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("{head}...{tail}")
}

/// Render a horizontal ranking chart for usage entries.
///
/// Returns Ok(false) without touching the filesystem when `data` is empty.
pub fn render_usage_bars(
    data: &[UsageEntry],
    path: &Path,
    title: &str,
) -> Result<bool, ChartError> {
    if data.is_empty() {
        return Ok(false);
    }

    let rows = data.len() as f64;
    let height = (data.len() as u32 * 60).max(240) + 80;
    let root = SVGBackend::new(path, (900, height)).into_drawing_area();
    root.fill(&WHITE).map_err(ChartError::from_draw)?;

    let max_secs = data
        .iter()
        .map(|e| e.seconds)
        .fold(0.0_f64, f64::max)
        .max(1.0);

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(12)
        .x_label_area_size(36)
        .y_label_area_size(10)
        .build_cartesian_2d(0.0..max_secs * 1.08, 0.0..rows)
        .map_err(ChartError::from_draw)?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(0)
        .x_desc("Duration (seconds)")
        .draw()
        .map_err(ChartError::from_draw)?;

    for (i, entry) in data.iter().enumerate() {
        // Highest-ranked entry at the top.
        let y0 = rows - i as f64 - 0.85;
        let y1 = rows - i as f64 - 0.25;
        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(0.0, y0), (entry.seconds, y1)],
                BAR_COLOR.filled(),
            )))
            .map_err(ChartError::from_draw)?;
        chart
            .draw_series(std::iter::once(Text::new(
                shorten_label(&entry.label(), 60),
                (max_secs * 0.01, y1 + 0.12),
                ("sans-serif", 15),
            )))
            .map_err(ChartError::from_draw)?;
    }

    root.present().map_err(ChartError::from_draw)?;
    Ok(true)
}

/// Render the active-vs-idle donut chart.
///
/// Returns Ok(false) when there is no activity data.
pub fn render_activity_donut(
    path: &Path,
    active_secs: u64,
    idle_secs: u64,
) -> Result<bool, ChartError> {
    let Some((active_pct, idle_pct)) = split_percentages(active_secs, idle_secs) else {
        return Ok(false);
    };

    let root = SVGBackend::new(path, (440, 460)).into_drawing_area();
    root.fill(&WHITE).map_err(ChartError::from_draw)?;

    let center = (220, 200);
    let radius = 130.0;
    let sizes = [active_secs as f64, idle_secs as f64];
    let colors = [ACTIVE_COLOR, IDLE_COLOR];
    let labels = [
        format!("Active {active_pct:.1}%"),
        format!("Idle {idle_pct:.1}%"),
    ];

    let mut pie = Pie::new(&center, &radius, &sizes, &colors, &labels);
    pie.donut_hole(55.0);
    pie.start_angle(-50.0);
    pie.label_style(("sans-serif", 16).into_font());
    pie.label_offset(18.0);
    root.draw(&pie).map_err(ChartError::from_draw)?;

    root.draw(&Text::new(
        format!("{active_pct:.1}% Active on PC and {idle_pct:.1}% Idle"),
        (90, 430),
        ("sans-serif", 16).into_font().style(FontStyle::Bold),
    ))
    .map_err(ChartError::from_draw)?;

    root.present().map_err(ChartError::from_draw)?;
    Ok(true)
}
