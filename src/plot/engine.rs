//! Waveform plotting engine.
//!
//! Builds a [`Figure`] from a [`Stream`]: one axes per trace id, stacked
//! vertically, sharing the requested time window on the x axis.

use tracing::debug;

use super::figure::{Axes, Color, Figure, FigureRegistry, HAlign, SubplotParams, Text, VAlign};
use crate::error::{Result, SeisplotError};
use crate::fdsn::{Stream, Trace};
use crate::time_range::TimeRange;

/// Space reserved above the axes for the title, in figure pixels
const TITLE_MARGIN_PX: f64 = 40.0;

/// Space reserved below the axes for time labels, in figure pixels
const BOTTOM_MARGIN_PX: f64 = 30.0;

const LEFT_MARGIN_PX: f64 = 80.0;
const RIGHT_MARGIN_PX: f64 = 20.0;

/// Largest share of the figure any one margin may take
const MAX_MARGIN_SHARE: f64 = 0.25;

/// Smallest magnitude factored out of the y tick labels
const POWER_LIMIT: i32 = 3;

/// Traces longer than this many samples per pixel column are decimated
const DECIMATION_FACTOR: usize = 4;

const TITLE_SIZE: f64 = 10.0;

/// Appearance of a waveform figure
#[derive(Debug, Clone, PartialEq)]
pub struct PlotStyle {
    pub width_px: u32,
    pub height_px: u32,
    pub dpi: f64,
    /// Trace line width in points
    pub line_width: f64,
    pub color: Color,
    pub transparent: bool,
    /// Tick label size in points
    pub label_size: f64,
}

/// Turns waveform data into a figure
pub trait PlotEngine: Send + Sync {
    fn plot(&self, stream: &Stream, time_range: &TimeRange, style: &PlotStyle) -> Result<Figure>;
}

/// The built-in engine
#[derive(Debug, Clone, Default)]
pub struct WaveformEngine {
    registry: FigureRegistry,
}

impl WaveformEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Figures created by this engine that have not been dropped yet
    pub fn open_figures(&self) -> usize {
        self.registry.open_count()
    }
}

impl PlotEngine for WaveformEngine {
    fn plot(&self, stream: &Stream, time_range: &TimeRange, style: &PlotStyle) -> Result<Figure> {
        if stream.is_empty() {
            return Err(SeisplotError::ImageGeneration {
                message: "No traces to plot".to_string(),
            });
        }

        let width = (style.width_px as f64).max(1.0);
        let height = (style.height_px as f64).max(1.0);
        // Small figures shrink their margins instead of losing the axes
        let margin = |px: f64, extent: f64| px.min(extent * MAX_MARGIN_SHARE) / extent;
        let subplot = SubplotParams::new(
            margin(LEFT_MARGIN_PX, width),
            margin(BOTTOM_MARGIN_PX, height),
            1.0 - margin(RIGHT_MARGIN_PX, width),
            1.0 - margin(TITLE_MARGIN_PX, height),
        );

        let mut figure = Figure::new(style.width_px, style.height_px, style.dpi, &self.registry);
        figure.transparent = style.transparent;
        figure.subplot = subplot;
        figure.texts.push(
            Text::new(
                time_range.to_string(),
                0.5,
                1.0 - 10.0 / height,
                TITLE_SIZE,
            )
            .aligned(HAlign::Center, VAlign::Top),
        );

        let duration = time_range.duration_secs();
        let xlim = if duration > 0.0 {
            (0.0, duration)
        } else {
            (0.0, 1.0)
        };
        let axes_width_px = ((subplot.right - subplot.left) * width) as usize;

        let groups = stream.grouped();
        let count = groups.len();
        for (index, (id, traces)) in groups.into_iter().enumerate() {
            let ylim = y_limits(&traces);
            let mut axes = Axes::new(xlim, ylim, style.label_size);

            for trace in &traces {
                let points = trace_points(trace, time_range, axes_width_px);
                if !points.is_empty() {
                    axes.plot(points, style.line_width, style.color);
                }
            }

            axes.texts.push(
                Text::new(id, 0.02, 0.95, style.label_size).aligned(HAlign::Left, VAlign::Top),
            );

            let exponent = offset_exponent(ylim.0, ylim.1);
            axes.yaxis.exponent = exponent;
            axes.yaxis.offset_text.content = offset_label(exponent);
            axes.time_origin = Some(time_range.start);
            axes.xaxis.tick_labels_visible = index + 1 == count;

            figure.axes.push(axes);
        }

        debug!(
            axes = count,
            width = style.width_px,
            height = style.height_px,
            open_figures = self.registry.open_count(),
            "Figure created"
        );
        Ok(figure)
    }
}

/// Power of ten factored out of y labels spanning `lo..hi`, or 0 below 10³
pub fn offset_exponent(lo: f64, hi: f64) -> i32 {
    let max_abs = lo.abs().max(hi.abs());
    if !(max_abs.is_finite() && max_abs > 0.0) {
        return 0;
    }
    let oom = max_abs.log10().floor() as i32;
    if oom >= POWER_LIMIT || oom <= -POWER_LIMIT {
        oom
    } else {
        0
    }
}

/// Offset text for `exponent`, e.g. `×10³`; empty for 0
pub fn offset_label(exponent: i32) -> String {
    if exponent == 0 {
        return String::new();
    }
    let digits: String = exponent
        .to_string()
        .chars()
        .map(|c| match c {
            '-' => '⁻',
            '0' => '⁰',
            '1' => '¹',
            '2' => '²',
            '3' => '³',
            '4' => '⁴',
            '5' => '⁵',
            '6' => '⁶',
            '7' => '⁷',
            '8' => '⁸',
            '9' => '⁹',
            other => other,
        })
        .collect();
    format!("×10{}", digits)
}

/// Data extent over all traces, widened when flat or empty
fn y_limits(traces: &[&Trace]) -> (f64, f64) {
    let extent = traces
        .iter()
        .filter_map(|t| t.extent())
        .fold(None, |acc: Option<(f64, f64)>, (lo, hi)| match acc {
            None => Some((lo, hi)),
            Some((a, b)) => Some((a.min(lo), b.max(hi))),
        });
    match extent {
        Some((lo, hi)) if hi > lo => (lo, hi),
        Some((v, _)) => (v - 1.0, v + 1.0),
        None => (-1.0, 1.0),
    }
}

/// Trace samples as `(seconds from window start, value)`.
///
/// Traces with many samples per pixel column are reduced to each column's
/// minimum and maximum, in sample order.
fn trace_points(trace: &Trace, time_range: &TimeRange, columns: usize) -> Vec<(f64, f64)> {
    let offset = time_range.offset_of(trace.stats.starttime);
    let delta = trace.delta();
    let npts = trace.npts();
    let columns = columns.max(1);

    if npts <= columns * DECIMATION_FACTOR {
        return trace
            .data
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .map(|(i, &v)| (offset + i as f64 * delta, v))
            .collect();
    }

    let chunk = npts.div_ceil(columns);
    let mut points = Vec::with_capacity(2 * columns);
    for (c, samples) in trace.data.chunks(chunk).enumerate() {
        let x = offset + (c * chunk) as f64 * delta;
        let finite = samples.iter().enumerate().filter(|(_, v)| v.is_finite());
        let mut min: Option<(usize, f64)> = None;
        let mut max: Option<(usize, f64)> = None;
        for (i, &v) in finite {
            if min.map_or(true, |(_, m)| v < m) {
                min = Some((i, v));
            }
            if max.map_or(true, |(_, m)| v > m) {
                max = Some((i, v));
            }
        }
        if let (Some((imin, vmin)), Some((imax, vmax))) = (min, max) {
            if imin <= imax {
                points.push((x, vmin));
                points.push((x, vmax));
            } else {
                points.push((x, vmax));
                points.push((x, vmin));
            }
        }
    }
    points
}
