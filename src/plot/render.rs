//! Waveform plot rendering.
//!
//! The engine draws a generic waveform figure; [`Cleanup`] then strips it
//! down to the compact look used for embedding, and [`Plot`] serializes it.
//! Short plots are drawn enlarged by [`PlotSpec::scale`] and rasterized at a
//! proportionally lower dpi so the PNG still has the requested size.

use chrono::{DateTime, Utc};
use image::Rgba;
use std::sync::Arc;
use tracing::{debug, error};

use super::engine::{PlotEngine, PlotStyle};
use super::figure::{Color, Figure, SubplotParams};
use super::phases::PhaseColors;
use crate::error::{Result, SeisplotError};
use crate::fdsn::Stream;
use crate::logging::log_timed_operation;
use crate::time_range::TimeRange;

/// Plots shorter than this are drawn enlarged and scaled down on output
pub const MIN_PLOT_HEIGHT: u32 = 150;

pub const DEFAULT_WIDTH: u32 = 500;
pub const DEFAULT_HEIGHT: u32 = 200;

/// Resolution the figure is drawn at
pub const PLOT_DPI: f64 = 100.0;

/// Trace line width in points, before scaling
pub const LINE_WIDTH: f64 = 0.3;

/// Grey 0.2
pub const LINE_COLOR: Color = Rgba([51, 51, 51, 255]);

/// Arrival marker width in points, before scaling
pub const MARKER_WIDTH: f64 = 1.0;

/// Largest figure side, in pixels, after scaling
pub const MAX_FIGURE_PX: f64 = 16384.0;

const FRAME_LEFT_PX: f64 = 60.0;
const FRAME_BOTTOM_PX: f64 = 24.0;
const FRAME_EDGE: f64 = 0.99;

const SMALL_LABEL_SIZE: f64 = 8.33;
const MEDIUM_LABEL_SIZE: f64 = 10.0;

const Y_LABEL: &str = "Counts";

/// A vertical marker for a phase arrival
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrivalMarker {
    pub phase: String,
    pub time: DateTime<Utc>,
}

impl ArrivalMarker {
    pub fn new(phase: impl Into<String>, time: DateTime<Utc>) -> Self {
        Self {
            phase: phase.into(),
            time,
        }
    }
}

/// Requested output geometry and decorations
#[derive(Debug, Clone, PartialEq)]
pub struct PlotSpec {
    pub width: u32,
    pub height: u32,
    pub frame: bool,
    pub scale: f64,
    pub arrivals: Vec<ArrivalMarker>,
}

impl PlotSpec {
    pub fn new(width: u32, height: u32, frame: bool) -> Result<Self> {
        for (param, value) in [("width", width), ("height", height)] {
            if value == 0 {
                return Err(SeisplotError::InvalidParameter {
                    param: param.to_string(),
                    message: "Must be greater than zero".to_string(),
                });
            }
        }

        let scale = Self::scale_for_height(height);
        if width as f64 * scale > MAX_FIGURE_PX || height as f64 * scale > MAX_FIGURE_PX {
            return Err(SeisplotError::InvalidParameter {
                param: "width".to_string(),
                message: format!(
                    "Plot of {}x{} is too large to render",
                    width, height
                ),
            });
        }

        Ok(Self {
            width,
            height,
            frame,
            scale,
            arrivals: Vec::new(),
        })
    }

    pub fn with_arrivals(mut self, arrivals: Vec<ArrivalMarker>) -> Self {
        self.arrivals = arrivals;
        self
    }

    pub fn scale_for_height(height: u32) -> f64 {
        if height < MIN_PLOT_HEIGHT {
            MIN_PLOT_HEIGHT as f64 / height.max(1) as f64
        } else {
            1.0
        }
    }

    /// Engine settings for this plot, in the scaled geometry
    pub fn style(&self) -> PlotStyle {
        PlotStyle {
            width_px: (self.width as f64 * self.scale).round() as u32,
            height_px: (self.height as f64 * self.scale).round() as u32,
            dpi: PLOT_DPI,
            line_width: LINE_WIDTH * self.scale,
            color: LINE_COLOR,
            transparent: true,
            label_size: if self.scale == 1.0 {
                SMALL_LABEL_SIZE
            } else {
                MEDIUM_LABEL_SIZE
            },
        }
    }

    /// Rasterization dpi that brings the scaled figure back to `width × height`
    pub fn output_dpi(&self) -> f64 {
        PLOT_DPI / self.scale
    }
}

impl Default for PlotSpec {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            frame: false,
            scale: 1.0,
            arrivals: Vec::new(),
        }
    }
}

/// Post-processing applied to every engine figure
#[derive(Debug, Clone, PartialEq)]
pub struct Cleanup {
    pub frame: bool,
    pub subplot: SubplotParams,
    /// `(seconds from window start, colour)` per drawable arrival
    pub markers: Vec<(f64, Color)>,
    pub marker_width: f64,
}

impl Cleanup {
    /// Work out the cleanup for `spec`.
    ///
    /// Arrivals with a phase missing from `colors` are logged and dropped.
    pub fn for_spec(spec: &PlotSpec, colors: &PhaseColors, time_range: &TimeRange) -> Self {
        let subplot = if spec.frame {
            SubplotParams::new(
                FRAME_LEFT_PX / (spec.width as f64 * spec.scale),
                FRAME_BOTTOM_PX / (spec.height as f64 * spec.scale),
                FRAME_EDGE,
                FRAME_EDGE,
            )
        } else {
            SubplotParams::new(0.0, 0.0, 1.0, 1.0)
        };

        let markers = spec
            .arrivals
            .iter()
            .filter_map(|arrival| match colors.color_for(&arrival.phase) {
                Ok(color) => Some((time_range.offset_of(arrival.time), color)),
                Err(e) => {
                    error!(
                        phase = %arrival.phase,
                        time = %arrival.time,
                        error = %e,
                        "Couldn't add arrival"
                    );
                    None
                }
            })
            .collect();

        Self {
            frame: spec.frame,
            subplot,
            markers,
            marker_width: MARKER_WIDTH * spec.scale,
        }
    }

    pub fn apply(&self, mut figure: Figure) -> Figure {
        for text in figure.texts_mut() {
            text.set_visible(false);
        }

        let SubplotParams {
            left,
            bottom,
            right,
            top,
        } = self.subplot;
        figure.subplots_adjust(left, bottom, right, top);

        for axes in figure.axes_mut() {
            for text in axes.texts_mut() {
                text.set_visible(false);
            }
            if !self.frame {
                axes.set_axis_off();
                axes.set_frame_on(false);
                continue;
            }

            let offset = axes.yaxis.get_offset_text().get_text().to_string();
            let label = if offset.is_empty() {
                Y_LABEL.to_string()
            } else {
                axes.yaxis.get_offset_text_mut().set_visible(false);
                format!("{} ({})", Y_LABEL, offset)
            };
            axes.set_ylabel(label);
        }

        if let Some(first) = figure.axes_mut().first_mut() {
            for &(x, color) in &self.markers {
                first.axvline(x, self.marker_width, color);
            }
        }
        figure
    }
}

/// A rendered figure awaiting serialization
#[derive(Debug)]
pub struct Plot {
    figure: Figure,
    spec: PlotSpec,
}

impl Plot {
    pub fn figure(&self) -> &Figure {
        &self.figure
    }

    /// PNG bytes; the figure stays alive for further use
    pub fn to_png(&self) -> Result<Vec<u8>> {
        self.figure.savefig(self.spec.output_dpi())
    }

    /// PNG bytes; the figure is released whether or not encoding succeeds
    pub fn into_png(self) -> Result<Vec<u8>> {
        self.to_png()
    }
}

/// Renders streams to PNG with the configured engine and phase colours
#[derive(Clone)]
pub struct PlotRenderer {
    engine: Arc<dyn PlotEngine>,
    phase_colors: Arc<PhaseColors>,
}

impl PlotRenderer {
    pub fn new(engine: Arc<dyn PlotEngine>, phase_colors: Arc<PhaseColors>) -> Self {
        Self {
            engine,
            phase_colors,
        }
    }

    /// Draw and clean up a figure without serializing it
    pub fn plot(&self, stream: &Stream, time_range: &TimeRange, spec: PlotSpec) -> Result<Plot> {
        let style = spec.style();
        debug!(
            scale = spec.scale,
            width = style.width_px,
            height = style.height_px,
            line_width = style.line_width,
            "Plotting"
        );

        let figure = self.engine.plot(stream, time_range, &style)?;
        let cleanup = Cleanup::for_spec(&spec, &self.phase_colors, time_range);
        Ok(Plot {
            figure: cleanup.apply(figure),
            spec,
        })
    }

    pub fn render(&self, stream: &Stream, time_range: &TimeRange, spec: PlotSpec) -> Result<Vec<u8>> {
        log_timed_operation("render", || self.plot(stream, time_range, spec)?.into_png())
    }
}
