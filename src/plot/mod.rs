//! Waveform plotting.
//!
//! - `engine`: builds a figure from a stream
//! - `figure`: resolution-independent figure model, drawn with plotters
//! - `backend`: plotters backend wrapper that tolerates missing fonts
//! - `render`: sizing, cleanup and PNG output
//! - `phases`: arrival marker colours

pub mod backend;
pub mod engine;
pub mod figure;
pub mod phases;
pub mod render;

pub use engine::{PlotEngine, PlotStyle, WaveformEngine};
pub use figure::{Axes, Figure, FigureRegistry, Text};
pub use phases::{default_phase_colors, parse_hex_color, PhaseColors};
pub use render::{
    ArrivalMarker, Cleanup, Plot, PlotRenderer, PlotSpec, DEFAULT_HEIGHT, DEFAULT_WIDTH,
    MIN_PLOT_HEIGHT, PLOT_DPI,
};
