//! Figure model and rasterization.
//!
//! A [`Figure`] is resolution independent: geometry is kept as fractions of
//! the figure, line widths and font sizes in points. Pixels only appear when
//! the figure is drawn with plotters at a chosen dpi.

use chrono::{DateTime, Duration, Utc};
use image::{Rgba, RgbaImage};
use plotters::coord::Shift;
use plotters::prelude::{
    BitMapBackend, ChartBuilder, DrawingArea, FontTransform, IntoDrawingArea, IntoFont,
    LabelAreaPosition, LineSeries, RGBAColor, Rectangle, ShapeStyle, Text as TextElement, WHITE,
};
use plotters_backend::text_anchor::{HPos, Pos, VPos};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::backend::TextSafeBackend;
use crate::error::{Result, SeisplotError};

/// Points per inch
const POINTS_PER_INCH: f64 = 72.0;

/// Spine and tick line width, in points
const SPINE_WIDTH: f64 = 0.8;

/// Tick mark length, in points
const TICK_LENGTH: f64 = 3.5;

/// Gap between the axes and their offset text, in points
const LABEL_PAD: f64 = 2.0;

/// Room for y tick labels and the y label left of the axes, in points
const Y_LABEL_AREA: f64 = 45.0;

/// Room for x tick labels below the axes, in points
const X_LABEL_AREA: f64 = 16.0;

const X_TICKS: usize = 6;
const Y_TICKS: usize = 4;

const FONT_FAMILY: &str = "sans-serif";

/// Opaque white; keyed out when the figure is transparent
const BACKGROUND: [u8; 3] = [255, 255, 255];

pub type Color = Rgba<u8>;

const BLACK: Color = Rgba([0, 0, 0, 255]);

type Area<'a> = DrawingArea<TextSafeBackend<BitMapBackend<'a>>, Shift>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VAlign {
    Top,
    Center,
    Bottom,
}

/// A piece of text positioned in fractions of its container (y up)
#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub content: String,
    pub x: f64,
    pub y: f64,
    /// Font size in points
    pub size: f64,
    pub halign: HAlign,
    pub valign: VAlign,
    pub vertical: bool,
    pub color: Color,
    pub visible: bool,
}

impl Text {
    pub fn new(content: impl Into<String>, x: f64, y: f64, size: f64) -> Self {
        Self {
            content: content.into(),
            x,
            y,
            size,
            halign: HAlign::Left,
            valign: VAlign::Bottom,
            vertical: false,
            color: BLACK,
            visible: true,
        }
    }

    pub fn aligned(mut self, halign: HAlign, valign: VAlign) -> Self {
        self.halign = halign;
        self.valign = valign;
        self
    }

    pub fn get_text(&self) -> &str {
        &self.content
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }
}

/// Region of the figure shared by the axes, in figure fractions (y up)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubplotParams {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

impl SubplotParams {
    pub fn new(left: f64, bottom: f64, right: f64, top: f64) -> Self {
        Self {
            left,
            bottom,
            right,
            top,
        }
    }
}

impl Default for SubplotParams {
    fn default() -> Self {
        Self::new(0.125, 0.11, 0.9, 0.88)
    }
}

/// Polyline in data coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct Line2D {
    pub points: Vec<(f64, f64)>,
    /// Width in points
    pub width: f64,
    pub color: Color,
}

/// Full-height vertical line at a data x position
#[derive(Debug, Clone, PartialEq)]
pub struct VLine {
    pub x: f64,
    /// Width in points
    pub width: f64,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    pub tick_labels_visible: bool,
    /// Power of ten factored out of the tick labels
    pub exponent: i32,
    /// Shows the factored-out magnitude, e.g. `×10³`
    pub offset_text: Text,
    pub label: Option<Text>,
}

impl Axis {
    pub fn new(label_size: f64) -> Self {
        Self {
            tick_labels_visible: true,
            exponent: 0,
            offset_text: Text::new("", 0.0, 1.0, label_size),
            label: None,
        }
    }

    pub fn get_offset_text(&self) -> &Text {
        &self.offset_text
    }

    pub fn get_offset_text_mut(&mut self) -> &mut Text {
        &mut self.offset_text
    }
}

/// One panel of the figure
#[derive(Debug, Clone, PartialEq)]
pub struct Axes {
    pub xlim: (f64, f64),
    pub ylim: (f64, f64),
    /// When set, x values are seconds after this instant and labelled as clock times
    pub time_origin: Option<DateTime<Utc>>,
    pub lines: Vec<Line2D>,
    pub vlines: Vec<VLine>,
    /// Annotations positioned in axes fractions
    pub texts: Vec<Text>,
    pub xaxis: Axis,
    pub yaxis: Axis,
    pub axis_on: bool,
    pub frame_on: bool,
    /// Tick label size in points
    pub label_size: f64,
}

impl Axes {
    pub fn new(xlim: (f64, f64), ylim: (f64, f64), label_size: f64) -> Self {
        Self {
            xlim,
            ylim,
            time_origin: None,
            lines: Vec::new(),
            vlines: Vec::new(),
            texts: Vec::new(),
            xaxis: Axis::new(label_size),
            yaxis: Axis::new(label_size),
            axis_on: true,
            frame_on: true,
            label_size,
        }
    }

    pub fn plot(&mut self, points: Vec<(f64, f64)>, width: f64, color: Color) {
        self.lines.push(Line2D {
            points,
            width,
            color,
        });
    }

    pub fn axvline(&mut self, x: f64, width: f64, color: Color) {
        self.vlines.push(VLine { x, width, color });
    }

    pub fn texts_mut(&mut self) -> &mut Vec<Text> {
        &mut self.texts
    }

    /// Hide ticks, tick labels and axis labels
    pub fn set_axis_off(&mut self) {
        self.axis_on = false;
    }

    pub fn set_frame_on(&mut self, on: bool) {
        self.frame_on = on;
    }

    pub fn set_ylabel(&mut self, label: impl Into<String>) {
        let mut text = Text::new(label, 0.0, 0.5, self.label_size)
            .aligned(HAlign::Center, VAlign::Center);
        text.vertical = true;
        self.yaxis.label = Some(text);
    }

    pub fn get_ylabel(&self) -> Option<&str> {
        self.yaxis.label.as_ref().map(Text::get_text)
    }

    /// Label for an x tick
    fn format_x(&self, value: f64) -> String {
        match self.time_origin {
            Some(origin) => {
                let step = (self.xlim.1 - self.xlim.0) / X_TICKS as f64;
                format_clock(origin, value, step)
            }
            None => format_count(value),
        }
    }
}

/// Tick label with trailing zeros removed
pub fn format_count(value: f64) -> String {
    let text = format!("{:.3}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

/// Clock label for a point `offset` seconds after `origin`, coarser for wider `step`s
pub fn format_clock(origin: DateTime<Utc>, offset: f64, step: f64) -> String {
    let time = origin + Duration::microseconds((offset * 1e6).round() as i64);
    let format = if step >= 86400.0 {
        "%Y-%m-%d"
    } else if step >= 60.0 {
        "%H:%M"
    } else {
        "%H:%M:%S"
    };
    time.format(format).to_string()
}

/// Tracks how many figures are alive
#[derive(Debug, Clone, Default)]
pub struct FigureRegistry {
    open: Arc<AtomicUsize>,
}

impl FigureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) -> FigureHandle {
        self.open.fetch_add(1, Ordering::SeqCst);
        FigureHandle {
            open: self.open.clone(),
        }
    }

    pub fn open_count(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

/// Registration of a live figure, released on drop
#[derive(Debug)]
pub struct FigureHandle {
    open: Arc<AtomicUsize>,
}

impl Drop for FigureHandle {
    fn drop(&mut self) {
        let before = self.open.fetch_sub(1, Ordering::SeqCst);
        debug!(open_figures = before.saturating_sub(1), "Figure released");
    }
}

/// Pixel rectangle, y down
#[derive(Debug, Clone, Copy, PartialEq)]
struct PixelRect {
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
}

impl PixelRect {
    fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// Pixel position of a point given in fractions of the rectangle (y up)
    fn at(&self, fx: f64, fy: f64) -> (i32, i32) {
        (
            (self.x0 + fx * self.width()).round() as i32,
            (self.y1 - fy * self.height()).round() as i32,
        )
    }
}

#[derive(Debug)]
pub struct Figure {
    pub width_px: u32,
    pub height_px: u32,
    pub dpi: f64,
    /// Titles and other figure-level text, positioned in figure fractions
    pub texts: Vec<Text>,
    pub axes: Vec<Axes>,
    pub subplot: SubplotParams,
    pub transparent: bool,
    _handle: FigureHandle,
}

impl Figure {
    pub fn new(width_px: u32, height_px: u32, dpi: f64, registry: &FigureRegistry) -> Self {
        Self {
            width_px,
            height_px,
            dpi,
            texts: Vec::new(),
            axes: Vec::new(),
            subplot: SubplotParams::default(),
            transparent: false,
            _handle: registry.open(),
        }
    }

    pub fn texts_mut(&mut self) -> &mut Vec<Text> {
        &mut self.texts
    }

    pub fn axes_mut(&mut self) -> &mut Vec<Axes> {
        &mut self.axes
    }

    pub fn subplots_adjust(&mut self, left: f64, bottom: f64, right: f64, top: f64) {
        self.subplot = SubplotParams::new(left, bottom, right, top);
    }

    /// Pixel size of the figure when rasterized at `dpi`
    pub fn output_size(&self, dpi: f64) -> (u32, u32) {
        let factor = dpi / self.dpi;
        (
            (self.width_px as f64 * factor).round() as u32,
            (self.height_px as f64 * factor).round() as u32,
        )
    }

    /// Pixel rectangle of axes `index` in an image of `width × height`.
    ///
    /// The subplot region is split evenly between the axes, first on top.
    fn axes_rect(&self, index: usize, width: f64, height: f64) -> PixelRect {
        let count = self.axes.len().max(1) as f64;
        let top = (1.0 - self.subplot.top) * height;
        let bottom = (1.0 - self.subplot.bottom) * height;
        let slot = (bottom - top) / count;
        PixelRect {
            x0: self.subplot.left * width,
            y0: top + slot * index as f64,
            x1: self.subplot.right * width,
            y1: top + slot * (index as f64 + 1.0),
        }
    }

    /// Draw the figure at `dpi`
    pub fn rasterize(&self, dpi: f64) -> Result<RgbaImage> {
        if !(dpi.is_finite() && dpi > 0.0) {
            return Err(SeisplotError::ImageGeneration {
                message: format!("Invalid output dpi: {}", dpi),
            });
        }
        let (width, height) = self.output_size(dpi);
        if width == 0 || height == 0 {
            return Err(SeisplotError::ImageGeneration {
                message: format!("Figure rasterizes to an empty image ({}x{})", width, height),
            });
        }

        let pt = dpi / POINTS_PER_INCH;
        let mut buffer = vec![0u8; width as usize * height as usize * 3];
        {
            let backend = BitMapBackend::with_buffer(&mut buffer, (width, height));
            let root = TextSafeBackend::new(backend).into_drawing_area();
            root.fill(&WHITE).map_err(drawing_error)?;

            for (index, axes) in self.axes.iter().enumerate() {
                let rect = self.axes_rect(index, width as f64, height as f64);
                draw_axes(&root, axes, rect, height, pt)?;
            }

            let whole = PixelRect {
                x0: 0.0,
                y0: 0.0,
                x1: width as f64,
                y1: height as f64,
            };
            for text in self.texts.iter().filter(|t| t.is_visible()) {
                draw_text(&root, text, whole, pt)?;
            }
            root.present().map_err(drawing_error)?;
        }

        Ok(to_rgba(width, height, &buffer, self.transparent))
    }

    /// Encode the figure as PNG at `dpi`
    pub fn savefig(&self, dpi: f64) -> Result<Vec<u8>> {
        let image = self.rasterize(dpi)?;
        let mut buffer = Cursor::new(Vec::new());
        image
            .write_to(&mut buffer, image::ImageFormat::Png)
            .map_err(|e| SeisplotError::ImageGeneration {
                message: format!("Failed to encode PNG: {}", e),
            })?;
        Ok(buffer.into_inner())
    }
}

fn drawing_error<E: std::fmt::Display>(error: E) -> SeisplotError {
    SeisplotError::ImageGeneration {
        message: format!("Failed to draw figure: {}", error),
    }
}

/// Line style for `width` pixels; hairlines are one pixel at reduced opacity
fn stroke(color: Color, width: f64) -> ShapeStyle {
    let (stroke_width, opacity) = if width < 1.0 {
        (1, width.max(0.0))
    } else {
        (width.round() as u32, 1.0)
    };
    ShapeStyle {
        color: plot_color(color, opacity),
        filled: false,
        stroke_width,
    }
}

fn plot_color(color: Color, opacity: f64) -> RGBAColor {
    RGBAColor(
        color[0],
        color[1],
        color[2],
        opacity * color[3] as f64 / 255.0,
    )
}

/// Expand the RGB drawing buffer, keying out the background if transparent
fn to_rgba(width: u32, height: u32, rgb: &[u8], transparent: bool) -> RgbaImage {
    let mut image = RgbaImage::new(width, height);
    for (pixel, chunk) in image.pixels_mut().zip(rgb.chunks_exact(3)) {
        let alpha = if transparent && chunk == &BACKGROUND[..] {
            0
        } else {
            255
        };
        *pixel = Rgba([chunk[0], chunk[1], chunk[2], alpha]);
    }
    image
}

fn draw_text(root: &Area, text: &Text, container: PixelRect, pt: f64) -> Result<()> {
    let h_pos = match text.halign {
        HAlign::Left => HPos::Left,
        HAlign::Center => HPos::Center,
        HAlign::Right => HPos::Right,
    };
    let v_pos = match text.valign {
        VAlign::Top => VPos::Top,
        VAlign::Center => VPos::Center,
        VAlign::Bottom => VPos::Bottom,
    };

    let mut font = (FONT_FAMILY, text.size * pt).into_font();
    if text.vertical {
        font = font.transform(FontTransform::Rotate270);
    }
    let style = font
        .color(&plot_color(text.color, 1.0))
        .pos(Pos::new(h_pos, v_pos));

    root.draw(&TextElement::new(
        text.content.clone(),
        container.at(text.x, text.y),
        style,
    ))
    .map_err(drawing_error)
}

fn draw_axes(root: &Area, axes: &Axes, rect: PixelRect, image_height: u32, pt: f64) -> Result<()> {
    let x0 = rect.x0.round() as i32;
    let y0 = rect.y0.round() as i32;
    let width = rect.x1.round() as i32 - x0;
    let height = rect.y1.round() as i32 - y0;
    if width < 1 || height < 1 || axes.xlim.1 <= axes.xlim.0 || axes.ylim.1 <= axes.ylim.0 {
        debug!(width, height, "Skipping empty axes");
        return Ok(());
    }

    // Tick labels live outside the axes, in whatever margin the layout leaves
    let (left_area, bottom_area) = if axes.axis_on {
        (
            x0.clamp(0, (Y_LABEL_AREA * pt).round() as i32),
            (image_height as i32 - y0 - height).clamp(0, (X_LABEL_AREA * pt).round() as i32),
        )
    } else {
        (0, 0)
    };

    let area = root
        .clone()
        .shrink((x0 - left_area, y0), (width + left_area, height + bottom_area));
    let mut chart = ChartBuilder::on(&area)
        .set_label_area_size(LabelAreaPosition::Left, left_area)
        .set_label_area_size(LabelAreaPosition::Bottom, bottom_area)
        .build_cartesian_2d(axes.xlim.0..axes.xlim.1, axes.ylim.0..axes.ylim.1)
        .map_err(drawing_error)?;

    let (x_lo, x_hi) = axes.xlim;
    for line in &axes.lines {
        let points = line
            .points
            .iter()
            .copied()
            .filter(|(x, _)| *x >= x_lo && *x <= x_hi);
        chart
            .draw_series(LineSeries::new(points, stroke(line.color, line.width * pt)))
            .map_err(drawing_error)?;
    }

    for vline in axes.vlines.iter().filter(|v| v.x >= x_lo && v.x <= x_hi) {
        chart
            .draw_series(LineSeries::new(
                [(vline.x, axes.ylim.0), (vline.x, axes.ylim.1)],
                stroke(vline.color, vline.width * pt),
            ))
            .map_err(drawing_error)?;
    }

    let spine = stroke(BLACK, SPINE_WIDTH * pt);
    if axes.frame_on {
        chart
            .plotting_area()
            .draw(&Rectangle::new(
                [(axes.xlim.0, axes.ylim.0), (axes.xlim.1, axes.ylim.1)],
                spine,
            ))
            .map_err(drawing_error)?;
    }

    if axes.axis_on {
        let factor = 10f64.powi(axes.yaxis.exponent);
        let y_format = |value: &f64| format_count(*value / factor);
        let x_format = |value: &f64| axes.format_x(*value);
        let no_label = |_: &f64| String::new();
        let x_labels: &dyn Fn(&f64) -> String = if axes.xaxis.tick_labels_visible {
            &x_format
        } else {
            &no_label
        };

        let mut mesh = chart.configure_mesh();
        mesh.disable_mesh()
            .x_labels(X_TICKS)
            .y_labels(Y_TICKS)
            .x_label_formatter(x_labels)
            .y_label_formatter(&y_format)
            .label_style((FONT_FAMILY, axes.label_size * pt).into_font())
            .axis_style(spine)
            .set_all_tick_mark_size((TICK_LENGTH * pt).round() as i32);
        if let Some(label) = axes.yaxis.label.as_ref().filter(|l| l.is_visible()) {
            mesh.y_desc(label.content.clone())
                .axis_desc_style((FONT_FAMILY, label.size * pt).into_font());
        }
        mesh.draw().map_err(drawing_error)?;

        let offset = &axes.yaxis.offset_text;
        if offset.is_visible() && !offset.content.is_empty() {
            let style = (FONT_FAMILY, offset.size * pt)
                .into_font()
                .color(&plot_color(offset.color, 1.0))
                .pos(Pos::new(HPos::Left, VPos::Bottom));
            let anchor = (x0, y0 - (LABEL_PAD * pt).round() as i32);
            root.draw(&TextElement::new(offset.content.clone(), anchor, style))
                .map_err(drawing_error)?;
        }
    }

    for text in axes.texts.iter().filter(|t| t.is_visible()) {
        draw_text(root, text, rect, pt)?;
    }
    Ok(())
}
