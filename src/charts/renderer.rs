//! Static Chart Renderer
//! Draws onto an in-memory RGB buffer with plotters and encodes PNG files.
//!
//! Figures build their own charts; this module holds the shared pieces:
//! canvas lifecycle, title block, year axes, COVID band, markers, bars,
//! arrows, text boxes and colormaps.

use crate::charts::style::Style;
use image::{ImageError, RgbImage};
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::FontTransform;
use std::ops::Range;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Drawing failed: {0}")]
    Drawing(String),
    #[error("PNG encoding failed: {0}")]
    Image(#[from] ImageError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Pixel buffer does not match a {width}x{height} canvas")]
    Buffer { width: u32, height: u32 },
}

impl<E: std::error::Error + Send + Sync> From<DrawingAreaErrorKind<E>> for RenderError {
    fn from(err: DrawingAreaErrorKind<E>) -> Self {
        RenderError::Drawing(err.to_string())
    }
}

/// Whole-canvas drawing area in backend pixels.
pub type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;
/// A two-dimensional chart with numeric axes.
pub type Chart<'a, 'b> =
    ChartContext<'a, BitMapBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

/// First and last year of the COVID shading band.
pub const COVID_BAND: (f64, f64) = (2019.5, 2021.5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Circle,
    Square,
    Triangle,
}

/// One bar of a bar chart.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub label: String,
    pub value: f64,
    pub color: RGBColor,
}

impl Bar {
    pub fn new(label: impl Into<String>, value: f64, color: RGBColor) -> Self {
        Self {
            label: label.into(),
            value,
            color,
        }
    }
}

/// Axis titles and tick density of a chart.
#[derive(Debug, Clone, Copy)]
pub struct AxisSpec<'t> {
    pub x_desc: &'t str,
    pub y_desc: &'t str,
    pub x_labels: usize,
    pub y_labels: usize,
}

impl<'t> AxisSpec<'t> {
    pub fn new(x_desc: &'t str, y_desc: &'t str) -> Self {
        Self {
            x_desc,
            y_desc,
            x_labels: 10,
            y_labels: 8,
        }
    }

    pub fn x_labels(mut self, n: usize) -> Self {
        self.x_labels = n;
        self
    }
}

pub struct StaticChartRenderer;

impl StaticChartRenderer {
    /// Render into a white canvas and save it as PNG, creating parent directories.
    pub fn render_png<F>(path: &Path, size: (u32, u32), draw: F) -> Result<(), RenderError>
    where
        F: FnOnce(&DrawingArea<BitMapBackend<'_>, Shift>) -> Result<(), RenderError>,
    {
        let (width, height) = size;
        let mut buffer = vec![255u8; width as usize * height as usize * 3];
        {
            let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
            root.fill(&WHITE)?;
            draw(&root)?;
            root.present()?;
        }

        let image =
            RgbImage::from_raw(width, height, buffer).ok_or(RenderError::Buffer { width, height })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        image.save(path)?;
        log::debug!("wrote {} ({}x{})", path.display(), width, height);
        Ok(())
    }

    /// Draw a bold title and a regular subtitle centred at the top of `area`
    /// and return the area below them.
    pub fn title_block<'b>(
        area: &Area<'b>,
        style: &Style,
        title: &str,
        subtitle: &str,
        title_pt: f64,
    ) -> Result<Area<'b>, RenderError> {
        let (width, _) = area.dim_in_pixel();
        let line_gap = style.px(title_pt * 0.5) as i32;
        let title_h = style.px(title_pt * 1.3) as i32;
        let top = style.px(8.0) as i32;
        let centre = Pos::new(HPos::Center, VPos::Top);

        area.draw(&Text::new(
            title.to_string(),
            (width as i32 / 2, top),
            style.bold(title_pt).pos(centre),
        ))?;
        let mut used = top + title_h;
        if !subtitle.is_empty() {
            area.draw(&Text::new(
                subtitle.to_string(),
                (width as i32 / 2, used),
                style.font(title_pt - 2.0).pos(centre),
            ))?;
            used += style.px((title_pt - 2.0) * 1.3) as i32;
        }

        let (_, body) = area.split_vertically(used + line_gap);
        Ok(body)
    }

    /// Cartesian chart with the common mesh styling.
    pub fn cartesian<'a, 'b>(
        area: &'a Area<'b>,
        style: &Style,
        x: Range<f64>,
        y: Range<f64>,
        axes: AxisSpec<'_>,
        caption: Option<(&str, RGBColor)>,
    ) -> Result<Chart<'a, 'b>, RenderError> {
        let mut builder = ChartBuilder::on(area);
        builder
            .margin(style.px_u32(8.0))
            .margin_right(style.px_u32(14.0))
            .x_label_area_size(style.px_u32(style.base_font_pt * 3.2))
            .y_label_area_size(style.px_u32(style.base_font_pt * 5.5));
        if let Some((text, color)) = caption {
            builder.caption(text, style.bold_colored(style.label_font_pt, color));
        }
        let mut chart = builder.build_cartesian_2d(x, y)?;

        chart
            .configure_mesh()
            .x_labels(axes.x_labels)
            .y_labels(axes.y_labels)
            .x_desc(axes.x_desc)
            .y_desc(axes.y_desc)
            .axis_desc_style(style.axis_desc())
            .label_style(style.tick_label())
            .axis_style(style.palette.muted.rgb().stroke_width(style.stroke(0.8)))
            .bold_line_style(style.palette.neutral.rgb().mix(0.3).stroke_width(style.stroke(0.5)))
            .light_line_style(TRANSPARENT.stroke_width(0))
            .x_label_formatter(&|v: &f64| Self::format_tick(*v))
            .y_label_formatter(&|v: &f64| Self::format_tick(*v))
            .disable_x_mesh()
            .draw()?;
        Ok(chart)
    }

    /// Chart with one x tick per year and a horizontal grid.
    pub fn year_chart<'a, 'b>(
        area: &'a Area<'b>,
        style: &Style,
        years: Range<f64>,
        y: Range<f64>,
        y_desc: &str,
        year_step: usize,
        caption: Option<(&str, RGBColor)>,
    ) -> Result<Chart<'a, 'b>, RenderError> {
        let span = (years.end - years.start).ceil().max(1.0) as usize;
        let x_labels = (span / year_step.max(1)).max(2);
        let axes = AxisSpec::new("Año", y_desc).x_labels(x_labels);
        Self::cartesian(area, style, years, y, axes, caption)
    }

    /// Chart whose y axis holds one category per integer position.
    pub fn category_chart<'a, 'b>(
        area: &'a Area<'b>,
        style: &Style,
        x: Range<f64>,
        labels: &[String],
        x_desc: &str,
        label_pt: f64,
    ) -> Result<Chart<'a, 'b>, RenderError> {
        let n = labels.len();
        let widest = labels
            .iter()
            .map(|l| l.chars().count())
            .max()
            .unwrap_or(4) as f64;
        let mut chart = ChartBuilder::on(area)
            .margin(style.px_u32(8.0))
            .margin_right(style.px_u32(20.0))
            .x_label_area_size(style.px_u32(style.base_font_pt * 3.2))
            .y_label_area_size(style.px_u32(label_pt * 0.62 * widest + 12.0))
            .build_cartesian_2d(x, -0.5..(n as f64 - 0.5))?;

        let label_of = |v: &f64| Self::category_label(labels, *v);
        chart
            .configure_mesh()
            .x_labels(8)
            .y_labels(n.max(1))
            .x_desc(x_desc)
            .axis_desc_style(style.axis_desc())
            .label_style(style.tick_label())
            .y_label_style(style.font(label_pt))
            .axis_style(style.palette.muted.rgb().stroke_width(style.stroke(0.8)))
            .bold_line_style(style.palette.neutral.rgb().mix(0.3).stroke_width(style.stroke(0.5)))
            .light_line_style(TRANSPARENT.stroke_width(0))
            .x_label_formatter(&|v: &f64| Self::format_tick(*v))
            .y_label_formatter(&label_of)
            .disable_y_mesh()
            .draw()?;
        Ok(chart)
    }

    /// Chart whose x axis holds one category per integer position.
    pub fn column_chart<'a, 'b>(
        area: &'a Area<'b>,
        style: &Style,
        labels: &[String],
        y: Range<f64>,
        y_desc: &str,
        caption: Option<(&str, RGBColor)>,
    ) -> Result<Chart<'a, 'b>, RenderError> {
        let n = labels.len();
        let mut builder = ChartBuilder::on(area);
        builder
            .margin(style.px_u32(8.0))
            .margin_right(style.px_u32(14.0))
            .x_label_area_size(style.px_u32(style.base_font_pt * 3.0))
            .y_label_area_size(style.px_u32(style.base_font_pt * 5.5));
        if let Some((text, color)) = caption {
            builder.caption(text, style.bold_colored(style.label_font_pt, color));
        }
        let mut chart = builder.build_cartesian_2d(-0.5..(n as f64 - 0.5), y)?;

        let label_of = |v: &f64| Self::category_label(labels, *v);
        chart
            .configure_mesh()
            .x_labels(n.max(1))
            .y_labels(8)
            .y_desc(y_desc)
            .axis_desc_style(style.axis_desc())
            .label_style(style.tick_label())
            .axis_style(style.palette.muted.rgb().stroke_width(style.stroke(0.8)))
            .bold_line_style(style.palette.neutral.rgb().mix(0.3).stroke_width(style.stroke(0.5)))
            .light_line_style(TRANSPARENT.stroke_width(0))
            .x_label_formatter(&label_of)
            .y_label_formatter(&|v: &f64| Self::format_tick(*v))
            .disable_x_mesh()
            .draw()?;
        Ok(chart)
    }

    /// Chart with categories on both axes; `rows` are listed top to bottom
    /// and row `r` sits at `y = rows.len() - 1 - r`.
    pub fn grid_chart<'a, 'b>(
        area: &'a Area<'b>,
        style: &Style,
        columns: &[String],
        rows: &[String],
        x_desc: &str,
        y_desc: &str,
    ) -> Result<Chart<'a, 'b>, RenderError> {
        let (ncols, nrows) = (columns.len(), rows.len());
        let bottom_up: Vec<String> = rows.iter().rev().cloned().collect();
        let widest = rows.iter().map(|l| l.chars().count()).max().unwrap_or(4) as f64;
        let mut chart = ChartBuilder::on(area)
            .margin(style.px_u32(8.0))
            .x_label_area_size(style.px_u32(style.base_font_pt * 3.2))
            .y_label_area_size(style.px_u32(style.base_font_pt * 0.62 * widest + 26.0))
            .build_cartesian_2d(-0.5..(ncols as f64 - 0.5), -0.5..(nrows as f64 - 0.5))?;

        let column_of = |v: &f64| Self::category_label(columns, *v);
        let row_of = |v: &f64| Self::category_label(&bottom_up, *v);
        chart
            .configure_mesh()
            .x_labels(ncols.max(1))
            .y_labels(nrows.max(1))
            .x_desc(x_desc)
            .y_desc(y_desc)
            .axis_desc_style(style.axis_desc())
            .label_style(style.tick_label())
            .axis_style(TRANSPARENT.stroke_width(0))
            .x_label_formatter(&column_of)
            .y_label_formatter(&row_of)
            .disable_mesh()
            .draw()?;
        Ok(chart)
    }

    /// Vertical colour scale for `range` drawn into `area`, tick labels on
    /// its right.
    pub fn colorbar(
        root: &Area<'_>,
        area: &Area<'_>,
        style: &Style,
        cmap: fn(f64) -> RGBColor,
        range: (f64, f64),
        label: &str,
    ) -> Result<(), RenderError> {
        let (lo, hi) = range;
        let hi = if hi > lo { hi } else { lo + 1.0 };
        let (_, height) = area.dim_in_pixel();
        let strip = area.margin(
            (height as f64 * 0.1) as i32,
            (height as f64 * 0.12) as i32,
            style.px(6.0) as i32,
            style.px(58.0) as i32,
        );
        let mut chart = ChartBuilder::on(&strip).build_cartesian_2d(0.0..1.0, lo..hi)?;

        let steps = 120;
        let dv = (hi - lo) / steps as f64;
        chart.draw_series((0..steps).map(|i| {
            let v0 = lo + dv * i as f64;
            let t = (v0 + dv / 2.0 - lo) / (hi - lo);
            Rectangle::new([(0.0, v0), (1.0, v0 + dv)], cmap(t).filled())
        }))?;
        chart.draw_series(std::iter::once(Rectangle::new(
            [(0.0, lo), (1.0, hi)],
            style.palette.muted.rgb().stroke_width(style.stroke(0.6)),
        )))?;

        let step = Self::nice_step(hi - lo, 6);
        let tick = style.px(3.0) as i32;
        let text = style.font(style.base_font_pt - 1.0);
        let mut value = (lo / step).ceil() * step;
        while value <= hi + 1e-9 {
            let (x, y) = Self::to_px(&chart, (1.0, value));
            root.draw(&PathElement::new(
                vec![(x, y), (x + tick, y)],
                style.palette.muted.rgb().stroke_width(style.stroke(0.6)),
            ))?;
            root.draw(&Text::new(
                Self::format_tick(value),
                (x + tick * 2, y),
                text.pos(Pos::new(HPos::Left, VPos::Center)),
            ))?;
            value += step;
        }

        let (x, _) = Self::to_px(&chart, (1.0, hi));
        let (_, mid) = Self::to_px(&chart, (1.0, (lo + hi) / 2.0));
        root.draw(&Text::new(
            label.to_string(),
            (x + style.px(44.0) as i32, mid),
            style
                .bold(style.base_font_pt)
                .transform(FontTransform::Rotate90)
                .pos(Pos::new(HPos::Center, VPos::Center)),
        ))?;
        Ok(())
    }

    /// Label at an integer category position, empty between positions.
    pub fn category_label(labels: &[String], position: f64) -> String {
        let index = position.round();
        if (position - index).abs() > 1e-6 || index < 0.0 {
            return String::new();
        }
        labels.get(index as usize).cloned().unwrap_or_default()
    }

    fn format_tick(value: f64) -> String {
        if (value - value.round()).abs() < 1e-9 {
            format!("{:.0}", value)
        } else if (value * 10.0 - (value * 10.0).round()).abs() < 1e-9 {
            format!("{:.1}", value)
        } else {
            format!("{:.2}", value)
        }
    }

    /// Horizontal bars centred on integer y positions with value labels at
    /// their tips; an empty label is skipped.
    pub fn draw_hbars<'a, 'b: 'a>(
        chart: &mut Chart<'a, 'b>,
        style: &Style,
        bars: &[Bar],
        thickness: f64,
        label_pt: f64,
        format: impl Fn(f64) -> String,
    ) -> Result<(), RenderError> {
        let x_span = chart.x_range().end - chart.x_range().start;
        let half = thickness / 2.0;
        let edge = WHITE.stroke_width(style.stroke(1.0));
        for (i, bar) in bars.iter().enumerate() {
            let y = i as f64;
            let base = chart.x_range().start.max(0.0);
            chart.draw_series(std::iter::once(Rectangle::new(
                [(base, y - half), (bar.value, y + half)],
                bar.color.filled(),
            )))?;
            chart.draw_series(std::iter::once(Rectangle::new(
                [(base, y - half), (bar.value, y + half)],
                edge,
            )))?;
            let text = format(bar.value);
            if text.is_empty() {
                continue;
            }
            chart.draw_series(std::iter::once(Text::new(
                text,
                (bar.value + x_span * 0.01, y),
                style
                    .bold(label_pt)
                    .pos(Pos::new(HPos::Left, VPos::Center)),
            )))?;
        }
        Ok(())
    }

    /// Vertical bars centred on `x` positions; the label sits above positive
    /// values and below negative ones.
    pub fn draw_vbars<'a, 'b: 'a>(
        chart: &mut Chart<'a, 'b>,
        style: &Style,
        bars: &[(f64, Bar)],
        width: f64,
        label_pt: f64,
        format: impl Fn(f64) -> String,
    ) -> Result<(), RenderError> {
        let y_span = chart.y_range().end - chart.y_range().start;
        let half = width / 2.0;
        let edge = WHITE.stroke_width(style.stroke(1.5));
        for (x, bar) in bars {
            let rect = [(x - half, 0.0), (x + half, bar.value)];
            chart.draw_series(std::iter::once(Rectangle::new(rect, bar.color.filled())))?;
            chart.draw_series(std::iter::once(Rectangle::new(rect, edge)))?;

            let text = format(bar.value);
            if text.is_empty() {
                continue;
            }
            let (y, vpos) = if bar.value >= 0.0 {
                (bar.value + y_span * 0.01, VPos::Bottom)
            } else {
                (bar.value - y_span * 0.01, VPos::Top)
            };
            chart.draw_series(std::iter::once(Text::new(
                text,
                (*x, y),
                style.bold(label_pt).pos(Pos::new(HPos::Center, vpos)),
            )))?;
        }
        Ok(())
    }

    /// Shade the COVID years across the full height of the chart.
    pub fn covid_band<'a, 'b: 'a>(
        chart: &mut Chart<'a, 'b>,
        style: &Style,
        alpha: f64,
    ) -> Result<(), RenderError> {
        let y = chart.y_range();
        chart.draw_series(std::iter::once(Rectangle::new(
            [(COVID_BAND.0, y.start), (COVID_BAND.1, y.end)],
            style.palette.covid_band.rgb().mix(alpha).filled(),
        )))?;
        Ok(())
    }

    /// Line through `points` with optional markers and legend entry.
    pub fn line<'a, 'b: 'a>(
        chart: &mut Chart<'a, 'b>,
        style: &Style,
        points: &[(f64, f64)],
        color: RGBColor,
        width_pt: f64,
        marker: Option<(MarkerKind, f64)>,
        label: Option<&str>,
    ) -> Result<(), RenderError> {
        let stroke = color.stroke_width(style.stroke(width_pt));
        let anno = chart.draw_series(LineSeries::new(points.iter().copied(), stroke))?;
        if let Some(label) = label {
            let reach = style.px(10.0) as i32;
            let dot = if marker.is_some() { style.px(2.5) as i32 } else { 0 };
            anno.label(label).legend(move |(x, y)| {
                EmptyElement::at((x, y))
                    + PathElement::new(vec![(-reach, 0), (reach, 0)], stroke)
                    + Circle::new((0, 0), dot, color.filled())
            });
        }
        if let Some((kind, size_pt)) = marker {
            Self::markers(chart, style, points, kind, size_pt, color)?;
        }
        Ok(())
    }

    /// Dashed polyline in data coordinates, dashes measured in points.
    pub fn dashed_line<'a, 'b: 'a>(
        chart: &mut Chart<'a, 'b>,
        style: &Style,
        points: &[(f64, f64)],
        color: RGBAColor,
        width_pt: f64,
        label: Option<&str>,
    ) -> Result<(), RenderError> {
        let dash = style.px(5.0);
        let gap = style.px(3.0);
        let stroke = color.stroke_width(style.stroke(width_pt));

        let mut dashes = Vec::new();
        for pair in points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let pa = chart.backend_coord(&a);
            let pb = chart.backend_coord(&b);
            let length = (((pb.0 - pa.0) as f64).powi(2) + ((pb.1 - pa.1) as f64).powi(2)).sqrt();
            if length < 1.0 {
                continue;
            }
            let lerp = |t: f64| (a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t);
            let mut start = 0.0;
            while start < length {
                let end = (start + dash).min(length);
                dashes.push(vec![lerp(start / length), lerp(end / length)]);
                start = end + gap;
            }
        }

        let anno = chart.draw_series(
            dashes
                .into_iter()
                .map(|segment| PathElement::new(segment, stroke)),
        )?;
        if let Some(label) = label {
            let reach = style.px(10.0) as i32;
            anno.label(label).legend(move |(x, y)| {
                EmptyElement::at((x, y))
                    + PathElement::new(vec![(-reach, 0), (-reach / 4, 0)], stroke)
                    + PathElement::new(vec![(reach / 4, 0), (reach, 0)], stroke)
            });
        }
        Ok(())
    }

    /// Vertical reference line spanning the chart.
    pub fn vline<'a, 'b: 'a>(
        chart: &mut Chart<'a, 'b>,
        style: &Style,
        x: f64,
        color: RGBAColor,
        width_pt: f64,
        label: Option<&str>,
    ) -> Result<(), RenderError> {
        let y = chart.y_range();
        Self::dashed_line(chart, style, &[(x, y.start), (x, y.end)], color, width_pt, label)
    }

    /// Horizontal reference line spanning the chart.
    pub fn hline<'a, 'b: 'a>(
        chart: &mut Chart<'a, 'b>,
        style: &Style,
        y: f64,
        color: RGBAColor,
        width_pt: f64,
        dashed: bool,
    ) -> Result<(), RenderError> {
        let x = chart.x_range();
        let points = [(x.start, y), (x.end, y)];
        if dashed {
            Self::dashed_line(chart, style, &points, color, width_pt, None)
        } else {
            chart.draw_series(LineSeries::new(
                points,
                color.stroke_width(style.stroke(width_pt)),
            ))?;
            Ok(())
        }
    }

    /// Filled markers with a thin white rim.
    pub fn markers<'a, 'b: 'a>(
        chart: &mut Chart<'a, 'b>,
        style: &Style,
        points: &[(f64, f64)],
        kind: MarkerKind,
        size_pt: f64,
        color: RGBColor,
    ) -> Result<(), RenderError> {
        let size = style.px(size_pt / 2.0).max(1.0) as i32;
        let rim = (style.px(0.8).max(1.0)) as i32;
        let fill = color.filled();
        let white = WHITE.filled();
        match kind {
            MarkerKind::Circle => {
                chart.draw_series(points.iter().map(|&p| {
                    EmptyElement::at(p)
                        + Circle::new((0, 0), size + rim, white)
                        + Circle::new((0, 0), size, fill)
                }))?;
            }
            MarkerKind::Square => {
                chart.draw_series(points.iter().map(|&p| {
                    let outer = size + rim;
                    EmptyElement::at(p)
                        + Rectangle::new([(-outer, -outer), (outer, outer)], white)
                        + Rectangle::new([(-size, -size), (size, size)], fill)
                }))?;
            }
            MarkerKind::Triangle => {
                chart.draw_series(points.iter().map(|&p| {
                    EmptyElement::at(p)
                        + TriangleMarker::new((0, 0), size + rim + rim / 2, white)
                        + TriangleMarker::new((0, 0), size, fill)
                }))?;
            }
        }
        Ok(())
    }

    /// Scatter markers with transparency and a legend swatch.
    pub fn scatter<'a, 'b: 'a>(
        chart: &mut Chart<'a, 'b>,
        style: &Style,
        points: &[(f64, f64)],
        kind: MarkerKind,
        color: RGBColor,
        alpha: f64,
        label: &str,
    ) -> Result<(), RenderError> {
        let size = style.px(2.6) as i32;
        let fill = color.mix(alpha).filled();
        let anno = match kind {
            MarkerKind::Triangle => chart.draw_series(
                points
                    .iter()
                    .map(|&p| TriangleMarker::new(p, size + size / 3, fill)),
            )?,
            MarkerKind::Square => chart.draw_series(points.iter().map(|&p| {
                EmptyElement::at(p) + Rectangle::new([(-size, -size), (size, size)], fill)
            }))?,
            MarkerKind::Circle => {
                chart.draw_series(points.iter().map(|&p| Circle::new(p, size, fill)))?
            }
        };
        let swatch = style.px(3.0) as i32;
        anno.label(label).legend(move |(x, y)| {
            Rectangle::new([(x - swatch, y - swatch), (x + swatch, y + swatch)], color.filled())
        });
        Ok(())
    }

    /// Legend box with the chart's labelled series.
    pub fn legend<'a, 'b: 'a>(
        chart: &mut Chart<'a, 'b>,
        style: &Style,
        position: SeriesLabelPosition,
    ) -> Result<(), RenderError> {
        chart
            .configure_series_labels()
            .position(position)
            .margin(style.px_u32(8.0))
            .legend_area_size(style.px_u32(24.0))
            .label_font(style.font(style.base_font_pt - 1.0))
            .background_style(WHITE.mix(0.92).filled())
            .border_style(style.palette.neutral.rgb().mix(0.6).stroke_width(style.stroke(0.6)))
            .draw()?;
        Ok(())
    }

    /// Pixel position of a data coordinate.
    pub fn to_px(chart: &Chart<'_, '_>, point: (f64, f64)) -> (i32, i32) {
        chart.backend_coord(&point)
    }

    /// Pixel position of a fraction of the plotting area (0,0 bottom-left).
    pub fn axes_px(chart: &Chart<'_, '_>, fx: f64, fy: f64) -> (i32, i32) {
        let x = chart.x_range();
        let y = chart.y_range();
        chart.backend_coord(&(
            x.start + (x.end - x.start) * fx,
            y.start + (y.end - y.start) * fy,
        ))
    }

    /// Straight arrow between two pixel positions; heads at `to`, and also at
    /// `from` when `double` is set.
    pub fn arrow(
        root: &Area<'_>,
        style: &Style,
        from: (i32, i32),
        to: (i32, i32),
        color: RGBColor,
        width_pt: f64,
        double: bool,
    ) -> Result<(), RenderError> {
        root.draw(&PathElement::new(
            vec![from, to],
            color.stroke_width(style.stroke(width_pt)),
        ))?;
        let head = style.px(5.0 + width_pt);
        root.draw(&Polygon::new(Self::arrow_head(from, to, head), color.filled()))?;
        if double {
            root.draw(&Polygon::new(Self::arrow_head(to, from, head), color.filled()))?;
        }
        Ok(())
    }

    /// Text centred at `text_at` with an arrow from its nearest edge to `target`.
    pub fn annotate(
        root: &Area<'_>,
        style: &Style,
        lines: &[&str],
        text_at: (i32, i32),
        target: (i32, i32),
        text_style: &TextStyle<'_>,
        color: RGBColor,
    ) -> Result<(), RenderError> {
        Self::text_lines(root, lines, text_at, text_style, HPos::Center, VPos::Center)?;
        let line_h = root.estimate_text_size("Ág", text_style)?.1 as i32;
        let half = (line_h * lines.len() as i32 + line_h / 5 * (lines.len() as i32 - 1)) / 2;
        let pad = style.px(2.0) as i32;
        let start = if target.1 < text_at.1 {
            (text_at.0, text_at.1 - half - pad)
        } else {
            (text_at.0, text_at.1 + half + pad)
        };
        // Stop short of the marker.
        let dx = (target.0 - start.0) as f64;
        let dy = (target.1 - start.1) as f64;
        let norm = (dx * dx + dy * dy).sqrt().max(1.0);
        let gap = style.px(5.0).min(norm / 2.0);
        let end = (
            target.0 - (dx / norm * gap) as i32,
            target.1 - (dy / norm * gap) as i32,
        );
        Self::arrow(root, style, start, end, color, 1.5, false)
    }

    fn arrow_head(from: (i32, i32), to: (i32, i32), length: f64) -> Vec<(i32, i32)> {
        let dx = (to.0 - from.0) as f64;
        let dy = (to.1 - from.1) as f64;
        let norm = (dx * dx + dy * dy).sqrt().max(1.0);
        let (ux, uy) = (dx / norm, dy / norm);
        let back = (to.0 as f64 - ux * length, to.1 as f64 - uy * length);
        let half = length * 0.4;
        vec![
            to,
            ((back.0 - uy * half) as i32, (back.1 + ux * half) as i32),
            ((back.0 + uy * half) as i32, (back.1 - ux * half) as i32),
        ]
    }

    /// Stacked lines of text anchored at a pixel position.
    pub fn text_lines(
        root: &Area<'_>,
        lines: &[&str],
        anchor: (i32, i32),
        text_style: &TextStyle<'_>,
        hpos: HPos,
        vpos: VPos,
    ) -> Result<(), RenderError> {
        let line_h = root.estimate_text_size("Ág", text_style)?.1 as i32;
        let total = line_h * lines.len() as i32 + line_h / 5 * (lines.len() as i32 - 1).max(0);
        let top = match vpos {
            VPos::Top => anchor.1,
            VPos::Center => anchor.1 - total / 2,
            VPos::Bottom => anchor.1 - total,
        };
        for (i, line) in lines.iter().enumerate() {
            let y = top + i as i32 * (line_h + line_h / 5);
            root.draw(&Text::new(
                line.to_string(),
                (anchor.0, y),
                text_style.pos(Pos::new(hpos, VPos::Top)),
            ))?;
        }
        Ok(())
    }

    /// Text inside a filled, bordered box. `anchor` is the box corner or edge
    /// centre picked by `hpos`/`vpos`.
    #[allow(clippy::too_many_arguments)]
    pub fn text_box(
        root: &Area<'_>,
        style: &Style,
        lines: &[&str],
        anchor: (i32, i32),
        hpos: HPos,
        vpos: VPos,
        text_style: &TextStyle<'_>,
        fill: RGBAColor,
        border: RGBColor,
    ) -> Result<(), RenderError> {
        let pad = style.px(4.0) as i32;
        let line_h = root.estimate_text_size("Ág", text_style)?.1 as i32;
        let gap = line_h / 5;
        let mut width = 0;
        for line in lines {
            width = width.max(root.estimate_text_size(line, text_style)?.0 as i32);
        }
        let height = line_h * lines.len() as i32 + gap * (lines.len() as i32 - 1).max(0);
        let box_w = width + 2 * pad;
        let box_h = height + 2 * pad;

        let left = match hpos {
            HPos::Left => anchor.0,
            HPos::Center => anchor.0 - box_w / 2,
            HPos::Right => anchor.0 - box_w,
        };
        let top = match vpos {
            VPos::Top => anchor.1,
            VPos::Center => anchor.1 - box_h / 2,
            VPos::Bottom => anchor.1 - box_h,
        };
        let corners = [(left, top), (left + box_w, top + box_h)];
        root.draw(&Rectangle::new(corners, fill.filled()))?;
        root.draw(&Rectangle::new(
            corners,
            border.stroke_width(style.stroke(1.0)),
        ))?;
        Self::text_lines(
            root,
            lines,
            (left + box_w / 2, top + pad),
            text_style,
            HPos::Center,
            VPos::Top,
        )
    }

    /// Step of a "nice" tick grid covering `range` with about `target_steps`
    /// intervals.
    pub fn nice_step(range: f64, target_steps: usize) -> f64 {
        if range <= 0.0 || !range.is_finite() {
            return 1.0;
        }
        let raw_step = range / target_steps.max(1) as f64;
        let magnitude = 10f64.powf(raw_step.log10().floor());
        let normalized = raw_step / magnitude;

        let nice = if normalized <= 1.0 {
            1.0
        } else if normalized <= 2.0 {
            2.0
        } else if normalized <= 5.0 {
            5.0
        } else {
            10.0
        };

        nice * magnitude
    }

    /// Axis range around `[lo, hi]` padded by `pad` of the span and snapped
    /// outwards to a nice step.
    pub fn padded_range(lo: f64, hi: f64, pad: f64) -> Range<f64> {
        let span = if hi > lo { hi - lo } else { hi.abs().max(1.0) };
        let step = Self::nice_step(span * (1.0 + 2.0 * pad), 8);
        let start = ((lo - span * pad) / step).floor() * step;
        let end = ((hi + span * pad) / step).ceil() * step;
        start..end
    }

    /// Interpolate a colormap given as evenly spaced anchors.
    pub fn colormap(anchors: &[RGBColor], t: f64) -> RGBColor {
        match anchors {
            [] => BLACK,
            [only] => *only,
            _ => {
                let t = if t.is_nan() { 0.5 } else { t.clamp(0.0, 1.0) };
                let scaled = t * (anchors.len() - 1) as f64;
                let i = (scaled.floor() as usize).min(anchors.len() - 2);
                let f = scaled - i as f64;
                let (a, b) = (anchors[i], anchors[i + 1]);
                let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * f).round() as u8;
                RGBColor(mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
            }
        }
    }

    /// Diverging red-yellow-green, reversed: low values green, high red.
    pub fn rdylgn_r(t: f64) -> RGBColor {
        const RDYLGN: [RGBColor; 11] = [
            RGBColor(0xa5, 0x00, 0x26),
            RGBColor(0xd7, 0x30, 0x27),
            RGBColor(0xf4, 0x6d, 0x43),
            RGBColor(0xfd, 0xae, 0x61),
            RGBColor(0xfe, 0xe0, 0x8b),
            RGBColor(0xff, 0xff, 0xbf),
            RGBColor(0xd9, 0xef, 0x8b),
            RGBColor(0xa6, 0xd9, 0x6a),
            RGBColor(0x66, 0xbd, 0x63),
            RGBColor(0x1a, 0x98, 0x50),
            RGBColor(0x00, 0x68, 0x37),
        ];
        Self::colormap(&RDYLGN, 1.0 - t)
    }

    /// Sequential white-to-dark-red.
    pub fn reds(t: f64) -> RGBColor {
        const REDS: [RGBColor; 9] = [
            RGBColor(0xff, 0xf5, 0xf0),
            RGBColor(0xfe, 0xe0, 0xd2),
            RGBColor(0xfc, 0xbb, 0xa1),
            RGBColor(0xfc, 0x92, 0x72),
            RGBColor(0xfb, 0x6a, 0x4a),
            RGBColor(0xef, 0x3b, 0x2c),
            RGBColor(0xcb, 0x18, 0x1d),
            RGBColor(0xa5, 0x0f, 0x15),
            RGBColor(0x67, 0x00, 0x0d),
        ];
        Self::colormap(&REDS, t)
    }

    /// `n` colours sampled evenly from `lo..=hi` of a colormap.
    pub fn sample(cmap: fn(f64) -> RGBColor, n: usize, lo: f64, hi: f64) -> Vec<RGBColor> {
        match n {
            0 => Vec::new(),
            1 => vec![cmap((lo + hi) / 2.0)],
            _ => (0..n)
                .map(|i| cmap(lo + (hi - lo) * i as f64 / (n - 1) as f64))
                .collect(),
        }
    }

    /// Relative luminance, used to pick readable text on coloured cells.
    pub fn is_dark(color: RGBColor) -> bool {
        let l = 0.2126 * color.0 as f64 + 0.7152 * color.1 as f64 + 0.0722 * color.2 as f64;
        l < 128.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nice_step_snaps_to_1_2_5() {
        assert_eq!(StaticChartRenderer::nice_step(100.0, 10), 10.0);
        assert_eq!(StaticChartRenderer::nice_step(130.0, 10), 20.0);
        assert_eq!(StaticChartRenderer::nice_step(0.4, 10), 0.05);
        assert_eq!(StaticChartRenderer::nice_step(0.0, 10), 1.0);
    }

    #[test]
    fn padded_range_contains_data() {
        let r = StaticChartRenderer::padded_range(812.0, 951.0, 0.05);
        assert!(r.start <= 812.0 - 6.0);
        assert!(r.end >= 951.0 + 6.0);
        let flat = StaticChartRenderer::padded_range(5.0, 5.0, 0.1);
        assert!(flat.start < 5.0 && flat.end > 5.0);
    }

    #[test]
    fn colormap_endpoints_and_midpoint() {
        assert_eq!(StaticChartRenderer::rdylgn_r(0.0), RGBColor(0x00, 0x68, 0x37));
        assert_eq!(StaticChartRenderer::rdylgn_r(1.0), RGBColor(0xa5, 0x00, 0x26));
        assert_eq!(StaticChartRenderer::rdylgn_r(0.5), RGBColor(0xff, 0xff, 0xbf));
        assert_eq!(StaticChartRenderer::reds(2.0), RGBColor(0x67, 0x00, 0x0d));
        let samples = StaticChartRenderer::sample(StaticChartRenderer::reds, 5, 0.3, 0.8);
        assert_eq!(samples.len(), 5);
        assert_eq!(samples[0], StaticChartRenderer::reds(0.3));
    }

    #[test]
    fn category_labels_only_on_integer_positions() {
        let labels = vec!["a".to_string(), "b".to_string()];
        assert_eq!(StaticChartRenderer::category_label(&labels, 1.0), "b");
        assert_eq!(StaticChartRenderer::category_label(&labels, 0.5), "");
        assert_eq!(StaticChartRenderer::category_label(&labels, 2.0), "");
        assert_eq!(StaticChartRenderer::category_label(&labels, -1.0), "");
    }

    #[test]
    fn arrow_head_points_at_target() {
        let head = StaticChartRenderer::arrow_head((0, 0), (100, 0), 10.0);
        assert_eq!(head[0], (100, 0));
        assert_eq!(head[1].0, 90);
        assert_eq!(head[2].0, 90);
        assert_eq!(head[1].1, -head[2].1);
    }

    #[test]
    fn renders_png_with_text() {
        let style = Style {
            dpi: 72,
            ..Style::default()
        };
        if !style.has_font() {
            eprintln!("skipping: no '{}' font installed", style.font_family);
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("chart.png");
        StaticChartRenderer::render_png(&path, style.canvas_size((4.0, 3.0)), |root| {
            let body = StaticChartRenderer::title_block(root, &style, "Title", "Sub", 14.0)?;
            let mut chart = StaticChartRenderer::year_chart(
                &body,
                &style,
                2009.5..2023.5,
                0.0..10.0,
                "Tasa",
                1,
                None,
            )?;
            StaticChartRenderer::covid_band(&mut chart, &style, 0.3)?;
            let pts: Vec<(f64, f64)> = (2010..=2023).map(|y| (y as f64, 5.0)).collect();
            StaticChartRenderer::line(
                &mut chart,
                &style,
                &pts,
                style.palette.primary.rgb(),
                2.0,
                Some((MarkerKind::Circle, 6.0)),
                Some("serie"),
            )?;
            StaticChartRenderer::legend(&mut chart, &style, SeriesLabelPosition::UpperRight)
        })
        .unwrap();
        let image = image::open(&path).unwrap();
        assert_eq!((image.width(), image.height()), (288, 216));
    }
}
