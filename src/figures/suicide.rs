//! Suicide mortality trend (figure 9).

use super::{
    change_between, male_female_ratio, mortality::sex_marker, to_points, trend_arrow,
    value_extent, year_axis, FigureError,
};
use crate::charts::{StaticChartRenderer, Style};
use crate::data::schema::{Cause, Metric, Sex, FIRST_YEAR, LAST_YEAR};
use crate::data::{DataProcessor, Selection};
use crate::stats::{LinearFit, StatsCalculator};
use log::info;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, VPos};
use polars::prelude::DataFrame;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct SuicideTrend {
    pub series: Vec<(Sex, Vec<(i32, f64)>)>,
    /// Least-squares fit of the both-sexes series against the year.
    pub trend: LinearFit,
    pub first: f64,
    pub last: f64,
    pub change_pct: f64,
    /// Male over female mean rate.
    pub ratio: f64,
}

impl SuicideTrend {
    /// Fitted values at each year of the both-sexes series.
    pub fn trend_line(&self) -> Vec<(f64, f64)> {
        self.series
            .iter()
            .find(|(sex, _)| *sex == Sex::Both)
            .map(|(_, s)| {
                s.iter()
                    .map(|&(y, _)| (y as f64, self.trend.predict(y as f64)))
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub fn compute(df: &DataFrame) -> Result<SuicideTrend, FigureError> {
    let base = Selection::region().cause(Cause::Suicide);
    let series = Sex::ALL
        .iter()
        .map(|&sex| {
            let points =
                DataProcessor::series(df, &base.clone().sex(sex), Metric::MortalityRate)?;
            Ok((sex, points))
        })
        .collect::<Result<Vec<_>, FigureError>>()?;

    let both = base.sex(Sex::Both);
    let both_series = DataProcessor::series(df, &both, Metric::MortalityRate)?;
    let trend = StatsCalculator::yearly_trend(&both_series)?;
    let (first, last, change_pct) = change_between(df, &both, FIRST_YEAR, LAST_YEAR)?;
    let ratio = male_female_ratio(df, Cause::Suicide)?;
    info!(
        "Suicide {:.2} -> {:.2} ({:+.1}%), slope {:.3}/year, H/M {:.2}",
        first, last, change_pct, trend.slope, ratio
    );

    Ok(SuicideTrend {
        series,
        trend,
        first,
        last,
        change_pct,
        ratio,
    })
}

fn subtitle(change_pct: f64) -> &'static str {
    if change_pct < 0.0 {
        "Tendencia a la baja con marcada disparidad de género"
    } else {
        "Tendencia al alza con marcada disparidad de género"
    }
}

pub fn render(data: &SuicideTrend, style: &Style, path: &Path) -> Result<(), FigureError> {
    StaticChartRenderer::render_png(path, style.canvas_size((14.0, 7.0)), |root| {
        let body = StaticChartRenderer::title_block(
            root,
            style,
            "Evolución de la Mortalidad por Suicidio en la Comunitat Valenciana (2010-2023)",
            subtitle(data.change_pct),
            13.0,
        )?;

        let (lo, hi) = value_extent(data.series.iter().map(|(_, s)| s.as_slice()));
        let y = StaticChartRenderer::padded_range(lo, hi, 0.15);
        let span = y.end - y.start;
        let mut chart = StaticChartRenderer::year_chart(
            &body,
            style,
            year_axis(),
            y,
            "Tasa de Suicidio (por 100.000 hab.)",
            1,
            None,
        )?;

        StaticChartRenderer::covid_band(&mut chart, style, 0.6)?;
        for (sex, series) in &data.series {
            StaticChartRenderer::line(
                &mut chart,
                style,
                &to_points(series),
                style.sex_color(*sex),
                2.5,
                Some((sex_marker(*sex), 8.0)),
                Some(sex.as_str()),
            )?;
        }
        StaticChartRenderer::dashed_line(
            &mut chart,
            style,
            &data.trend_line(),
            style.sex_color(Sex::Both).mix(0.5),
            2.0,
            Some("Tendencia lineal"),
        )?;

        let color = if data.change_pct < 0.0 {
            style.palette.success.rgb()
        } else {
            style.palette.danger.rgb()
        };
        let change = trend_arrow(data.change_pct);
        let offset = span * 0.12 * if data.change_pct < 0.0 { -1.0 } else { 1.0 };
        StaticChartRenderer::annotate(
            root,
            style,
            &[&change, "(2010-2023)"],
            StaticChartRenderer::to_px(&chart, (LAST_YEAR as f64 - 1.0, data.last + offset)),
            StaticChartRenderer::to_px(&chart, (LAST_YEAR as f64, data.last)),
            &style.bold_colored(11.0, color),
            color,
        )?;

        let ratio_line = format!("Ratio Hombres/Mujeres: {:.1}x", data.ratio);
        let claim = format!("Los hombres tienen una tasa {:.1} veces mayor", data.ratio);
        StaticChartRenderer::text_box(
            root,
            style,
            &[&ratio_line, &claim],
            StaticChartRenderer::axes_px(&chart, 0.98, 0.98),
            HPos::Right,
            VPos::Top,
            &style.font(10.0),
            RGBColor(0xe9, 0xd8, 0xfd).mix(0.9),
            style.sex_color(Sex::Both),
        )?;

        StaticChartRenderer::legend(&mut chart, style, SeriesLabelPosition::UpperLeft)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::synthetic_dataset;

    #[test]
    fn suicide_trend_declines_with_threefold_male_rate() {
        let data = compute(&synthetic_dataset()).unwrap();
        assert_eq!(data.series.len(), 3);
        assert!((data.trend.slope + 0.08).abs() < 1e-9);
        assert!((data.trend.r_value + 1.0).abs() < 1e-9);
        assert!((data.change_pct + 13.0).abs() < 1e-9);
        assert!((data.ratio - 3.0).abs() < 1e-9);
    }

    #[test]
    fn trend_line_spans_every_year() {
        let data = compute(&synthetic_dataset()).unwrap();
        let line = data.trend_line();
        assert_eq!(line.len(), 14);
        assert!((line[0].1 - 8.0).abs() < 1e-9);
    }

    #[test]
    fn subtitle_follows_direction_of_change() {
        assert_eq!(subtitle(-13.0), "Tendencia a la baja con marcada disparidad de género");
        assert_eq!(subtitle(4.2), "Tendencia al alza con marcada disparidad de género");
    }
}
