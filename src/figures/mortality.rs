//! General mortality over time (figure 1) and the four specific causes
//! (figure 3).

use super::{
    change_between, rate_in, region_general_both, to_points, trend_arrow, value_extent,
    year_axis, FigureError,
};
use crate::charts::{MarkerKind, StaticChartRenderer, Style};
use crate::data::schema::{Cause, Metric, Sex, FIRST_YEAR, LAST_YEAR};
use crate::data::{DataProcessor, Selection};
use log::info;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, VPos};
use polars::prelude::DataFrame;
use std::path::Path;

/// Year the COVID peak annotation points at.
pub const COVID_PEAK_YEAR: i32 = 2021;

#[derive(Debug, Clone, PartialEq)]
pub struct GeneralMortality {
    /// One series per sex, in `Sex::ALL` order.
    pub series: Vec<(Sex, Vec<(i32, f64)>)>,
    /// Both-sexes rate in the last year.
    pub latest: f64,
    /// Both-sexes rate in the COVID peak year.
    pub covid_peak: f64,
}

pub fn compute_general(df: &DataFrame) -> Result<GeneralMortality, FigureError> {
    let base = Selection::region().cause(Cause::General);
    let series = Sex::ALL
        .iter()
        .map(|&sex| {
            let points = DataProcessor::series(df, &base.clone().sex(sex), Metric::MortalityRate)?;
            Ok((sex, points))
        })
        .collect::<Result<Vec<_>, FigureError>>()?;

    let both = region_general_both();
    let latest = rate_in(df, &both, LAST_YEAR)?;
    let covid_peak = rate_in(df, &both, COVID_PEAK_YEAR)?;
    info!(
        "General mortality {}: {:.1}, {}: {:.1}",
        LAST_YEAR, latest, COVID_PEAK_YEAR, covid_peak
    );

    Ok(GeneralMortality {
        series,
        latest,
        covid_peak,
    })
}

pub(crate) fn sex_marker(sex: Sex) -> MarkerKind {
    match sex {
        Sex::Both => MarkerKind::Circle,
        Sex::Male => MarkerKind::Square,
        Sex::Female => MarkerKind::Triangle,
    }
}

pub fn render_general(
    data: &GeneralMortality,
    style: &Style,
    path: &Path,
) -> Result<(), FigureError> {
    StaticChartRenderer::render_png(path, style.canvas_size((14.0, 7.0)), |root| {
        let body = StaticChartRenderer::title_block(
            root,
            style,
            "Evolución de la Mortalidad General en la Comunitat Valenciana (2010-2023)",
            "Tasa Ajustada por Edad - Impacto visible del COVID-19",
            style.title_font_pt,
        )?;

        let (lo, hi) = value_extent(data.series.iter().map(|(_, s)| s.as_slice()));
        let y = StaticChartRenderer::padded_range(lo, hi, 0.12);
        let span = y.end - y.start;
        let mut chart = StaticChartRenderer::year_chart(
            &body,
            style,
            year_axis(),
            y,
            "Tasa de Mortalidad (por 100.000 hab.)",
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

        let success = style.palette.success.rgb();
        let latest_text = format!("{:.1}", data.latest);
        StaticChartRenderer::annotate(
            root,
            style,
            &["Mínimo histórico", &latest_text],
            StaticChartRenderer::to_px(&chart, (LAST_YEAR as f64 - 1.0, data.latest - span * 0.1)),
            StaticChartRenderer::to_px(&chart, (LAST_YEAR as f64, data.latest)),
            &style.bold_colored(10.0, success),
            success,
        )?;

        let danger = style.palette.danger.rgb();
        let peak_text = format!("{:.1}", data.covid_peak);
        StaticChartRenderer::annotate(
            root,
            style,
            &["Pico COVID", &peak_text],
            StaticChartRenderer::to_px(
                &chart,
                (COVID_PEAK_YEAR as f64 + 0.5, data.covid_peak + span * 0.1),
            ),
            StaticChartRenderer::to_px(&chart, (COVID_PEAK_YEAR as f64, data.covid_peak)),
            &style.bold_colored(10.0, danger),
            danger,
        )?;

        StaticChartRenderer::legend(&mut chart, style, SeriesLabelPosition::UpperRight)
    })?;
    Ok(())
}

/// One specific cause with its change over the whole period.
#[derive(Debug, Clone, PartialEq)]
pub struct CausePanel {
    pub cause: Cause,
    pub series: Vec<(i32, f64)>,
    pub first: f64,
    pub last: f64,
    pub change_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpecificCauses {
    pub panels: Vec<CausePanel>,
}

pub fn compute_specific(df: &DataFrame) -> Result<SpecificCauses, FigureError> {
    let panels = Cause::SPECIFIC
        .iter()
        .map(|&cause| {
            let selection = Selection::region().cause(cause).sex(Sex::Both);
            let series = DataProcessor::series(df, &selection, Metric::MortalityRate)?;
            let (first, last, change_pct) = change_between(df, &selection, FIRST_YEAR, LAST_YEAR)?;
            info!(
                "{}: {:.1} -> {:.1} ({:+.1}%)",
                cause.as_str(),
                first,
                last,
                change_pct
            );
            Ok(CausePanel {
                cause,
                series,
                first,
                last,
                change_pct,
            })
        })
        .collect::<Result<Vec<_>, FigureError>>()?;
    Ok(SpecificCauses { panels })
}

pub fn render_specific(
    data: &SpecificCauses,
    style: &Style,
    path: &Path,
) -> Result<(), FigureError> {
    StaticChartRenderer::render_png(path, style.canvas_size((14.0, 10.0)), |root| {
        let body = StaticChartRenderer::title_block(
            root,
            style,
            "Evolución de las Causas Específicas de Mortalidad (2010-2023)",
            "Comunitat Valenciana - Ambos Sexos",
            style.title_font_pt,
        )?;

        for (panel, area) in data.panels.iter().zip(body.split_evenly((2, 2)).iter()) {
            let color = style.cause_color(panel.cause);
            let (lo, hi) = value_extent([panel.series.as_slice()]);
            let mut chart = StaticChartRenderer::year_chart(
                area,
                style,
                year_axis(),
                StaticChartRenderer::padded_range(lo, hi, 0.15),
                "Tasa por 100.000 hab.",
                2,
                Some((panel.cause.title(), color)),
            )?;
            StaticChartRenderer::covid_band(&mut chart, style, 0.4)?;
            StaticChartRenderer::line(
                &mut chart,
                style,
                &to_points(&panel.series),
                color,
                2.5,
                Some((MarkerKind::Circle, 6.0)),
                None,
            )?;

            let trend = if panel.change_pct < 0.0 {
                style.palette.success.rgb()
            } else {
                style.palette.danger.rgb()
            };
            StaticChartRenderer::text_box(
                root,
                style,
                &[&trend_arrow(panel.change_pct)],
                StaticChartRenderer::axes_px(&chart, 0.95, 0.95),
                HPos::Right,
                VPos::Top,
                &style.bold_colored(14.0, trend),
                WHITE.mix(0.9),
                trend,
            )?;
        }
        Ok(())
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::{region_rate, synthetic_dataset};

    #[test]
    fn general_series_cover_every_year_for_each_sex() {
        let data = compute_general(&synthetic_dataset()).unwrap();
        assert_eq!(data.series.len(), 3);
        for (sex, series) in &data.series {
            assert_eq!(series.len(), 14, "{:?}", sex);
            assert_eq!(series.first().map(|p| p.0), Some(FIRST_YEAR));
            assert_eq!(series.last().map(|p| p.0), Some(LAST_YEAR));
        }
        assert_eq!(data.latest, region_rate(Cause::General, Sex::Both, LAST_YEAR));
        assert_eq!(
            data.covid_peak,
            region_rate(Cause::General, Sex::Both, COVID_PEAK_YEAR)
        );
    }

    #[test]
    fn specific_panels_follow_cause_order_and_decline() {
        let data = compute_specific(&synthetic_dataset()).unwrap();
        let causes: Vec<Cause> = data.panels.iter().map(|p| p.cause).collect();
        assert_eq!(causes, Cause::SPECIFIC.to_vec());
        for panel in &data.panels {
            // 13 years at 1 % of the 2010 value per year.
            assert!((panel.change_pct + 13.0).abs() < 1e-9, "{:?}", panel.cause);
        }
    }
}
