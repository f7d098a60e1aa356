//! COVID-19 impact on regional mortality (figure 12).

use super::{rate_in, region_general_both, FigureError};
use crate::charts::{Bar, StaticChartRenderer, Style};
use crate::data::schema::Metric;
use crate::data::{DataProcessor, QueryError, Selection};
use crate::stats::StatsCalculator;
use log::{info, warn};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use polars::prelude::DataFrame;
use serde::Serialize;
use std::path::Path;

pub const PRE_COVID_YEARS: [i32; 2] = [2018, 2019];
pub const POST_COVID_YEARS: [i32; 2] = [2022, 2023];

/// Bar labels in display order.
pub const PERIOD_LABELS: [&str; 4] = [
    "Pre-COVID (2018-19)",
    "2020",
    "2021",
    "Post-COVID (2022-23)",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CovidImpact {
    pub pre_covid: f64,
    pub y2020: f64,
    pub y2021: f64,
    pub post_covid: f64,
    /// Percent change of each period vs pre-COVID; the first is 0.
    pub variations: [f64; 4],
}

impl CovidImpact {
    pub fn values(&self) -> [f64; 4] {
        [self.pre_covid, self.y2020, self.y2021, self.post_covid]
    }
}

/// Mean over every row in `years`; a missing year narrows the mean.
fn mean_of_years(df: &DataFrame, selection: &Selection, years: &[i32]) -> Result<f64, FigureError> {
    let mut values = Vec::new();
    for &year in years {
        let rows = DataProcessor::values(df, &selection.clone().period(year), Metric::MortalityRate)?;
        if rows.is_empty() {
            warn!("No rows for {} in {}", selection, year);
        }
        values.extend(rows);
    }
    StatsCalculator::mean(&values)
        .ok_or_else(|| QueryError::NotFound(format!("{} in {:?}", selection, years)).into())
}

pub fn compute(df: &DataFrame) -> Result<CovidImpact, FigureError> {
    let selection = region_general_both();
    let pre_covid = mean_of_years(df, &selection, &PRE_COVID_YEARS)?;
    let y2020 = rate_in(df, &selection, 2020)?;
    let y2021 = rate_in(df, &selection, 2021)?;
    let post_covid = mean_of_years(df, &selection, &POST_COVID_YEARS)?;

    let variations = [
        0.0,
        StatsCalculator::percent_change(pre_covid, y2020)?,
        StatsCalculator::percent_change(pre_covid, y2021)?,
        StatsCalculator::percent_change(pre_covid, post_covid)?,
    ];
    info!(
        "Pre {:.1}, 2020 {:.1} ({:+.1}%), 2021 {:.1} ({:+.1}%), post {:.1} ({:+.1}%)",
        pre_covid, y2020, variations[1], y2021, variations[2], post_covid, variations[3]
    );

    Ok(CovidImpact {
        pre_covid,
        y2020,
        y2021,
        post_covid,
        variations,
    })
}

/// Signed variation label; the reference bar gets none.
fn variation_label(v: f64) -> String {
    if v > 0.0 {
        format!("+{:.1}%", v)
    } else if v < 0.0 {
        format!("{:.1}%", v)
    } else {
        String::new()
    }
}

pub fn render(data: &CovidImpact, style: &Style, path: &Path) -> Result<(), FigureError> {
    let p = &style.palette;
    let labels: Vec<String> = PERIOD_LABELS.iter().map(|l| l.to_string()).collect();
    StaticChartRenderer::render_png(path, style.canvas_size((14.0, 6.0)), |root| {
        let body = StaticChartRenderer::title_block(
            root,
            style,
            "Impacto del COVID-19 en la Mortalidad de la Comunitat Valenciana",
            "Análisis comparativo Pre-COVID, Durante y Post-COVID",
            style.title_font_pt,
        )?;
        let panels = body.split_evenly((1, 2));

        let values = data.values();
        let colors = [p.success, p.danger, p.danger, p.male].map(|c| c.rgb());
        let max = values.iter().copied().fold(0.0, f64::max);
        let mut chart = StaticChartRenderer::column_chart(
            &panels[0],
            style,
            &labels,
            0.0..(max * 1.18).max(1.0),
            "Tasa de Mortalidad (por 100.000 hab.)",
            Some(("Comparativa de Mortalidad por Período", p.ink.rgb())),
        )?;
        let bars: Vec<(f64, Bar)> = values
            .iter()
            .zip(colors)
            .zip(&labels)
            .enumerate()
            .map(|(i, ((&v, color), label))| (i as f64, Bar::new(label.as_str(), v, color)))
            .collect();
        StaticChartRenderer::draw_vbars(&mut chart, style, &bars, 0.6, 12.0, |v| {
            format!("{:.1}", v)
        })?;
        StaticChartRenderer::hline(
            &mut chart,
            style,
            data.pre_covid,
            p.success.rgb().mix(0.7),
            2.0,
            true,
        )?;

        let var_colors = [p.neutral, p.danger, p.danger, p.male].map(|c| c.rgb());
        let top = data.variations.iter().copied().fold(0.0, f64::max);
        let bottom = data.variations.iter().copied().fold(0.0, f64::min);
        let y = (bottom * 1.3).min(-1.5)..(top * 1.3).max(1.5);
        let y_span = y.end - y.start;
        let mut chart = StaticChartRenderer::column_chart(
            &panels[1],
            style,
            &labels,
            y,
            "Variación respecto a Pre-COVID (%)",
            Some(("Exceso de Mortalidad", p.ink.rgb())),
        )?;
        let bars: Vec<(f64, Bar)> = data
            .variations
            .iter()
            .zip(var_colors)
            .zip(&labels)
            .enumerate()
            .map(|(i, ((&v, color), label))| (i as f64, Bar::new(label.as_str(), v, color)))
            .collect();
        StaticChartRenderer::draw_vbars(&mut chart, style, &bars, 0.6, 12.0, variation_label)?;
        chart.draw_series(std::iter::once(Text::new(
            "Ref.".to_string(),
            (0.0, y_span * 0.02),
            style
                .bold_colored(11.0, p.neutral.rgb())
                .pos(Pos::new(HPos::Center, VPos::Bottom)),
        )))?;
        StaticChartRenderer::hline(&mut chart, style, 0.0, BLACK.mix(1.0), 1.0, false)?;
        Ok(())
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::{self, synthetic_dataset, Row};
    use crate::data::schema::{Cause, Sex};

    #[test]
    fn periods_use_two_year_means_and_exact_years() {
        let data = compute(&synthetic_dataset()).unwrap();
        // 1000 x (1 - 0.01 k), with 2020 x 1.05 and 2021 x 1.08.
        assert!((data.pre_covid - 915.0).abs() < 1e-9);
        assert!((data.y2020 - 945.0).abs() < 1e-9);
        assert!((data.y2021 - 961.2).abs() < 1e-9);
        assert!((data.post_covid - 875.0).abs() < 1e-9);
        assert_eq!(data.variations[0], 0.0);
        assert!((data.variations[1] - 30.0 / 915.0 * 100.0).abs() < 1e-9);
        assert!(data.variations[3] < 0.0);
    }

    #[test]
    fn missing_baseline_year_uses_the_remaining_one() {
        let df = fixtures::frame(&[
            Row::region(Cause::General, Sex::Both, 2018, 900.0),
            Row::region(Cause::General, Sex::Both, 2020, 990.0),
            Row::region(Cause::General, Sex::Both, 2021, 1000.0),
            Row::region(Cause::General, Sex::Both, 2022, 880.0),
            Row::region(Cause::General, Sex::Both, 2023, 860.0),
        ]);
        let data = compute(&df).unwrap();
        assert_eq!(data.pre_covid, 900.0);
        assert_eq!(data.post_covid, 870.0);
        assert!((data.variations[1] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn empty_period_is_not_found() {
        let df = fixtures::frame(&[
            Row::region(Cause::General, Sex::Both, 2020, 990.0),
            Row::region(Cause::General, Sex::Both, 2021, 1000.0),
        ]);
        assert!(matches!(
            compute(&df),
            Err(FigureError::Query(QueryError::NotFound(_)))
        ));
    }

    #[test]
    fn reference_bar_has_no_variation_label() {
        assert_eq!(variation_label(0.0), "");
        assert_eq!(variation_label(3.28), "+3.3%");
        assert_eq!(variation_label(-4.4), "-4.4%");
    }
}
