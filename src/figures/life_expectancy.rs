//! Life expectancy at 65 by sex (figure 6).

use super::{mortality::sex_marker, to_points, value_extent, FigureError};
use crate::charts::{StaticChartRenderer, Style};
use crate::data::schema::{Cause, Metric, Sex, FIRST_YEAR, LAST_YEAR};
use crate::data::{DataProcessor, Selection};
use log::info;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, VPos};
use polars::prelude::DataFrame;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct LifeExpectancy {
    /// Male, female and both-sexes series.
    pub series: Vec<(Sex, Vec<(i32, f64)>)>,
    pub male_latest: f64,
    pub female_latest: f64,
    /// Female minus male, last year.
    pub gap: f64,
}

const SERIES_ORDER: [Sex; 3] = [Sex::Male, Sex::Female, Sex::Both];

/// Life expectancy of one sex in one year from the regional General rows.
pub(crate) fn life_expectancy_in(df: &DataFrame, sex: Sex, year: i32) -> Result<f64, FigureError> {
    let selection = Selection::region()
        .cause(Cause::General)
        .sex(sex)
        .period(year);
    Ok(DataProcessor::value_at(
        df,
        &selection,
        Metric::LifeExpectancy,
    )?)
}

pub fn compute(df: &DataFrame) -> Result<LifeExpectancy, FigureError> {
    let base = Selection::region().cause(Cause::General);
    let series = SERIES_ORDER
        .iter()
        .map(|&sex| {
            let points =
                DataProcessor::series(df, &base.clone().sex(sex), Metric::LifeExpectancy)?;
            Ok((sex, points))
        })
        .collect::<Result<Vec<_>, FigureError>>()?;

    let male_latest = life_expectancy_in(df, Sex::Male, LAST_YEAR)?;
    let female_latest = life_expectancy_in(df, Sex::Female, LAST_YEAR)?;
    let gap = female_latest - male_latest;
    info!(
        "Life expectancy {}: H {:.1}, M {:.1}, gap {:.1} years",
        LAST_YEAR, male_latest, female_latest, gap
    );

    Ok(LifeExpectancy {
        series,
        male_latest,
        female_latest,
        gap,
    })
}

pub fn render(data: &LifeExpectancy, style: &Style, path: &Path) -> Result<(), FigureError> {
    StaticChartRenderer::render_png(path, style.canvas_size((14.0, 7.0)), |root| {
        let body = StaticChartRenderer::title_block(
            root,
            style,
            "Evolución de la Esperanza de Vida por Sexo (2010-2023)",
            "Comunitat Valenciana - Brecha de género persistente",
            style.title_font_pt,
        )?;

        let (lo, hi) = value_extent(data.series.iter().map(|(_, s)| s.as_slice()));
        let y = StaticChartRenderer::padded_range(lo, hi, 0.1);
        let span = y.end - y.start;
        // Extra year on the right for the gap annotation.
        let x = FIRST_YEAR as f64 - 0.5..LAST_YEAR as f64 + 1.5;
        let mut chart = StaticChartRenderer::year_chart(
            &body,
            style,
            x,
            y,
            "Esperanza de Vida a los 65 años (años)",
            1,
            None,
        )?;

        StaticChartRenderer::covid_band(&mut chart, style, 0.4)?;
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

        let ink = style.palette.ink.rgb();
        let arrow_x = LAST_YEAR as f64 + 0.3;
        StaticChartRenderer::arrow(
            root,
            style,
            StaticChartRenderer::to_px(&chart, (arrow_x, data.male_latest)),
            StaticChartRenderer::to_px(&chart, (arrow_x, data.female_latest)),
            ink,
            2.0,
            true,
        )?;
        let gap_text = format!("{:.1} años", data.gap);
        StaticChartRenderer::text_lines(
            root,
            &["Brecha", &gap_text],
            StaticChartRenderer::to_px(
                &chart,
                (
                    LAST_YEAR as f64 + 0.5,
                    (data.male_latest + data.female_latest) / 2.0,
                ),
            ),
            &style.bold(11.0),
            HPos::Left,
            VPos::Center,
        )?;

        let female = format!("{:.1}", data.female_latest);
        StaticChartRenderer::text_lines(
            root,
            &[&female],
            StaticChartRenderer::to_px(
                &chart,
                (LAST_YEAR as f64 + 0.1, data.female_latest + span * 0.02),
            ),
            &style.bold_colored(10.0, style.sex_color(Sex::Female)),
            HPos::Left,
            VPos::Bottom,
        )?;
        let male = format!("{:.1}", data.male_latest);
        StaticChartRenderer::text_lines(
            root,
            &[&male],
            StaticChartRenderer::to_px(
                &chart,
                (LAST_YEAR as f64 + 0.1, data.male_latest - span * 0.02),
            ),
            &style.bold_colored(10.0, style.sex_color(Sex::Male)),
            HPos::Left,
            VPos::Top,
        )?;

        StaticChartRenderer::legend(&mut chart, style, SeriesLabelPosition::LowerRight)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::{region_life, synthetic_dataset};

    #[test]
    fn gap_is_female_minus_male_in_last_year() {
        let data = compute(&synthetic_dataset()).unwrap();
        assert_eq!(data.male_latest, region_life(Sex::Male, LAST_YEAR));
        assert_eq!(data.female_latest, region_life(Sex::Female, LAST_YEAR));
        assert!((data.gap - 4.0).abs() < 1e-9);
        let order: Vec<Sex> = data.series.iter().map(|s| s.0).collect();
        assert_eq!(order, SERIES_ORDER.to_vec());
    }
}
