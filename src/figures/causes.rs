//! Cause hierarchy (figure 2), male/female ratios (figure 4) and male vs
//! female rates per cause (figure 5).

use super::{male_female_ratio, FigureError};
use crate::charts::{Bar, StaticChartRenderer, Style};
use crate::data::schema::{Cause, Metric, Sex, CAUSE};
use crate::data::{compare_nan_last, DataProcessor, Selection};
use log::{info, warn};
use plotters::prelude::*;
use polars::prelude::DataFrame;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct CauseHierarchy {
    /// Mean regional rate per specific cause, ascending.
    pub causes: Vec<(Cause, f64)>,
}

pub fn compute_hierarchy(df: &DataFrame) -> Result<CauseHierarchy, FigureError> {
    let selection = Selection::region().sex(Sex::Both);
    let groups = DataProcessor::group_mean(df, &selection, &[CAUSE], Metric::MortalityRate)?;
    let causes = DataProcessor::rank(groups, false)
        .into_iter()
        .filter_map(|g| match Cause::from_literal(g.key()) {
            Some(Cause::General) => None,
            Some(cause) => Some((cause, g.mean)),
            None => {
                warn!("Ignoring unknown cause {:?}", g.key());
                None
            }
        })
        .collect::<Vec<_>>();
    for (cause, mean) in &causes {
        info!("{}: {:.1}", cause.label(), mean);
    }
    Ok(CauseHierarchy { causes })
}

pub fn render_hierarchy(
    data: &CauseHierarchy,
    style: &Style,
    path: &Path,
) -> Result<(), FigureError> {
    StaticChartRenderer::render_png(path, style.canvas_size((12.0, 6.0)), |root| {
        let body = StaticChartRenderer::title_block(
            root,
            style,
            "Jerarquía de Causas de Mortalidad en la Comunitat Valenciana",
            "Promedio 2010-2023 (Ambos Sexos)",
            style.title_font_pt,
        )?;
        let bars: Vec<Bar> = data
            .causes
            .iter()
            .map(|&(cause, mean)| Bar::new(cause.label(), mean, style.cause_color(cause)))
            .collect();
        let labels: Vec<String> = bars.iter().map(|b| b.label.clone()).collect();
        let max = bars.iter().map(|b| b.value).fold(0.0, f64::max);

        let mut chart = StaticChartRenderer::category_chart(
            &body,
            style,
            0.0..(max * 1.15).max(1.0),
            &labels,
            "Tasa de Mortalidad Promedio (por 100.000 hab.)",
            style.base_font_pt,
        )?;
        StaticChartRenderer::draw_hbars(&mut chart, style, &bars, 0.6, 12.0, |v| {
            format!("{:.1}", v)
        })
    })?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenderRatios {
    /// Male/female ratio of mean regional rates, descending.
    pub ratios: Vec<(Cause, f64)>,
}

pub fn compute_gender_ratio(df: &DataFrame) -> Result<GenderRatios, FigureError> {
    let mut ratios = Cause::ALL
        .iter()
        .map(|&cause| Ok((cause, male_female_ratio(df, cause)?)))
        .collect::<Result<Vec<_>, FigureError>>()?;
    ratios.sort_by(|a, b| compare_nan_last(a.1, b.1, true));
    for (cause, ratio) in &ratios {
        info!("Ratio H/M {}: {:.2}", cause.as_str(), ratio);
    }
    Ok(GenderRatios { ratios })
}

pub fn render_gender_ratio(
    data: &GenderRatios,
    style: &Style,
    path: &Path,
) -> Result<(), FigureError> {
    StaticChartRenderer::render_png(path, style.canvas_size((12.0, 7.0)), |root| {
        let body = StaticChartRenderer::title_block(
            root,
            style,
            "Disparidades de Género en Mortalidad",
            "Ratio Hombres/Mujeres por Causa (Promedio 2010-2023)",
            style.title_font_pt,
        )?;
        let colors =
            StaticChartRenderer::sample(StaticChartRenderer::rdylgn_r, data.ratios.len(), 0.2, 0.8);
        let bars: Vec<Bar> = data
            .ratios
            .iter()
            .zip(colors)
            .map(|(&(cause, ratio), color)| Bar::new(cause.label(), ratio, color))
            .collect();
        let labels: Vec<String> = bars.iter().map(|b| b.label.clone()).collect();
        let max = bars.iter().map(|b| b.value).fold(1.0, f64::max);

        let mut chart = StaticChartRenderer::category_chart(
            &body,
            style,
            0.0..max * 1.2,
            &labels,
            "Ratio de Mortalidad Hombres / Mujeres",
            12.0,
        )?;
        StaticChartRenderer::draw_hbars(&mut chart, style, &bars, 0.6, 13.0, |v| {
            format!("{:.2}x", v)
        })?;
        StaticChartRenderer::vline(
            &mut chart,
            style,
            1.0,
            style.palette.ink.rgb().mix(1.0),
            2.0,
            Some("Igualdad (ratio=1)"),
        )?;
        StaticChartRenderer::legend(&mut chart, style, SeriesLabelPosition::LowerRight)
    })?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct SexRates {
    pub cause: Cause,
    pub male: f64,
    pub female: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SexComparison {
    pub causes: Vec<SexRates>,
}

pub fn compute_sex_comparison(df: &DataFrame) -> Result<SexComparison, FigureError> {
    let causes = Cause::SPECIFIC
        .iter()
        .map(|&cause| {
            let base = Selection::region().cause(cause);
            let male = DataProcessor::mean(df, &base.clone().sex(Sex::Male), Metric::MortalityRate)?;
            let female = DataProcessor::mean(df, &base.sex(Sex::Female), Metric::MortalityRate)?;
            info!("{}: H {:.1} / M {:.1}", cause.as_str(), male, female);
            Ok(SexRates {
                cause,
                male,
                female,
            })
        })
        .collect::<Result<Vec<_>, FigureError>>()?;
    Ok(SexComparison { causes })
}

pub fn render_sex_comparison(
    data: &SexComparison,
    style: &Style,
    path: &Path,
) -> Result<(), FigureError> {
    StaticChartRenderer::render_png(path, style.canvas_size((12.0, 7.0)), |root| {
        let body = StaticChartRenderer::title_block(
            root,
            style,
            "Comparativa de Mortalidad por Sexo y Causa",
            "Comunitat Valenciana - Promedio 2010-2023",
            style.title_font_pt,
        )?;
        let labels: Vec<String> = data
            .causes
            .iter()
            .map(|c| c.cause.label().to_string())
            .collect();
        let max = data
            .causes
            .iter()
            .map(|c| c.male.max(c.female))
            .fold(0.0, f64::max);

        let mut chart = StaticChartRenderer::column_chart(
            &body,
            style,
            &labels,
            0.0..(max * 1.12).max(1.0),
            "Tasa de Mortalidad (por 100.000 hab.)",
            None,
        )?;

        let width = 0.35;
        let male_color = style.sex_color(Sex::Male);
        let female_color = style.sex_color(Sex::Female);
        let male: Vec<(f64, Bar)> = data
            .causes
            .iter()
            .enumerate()
            .map(|(i, c)| (i as f64 - width / 2.0, Bar::new("Hombres", c.male, male_color)))
            .collect();
        let female: Vec<(f64, Bar)> = data
            .causes
            .iter()
            .enumerate()
            .map(|(i, c)| (i as f64 + width / 2.0, Bar::new("Mujeres", c.female, female_color)))
            .collect();
        StaticChartRenderer::draw_vbars(&mut chart, style, &male, width, 10.0, |v| {
            format!("{:.1}", v)
        })?;
        StaticChartRenderer::draw_vbars(&mut chart, style, &female, width, 10.0, |v| {
            format!("{:.1}", v)
        })?;

        // Legend swatches for the two groups.
        let swatch = style.px(4.0) as i32;
        for (label, color) in [("Hombres", male_color), ("Mujeres", female_color)] {
            chart
                .draw_series(std::iter::empty::<Rectangle<(f64, f64)>>())?
                .label(label)
                .legend(move |(x, y)| {
                    Rectangle::new([(x - swatch, y - swatch), (x + swatch, y + swatch)], color.filled())
                });
        }
        StaticChartRenderer::legend(&mut chart, style, SeriesLabelPosition::UpperRight)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::synthetic_dataset;
    use pretty_assertions::assert_eq;

    #[test]
    fn hierarchy_excludes_general_and_ascends() {
        let data = compute_hierarchy(&synthetic_dataset()).unwrap();
        let causes: Vec<Cause> = data.causes.iter().map(|c| c.0).collect();
        assert_eq!(
            causes,
            vec![
                Cause::Suicide,
                Cause::Cerebrovascular,
                Cause::Cardio,
                Cause::Cancer
            ]
        );
        assert!(data.causes.windows(2).all(|w| w[0].1 <= w[1].1));
    }

    #[test]
    fn gender_ratios_descend_with_suicide_first() {
        let data = compute_gender_ratio(&synthetic_dataset()).unwrap();
        assert_eq!(data.ratios.len(), 5);
        assert_eq!(data.ratios[0].0, Cause::Suicide);
        assert!((data.ratios[0].1 - 3.0).abs() < 1e-9);
        // Every other cause is 1.5 / 0.75.
        assert!(data.ratios[1..].iter().all(|r| (r.1 - 2.0).abs() < 1e-9));
    }

    #[test]
    fn sex_comparison_covers_specific_causes() {
        let data = compute_sex_comparison(&synthetic_dataset()).unwrap();
        assert_eq!(data.causes.len(), 4);
        let suicide = &data.causes[3];
        assert_eq!(suicide.cause, Cause::Suicide);
        assert!((suicide.male / suicide.female - 3.0).abs() < 1e-9);
    }
}
