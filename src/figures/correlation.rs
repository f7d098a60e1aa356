//! Mortality vs life expectancy across health departments (figure 10).

use super::FigureError;
use crate::charts::{AxisSpec, MarkerKind, StaticChartRenderer, Style};
use crate::data::schema::{Cause, GeoLevel, Metric, Sex};
use crate::data::{DataProcessor, Selection};
use crate::stats::{Correlation, LinearFit, StatsCalculator};
use log::info;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, VPos};
use polars::prelude::DataFrame;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct MortalityVsLife {
    /// `(rate, life expectancy)` per hospital-zone row.
    pub male: Vec<(f64, f64)>,
    pub female: Vec<(f64, f64)>,
    /// Fitted on male and female rows together.
    pub fit: LinearFit,
    pub correlation: Correlation,
}

impl MortalityVsLife {
    pub fn pooled(&self) -> Vec<(f64, f64)> {
        self.male.iter().chain(&self.female).copied().collect()
    }
}

/// "p < 0.001" below the threshold, otherwise the value.
pub fn p_value_label(p: f64) -> String {
    if p < 0.001 {
        "p < 0.001".to_string()
    } else {
        format!("p = {:.3}", p)
    }
}

pub fn compute(df: &DataFrame) -> Result<MortalityVsLife, FigureError> {
    let base = Selection::new()
        .cause(Cause::General)
        .level(GeoLevel::HospitalZone);
    let pairs = |sex: Sex| {
        DataProcessor::pairs(
            df,
            &base.clone().sex(sex),
            Metric::MortalityRate,
            Metric::LifeExpectancy,
        )
    };
    let male = pairs(Sex::Male)?;
    let female = pairs(Sex::Female)?;

    let pooled: Vec<(f64, f64)> = male.iter().chain(&female).copied().collect();
    let fit = StatsCalculator::linear_fit(&pooled)?;
    let correlation = StatsCalculator::pearson(&pooled)?;
    info!(
        "n = {}, slope {:.5}, r = {:.3}, {}",
        correlation.n,
        fit.slope,
        correlation.r,
        p_value_label(correlation.p_value)
    );

    Ok(MortalityVsLife {
        male,
        female,
        fit,
        correlation,
    })
}

pub fn render(data: &MortalityVsLife, style: &Style, path: &Path) -> Result<(), FigureError> {
    let pooled = data.pooled();
    StaticChartRenderer::render_png(path, style.canvas_size((12.0, 8.0)), |root| {
        let body = StaticChartRenderer::title_block(
            root,
            style,
            "Relación entre Mortalidad y Esperanza de Vida",
            "Datos por Departamento, Año y Sexo (2010-2023)",
            13.0,
        )?;

        let (x_lo, x_hi) =
            StatsCalculator::extent(pooled.iter().map(|p| p.0)).unwrap_or((0.0, 1.0));
        let (y_lo, y_hi) =
            StatsCalculator::extent(pooled.iter().map(|p| p.1)).unwrap_or((0.0, 1.0));
        let mut chart = StaticChartRenderer::cartesian(
            &body,
            style,
            StaticChartRenderer::padded_range(x_lo, x_hi, 0.05),
            StaticChartRenderer::padded_range(y_lo, y_hi, 0.08),
            AxisSpec::new(
                "Tasa de Mortalidad General (por 100.000 hab.)",
                "Esperanza de Vida a los 65 años (años)",
            ),
            None,
        )?;

        StaticChartRenderer::scatter(
            &mut chart,
            style,
            &data.male,
            MarkerKind::Square,
            style.sex_color(Sex::Male),
            0.6,
            Sex::Male.as_str(),
        )?;
        StaticChartRenderer::scatter(
            &mut chart,
            style,
            &data.female,
            MarkerKind::Triangle,
            style.sex_color(Sex::Female),
            0.6,
            Sex::Female.as_str(),
        )?;
        StaticChartRenderer::dashed_line(
            &mut chart,
            style,
            &[(x_lo, data.fit.predict(x_lo)), (x_hi, data.fit.predict(x_hi))],
            BLACK.mix(0.7),
            2.0,
            Some("Regresión lineal"),
        )?;

        let r_line = format!("r = {:.3}", data.correlation.r);
        let p_line = p_value_label(data.correlation.p_value);
        StaticChartRenderer::text_box(
            root,
            style,
            &["Correlación de Pearson", &r_line, &p_line],
            StaticChartRenderer::axes_px(&chart, 0.98, 0.55),
            HPos::Right,
            VPos::Center,
            &style.font(11.0),
            style.palette.panel.rgb().mix(1.0),
            RGBColor(0xe2, 0xe8, 0xf0),
        )?;

        StaticChartRenderer::legend(&mut chart, style, SeriesLabelPosition::UpperRight)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::synthetic_dataset;

    #[test]
    fn pools_male_and_female_department_rows() {
        let data = compute(&synthetic_dataset()).unwrap();
        // 6 departments x 14 years per sex.
        assert_eq!(data.male.len(), 84);
        assert_eq!(data.female.len(), 84);
        assert_eq!(data.correlation.n, 168);
        // Life expectancy is 30 - rate / 100 in the fixture.
        assert!((data.fit.slope + 0.01).abs() < 1e-9);
        assert!((data.correlation.r + 1.0).abs() < 1e-9);
        assert_eq!(p_value_label(data.correlation.p_value), "p < 0.001");
    }

    #[test]
    fn p_value_label_switches_at_threshold() {
        assert_eq!(p_value_label(0.0004), "p < 0.001");
        assert_eq!(p_value_label(0.0421), "p = 0.042");
    }
}
