//! Figures module - the thirteen fixed figures
//!
//! Every figure is split into a pure `compute_*` step that returns the
//! numbers it shows and a `render_*` step that draws them.

pub mod causes;
pub mod correlation;
pub mod covid;
pub mod dashboard;
pub mod life_expectancy;
pub mod mortality;
pub mod suicide;
pub mod territory;

use crate::charts::{RenderError, Style};
use crate::data::schema::{Cause, Metric, Sex, FIRST_YEAR, LAST_YEAR};
use crate::data::{DataProcessor, QueryError, Selection};
use crate::stats::{StatsCalculator, StatsError};
use log::{error, info};
use polars::prelude::DataFrame;
use std::ops::Range;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FigureError {
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Stats(#[from] StatsError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("Cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// The thirteen figures, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FigureKind {
    GeneralMortality,
    CauseHierarchy,
    SpecificCauses,
    GenderRatio,
    SexComparison,
    LifeExpectancy,
    DepartmentRanking,
    DepartmentHeatmap,
    SuicideTrend,
    Correlation,
    Provinces,
    CovidImpact,
    Dashboard,
}

impl FigureKind {
    pub const ALL: [FigureKind; 13] = [
        FigureKind::GeneralMortality,
        FigureKind::CauseHierarchy,
        FigureKind::SpecificCauses,
        FigureKind::GenderRatio,
        FigureKind::SexComparison,
        FigureKind::LifeExpectancy,
        FigureKind::DepartmentRanking,
        FigureKind::DepartmentHeatmap,
        FigureKind::SuicideTrend,
        FigureKind::Correlation,
        FigureKind::Provinces,
        FigureKind::CovidImpact,
        FigureKind::Dashboard,
    ];

    /// 1-based figure number.
    pub fn number(self) -> u8 {
        Self::ALL
            .iter()
            .position(|k| *k == self)
            .map_or(0, |i| i as u8 + 1)
    }

    pub fn from_number(number: u8) -> Option<Self> {
        Self::ALL.get((number as usize).checked_sub(1)?).copied()
    }

    pub fn file_name(self) -> &'static str {
        match self {
            FigureKind::GeneralMortality => "fig1_evolucion_mortalidad_general.png",
            FigureKind::CauseHierarchy => "fig2_jerarquia_causas_mortalidad.png",
            FigureKind::SpecificCauses => "fig3_evolucion_causas_especificas.png",
            FigureKind::GenderRatio => "fig4_disparidad_genero_ratio.png",
            FigureKind::SexComparison => "fig5_comparativa_sexo_causa.png",
            FigureKind::LifeExpectancy => "fig6_esperanza_vida_genero.png",
            FigureKind::DepartmentRanking => "fig7_ranking_departamentos.png",
            FigureKind::DepartmentHeatmap => "fig8_heatmap_departamentos.png",
            FigureKind::SuicideTrend => "fig9_tendencia_suicidio.png",
            FigureKind::Correlation => "fig10_scatter_correlacion.png",
            FigureKind::Provinces => "fig11_comparativa_provincias.png",
            FigureKind::CovidImpact => "fig12_impacto_covid.png",
            FigureKind::Dashboard => "fig13_dashboard_resumen.png",
        }
    }

    /// Progress heading logged before the figure is built.
    pub fn heading(self) -> &'static str {
        match self {
            FigureKind::GeneralMortality => "Evolución de la Mortalidad General (2010-2023)",
            FigureKind::CauseHierarchy => "Jerarquía de Causas de Mortalidad",
            FigureKind::SpecificCauses => "Evolución Temporal por Causa Específica",
            FigureKind::GenderRatio => "Disparidades de Género - Ratio H/M",
            FigureKind::SexComparison => "Comparativa de Tasas por Sexo y Causa",
            FigureKind::LifeExpectancy => "Esperanza de Vida por Sexo",
            FigureKind::DepartmentRanking => "Ranking de Departamentos de Salud",
            FigureKind::DepartmentHeatmap => "Heatmap - Mortalidad por Departamento y Año",
            FigureKind::SuicideTrend => "Tendencia del Suicidio",
            FigureKind::Correlation => "Scatter - Correlación Mortalidad vs Esperanza de Vida",
            FigureKind::Provinces => "Comparativa por Provincias",
            FigureKind::CovidImpact => "Impacto COVID-19 - Análisis Detallado",
            FigureKind::Dashboard => "Dashboard Resumen",
        }
    }

    /// Compute and render this figure into `output_dir`.
    pub fn generate(
        self,
        df: &DataFrame,
        style: &Style,
        output_dir: &Path,
    ) -> Result<PathBuf, FigureError> {
        let path = output_dir.join(self.file_name());
        match self {
            FigureKind::GeneralMortality => {
                mortality::render_general(&mortality::compute_general(df)?, style, &path)?
            }
            FigureKind::CauseHierarchy => {
                causes::render_hierarchy(&causes::compute_hierarchy(df)?, style, &path)?
            }
            FigureKind::SpecificCauses => {
                mortality::render_specific(&mortality::compute_specific(df)?, style, &path)?
            }
            FigureKind::GenderRatio => {
                causes::render_gender_ratio(&causes::compute_gender_ratio(df)?, style, &path)?
            }
            FigureKind::SexComparison => {
                causes::render_sex_comparison(&causes::compute_sex_comparison(df)?, style, &path)?
            }
            FigureKind::LifeExpectancy => {
                life_expectancy::render(&life_expectancy::compute(df)?, style, &path)?
            }
            FigureKind::DepartmentRanking => {
                territory::render_ranking(&territory::compute_ranking(df)?, style, &path)?
            }
            FigureKind::DepartmentHeatmap => {
                territory::render_heatmap(&territory::compute_heatmap(df)?, style, &path)?
            }
            FigureKind::SuicideTrend => suicide::render(&suicide::compute(df)?, style, &path)?,
            FigureKind::Correlation => {
                correlation::render(&correlation::compute(df)?, style, &path)?
            }
            FigureKind::Provinces => {
                territory::render_provinces(&territory::compute_provinces(df)?, style, &path)?
            }
            FigureKind::CovidImpact => covid::render(&covid::compute(df)?, style, &path)?,
            FigureKind::Dashboard => dashboard::render(&dashboard::compute(df)?, style, &path)?,
        }
        Ok(path)
    }
}

/// Outcome of a run over several figures.
#[derive(Debug, Default)]
pub struct RunReport {
    pub written: Vec<PathBuf>,
    pub failed: Vec<(FigureKind, FigureError)>,
}

/// Figures selected by number; all of them when `only` is empty.
pub fn select(only: &[u8]) -> Vec<FigureKind> {
    if only.is_empty() {
        return FigureKind::ALL.to_vec();
    }
    FigureKind::ALL
        .into_iter()
        .filter(|k| only.contains(&k.number()))
        .collect()
}

/// Generate the selected figures in order.
///
/// Without `keep_going` the first failure is returned and later figures are
/// not attempted; files already written stay on disk.
pub fn generate_all(
    df: &DataFrame,
    style: &Style,
    output_dir: &Path,
    figures: &[FigureKind],
    keep_going: bool,
) -> Result<RunReport, FigureError> {
    std::fs::create_dir_all(output_dir).map_err(|source| FigureError::OutputDir {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let mut report = RunReport::default();
    for &kind in figures {
        info!("FIGURA {}: {}", kind.number(), kind.heading());
        match kind.generate(df, style, output_dir) {
            Ok(path) => {
                info!("Guardada: {}", path.display());
                report.written.push(path);
            }
            Err(e) => {
                error!("Figure {} ({}) failed: {}", kind.number(), kind.file_name(), e);
                if !keep_going {
                    return Err(e);
                }
                report.failed.push((kind, e));
            }
        }
    }
    Ok(report)
}

/// x range that frames every year of the dataset.
pub(crate) fn year_axis() -> Range<f64> {
    FIRST_YEAR as f64 - 0.5..LAST_YEAR as f64 + 0.5
}

pub(crate) fn to_points(series: &[(i32, f64)]) -> Vec<(f64, f64)> {
    series.iter().map(|&(y, v)| (y as f64, v)).collect()
}

/// Regional General mortality for both sexes.
pub(crate) fn region_general_both() -> Selection {
    Selection::region().cause(Cause::General).sex(Sex::Both)
}

/// Mortality rate of a selection in one year, exactly one row expected.
pub(crate) fn rate_in(df: &DataFrame, selection: &Selection, year: i32) -> Result<f64, FigureError> {
    Ok(DataProcessor::value_at(
        df,
        &selection.clone().period(year),
        Metric::MortalityRate,
    )?)
}

/// Male over female mean regional mortality for a cause.
pub(crate) fn male_female_ratio(df: &DataFrame, cause: Cause) -> Result<f64, FigureError> {
    let base = Selection::region().cause(cause);
    let male = DataProcessor::mean(df, &base.clone().sex(Sex::Male), Metric::MortalityRate)?;
    let female = DataProcessor::mean(df, &base.sex(Sex::Female), Metric::MortalityRate)?;
    Ok(StatsCalculator::ratio(male, female)?)
}

/// Percent change of a selection's rate between two years.
pub(crate) fn change_between(
    df: &DataFrame,
    selection: &Selection,
    start: i32,
    end: i32,
) -> Result<(f64, f64, f64), FigureError> {
    let first = rate_in(df, selection, start)?;
    let last = rate_in(df, selection, end)?;
    let change = StatsCalculator::percent_change(first, last)?;
    Ok((first, last, change))
}

/// "↓ 10.0%" or "↑ 4.2%".
pub(crate) fn trend_arrow(change: f64) -> String {
    if change < 0.0 {
        format!("↓ {:.1}%", change.abs())
    } else {
        format!("↑ {:.1}%", change)
    }
}

/// Minimum and maximum of several series' values.
pub(crate) fn value_extent<'a>(series: impl IntoIterator<Item = &'a [(i32, f64)]>) -> (f64, f64) {
    StatsCalculator::extent(series.into_iter().flatten().map(|&(_, v)| v)).unwrap_or((0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::{self, synthetic_dataset, Row};

    #[test]
    fn figure_numbers_and_files_line_up() {
        for (i, kind) in FigureKind::ALL.iter().enumerate() {
            let n = i as u8 + 1;
            assert_eq!(kind.number(), n);
            assert_eq!(FigureKind::from_number(n), Some(*kind));
            assert!(kind.file_name().starts_with(&format!("fig{}_", n)));
            assert!(kind.file_name().ends_with(".png"));
        }
        assert_eq!(FigureKind::from_number(0), None);
        assert_eq!(FigureKind::from_number(14), None);
    }

    #[test]
    fn select_keeps_output_order() {
        assert_eq!(select(&[]).len(), 13);
        assert_eq!(
            select(&[12, 3]),
            vec![FigureKind::SpecificCauses, FigureKind::CovidImpact]
        );
    }

    #[test]
    fn ten_percent_decline_between_first_and_last_year() {
        let df = fixtures::frame(&[
            Row::region(Cause::General, Sex::Both, 2010, 100.0),
            Row::region(Cause::General, Sex::Both, 2023, 90.0),
        ]);
        let (first, last, change) = change_between(&df, &region_general_both(), 2010, 2023).unwrap();
        assert_eq!((first, last), (100.0, 90.0));
        assert!((change + 10.0).abs() < 1e-9);
        assert_eq!(trend_arrow(change), "↓ 10.0%");
        assert_eq!(trend_arrow(11.24), "↑ 11.2%");
    }

    #[test]
    fn ratio_with_zero_female_rate_is_an_error() {
        let df = fixtures::frame(&[
            Row::region(Cause::Suicide, Sex::Male, 2010, 12.0),
            Row::region(Cause::Suicide, Sex::Female, 2010, 0.0),
        ]);
        assert!(matches!(
            male_female_ratio(&df, Cause::Suicide),
            Err(FigureError::Stats(StatsError::ZeroDenominator { .. }))
        ));
    }

    #[test]
    fn missing_year_is_not_found() {
        let df = synthetic_dataset();
        let err = rate_in(&df, &region_general_both(), 2030).unwrap_err();
        assert!(matches!(err, FigureError::Query(QueryError::NotFound(_))));
    }

    #[test]
    fn stops_at_first_failure_unless_keep_going() {
        // Only cancer rows: figure 1 cannot be computed.
        let df = fixtures::frame(&[Row::region(Cause::Cancer, Sex::Both, 2010, 250.0)]);
        let dir = tempfile::tempdir().unwrap();
        let style = Style::default();
        let figures = [FigureKind::GeneralMortality, FigureKind::LifeExpectancy];

        let err = generate_all(&df, &style, dir.path(), &figures, false).unwrap_err();
        assert!(matches!(err, FigureError::Query(_)));

        let report = generate_all(&df, &style, dir.path(), &figures, true).unwrap();
        assert!(report.written.is_empty());
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.failed[0].0, FigureKind::GeneralMortality);
    }

    fn same_twice<T: PartialEq + std::fmt::Debug>(
        compute: impl Fn(&DataFrame) -> Result<T, FigureError>,
        df: &DataFrame,
    ) {
        assert_eq!(compute(df).unwrap(), compute(df).unwrap());
    }

    #[test]
    fn figure_data_is_deterministic() {
        let df = synthetic_dataset();
        same_twice(mortality::compute_general, &df);
        same_twice(causes::compute_hierarchy, &df);
        same_twice(mortality::compute_specific, &df);
        same_twice(causes::compute_gender_ratio, &df);
        same_twice(causes::compute_sex_comparison, &df);
        same_twice(life_expectancy::compute, &df);
        same_twice(territory::compute_ranking, &df);
        same_twice(territory::compute_heatmap, &df);
        same_twice(suicide::compute, &df);
        same_twice(correlation::compute, &df);
        same_twice(territory::compute_provinces, &df);
        same_twice(covid::compute, &df);
        same_twice(dashboard::compute, &df);
    }

    #[test]
    fn renders_every_figure_from_synthetic_data() {
        let style = Style {
            dpi: 60,
            ..Style::default()
        };
        if !style.has_font() {
            eprintln!("skipping: no '{}' font installed", style.font_family);
            return;
        }
        let df = synthetic_dataset();
        let dir = tempfile::tempdir().unwrap();
        let report = generate_all(&df, &style, dir.path(), &FigureKind::ALL, false).unwrap();
        assert_eq!(report.written.len(), 13);
        for path in &report.written {
            assert!(path.exists(), "{}", path.display());
        }
    }
}
