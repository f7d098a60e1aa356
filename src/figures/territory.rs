//! Health departments and provinces: ranking (figure 7), department x year
//! heatmap (figure 8) and province comparison (figure 11).

use super::{region_general_both, to_points, value_extent, year_axis, FigureError};
use crate::charts::{Bar, MarkerKind, StaticChartRenderer, Style};
use crate::data::schema::{Cause, GeoLevel, Metric, Sex, LOCATION, PROVINCE, PROVINCES};
use crate::data::{DataProcessor, PivotTable, QueryError, Selection};
use crate::stats::{StatsCalculator, StatsError};
use log::{debug, info, warn};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use polars::prelude::DataFrame;
use serde::Serialize;
use std::path::Path;

/// Hospital-zone General mortality for both sexes.
pub(crate) fn department_selection() -> Selection {
    Selection::new()
        .cause(Cause::General)
        .sex(Sex::Both)
        .level(GeoLevel::HospitalZone)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Department {
    pub name: String,
    pub province: String,
    pub mean: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DepartmentRanking {
    /// Ascending by mean rate.
    pub departments: Vec<Department>,
    /// Unweighted mean of the department means.
    pub mean: f64,
}

pub fn compute_ranking(df: &DataFrame) -> Result<DepartmentRanking, FigureError> {
    let groups = DataProcessor::group_mean(
        df,
        &department_selection(),
        &[LOCATION, PROVINCE],
        Metric::MortalityRate,
    )?;
    let departments: Vec<Department> = DataProcessor::rank(groups, false)
        .into_iter()
        .map(|g| Department {
            name: g.keys[0].clone(),
            province: g.keys[1].clone(),
            mean: g.mean,
        })
        .collect();
    let means: Vec<f64> = departments.iter().map(|d| d.mean).collect();
    let mean = StatsCalculator::mean(&means).ok_or(StatsError::InsufficientData {
        context: "department mean",
        needed: 1,
        got: 0,
    })?;
    info!("{} departments, mean {:.1}", departments.len(), mean);
    Ok(DepartmentRanking { departments, mean })
}

pub fn render_ranking(
    data: &DepartmentRanking,
    style: &Style,
    path: &Path,
) -> Result<(), FigureError> {
    StaticChartRenderer::render_png(path, style.canvas_size((12.0, 10.0)), |root| {
        let body = StaticChartRenderer::title_block(
            root,
            style,
            "Ranking de Departamentos de Salud por Mortalidad General",
            "Promedio 2010-2023 - Disparidades territoriales significativas",
            13.0,
        )?;
        let bars: Vec<Bar> = data
            .departments
            .iter()
            .map(|d| Bar::new(d.name.as_str(), d.mean, style.province_color(&d.province)))
            .collect();
        let labels: Vec<String> = bars.iter().map(|b| b.label.clone()).collect();
        let (lo, hi) = StatsCalculator::extent(bars.iter().map(|b| b.value)).unwrap_or((0.0, 1.0));
        let x = StaticChartRenderer::padded_range(lo, hi, 0.15);

        let mut chart = StaticChartRenderer::category_chart(
            &body,
            style,
            x,
            &labels,
            "Tasa de Mortalidad General Promedio (por 100.000 hab.)",
            9.0,
        )?;
        StaticChartRenderer::draw_hbars(&mut chart, style, &bars, 0.7, 9.0, |v| {
            format!("{:.1}", v)
        })?;

        let swatch = style.px(4.0) as i32;
        for province in PROVINCES {
            let color = style.province_color(province);
            chart
                .draw_series(std::iter::empty::<Rectangle<(f64, f64)>>())?
                .label(province)
                .legend(move |(x, y)| {
                    Rectangle::new([(x - swatch, y - swatch), (x + swatch, y + swatch)], color.filled())
                });
        }
        StaticChartRenderer::vline(
            &mut chart,
            style,
            data.mean,
            style.palette.danger.rgb().mix(1.0),
            2.0,
            Some(format!("Media CV: {:.1}", data.mean).as_str()),
        )?;
        StaticChartRenderer::legend(&mut chart, style, SeriesLabelPosition::LowerRight)
    })?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct DepartmentHeatmap {
    pub table: PivotTable,
}

/// Columns outlined as COVID years.
const HIGHLIGHT_YEARS: [i32; 2] = [2020, 2021];

pub fn compute_heatmap(df: &DataFrame) -> Result<DepartmentHeatmap, FigureError> {
    let table =
        DataProcessor::pivot_by_year(df, &department_selection(), Metric::MortalityRate)?;
    let (rows, cols) = table.shape();
    debug!("heatmap {} departments x {} years", rows, cols);
    Ok(DepartmentHeatmap { table })
}

pub fn render_heatmap(
    data: &DepartmentHeatmap,
    style: &Style,
    path: &Path,
) -> Result<(), FigureError> {
    let table = &data.table;
    StaticChartRenderer::render_png(path, style.canvas_size((16.0, 10.0)), |root| {
        let body = StaticChartRenderer::title_block(
            root,
            style,
            "Mapa de Calor: Mortalidad General por Departamento y Año (2010-2023)",
            "Intensidad de color proporcional a la tasa - Años COVID destacados en rojo",
            13.0,
        )?;
        let (width, _) = body.dim_in_pixel();
        let (grid_area, bar_area) = body.split_horizontally(width as i32 - style.px(110.0) as i32);

        let columns: Vec<String> = table.years.iter().map(|y| y.to_string()).collect();
        let mut chart = StaticChartRenderer::grid_chart(
            &grid_area,
            style,
            &columns,
            &table.rows,
            "Año",
            "Departamento de Salud",
        )?;

        let (lo, hi) = table.value_range().unwrap_or((0.0, 1.0));
        let scale = |v: f64| if hi > lo { (v - lo) / (hi - lo) } else { 0.5 };
        let nrows = table.rows.len();
        let border = WHITE.stroke_width(style.stroke(0.5));
        let missing = RGBColor(0xe2, 0xe8, 0xf0);
        let centred = Pos::new(HPos::Center, VPos::Center);

        for (r, row) in table.cells.iter().enumerate() {
            let y = (nrows - 1 - r) as f64;
            for (c, cell) in row.iter().enumerate() {
                let x = c as f64;
                let rect = [(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)];
                let fill = cell.map_or(missing, |v| StaticChartRenderer::rdylgn_r(scale(v)));
                chart.draw_series(std::iter::once(Rectangle::new(rect, fill.filled())))?;
                chart.draw_series(std::iter::once(Rectangle::new(rect, border)))?;
                if let Some(v) = cell {
                    let ink = if StaticChartRenderer::is_dark(fill) {
                        WHITE
                    } else {
                        style.palette.ink.rgb()
                    };
                    chart.draw_series(std::iter::once(Text::new(
                        format!("{:.0}", v),
                        (x, y),
                        style.font_colored(8.0, ink).pos(centred),
                    )))?;
                }
            }
        }

        let outline = RED.stroke_width(style.stroke(3.0));
        for (c, year) in table.years.iter().enumerate() {
            if HIGHLIGHT_YEARS.contains(year) {
                let x = c as f64;
                chart.draw_series(std::iter::once(Rectangle::new(
                    [(x - 0.5, -0.5), (x + 0.5, nrows as f64 - 0.5)],
                    outline,
                )))?;
            }
        }

        StaticChartRenderer::colorbar(
            root,
            &bar_area,
            style,
            StaticChartRenderer::rdylgn_r,
            (lo, hi),
            "Tasa de Mortalidad (por 100.000 hab.)",
        )
    })?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProvinceComparison {
    /// Provinces with data, in legend order.
    pub provinces: Vec<(String, Vec<(i32, f64)>)>,
    /// Regional General/Both series.
    pub region: Vec<(i32, f64)>,
}

pub fn compute_provinces(df: &DataFrame) -> Result<ProvinceComparison, FigureError> {
    let mut provinces = Vec::new();
    for province in PROVINCES {
        let selection = Selection::new()
            .province(province)
            .level(GeoLevel::Province)
            .cause(Cause::General)
            .sex(Sex::Both);
        match DataProcessor::series(df, &selection, Metric::MortalityRate) {
            Ok(series) => provinces.push((province.to_string(), series)),
            Err(QueryError::NotFound(_)) => warn!("No province rows for {}, skipped", province),
            Err(e) => return Err(e.into()),
        }
    }
    if provinces.is_empty() {
        return Err(QueryError::NotFound("province-level General rows".to_string()).into());
    }
    let region = DataProcessor::series(df, &region_general_both(), Metric::MortalityRate)?;
    Ok(ProvinceComparison { provinces, region })
}

pub fn render_provinces(
    data: &ProvinceComparison,
    style: &Style,
    path: &Path,
) -> Result<(), FigureError> {
    StaticChartRenderer::render_png(path, style.canvas_size((14.0, 7.0)), |root| {
        let body = StaticChartRenderer::title_block(
            root,
            style,
            "Evolución de la Mortalidad General por Provincia (2010-2023)",
            "Comparativa interprovincial - Ambos sexos",
            13.0,
        )?;
        let all = data
            .provinces
            .iter()
            .map(|(_, s)| s.as_slice())
            .chain(std::iter::once(data.region.as_slice()));
        let (lo, hi) = value_extent(all);
        let mut chart = StaticChartRenderer::year_chart(
            &body,
            style,
            year_axis(),
            StaticChartRenderer::padded_range(lo, hi, 0.08),
            "Tasa de Mortalidad General (por 100.000 hab.)",
            1,
            None,
        )?;

        StaticChartRenderer::covid_band(&mut chart, style, 0.6)?;
        for (province, series) in &data.provinces {
            StaticChartRenderer::line(
                &mut chart,
                style,
                &to_points(series),
                style.province_color(province),
                2.5,
                Some((MarkerKind::Circle, 7.0)),
                Some(province),
            )?;
        }
        StaticChartRenderer::dashed_line(
            &mut chart,
            style,
            &to_points(&data.region),
            style.palette.primary.rgb().mix(0.7),
            3.0,
            Some("Media CV"),
        )?;
        StaticChartRenderer::legend(&mut chart, style, SeriesLabelPosition::UpperRight)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::{self, synthetic_dataset, Row, DEPARTMENTS};
    use pretty_assertions::assert_eq;

    #[test]
    fn ranking_ascends_and_keeps_province() {
        let data = compute_ranking(&synthetic_dataset()).unwrap();
        let names: Vec<&str> = data.departments.iter().map(|d| d.name.as_str()).collect();
        let expected: Vec<&str> = DEPARTMENTS.iter().map(|d| d.0).collect();
        assert_eq!(names, expected);
        assert_eq!(data.departments[5].province, "Castellón");
        // 800 + 40 i - 2 (y - 2010) averaged over 14 years.
        assert!((data.departments[0].mean - 787.0).abs() < 1e-9);
        assert!((data.mean - 887.0).abs() < 1e-9);
    }

    #[test]
    fn heatmap_rows_descend_by_mean() {
        let data = compute_heatmap(&synthetic_dataset()).unwrap();
        assert_eq!(data.table.shape(), (6, 14));
        assert_eq!(data.table.rows[0], "La Plana");
        assert_eq!(data.table.rows[5], "Alcoy");
        assert_eq!(data.table.cells[0][0], Some(1000.0));
    }

    #[test]
    fn provinces_without_rows_are_skipped() {
        let df = fixtures::frame(&[
            Row::region(Cause::General, Sex::Both, 2010, 1000.0),
            Row::new("Alicante", Cause::General, Sex::Both, 2010, 950.0)
                .level(GeoLevel::Province)
                .province("Alicante"),
        ]);
        let data = compute_provinces(&df).unwrap();
        assert_eq!(data.provinces, vec![("Alicante".to_string(), vec![(2010, 950.0)])]);
        assert_eq!(data.region, vec![(2010, 1000.0)]);
    }

    #[test]
    fn provinces_all_missing_is_an_error() {
        let df = fixtures::frame(&[Row::region(Cause::General, Sex::Both, 2010, 1000.0)]);
        assert!(matches!(
            compute_provinces(&df),
            Err(FigureError::Query(QueryError::NotFound(_)))
        ));
    }

    #[test]
    fn synthetic_provinces_cover_all_three() {
        let data = compute_provinces(&synthetic_dataset()).unwrap();
        assert_eq!(data.provinces.len(), 3);
        assert!(data.provinces.iter().all(|(_, s)| s.len() == 14));
    }
}
