//! Summary dashboard (figure 13)
//!
//! Headline indicators, general mortality evolution, male/female ratios,
//! department extremes, COVID impact and the suicide trend on one canvas.

use super::{
    causes, change_between, covid, life_expectancy::life_expectancy_in, region_general_both,
    territory, to_points, trend_arrow, value_extent, year_axis, FigureError,
};
use crate::charts::{Area, Bar, MarkerKind, RenderError, StaticChartRenderer, Style};
use crate::data::schema::{Cause, Metric, Sex, FIRST_YEAR, LAST_YEAR};
use crate::data::{DataProcessor, Selection};
use crate::stats::{StatsCalculator, StatsError};
use log::info;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use polars::prelude::DataFrame;
use serde::Serialize;
use std::path::Path;

/// Life expectancy at 65 (years, 2022) published by the regional health
/// authority. Shown as-is, not derived from the loaded table.
pub const OFFICIAL_LIFE_EXPECTANCY_65: f64 = 20.6;

/// Female minus male life expectancy at 65 (years) from the same
/// publication. Shown as-is, not derived from the loaded table.
pub const OFFICIAL_GENDER_GAP: f64 = 3.8;

/// Year the official figures refer to.
pub const OFFICIAL_YEAR: i32 = 2022;

/// Last year of the historical baseline for COVID excess mortality.
pub const BASELINE_LAST_YEAR: i32 = 2019;

/// Peak COVID year compared against the baseline.
pub const EXCESS_YEAR: i32 = 2021;

/// Departments shown at each end of the extremes panel.
const EXTREMES: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CauseRatio {
    pub cause: String,
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardKpis {
    pub mortality_first: f64,
    pub mortality_latest: f64,
    pub mortality_change_pct: f64,
    pub life_expectancy_65: f64,
    pub gender_gap: f64,
    /// Gap computed from the table for the official year, for comparison.
    pub computed_gender_gap: f64,
    /// Mean General/Both rate up to the baseline's last year.
    pub historic_mean: f64,
    pub covid_excess_pct: f64,
    pub covid: covid::CovidImpact,
    /// Descending.
    pub ratios: Vec<CauseRatio>,
    /// `(max - min) / min * 100` over department means.
    pub disparity_pct: f64,
    /// Lowest departments, ascending.
    pub lowest: Vec<territory::Department>,
    /// Highest departments, ascending.
    pub highest: Vec<territory::Department>,
    pub suicide_change_pct: f64,
    #[serde(skip)]
    pub evolution: Vec<(i32, f64)>,
    #[serde(skip)]
    pub suicide: Vec<(i32, f64)>,
}

pub fn compute(df: &DataFrame) -> Result<DashboardKpis, FigureError> {
    let general = region_general_both();
    let evolution = DataProcessor::series(df, &general, Metric::MortalityRate)?;
    let (mortality_first, mortality_latest, mortality_change_pct) =
        change_between(df, &general, FIRST_YEAR, LAST_YEAR)?;

    let computed_gender_gap = life_expectancy_in(df, Sex::Female, OFFICIAL_YEAR)?
        - life_expectancy_in(df, Sex::Male, OFFICIAL_YEAR)?;
    info!(
        "Gender gap {}: {:.1} from data, {:.1} official",
        OFFICIAL_YEAR, computed_gender_gap, OFFICIAL_GENDER_GAP
    );

    let baseline: Vec<f64> = evolution
        .iter()
        .filter(|(year, _)| *year <= BASELINE_LAST_YEAR)
        .map(|&(_, v)| v)
        .collect();
    let historic_mean = StatsCalculator::mean(&baseline).ok_or(StatsError::InsufficientData {
        context: "historic baseline",
        needed: 1,
        got: 0,
    })?;
    let excess_rate = DataProcessor::value_at(
        df,
        &general.clone().period(EXCESS_YEAR),
        Metric::MortalityRate,
    )?;
    let covid_excess_pct = StatsCalculator::percent_change(historic_mean, excess_rate)?;
    let covid = covid::compute(df)?;

    let ratios = causes::compute_gender_ratio(df)?
        .ratios
        .into_iter()
        .map(|(cause, ratio)| CauseRatio {
            cause: cause.as_str().to_string(),
            ratio,
        })
        .collect();

    let ranking = territory::compute_ranking(df)?.departments;
    let n = EXTREMES.min(ranking.len());
    let lowest = ranking[..n].to_vec();
    let highest = ranking[ranking.len() - n..].to_vec();
    let (min, max) = StatsCalculator::extent(ranking.iter().map(|d| d.mean)).ok_or(
        StatsError::InsufficientData {
            context: "department disparity",
            needed: 1,
            got: 0,
        },
    )?;
    let disparity_pct = StatsCalculator::percent_change(min, max)?;

    let suicide_selection = Selection::region().cause(Cause::Suicide).sex(Sex::Both);
    let suicide = DataProcessor::series(df, &suicide_selection, Metric::MortalityRate)?;
    let (_, _, suicide_change_pct) =
        change_between(df, &suicide_selection, FIRST_YEAR, LAST_YEAR)?;

    info!(
        "Mortality {}: {:.2} ({:+.1}% vs {}), COVID excess {:+.1}%, disparity {:.1}%, suicide {:+.1}%",
        LAST_YEAR,
        mortality_latest,
        mortality_change_pct,
        FIRST_YEAR,
        covid_excess_pct,
        disparity_pct,
        suicide_change_pct
    );

    Ok(DashboardKpis {
        mortality_first,
        mortality_latest,
        mortality_change_pct,
        life_expectancy_65: OFFICIAL_LIFE_EXPECTANCY_65,
        gender_gap: OFFICIAL_GENDER_GAP,
        computed_gender_gap,
        historic_mean,
        covid_excess_pct,
        covid,
        ratios,
        disparity_pct,
        lowest,
        highest,
        suicide_change_pct,
        evolution,
        suicide,
    })
}

fn kpi_card(
    area: &Area<'_>,
    style: &Style,
    value: &str,
    value_color: RGBColor,
    label: &str,
    note: &str,
    note_color: RGBColor,
) -> Result<(), RenderError> {
    let inset = style.px(6.0) as i32;
    let card = area.margin(inset, inset, inset, inset);
    card.fill(&style.palette.panel.rgb())?;
    let (w, h) = card.dim_in_pixel();
    let at = |fy: f64| (w as i32 / 2, (h as f64 * (1.0 - fy)) as i32);
    let centred = Pos::new(HPos::Center, VPos::Center);

    card.draw(&Text::new(
        value.to_string(),
        at(0.7),
        style.bold_colored(40.0, value_color).pos(centred),
    ))?;
    card.draw(&Text::new(
        label.to_string(),
        at(0.35),
        style
            .font_colored(12.0, style.palette.muted.rgb())
            .pos(centred),
    ))?;
    card.draw(&Text::new(
        note.to_string(),
        at(0.15),
        style.bold_colored(11.0, note_color).pos(centred),
    ))?;
    Ok(())
}

/// Panel title above a sub-chart.
fn panel<'b>(area: &Area<'b>, style: &Style, title: &str) -> Result<Area<'b>, RenderError> {
    StaticChartRenderer::title_block(area, style, title, "", 11.0)
}

pub fn render(data: &DashboardKpis, style: &Style, path: &Path) -> Result<(), FigureError> {
    let p = &style.palette;
    StaticChartRenderer::render_png(path, style.canvas_size((16.0, 12.0)), |root| {
        let body = StaticChartRenderer::title_block(
            root,
            style,
            "MORTALIDAD Y ESPERANZA DE VIDA - COMUNITAT VALENCIANA 2010-2023",
            "Dashboard Resumen de Indicadores Epidemiológicos",
            16.0,
        )?;
        let rows = body.split_evenly((3, 1));

        // Headline indicators.
        let cards = rows[0].split_evenly((1, 3));
        let change_color = if data.mortality_change_pct < 0.0 {
            p.success.rgb()
        } else {
            p.danger.rgb()
        };
        kpi_card(
            &cards[0],
            style,
            &format!("{:.2}", data.mortality_latest),
            p.primary.rgb(),
            &format!("Mortalidad General {}", LAST_YEAR),
            &format!("{} vs {}", trend_arrow(data.mortality_change_pct), FIRST_YEAR),
            change_color,
        )?;
        kpi_card(
            &cards[1],
            style,
            &format!("{:.1}", data.life_expectancy_65),
            p.primary.rgb(),
            "Esperanza de Vida (65 años)",
            &format!("años ({})", OFFICIAL_YEAR),
            p.neutral.rgb(),
        )?;
        kpi_card(
            &cards[2],
            style,
            &format!("{:.1}", data.gender_gap),
            p.female.rgb(),
            "Brecha de Género (años)",
            "Mujeres viven más",
            p.female.rgb(),
        )?;

        // Evolution and ratios.
        let (width, _) = rows[1].dim_in_pixel();
        let (evolution_area, ratio_area) = rows[1].split_horizontally(width as i32 * 2 / 3);
        {
            let area = panel(&evolution_area, style, "Evolución de la Mortalidad General (2010-2023)")?;
            let (lo, hi) = value_extent([data.evolution.as_slice()]);
            let y = StaticChartRenderer::padded_range(lo, hi, 0.1);
            let floor = y.start;
            let mut chart = StaticChartRenderer::year_chart(
                &area,
                style,
                year_axis(),
                y,
                "Tasa por 100.000",
                2,
                None,
            )?;
            StaticChartRenderer::covid_band(&mut chart, style, 0.5)?;
            let points = to_points(&data.evolution);
            chart.draw_series(AreaSeries::new(
                points.iter().copied(),
                floor,
                p.primary.rgb().mix(0.1),
            ))?;
            StaticChartRenderer::line(
                &mut chart,
                style,
                &points,
                p.primary.rgb(),
                2.5,
                Some((MarkerKind::Circle, 6.0)),
                None,
            )?;
        }
        {
            let area = panel(&ratio_area, style, "Ratio Mortalidad H/M")?;
            let colors =
                StaticChartRenderer::sample(StaticChartRenderer::reds, data.ratios.len(), 0.3, 0.8);
            let bars: Vec<Bar> = data
                .ratios
                .iter()
                .zip(colors)
                .map(|(r, color)| Bar::new(r.cause.as_str(), r.ratio, color))
                .collect();
            let labels: Vec<String> = bars.iter().map(|b| b.label.clone()).collect();
            let max = bars.iter().map(|b| b.value).fold(1.0, f64::max);
            let mut chart = StaticChartRenderer::category_chart(
                &area,
                style,
                0.0..max * 1.15,
                &labels,
                "Ratio",
                9.0,
            )?;
            StaticChartRenderer::draw_hbars(&mut chart, style, &bars, 0.6, 9.0, |v| {
                format!("{:.2}x", v)
            })?;
            StaticChartRenderer::vline(&mut chart, style, 1.0, BLACK.mix(0.5), 1.5, None)?;
        }

        let bottom = rows[2].split_evenly((1, 3));
        {
            let area = panel(&bottom[0], style, "Extremos por Departamento")?;
            let mut bars: Vec<Bar> = data
                .lowest
                .iter()
                .map(|d| Bar::new(d.name.as_str(), d.mean, p.success.rgb()))
                .collect();
            bars.push(Bar::new("...", 0.0, WHITE));
            bars.extend(
                data.highest
                    .iter()
                    .map(|d| Bar::new(d.name.as_str(), d.mean, p.danger.rgb())),
            );
            let labels: Vec<String> = bars.iter().map(|b| b.label.clone()).collect();
            let max = bars.iter().map(|b| b.value).fold(1.0, f64::max);
            let mut chart = StaticChartRenderer::category_chart(
                &area,
                style,
                0.0..max * 1.15,
                &labels,
                "Tasa Mortalidad",
                8.0,
            )?;
            StaticChartRenderer::draw_hbars(&mut chart, style, &bars, 0.7, 8.0, |v| {
                if v > 0.0 {
                    format!("{:.0}", v)
                } else {
                    String::new()
                }
            })?;
        }
        {
            let area = panel(&bottom[1], style, "Impacto COVID-19")?;
            let labels: Vec<String> = ["Pre-COVID", "2020", "2021", "Post-COVID"]
                .iter()
                .map(|l| l.to_string())
                .collect();
            let values = data.covid.values();
            let colors = [p.success, p.danger, p.danger, p.primary].map(|c| c.rgb());
            let max = values.iter().copied().fold(1.0, f64::max);
            let mut chart = StaticChartRenderer::column_chart(
                &area,
                style,
                &labels,
                0.0..max * 1.15,
                "Tasa Mortalidad",
                None,
            )?;
            let bars: Vec<(f64, Bar)> = values
                .iter()
                .zip(colors)
                .zip(&labels)
                .enumerate()
                .map(|(i, ((&v, color), label))| (i as f64, Bar::new(label.as_str(), v, color)))
                .collect();
            StaticChartRenderer::draw_vbars(&mut chart, style, &bars, 0.6, 9.0, |v| {
                format!("{:.0}", v)
            })?;
            StaticChartRenderer::hline(
                &mut chart,
                style,
                data.covid.pre_covid,
                p.success.rgb().mix(0.7),
                1.5,
                true,
            )?;
        }
        {
            let title = format!("Tendencia Suicidio ({:+.1}%)", data.suicide_change_pct);
            let area = panel(&bottom[2], style, &title)?;
            let (lo, hi) = value_extent([data.suicide.as_slice()]);
            let y = StaticChartRenderer::padded_range(lo, hi, 0.15);
            let floor = y.start;
            let mut chart = StaticChartRenderer::year_chart(
                &area,
                style,
                year_axis(),
                y,
                "Tasa por 100.000",
                4,
                None,
            )?;
            let points = to_points(&data.suicide);
            let color = style.cause_color(Cause::Suicide);
            chart.draw_series(AreaSeries::new(points.iter().copied(), floor, color.mix(0.2)))?;
            StaticChartRenderer::line(
                &mut chart,
                style,
                &points,
                color,
                2.5,
                Some((MarkerKind::Circle, 5.0)),
                None,
            )?;
        }
        Ok(())
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::synthetic_dataset;
    use pretty_assertions::assert_eq;

    #[test]
    fn official_values_are_not_derived_from_the_table() {
        let data = compute(&synthetic_dataset()).unwrap();
        assert_eq!(data.life_expectancy_65, 20.6);
        assert_eq!(data.gender_gap, 3.8);
        // The fixture's own 2022 gap is 4.0.
        assert!((data.computed_gender_gap - 4.0).abs() < 1e-9);
    }

    #[test]
    fn headline_and_extra_indicators() {
        let data = compute(&synthetic_dataset()).unwrap();
        assert!((data.mortality_latest - 870.0).abs() < 1e-9);
        assert!((data.mortality_change_pct + 13.0).abs() < 1e-9);
        assert!((data.historic_mean - 955.0).abs() < 1e-9);
        assert!((data.covid_excess_pct - (961.2 - 955.0) / 955.0 * 100.0).abs() < 1e-9);
        assert!((data.disparity_pct - 200.0 / 787.0 * 100.0).abs() < 1e-9);
        assert!((data.suicide_change_pct + 13.0).abs() < 1e-9);
        assert_eq!(data.ratios[0].cause, "Suicidio");

        let lowest: Vec<&str> = data.lowest.iter().map(|d| d.name.as_str()).collect();
        let highest: Vec<&str> = data.highest.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(lowest, vec!["Alcoy", "Elche", "Gandia"]);
        assert_eq!(highest, vec!["Requena", "Vinaros", "La Plana"]);
    }

    #[test]
    fn summary_json_omits_series() {
        let data = compute(&synthetic_dataset()).unwrap();
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["life_expectancy_65"], 20.6);
        assert_eq!(json["lowest"][0]["name"], "Alcoy");
        assert!(json.get("evolution").is_none());
        assert!(json.get("suicide").is_none());
    }
}
