//! Data Processor Module
//! Equality selections, exact lookups, group means and pivots over the
//! loaded dataset.

use crate::data::schema::{
    Cause, GeoLevel, Metric, Sex, CAUSE, GEO_LEVEL, LOCATION, PERIOD, PROVINCE, REGION, SEX,
};
use polars::prelude::*;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("No rows match {0}")]
    NotFound(String),
    #[error("{count} rows match {selection}, expected exactly one")]
    Ambiguous { selection: String, count: usize },
}

/// Conjunction of equality predicates over the categorical columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub location: Option<String>,
    pub cause: Option<Cause>,
    pub sex: Option<Sex>,
    pub level: Option<GeoLevel>,
    pub province: Option<String>,
    pub period: Option<i32>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows of the regional aggregate.
    pub fn region() -> Self {
        Self::new().location(REGION)
    }

    pub fn location(mut self, location: &str) -> Self {
        self.location = Some(location.to_string());
        self
    }

    pub fn cause(mut self, cause: Cause) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn sex(mut self, sex: Sex) -> Self {
        self.sex = Some(sex);
        self
    }

    pub fn level(mut self, level: GeoLevel) -> Self {
        self.level = Some(level);
        self
    }

    pub fn province(mut self, province: &str) -> Self {
        self.province = Some(province.to_string());
        self
    }

    pub fn period(mut self, period: i32) -> Self {
        self.period = Some(period);
        self
    }

    /// Compile to a Polars predicate.
    pub fn to_expr(&self) -> Expr {
        let mut expr = lit(true);
        if let Some(location) = &self.location {
            expr = expr.and(col(LOCATION).eq(lit(location.clone())));
        }
        if let Some(cause) = self.cause {
            expr = expr.and(col(CAUSE).eq(lit(cause.as_str())));
        }
        if let Some(sex) = self.sex {
            expr = expr.and(col(SEX).eq(lit(sex.as_str())));
        }
        if let Some(level) = self.level {
            expr = expr.and(col(GEO_LEVEL).eq(lit(level.as_str())));
        }
        if let Some(province) = &self.province {
            expr = expr.and(col(PROVINCE).eq(lit(province.clone())));
        }
        if let Some(period) = self.period {
            expr = expr.and(col(PERIOD).eq(lit(period)));
        }
        expr
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(location) = &self.location {
            parts.push(format!("{LOCATION}={location}"));
        }
        if let Some(cause) = self.cause {
            parts.push(format!("{CAUSE}={}", cause.as_str()));
        }
        if let Some(sex) = self.sex {
            parts.push(format!("{SEX}={}", sex.as_str()));
        }
        if let Some(level) = self.level {
            parts.push(format!("{GEO_LEVEL}={}", level.as_str()));
        }
        if let Some(province) = &self.province {
            parts.push(format!("{PROVINCE}={province}"));
        }
        if let Some(period) = self.period {
            parts.push(format!("{PERIOD}={period}"));
        }
        if parts.is_empty() {
            write!(f, "[all rows]")
        } else {
            write!(f, "[{}]", parts.join(", "))
        }
    }
}

/// Mean of a metric for one group of key values.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMean {
    pub keys: Vec<String>,
    pub mean: f64,
}

impl GroupMean {
    /// First key value (the only one for single-key groupings).
    pub fn key(&self) -> &str {
        self.keys.first().map(String::as_str).unwrap_or("")
    }
}

/// Location x year matrix of mean values.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotTable {
    pub rows: Vec<String>,
    pub years: Vec<i32>,
    /// `cells[row][year_index]`, `None` where the pair has no data.
    pub cells: Vec<Vec<Option<f64>>>,
}

impl PivotTable {
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.years.len())
    }

    /// Minimum and maximum over the populated cells.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.cells
            .iter()
            .flatten()
            .flatten()
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Order two values ascending or descending with NaN after every number.
pub fn compare_nan_last(a: f64, b: f64, descending: bool) -> std::cmp::Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => std::cmp::Ordering::Equal,
        (true, false) => std::cmp::Ordering::Greater,
        (false, true) => std::cmp::Ordering::Less,
        (false, false) if descending => b.total_cmp(&a),
        (false, false) => a.total_cmp(&b),
    }
}

/// Read-only queries over the observation table.
pub struct DataProcessor;

impl DataProcessor {
    /// Rows matching a selection.
    pub fn filter(df: &DataFrame, selection: &Selection) -> Result<DataFrame, QueryError> {
        let filtered = df.clone().lazy().filter(selection.to_expr()).collect()?;
        Ok(filtered)
    }

    /// `(period, value)` pairs for a selection, ordered by period.
    pub fn series(
        df: &DataFrame,
        selection: &Selection,
        metric: Metric,
    ) -> Result<Vec<(i32, f64)>, QueryError> {
        let filtered = Self::filter(df, selection)?;
        let periods = filtered.column(PERIOD)?.as_materialized_series().i32()?.clone();
        let values = filtered
            .column(metric.column())?
            .as_materialized_series()
            .f64()?
            .clone();

        let mut points: Vec<(i32, f64)> = periods
            .into_iter()
            .zip(values.into_iter())
            .filter_map(|(p, v)| match (p, v) {
                (Some(p), Some(v)) if !v.is_nan() => Some((p, v)),
                _ => None,
            })
            .collect();
        if points.is_empty() {
            return Err(QueryError::NotFound(selection.to_string()));
        }
        points.sort_by_key(|&(p, _)| p);
        Ok(points)
    }

    /// The single value a selection identifies.
    pub fn value_at(
        df: &DataFrame,
        selection: &Selection,
        metric: Metric,
    ) -> Result<f64, QueryError> {
        let values = Self::values(df, selection, metric)?;
        match values.as_slice() {
            [] => Err(QueryError::NotFound(selection.to_string())),
            [value] => Ok(*value),
            many => Err(QueryError::Ambiguous {
                selection: selection.to_string(),
                count: many.len(),
            }),
        }
    }

    /// Non-null values of a metric for a selection, in row order.
    pub fn values(
        df: &DataFrame,
        selection: &Selection,
        metric: Metric,
    ) -> Result<Vec<f64>, QueryError> {
        let filtered = Self::filter(df, selection)?;
        let values = filtered
            .column(metric.column())?
            .as_materialized_series()
            .f64()?
            .into_iter()
            .flatten()
            .filter(|v| !v.is_nan())
            .collect();
        Ok(values)
    }

    /// Mean of a metric over a selection.
    pub fn mean(df: &DataFrame, selection: &Selection, metric: Metric) -> Result<f64, QueryError> {
        let values = Self::values(df, selection, metric)?;
        if values.is_empty() {
            return Err(QueryError::NotFound(selection.to_string()));
        }
        Ok(values.iter().sum::<f64>() / values.len() as f64)
    }

    /// Mean of a metric per distinct combination of `keys`.
    ///
    /// Groups keep the order in which they first appear in the table.
    pub fn group_mean(
        df: &DataFrame,
        selection: &Selection,
        keys: &[&str],
        metric: Metric,
    ) -> Result<Vec<GroupMean>, QueryError> {
        let key_exprs: Vec<Expr> = keys.iter().map(|k| col(*k)).collect();
        let grouped = df
            .clone()
            .lazy()
            .filter(selection.to_expr())
            .group_by_stable(key_exprs)
            .agg([col(metric.column()).mean().alias("mean")])
            .collect()?;

        if grouped.height() == 0 {
            return Err(QueryError::NotFound(selection.to_string()));
        }

        let key_columns = keys
            .iter()
            .map(|k| {
                Ok(grouped
                    .column(k)?
                    .as_materialized_series()
                    .str()?
                    .into_iter()
                    .map(|v| v.unwrap_or_default().to_string())
                    .collect::<Vec<_>>())
            })
            .collect::<Result<Vec<_>, PolarsError>>()?;
        let means = grouped.column("mean")?.as_materialized_series().f64()?.clone();

        let groups = means
            .into_iter()
            .enumerate()
            .map(|(i, mean)| GroupMean {
                keys: key_columns.iter().map(|c| c[i].clone()).collect(),
                mean: mean.unwrap_or(f64::NAN),
            })
            .collect();
        Ok(groups)
    }

    /// Stable sort of group means by value; NaN means go last either way.
    pub fn rank(mut groups: Vec<GroupMean>, descending: bool) -> Vec<GroupMean> {
        groups.sort_by(|a, b| compare_nan_last(a.mean, b.mean, descending));
        groups
    }

    /// Location x year matrix of mean values, rows by descending row mean.
    pub fn pivot_by_year(
        df: &DataFrame,
        selection: &Selection,
        metric: Metric,
    ) -> Result<PivotTable, QueryError> {
        let cells = Self::group_mean_by_year(df, selection, metric)?;

        let mut rows: Vec<String> = Vec::new();
        let mut years: Vec<i32> = Vec::new();
        for (location, year, _) in &cells {
            if !rows.contains(location) {
                rows.push(location.clone());
            }
            if !years.contains(year) {
                years.push(*year);
            }
        }
        years.sort_unstable();

        let mut matrix = vec![vec![None; years.len()]; rows.len()];
        for (location, year, mean) in cells {
            let r = rows.iter().position(|l| *l == location);
            let c = years.iter().position(|y| *y == year);
            if let (Some(r), Some(c)) = (r, c) {
                matrix[r][c] = mean;
            }
        }

        // Row mean is only used for ordering.
        let row_mean = |row: &[Option<f64>]| {
            let present: Vec<f64> = row.iter().flatten().copied().collect();
            if present.is_empty() {
                f64::NAN
            } else {
                present.iter().sum::<f64>() / present.len() as f64
            }
        };
        let mut order: Vec<usize> = (0..rows.len()).collect();
        order.sort_by(|&a, &b| {
            compare_nan_last(row_mean(&matrix[a]), row_mean(&matrix[b]), true)
        });

        Ok(PivotTable {
            rows: order.iter().map(|&i| rows[i].clone()).collect(),
            years,
            cells: order.iter().map(|&i| matrix[i].clone()).collect(),
        })
    }

    fn group_mean_by_year(
        df: &DataFrame,
        selection: &Selection,
        metric: Metric,
    ) -> Result<Vec<(String, i32, Option<f64>)>, QueryError> {
        let grouped = df
            .clone()
            .lazy()
            .filter(selection.to_expr())
            .group_by_stable([col(LOCATION), col(PERIOD)])
            .agg([col(metric.column()).mean().alias("mean")])
            .collect()?;

        if grouped.height() == 0 {
            return Err(QueryError::NotFound(selection.to_string()));
        }

        let locations = grouped.column(LOCATION)?.as_materialized_series().str()?.clone();
        let periods = grouped.column(PERIOD)?.as_materialized_series().i32()?.clone();
        let means = grouped.column("mean")?.as_materialized_series().f64()?.clone();

        let cells = locations
            .into_iter()
            .zip(periods.into_iter())
            .zip(means.into_iter())
            .filter_map(|((l, p), m)| Some((l?.to_string(), p?, m.filter(|v| !v.is_nan()))))
            .collect();
        Ok(cells)
    }

    /// Paired `(x, y)` values for rows where both metrics are present.
    pub fn pairs(
        df: &DataFrame,
        selection: &Selection,
        x: Metric,
        y: Metric,
    ) -> Result<Vec<(f64, f64)>, QueryError> {
        let filtered = Self::filter(df, selection)?;
        let xs = filtered.column(x.column())?.as_materialized_series().f64()?.clone();
        let ys = filtered.column(y.column())?.as_materialized_series().f64()?.clone();

        let points: Vec<(f64, f64)> = xs
            .into_iter()
            .zip(ys.into_iter())
            .filter_map(|(x, y)| match (x, y) {
                (Some(x), Some(y)) if !x.is_nan() && !y.is_nan() => Some((x, y)),
                _ => None,
            })
            .collect();
        if points.is_empty() {
            return Err(QueryError::NotFound(selection.to_string()));
        }
        Ok(points)
    }
}
