//! Statistics Calculator Module
//! Means, ratios, percent changes, least-squares trends and Pearson correlation.

use statrs::distribution::{ContinuousCDF, StudentsT};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatsError {
    #[error("{context}: denominator is {value}, result undefined")]
    ZeroDenominator { context: &'static str, value: f64 },
    #[error("{context}: need at least {needed} values, got {got}")]
    InsufficientData {
        context: &'static str,
        needed: usize,
        got: usize,
    },
    #[error("{context}: series has no variance")]
    NoVariance { context: &'static str },
}

/// Degree-1 least-squares fit of `y` against `x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_value: f64,
    pub p_value: f64,
    /// Standard error of the slope.
    pub std_err: f64,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Pearson correlation with its two-tailed p-value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correlation {
    pub r: f64,
    pub p_value: f64,
    pub n: usize,
}

/// Pure numeric helpers shared by the figures.
pub struct StatsCalculator;

impl StatsCalculator {
    /// Arithmetic mean; `None` for an empty slice.
    pub fn mean(values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }

    /// `numerator / denominator`, refusing a zero or non-finite denominator.
    pub fn ratio(numerator: f64, denominator: f64) -> Result<f64, StatsError> {
        if denominator == 0.0 || !denominator.is_finite() {
            return Err(StatsError::ZeroDenominator {
                context: "ratio",
                value: denominator,
            });
        }
        Ok(numerator / denominator)
    }

    /// `(end - start) / start * 100`, refusing a zero or non-finite start.
    pub fn percent_change(start: f64, end: f64) -> Result<f64, StatsError> {
        if start == 0.0 || !start.is_finite() {
            return Err(StatsError::ZeroDenominator {
                context: "percent change",
                value: start,
            });
        }
        Ok((end - start) / start * 100.0)
    }

    fn moments(points: &[(f64, f64)]) -> (f64, f64, f64, f64, f64) {
        let n = points.len() as f64;
        let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
        let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;
        let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
        for &(x, y) in points {
            let dx = x - mean_x;
            let dy = y - mean_y;
            sxx += dx * dx;
            syy += dy * dy;
            sxy += dx * dy;
        }
        (mean_x, mean_y, sxx, syy, sxy)
    }

    /// Two-tailed p-value of a correlation coefficient (Student t, n - 2 df).
    fn correlation_p_value(r: f64, n: usize) -> f64 {
        if n < 3 {
            return f64::NAN;
        }
        let df = (n - 2) as f64;
        let r = r.clamp(-1.0, 1.0);
        let denom = 1.0 - r * r;
        if denom <= 0.0 {
            return 0.0;
        }
        let t = r * (df / denom).sqrt();
        match StudentsT::new(0.0, 1.0, df) {
            Ok(dist) => 2.0 * (1.0 - dist.cdf(t.abs())),
            Err(_) => f64::NAN,
        }
    }

    /// Ordinary least squares of `y` on `x`.
    pub fn linear_fit(points: &[(f64, f64)]) -> Result<LinearFit, StatsError> {
        if points.len() < 2 {
            return Err(StatsError::InsufficientData {
                context: "linear fit",
                needed: 2,
                got: points.len(),
            });
        }
        let (mean_x, mean_y, sxx, syy, sxy) = Self::moments(points);
        if sxx == 0.0 {
            return Err(StatsError::NoVariance {
                context: "linear fit",
            });
        }

        let slope = sxy / sxx;
        let intercept = mean_y - slope * mean_x;
        let r_value = if syy == 0.0 {
            0.0
        } else {
            (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
        };

        let n = points.len();
        let std_err = if n > 2 {
            (((1.0 - r_value * r_value) * syy / sxx) / (n - 2) as f64).sqrt()
        } else {
            f64::NAN
        };

        Ok(LinearFit {
            slope,
            intercept,
            r_value,
            p_value: Self::correlation_p_value(r_value, n),
            std_err,
        })
    }

    /// Trend line over a yearly series.
    pub fn yearly_trend(series: &[(i32, f64)]) -> Result<LinearFit, StatsError> {
        let points: Vec<(f64, f64)> = series.iter().map(|&(y, v)| (y as f64, v)).collect();
        Self::linear_fit(&points)
    }

    /// Pearson correlation coefficient and two-tailed p-value.
    pub fn pearson(points: &[(f64, f64)]) -> Result<Correlation, StatsError> {
        if points.len() < 3 {
            return Err(StatsError::InsufficientData {
                context: "pearson correlation",
                needed: 3,
                got: points.len(),
            });
        }
        let (_, _, sxx, syy, sxy) = Self::moments(points);
        if sxx == 0.0 || syy == 0.0 {
            return Err(StatsError::NoVariance {
                context: "pearson correlation",
            });
        }
        let r = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);
        Ok(Correlation {
            r,
            p_value: Self::correlation_p_value(r, points.len()),
            n: points.len(),
        })
    }

    /// Minimum and maximum, ignoring NaN.
    pub fn extent(values: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
        values
            .into_iter()
            .filter(|v| !v.is_nan())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < EPS
    }

    #[test]
    fn percent_change_sign_follows_direction() {
        assert_eq!(StatsCalculator::percent_change(50.0, 50.0).unwrap(), 0.0);
        assert!(StatsCalculator::percent_change(50.0, 60.0).unwrap() > 0.0);
        assert!(StatsCalculator::percent_change(50.0, 40.0).unwrap() < 0.0);
        assert!(close(
            StatsCalculator::percent_change(100.0, 90.0).unwrap(),
            -10.0
        ));
    }

    #[test]
    fn percent_change_reverses_with_base_rescaling() {
        for &(a, b) in &[(100.0, 90.0), (8.0, 8.9), (819.88, 911.0), (3.0, 0.5)] {
            let forward = StatsCalculator::percent_change(a, b).unwrap();
            let backward = StatsCalculator::percent_change(b, a).unwrap();
            assert!(close(forward, -backward * (b / a)), "{a} -> {b}");
        }
    }

    #[test]
    fn percent_change_from_zero_is_an_error() {
        let err = StatsCalculator::percent_change(0.0, 10.0).unwrap_err();
        assert!(matches!(err, StatsError::ZeroDenominator { value, .. } if value == 0.0));
        assert!(StatsCalculator::percent_change(f64::NAN, 10.0).is_err());
        // A zero end value is well defined.
        assert_eq!(StatsCalculator::percent_change(10.0, 0.0).unwrap(), -100.0);
    }

    #[test]
    fn ratio_is_plain_division() {
        assert_eq!(StatsCalculator::ratio(30.0, 10.0).unwrap(), 3.0);
        assert!(matches!(
            StatsCalculator::ratio(30.0, 0.0),
            Err(StatsError::ZeroDenominator { context: "ratio", .. })
        ));
    }

    #[test]
    fn mean_of_empty_is_none() {
        assert_eq!(StatsCalculator::mean(&[]), None);
        assert_eq!(StatsCalculator::mean(&[1.0, 2.0, 6.0]), Some(3.0));
    }

    #[test]
    fn trend_recovers_perfect_line() {
        let series: Vec<(i32, f64)> = (2010..=2023)
            .map(|y| (y, 1000.0 - 5.0 * (y - 2010) as f64))
            .collect();
        let fit = StatsCalculator::yearly_trend(&series).unwrap();
        assert!((fit.slope + 5.0).abs() < 1e-9);
        assert!((fit.r_value + 1.0).abs() < 1e-12);
        assert!((fit.predict(2010.0) - 1000.0).abs() < 1e-6);
        assert!(fit.std_err.abs() < 1e-6);
        assert!(fit.p_value < 1e-10);

        let points: Vec<(f64, f64)> = series.iter().map(|&(y, v)| (v, y as f64)).collect();
        let corr = StatsCalculator::pearson(&points).unwrap();
        assert!((corr.r + 1.0).abs() < 1e-12);
        assert_eq!(corr.n, 14);
    }

    #[test]
    fn pearson_p_value_is_large_for_noise() {
        // Symmetric pattern with zero covariance.
        let points = [(1.0, 1.0), (2.0, -1.0), (3.0, -1.0), (4.0, 1.0)];
        let corr = StatsCalculator::pearson(&points).unwrap();
        assert!(corr.r.abs() < EPS);
        assert!((corr.p_value - 1.0).abs() < 1e-9);
    }

    #[test]
    fn pearson_p_value_matches_reference() {
        // r ~= 0.903 with n = 10 gives p ~= 3.4e-4 (two-tailed).
        let xs = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let ys = [2.0, 1.0, 4.0, 3.0, 7.0, 5.0, 6.0, 9.0, 10.0, 8.0];
        let points: Vec<(f64, f64)> = xs.iter().copied().zip(ys.iter().copied()).collect();
        let corr = StatsCalculator::pearson(&points).unwrap();
        let fit = StatsCalculator::linear_fit(&points).unwrap();
        assert!((corr.r - fit.r_value).abs() < EPS);
        assert!(corr.p_value > 1e-4 && corr.p_value < 1e-3);
        assert!((corr.p_value - fit.p_value).abs() < EPS);
    }

    #[test]
    fn degenerate_inputs_are_rejected() {
        assert!(matches!(
            StatsCalculator::linear_fit(&[(1.0, 2.0)]),
            Err(StatsError::InsufficientData { needed: 2, got: 1, .. })
        ));
        assert!(matches!(
            StatsCalculator::linear_fit(&[(1.0, 2.0), (1.0, 3.0)]),
            Err(StatsError::NoVariance { .. })
        ));
        assert!(matches!(
            StatsCalculator::pearson(&[(1.0, 2.0), (2.0, 2.0), (3.0, 2.0)]),
            Err(StatsError::NoVariance { .. })
        ));
    }

    #[test]
    fn extent_ignores_nan() {
        assert_eq!(
            StatsCalculator::extent([3.0, f64::NAN, -1.0, 2.0]),
            Some((-1.0, 3.0))
        );
        assert_eq!(StatsCalculator::extent(Vec::new()), None);
    }
}
