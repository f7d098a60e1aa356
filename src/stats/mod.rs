//! Stats module - Descriptive statistics, trends and correlation

mod calculator;

pub use calculator::{Correlation, LinearFit, StatsCalculator, StatsError};
