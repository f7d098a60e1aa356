//! Synthetic observation tables for tests.

use crate::data::schema::{
    Cause, GeoLevel, Sex, CAUSE, FIRST_YEAR, GEO_LEVEL, LAST_YEAR, LIFE_EXPECTANCY, LOCATION,
    MORTALITY_RATE, PERIOD, PROVINCE, PROVINCES, REGION, SEX,
};
use polars::prelude::*;

#[derive(Debug, Clone)]
pub struct Row {
    pub period: i32,
    pub cause: Cause,
    pub sex: Sex,
    pub location: String,
    pub province: String,
    pub level: GeoLevel,
    pub rate: Option<f64>,
    pub life_expectancy: Option<f64>,
}

impl Row {
    pub fn new(location: &str, cause: Cause, sex: Sex, period: i32, rate: f64) -> Self {
        Self {
            period,
            cause,
            sex,
            location: location.to_string(),
            province: "Valencia".to_string(),
            level: GeoLevel::Region,
            rate: Some(rate),
            life_expectancy: Some(20.0),
        }
    }

    pub fn region(cause: Cause, sex: Sex, period: i32, rate: f64) -> Self {
        Self::new(REGION, cause, sex, period, rate)
    }

    pub fn level(mut self, level: GeoLevel) -> Self {
        self.level = level;
        self
    }

    pub fn province(mut self, province: &str) -> Self {
        self.province = province.to_string();
        self
    }

    pub fn life(mut self, years: f64) -> Self {
        self.life_expectancy = Some(years);
        self
    }
}

/// Build a table with the loader's column names and dtypes.
pub fn frame(rows: &[Row]) -> DataFrame {
    DataFrame::new(vec![
        Column::new(
            PERIOD.into(),
            rows.iter().map(|r| r.period).collect::<Vec<i32>>(),
        ),
        Column::new(
            CAUSE.into(),
            rows.iter().map(|r| r.cause.as_str()).collect::<Vec<&str>>(),
        ),
        Column::new(
            SEX.into(),
            rows.iter().map(|r| r.sex.as_str()).collect::<Vec<&str>>(),
        ),
        Column::new(
            LOCATION.into(),
            rows.iter().map(|r| r.location.as_str()).collect::<Vec<&str>>(),
        ),
        Column::new(
            PROVINCE.into(),
            rows.iter().map(|r| r.province.as_str()).collect::<Vec<&str>>(),
        ),
        Column::new(
            GEO_LEVEL.into(),
            rows.iter().map(|r| r.level.as_str()).collect::<Vec<&str>>(),
        ),
        Column::new(
            MORTALITY_RATE.into(),
            rows.iter().map(|r| r.rate).collect::<Vec<Option<f64>>>(),
        ),
        Column::new(
            LIFE_EXPECTANCY.into(),
            rows.iter()
                .map(|r| r.life_expectancy)
                .collect::<Vec<Option<f64>>>(),
        ),
    ])
    .expect("fixture columns have equal length")
}

pub fn cause_base(cause: Cause) -> f64 {
    match cause {
        Cause::General => 1000.0,
        Cause::Cancer => 250.0,
        Cause::Cardio => 80.0,
        Cause::Cerebrovascular => 60.0,
        Cause::Suicide => 8.0,
    }
}

pub fn sex_factor(cause: Cause, sex: Sex) -> f64 {
    match (cause, sex) {
        (_, Sex::Both) => 1.0,
        (Cause::Suicide, Sex::Male) => 3.0,
        (Cause::Suicide, Sex::Female) => 1.0,
        (_, Sex::Male) => 1.5,
        (_, Sex::Female) => 0.75,
    }
}

/// Regional rate: 1 % linear decline per year, COVID bump on general mortality.
pub fn region_rate(cause: Cause, sex: Sex, year: i32) -> f64 {
    let trend = 1.0 - 0.01 * (year - FIRST_YEAR) as f64;
    let covid = match (cause, year) {
        (Cause::General, 2020) => 1.05,
        (Cause::General, 2021) => 1.08,
        _ => 1.0,
    };
    cause_base(cause) * sex_factor(cause, sex) * trend * covid
}

pub fn region_life(sex: Sex, year: i32) -> f64 {
    let base = match sex {
        Sex::Both => 20.0,
        Sex::Male => 18.0,
        Sex::Female => 22.0,
    };
    base + 0.1 * (year - FIRST_YEAR) as f64
}

pub const DEPARTMENTS: [(&str, &str); 6] = [
    ("Alcoy", "Alicante"),
    ("Elche", "Alicante"),
    ("Gandia", "Valencia"),
    ("Requena", "Valencia"),
    ("Vinaros", "Castellón"),
    ("La Plana", "Castellón"),
];

pub fn department_rate(index: usize, sex: Sex, year: i32) -> f64 {
    let factor = match sex {
        Sex::Both => 1.0,
        Sex::Male => 1.2,
        Sex::Female => 0.8,
    };
    (800.0 + 40.0 * index as f64 - 2.0 * (year - FIRST_YEAR) as f64) * factor
}

/// A complete table covering every selection the figures make.
pub fn synthetic_dataset() -> DataFrame {
    let mut rows = Vec::new();
    for year in FIRST_YEAR..=LAST_YEAR {
        for cause in Cause::ALL {
            for sex in Sex::ALL {
                rows.push(
                    Row::region(cause, sex, year, region_rate(cause, sex, year))
                        .life(region_life(sex, year)),
                );
            }
        }
        for (j, province) in PROVINCES.iter().enumerate() {
            let rate = 950.0 + 10.0 * j as f64 - 3.0 * (year - FIRST_YEAR) as f64;
            rows.push(
                Row::new(province, Cause::General, Sex::Both, year, rate)
                    .level(GeoLevel::Province)
                    .province(province),
            );
        }
        for (i, (name, province)) in DEPARTMENTS.iter().enumerate() {
            for sex in Sex::ALL {
                let rate = department_rate(i, sex, year);
                rows.push(
                    Row::new(name, Cause::General, sex, year, rate)
                        .level(GeoLevel::HospitalZone)
                        .province(province)
                        .life(30.0 - rate / 100.0),
                );
            }
        }
    }
    frame(&rows)
}
