//! CSV Data Loader Module
//! Loads the `;`-separated mortality dataset with Polars and normalizes dtypes.

use crate::data::schema::{
    GeoLevel, CAUSE, GEO_LEVEL, LIFE_EXPECTANCY, LOCATION, MORTALITY_RATE, PERIOD, PROVINCE,
    REQUIRED_COLUMNS, SEX,
};
use log::info;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Field separator of the published dataset.
pub const DEFAULT_SEPARATOR: u8 = b';';

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Input file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Data format error: missing columns {missing:?} (found {found:?}); check the separator")]
    DataFormat {
        missing: Vec<String>,
        found: Vec<String>,
    },
    #[error("Failed to load CSV: {0}")]
    Csv(#[from] PolarsError),
    #[error("Dataset has no rows")]
    Empty,
}

/// Sanity figures reported after loading.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    pub rows: usize,
    pub columns: usize,
    pub period_min: Option<i32>,
    pub period_max: Option<i32>,
    pub causes: Vec<String>,
    /// Row count per geographic level, in `GeoLevel::ALL` order.
    pub levels: Vec<(GeoLevel, usize)>,
}

/// Handles CSV file loading with Polars.
pub struct DataLoader {
    separator: u8,
    df: Option<DataFrame>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self::with_separator(DEFAULT_SEPARATOR)
    }

    pub fn with_separator(separator: u8) -> Self {
        Self {
            separator,
            df: None,
        }
    }

    /// Load the dataset, keeping only the required columns with fixed dtypes.
    pub fn load_csv(&mut self, file_path: &Path) -> Result<&DataFrame, LoaderError> {
        if !file_path.exists() {
            return Err(LoaderError::NotFound(file_path.to_path_buf()));
        }
        let raw = LazyCsvReader::new(file_path)
            .with_separator(self.separator)
            .with_has_header(true)
            .with_infer_schema_length(Some(10000))
            .finish()?
            .collect()?;

        let found: Vec<String> = raw
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|c| !found.iter().any(|f| f == *c))
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(LoaderError::DataFormat { missing, found });
        }
        if raw.height() == 0 {
            return Err(LoaderError::Empty);
        }

        let df = Self::normalize(raw)?;
        self.df = Some(df);

        let summary = self.summary();
        info!(
            "Dataset loaded from {}: {} rows, {} columns",
            file_path.display(),
            summary.rows,
            summary.columns
        );
        if let (Some(min), Some(max)) = (summary.period_min, summary.period_max) {
            info!("  Period: {} - {}", min, max);
        }
        info!("  Causes: {:?}", summary.causes);
        for (level, rows) in &summary.levels {
            info!("  {}: {} rows", level.as_str(), rows);
        }

        self.get_dataframe().ok_or(LoaderError::Empty)
    }

    /// Cast the required columns to the dtypes the queries expect.
    pub fn normalize(raw: DataFrame) -> Result<DataFrame, LoaderError> {
        let df = raw
            .lazy()
            .select([
                col(PERIOD).cast(DataType::Int32),
                col(CAUSE).cast(DataType::String),
                col(SEX).cast(DataType::String),
                col(LOCATION).cast(DataType::String),
                col(PROVINCE).cast(DataType::String),
                col(GEO_LEVEL).cast(DataType::String),
                col(MORTALITY_RATE).cast(DataType::Float64),
                col(LIFE_EXPECTANCY).cast(DataType::Float64),
            ])
            .collect()?;
        Ok(df)
    }

    /// Row/column counts, period range and distinct causes.
    pub fn summary(&self) -> DatasetSummary {
        let period = self
            .df
            .as_ref()
            .and_then(|df| df.column(PERIOD).ok())
            .and_then(|c| c.as_materialized_series().i32().ok().cloned());

        DatasetSummary {
            rows: self.get_row_count(),
            columns: self.get_columns().len(),
            period_min: period.as_ref().and_then(|ca| ca.min()),
            period_max: period.as_ref().and_then(|ca| ca.max()),
            causes: self.get_unique_values(CAUSE),
            levels: self.level_counts(),
        }
    }

    fn level_counts(&self) -> Vec<(GeoLevel, usize)> {
        let mut counts = GeoLevel::ALL.map(|level| (level, 0));
        let levels = self
            .df
            .as_ref()
            .and_then(|df| df.column(GEO_LEVEL).ok())
            .and_then(|c| c.as_materialized_series().str().ok().cloned());
        if let Some(levels) = levels {
            for value in levels.into_iter().flatten() {
                let level = GeoLevel::classify(value);
                if let Some(entry) = counts.iter_mut().find(|(l, _)| *l == level) {
                    entry.1 += 1;
                }
            }
        }
        counts.to_vec()
    }

    /// Get list of column names from loaded DataFrame.
    pub fn get_columns(&self) -> Vec<String> {
        self.df
            .as_ref()
            .map(|df| {
                df.get_column_names()
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Distinct values of a string column, in order of first appearance.
    pub fn get_unique_values(&self, column: &str) -> Vec<String> {
        let Some(df) = &self.df else {
            return Vec::new();
        };

        df.column(column)
            .ok()
            .and_then(|col| col.as_materialized_series().unique_stable().ok())
            .and_then(|unique| {
                unique.str().ok().map(|ca| {
                    ca.into_iter()
                        .flatten()
                        .map(|s| s.to_string())
                        .collect()
                })
            })
            .unwrap_or_default()
    }

    /// Get the number of rows in the DataFrame.
    pub fn get_row_count(&self) -> usize {
        self.df.as_ref().map(|df| df.height()).unwrap_or(0)
    }

    /// Get a reference to the loaded DataFrame.
    pub fn get_dataframe(&self) -> Option<&DataFrame> {
        self.df.as_ref()
    }

    /// Take ownership of the loaded DataFrame.
    pub fn into_dataframe(self) -> Option<DataFrame> {
        self.df
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "periodo;causa_mortalidad;sexo;ubicacion;provincia;nivel_geografico;tasa_mortalidad;esperanza_vida";

    fn write_csv(body: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", body).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn loads_semicolon_file_and_reports_summary() {
        let file = write_csv(&format!(
            "{HEADER}\n\
             2010;General;Ambos sexos;Comunitat Valenciana;Valencia;COMUNITAT;950.5;19.8\n\
             2023;General;Ambos sexos;Comunitat Valenciana;Valencia;COMUNITAT;819.9;20.9\n\
             2023;Suicidio;Hombres;Comunitat Valenciana;Valencia;COMUNITAT;13.2;18.7\n"
        ));

        let mut loader = DataLoader::new();
        let df = loader.load_csv(file.path()).unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(df.column(PERIOD).unwrap().dtype(), &DataType::Int32);
        assert_eq!(df.column(MORTALITY_RATE).unwrap().dtype(), &DataType::Float64);

        let summary = loader.summary();
        assert_eq!(
            summary,
            DatasetSummary {
                rows: 3,
                columns: 8,
                period_min: Some(2010),
                period_max: Some(2023),
                causes: vec!["General".to_string(), "Suicidio".to_string()],
                levels: vec![
                    (GeoLevel::Region, 3),
                    (GeoLevel::Province, 0),
                    (GeoLevel::HospitalZone, 0),
                ],
            }
        );
    }

    #[test]
    fn summary_counts_rows_per_geographic_level() {
        let file = write_csv(&format!(
            "{HEADER}\n\
             2010;General;Hombres;Comunitat Valenciana;Valencia;COMUNITAT;950.5;19.8\n\
             2010;General;Hombres;Valencia;Valencia;PROVINCIA;940.0;19.9\n\
             2010;General;Hombres;Valencia Clinico;Valencia;HOSPITAL/ZONA SALUD;900.0;\n\
             2010;General;Mujeres;Valencia Clinico;Valencia;HOSPITAL/ZONA SALUD;800.0;\n"
        ));
        let mut loader = DataLoader::new();
        loader.load_csv(file.path()).unwrap();
        assert_eq!(
            loader.summary().levels,
            vec![
                (GeoLevel::Region, 1),
                (GeoLevel::Province, 1),
                (GeoLevel::HospitalZone, 2),
            ]
        );
    }

    #[test]
    fn extra_columns_are_dropped() {
        let file = write_csv(&format!(
            "{HEADER};fuente\n\
             2010;General;Ambos sexos;Comunitat Valenciana;Valencia;COMUNITAT;950.5;19.8;GVA\n"
        ));
        let mut loader = DataLoader::new();
        loader.load_csv(file.path()).unwrap();
        assert_eq!(loader.get_columns().len(), 8);
    }

    #[test]
    fn missing_file_is_not_found() {
        let mut loader = DataLoader::new();
        let err = loader
            .load_csv(Path::new("/definitely/not/here.csv"))
            .unwrap_err();
        assert!(matches!(err, LoaderError::NotFound(_)));
    }

    #[test]
    fn wrong_separator_is_data_format_error() {
        let file = write_csv(&format!(
            "{}\n2010,General,Ambos sexos,Comunitat Valenciana,Valencia,COMUNITAT,950.5,19.8\n",
            HEADER.replace(';', ",")
        ));
        let mut loader = DataLoader::new();
        let err = loader.load_csv(file.path()).unwrap_err();
        match err {
            LoaderError::DataFormat { missing, .. } => assert_eq!(missing.len(), 8),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn custom_separator_is_honoured() {
        let file = write_csv(&format!(
            "{}\n2010,General,Ambos sexos,Comunitat Valenciana,Valencia,COMUNITAT,950.5,19.8\n",
            HEADER.replace(';', ",")
        ));
        let mut loader = DataLoader::with_separator(b',');
        assert_eq!(loader.load_csv(file.path()).unwrap().height(), 1);
    }

    #[test]
    fn header_only_file_is_empty() {
        let file = write_csv(&format!("{HEADER}\n"));
        let mut loader = DataLoader::new();
        // Depending on the reader, a header-only file is either empty or unreadable.
        assert!(matches!(
            loader.load_csv(file.path()).unwrap_err(),
            LoaderError::Empty | LoaderError::Csv(_)
        ));
    }
}
