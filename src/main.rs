//! Mortality Charts - Static figures for the Comunitat Valenciana
//!
//! Reads the mortality and life-expectancy CSV and writes the thirteen PNG
//! figures of the report.

mod charts;
mod config;
mod data;
mod figures;
mod stats;

use anyhow::{bail, Context, Result};
use clap::Parser;
use config::{Cli, RunConfig};
use data::{DataLoader, LoaderError};
use env_logger::Env;
use log::{error, info};
use polars::prelude::DataFrame;
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    let config = RunConfig::from_cli(cli).context("Invalid configuration")?;
    info!("Mortalidad y Esperanza de Vida - Comunitat Valenciana 2010-2023");

    let mut loader = DataLoader::with_separator(config.separator);
    loader
        .load_csv(&config.input)
        .with_context(|| format!("Cannot load {}", config.input.display()))?;
    let df = loader
        .into_dataframe()
        .ok_or(LoaderError::Empty)
        .context("Dataset is empty")?;

    let selected = figures::select(&config.only);
    let report = figures::generate_all(
        &df,
        &config.style,
        &config.output_dir,
        &selected,
        config.keep_going,
    )
    .context("Figure generation stopped")?;

    info!(
        "COMPLETADO: {} figuras generadas en '{}/'",
        report.written.len(),
        config.output_dir.display()
    );
    for (kind, e) in &report.failed {
        error!("  fig{}: {}", kind.number(), e);
    }

    if let Some(path) = &config.summary_json {
        write_summary(&df, path)?;
        info!("Indicadores: {}", path.display());
    }

    if !report.failed.is_empty() {
        bail!("{} figure(s) failed", report.failed.len());
    }
    Ok(())
}

/// Dashboard indicators as pretty JSON.
fn write_summary(df: &DataFrame, path: &Path) -> Result<()> {
    let kpis = figures::dashboard::compute(df).context("Cannot compute dashboard indicators")?;
    let json = serde_json::to_string_pretty(&kpis)?;
    std::fs::write(path, json).with_context(|| format!("Cannot write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::{self, synthetic_dataset, Row};
    use crate::data::schema::{Cause, Sex};

    #[test]
    fn summary_json_holds_dashboard_indicators() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kpis.json");
        write_summary(&synthetic_dataset(), &path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(json.get("computed_gender_gap").is_some());
        assert!(json.get("covid_excess_pct").is_some());
    }

    #[test]
    fn summary_failure_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kpis.json");
        let df = fixtures::frame(&[Row::region(Cause::Cancer, Sex::Both, 2010, 250.0)]);

        let err = write_summary(&df, &path).unwrap_err();
        assert!(err.to_string().contains("dashboard indicators"));
        assert!(!path.exists());
    }
}
