//! Run Configuration
//! Command-line arguments and the optional JSON style file.

use crate::charts::Style;
use clap::Parser;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read style file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid style file {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Separator {0:?} is not a single-byte character")]
    Separator(char),
    #[error("Style DPI must be between 36 and 1200, got {0}")]
    Dpi(u32),
}

/// Thirteen fixed figures from a mortality and life-expectancy CSV.
#[derive(Parser, Debug, Clone)]
#[command(name = "mortality-charts", version, about)]
pub struct Cli {
    /// Input CSV with a header row.
    pub input: PathBuf,

    /// Directory the PNG files are written to.
    #[arg(short, long, default_value = "figuras")]
    pub output_dir: PathBuf,

    /// Field separator of the input file.
    #[arg(long, default_value_t = ';')]
    pub separator: char,

    /// JSON file overriding palette, DPI and font settings.
    #[arg(long)]
    pub style: Option<PathBuf>,

    /// Only generate figure N (repeatable).
    #[arg(long = "only", value_name = "N", value_parser = clap::value_parser!(u8).range(1..=13))]
    pub only: Vec<u8>,

    /// Write the dashboard indicators as JSON.
    #[arg(long)]
    pub summary_json: Option<PathBuf>,

    /// Attempt every figure even after a failure.
    #[arg(long)]
    pub keep_going: bool,

    /// Debug-level logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Validated settings for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub separator: u8,
    pub style: Style,
    pub only: Vec<u8>,
    pub summary_json: Option<PathBuf>,
    pub keep_going: bool,
}

impl RunConfig {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let separator = Self::separator_byte(cli.separator)?;
        let style = load_style(cli.style.as_deref())?;
        let mut only = cli.only;
        only.sort_unstable();
        only.dedup();
        Ok(Self {
            input: cli.input,
            output_dir: cli.output_dir,
            separator,
            style,
            only,
            summary_json: cli.summary_json,
            keep_going: cli.keep_going,
        })
    }

    fn separator_byte(separator: char) -> Result<u8, ConfigError> {
        u8::try_from(separator)
            .ok()
            .filter(u8::is_ascii)
            .ok_or(ConfigError::Separator(separator))
    }
}

/// Default style, or the defaults overridden by a JSON file.
pub fn load_style(path: Option<&Path>) -> Result<Style, ConfigError> {
    let Some(path) = path else {
        return Ok(Style::default());
    };
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let style: Style = serde_json::from_str(&text).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    if !(36..=1200).contains(&style.dpi) {
        return Err(ConfigError::Dpi(style.dpi));
    }
    log::info!("Loaded style from {} ({} DPI)", path.display(), style.dpi);
    Ok(style)
}
