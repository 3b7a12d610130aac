pub mod analyze;
pub mod classify;
pub mod config;

use std::path::{Path, PathBuf};

use attention_core::{AnalysisWindow, Config};
use chrono::NaiveDate;
use clap::Args;
use serde::de::DeserializeOwned;

/// Input and window flags shared by `analyze` and `classify`.
#[derive(Args)]
pub struct InputArgs {
    /// JSON array of calendar events
    #[arg(long)]
    pub events: PathBuf,
    /// Config file (defaults to the user config, or built-in defaults)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// First day of the window (YYYY-MM-DD)
    #[arg(long)]
    pub from: NaiveDate,
    /// Day after the last day of the window (YYYY-MM-DD)
    #[arg(long)]
    pub to: NaiveDate,
    /// Print machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

impl InputArgs {
    pub fn load_config(&self) -> Result<Config, Box<dyn std::error::Error>> {
        let config = match &self.config {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };
        Ok(config)
    }

    /// Window between local midnights of `--from` and `--to`.
    pub fn window(&self, config: &Config) -> Result<AnalysisWindow, Box<dyn std::error::Error>> {
        Ok(AnalysisWindow::from_dates(config.tz()?, self.from, self.to)?)
    }
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, Box<dyn std::error::Error>> {
    attention_core::events::read_json(path).map_err(|e| format!("{}: {e}", path.display()).into())
}
