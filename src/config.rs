//! Run configuration for the `generate` binary and the batch runner.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::clean::CleanStrategy;
use crate::export::OutputFormat;
use crate::models::AdminLevel;

pub const DEFAULT_PNG_SIZE: u32 = 2400;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GenerateConfig {
    /// Root of downloaded dumps and the dataset cache
    pub data_dir: PathBuf,
    pub export_dir: PathBuf,
    /// Completed-task log, relative to `export_dir`. Empty disables resuming.
    pub log_file: PathBuf,
    pub clean: CleanStrategy,
    pub formats: Vec<OutputFormat>,
    pub combine_format_folders: bool,
    /// Empty means every country in the gazetteer
    pub countries: Vec<String>,
    pub admin_levels: Vec<AdminLevel>,
    pub task_budget_secs: Option<u64>,
    pub threads: Option<usize>,
    pub include_admin5: bool,
    pub png_size: u32,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            export_dir: PathBuf::from("export"),
            log_file: PathBuf::from("log.txt"),
            clean: CleanStrategy::default(),
            formats: OutputFormat::all(),
            combine_format_folders: false,
            countries: Vec::new(),
            admin_levels: Vec::new(),
            task_budget_secs: None,
            threads: None,
            include_admin5: false,
            png_size: DEFAULT_PNG_SIZE,
        }
    }
}

impl GenerateConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: GenerateConfig =
            toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Full path of the completed-task log, if resuming is enabled
    pub fn log_path(&self) -> Option<PathBuf> {
        if self.log_file.as_os_str().is_empty() {
            None
        } else {
            Some(self.export_dir.join(&self.log_file))
        }
    }

    pub fn levels(&self) -> Vec<AdminLevel> {
        if self.admin_levels.is_empty() {
            AdminLevel::defaults()
        } else {
            self.admin_levels.clone()
        }
    }

    pub fn task_budget(&self) -> Option<Duration> {
        self.task_budget_secs.map(Duration::from_secs)
    }
}
