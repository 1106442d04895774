//! Batch generation of approximate admin-area polygons.
//!
//! Loads the GeoNames gazetteer and country shapes, then generates, cleans
//! and exports polygons for every requested (country, admin level) pair.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use voronoi_admin::batch::{BatchRunner, CompletedLog, Generator};
use voronoi_admin::config::GenerateConfig;
use voronoi_admin::export::{Exporter, OutputFormat};
use voronoi_admin::load::load_datasets;
use voronoi_admin::models::{AdminLevel, Task};
use voronoi_admin::CleanStrategy;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "generate")]
#[command(about = "Generate approximate admin boundaries from GeoNames points")]
struct Args {
    /// Two-letter country codes; all countries when omitted
    #[arg(short, long, num_args = 1..)]
    countries: Vec<String>,

    /// Admin levels to generate (default 1 2 3)
    #[arg(short, long, num_args = 1..)]
    admin_levels: Vec<AdminLevel>,

    /// Completed-task log inside the export directory; "" disables resuming
    #[arg(short = 'l', long = "logfile")]
    log_file: Option<PathBuf>,

    /// Cleaning heuristic
    #[arg(long, value_enum)]
    clean: Option<CleanStrategy>,

    /// Output formats
    #[arg(short, long, value_enum, num_args = 1..)]
    formats: Vec<OutputFormat>,

    /// Export directory
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Write all formats into the export directory itself
    #[arg(long)]
    combine_format_folders: bool,

    /// Download and cache directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// TOML file with defaults for every option above
    #[arg(long)]
    config: Option<PathBuf>,

    /// Wall-clock budget per task, in seconds
    #[arg(long)]
    task_budget_secs: Option<u64>,

    /// Worker threads (default: one per core)
    #[arg(long)]
    threads: Option<usize>,

    /// Merge admin5 codes from adminCode5.txt
    #[arg(long)]
    include_admin5: bool,

    /// Rebuild cached datasets from the dump files
    #[arg(long)]
    refresh_cache: bool,

    /// Longest edge of PNG previews, in pixels
    #[arg(long)]
    png_size: Option<u32>,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// CLI flags win over the config file
    fn merge_into(self, mut config: GenerateConfig) -> GenerateConfig {
        if !self.countries.is_empty() {
            config.countries = self.countries;
        }
        if !self.admin_levels.is_empty() {
            config.admin_levels = self.admin_levels;
        }
        if let Some(log_file) = self.log_file {
            config.log_file = log_file;
        }
        if let Some(clean) = self.clean {
            config.clean = clean;
        }
        if !self.formats.is_empty() {
            config.formats = self.formats;
        }
        if let Some(dir) = self.dir {
            config.export_dir = dir;
        }
        if let Some(data_dir) = self.data_dir {
            config.data_dir = data_dir;
        }
        if self.task_budget_secs.is_some() {
            config.task_budget_secs = self.task_budget_secs;
        }
        if self.threads.is_some() {
            config.threads = self.threads;
        }
        if let Some(png_size) = self.png_size {
            config.png_size = png_size;
        }
        config.combine_format_folders |= self.combine_format_folders;
        config.include_admin5 |= self.include_admin5;
        config
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let refresh_cache = args.refresh_cache;
    let base = match &args.config {
        Some(path) => GenerateConfig::load_from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => GenerateConfig::default(),
    };
    let config = args.merge_into(base);

    info!("Voronoi admin generator");
    info!("Export directory: {}", config.export_dir.display());
    info!("Cleaning: {}", config.clean);

    let exporter = Exporter::new(
        &config.export_dir,
        &config.formats,
        config.combine_format_folders,
        config.png_size,
    )?;

    let log = match config.log_path() {
        Some(path) => {
            let log = CompletedLog::open(&path)?;
            info!("{} tasks already logged in {}", log.len(), path.display());
            log
        }
        None => CompletedLog::disabled(),
    };

    let datasets = load_datasets(&config.data_dir, config.include_admin5, refresh_cache)
        .context("Failed to load GeoNames data")?;
    info!(
        "Loaded {} places and {} country outlines",
        datasets.gazetteer.len(),
        datasets.outlines.len()
    );

    let countries = if config.countries.is_empty() {
        datasets.gazetteer.countries()
    } else {
        config.countries.clone()
    };
    let tasks = Task::all(&countries, &config.levels());
    info!("{} tasks over {} countries", tasks.len(), countries.len());

    let generator = Generator::new(&datasets.gazetteer, &datasets.outlines, config.clean)
        .with_budget(config.task_budget());
    let runner = BatchRunner::new(generator, exporter, log)
        .with_threads(config.threads)
        .with_progress(true);

    let (summary, _) = runner.run(&tasks)?;
    info!("Done: {}", summary);

    Ok(())
}
