//! Running (country, admin level) tasks end to end.
//!
//! `Generator` turns one task into polygons: select areas, tessellate the
//! country's sites once, extract every area's region and clean the batch.
//! `BatchRunner` drives many tasks in parallel, isolates their failures,
//! exports results and keeps the completed-task log used for resuming.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use geo::Coord;
use hashbrown::HashSet;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{debug, info, warn, Level};

use crate::clean::{clean, CleanStrategy};
use crate::error::GenerateError;
use crate::export::Exporter;
use crate::geometry::{geodesic_area_km2, union_all};
use crate::models::{AreaPolygons, Gazetteer, OutlineTable, Task, TaskOutput};
use crate::region::extract_region;
use crate::select::{select_admin_areas, select_tessellation_sites};
use crate::tessellation::build_tessellation;

/// Optional wall-clock limit of one task, checked between steps
#[derive(Debug, Clone, Copy)]
struct Deadline {
    started: Instant,
    budget: Option<Duration>,
}

impl Deadline {
    fn start(budget: Option<Duration>) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    fn check(&self) -> Result<(), GenerateError> {
        match self.budget {
            Some(budget) if self.started.elapsed() >= budget => {
                Err(GenerateError::BudgetExceeded { budget })
            }
            _ => Ok(()),
        }
    }
}

/// Generates the polygons of single tasks against shared, read-only inputs.
#[derive(Clone, Copy)]
pub struct Generator<'a> {
    gazetteer: &'a Gazetteer,
    outlines: &'a OutlineTable,
    strategy: CleanStrategy,
    budget: Option<Duration>,
}

impl<'a> Generator<'a> {
    pub fn new(gazetteer: &'a Gazetteer, outlines: &'a OutlineTable, strategy: CleanStrategy) -> Self {
        Self {
            gazetteer,
            outlines,
            strategy,
            budget: None,
        }
    }

    pub fn with_budget(mut self, budget: Option<Duration>) -> Self {
        self.budget = budget;
        self
    }

    pub fn generate(&self, task: &Task) -> Result<TaskOutput, GenerateError> {
        let deadline = Deadline::start(self.budget);

        let areas = select_admin_areas(&task.country, task.level, self.gazetteer);
        if areas.is_empty() {
            return Err(GenerateError::EmptySelection {
                country: task.country.clone(),
                level: task.level,
            });
        }

        let sites = select_tessellation_sites(&task.country, task.level, &areas, self.gazetteer);
        let outline = self
            .outlines
            .get(&task.country)
            .ok_or_else(|| GenerateError::MissingCountryOutline(task.country.clone()))?;

        debug!("{}: {} areas, {} sites", task, areas.len(), sites.len());
        let coords: Vec<Coord<f64>> = sites.iter().map(|p| p.point.0).collect();
        let tessellation = build_tessellation(&coords)?;

        let mut raw = Vec::with_capacity(areas.len());
        for area in &areas {
            deadline.check()?;
            raw.push(extract_region(area, &sites, &tessellation, outline)?);
        }

        deadline.check()?;
        let cleaned = clean(self.strategy, raw);

        if tracing::enabled!(Level::DEBUG) {
            let union = union_all(cleaned.iter().flat_map(|m| m.0.iter()));
            let outline_km2 = geodesic_area_km2(&outline.geometry);
            if outline_km2 > 0.0 {
                debug!(
                    "{}: polygons cover {:.1}% of the country outline",
                    task,
                    100.0 * geodesic_area_km2(&union) / outline_km2
                );
            }
        }

        Ok(TaskOutput {
            task: task.clone(),
            areas: areas
                .iter()
                .zip(cleaned)
                .map(|(area, polygons)| AreaPolygons::new(area, polygons))
                .collect(),
        })
    }
}

/// Labels of finished tasks, one per line, appended as tasks complete
pub struct CompletedLog {
    done: HashSet<String>,
    file: Option<File>,
}

impl CompletedLog {
    /// A log that remembers nothing and writes nowhere
    pub fn disabled() -> Self {
        Self {
            done: HashSet::new(),
            file: None,
        }
    }

    pub fn open(path: &Path) -> Result<Self> {
        let mut done = HashSet::new();
        if path.exists() {
            let file = File::open(path).context("Failed to open completed-task log")?;
            for line in BufReader::new(file).lines() {
                let line = line?;
                let label = line.trim();
                if !label.is_empty() {
                    done.insert(label.to_string());
                }
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open {} for appending", path.display()))?;

        Ok(Self {
            done,
            file: Some(file),
        })
    }

    pub fn contains(&self, label: &str) -> bool {
        self.done.contains(label)
    }

    pub fn len(&self) -> usize {
        self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.done.is_empty()
    }

    pub fn record(&mut self, label: &str) -> Result<()> {
        if let Some(file) = &mut self.file {
            writeln!(file, "{label}").context("Failed to write completed-task log")?;
            file.flush()?;
            self.done.insert(label.to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Generated { files: Vec<PathBuf> },
    /// No admin areas at this level
    Empty,
    Failed { reason: String },
    /// Already in the completed-task log
    Skipped,
}

#[derive(Debug, Clone)]
pub struct TaskReport {
    pub task: Task,
    pub outcome: TaskOutcome,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub generated: usize,
    pub empty: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunSummary {
    fn add(&mut self, outcome: &TaskOutcome) {
        match outcome {
            TaskOutcome::Generated { .. } => self.generated += 1,
            TaskOutcome::Empty => self.empty += 1,
            TaskOutcome::Failed { .. } => self.failed += 1,
            TaskOutcome::Skipped => self.skipped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.generated + self.empty + self.failed + self.skipped
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} generated, {} empty, {} failed, {} skipped",
            self.generated, self.empty, self.failed, self.skipped
        )
    }
}

pub struct BatchRunner<'a> {
    generator: Generator<'a>,
    exporter: Exporter,
    log: Mutex<CompletedLog>,
    threads: Option<usize>,
    progress: bool,
}

impl<'a> BatchRunner<'a> {
    pub fn new(generator: Generator<'a>, exporter: Exporter, log: CompletedLog) -> Self {
        Self {
            generator,
            exporter,
            log: Mutex::new(log),
            threads: None,
            progress: false,
        }
    }

    /// Size of a dedicated worker pool; `None` uses rayon's global pool
    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Run every task not yet logged as completed.
    ///
    /// Task failures are reported and recorded, never returned. Only failing
    /// to write the completed-task log aborts the run.
    pub fn run(&self, tasks: &[Task]) -> Result<(RunSummary, Vec<TaskReport>)> {
        let mut reports = Vec::with_capacity(tasks.len());
        let mut pending = Vec::new();
        {
            let log = self
                .log
                .lock()
                .map_err(|_| anyhow!("completed-task log lock poisoned"))?;
            for task in tasks {
                if log.contains(&task.label()) {
                    info!("Found {} in previously logged tasks; skipping.", task);
                    reports.push(TaskReport {
                        task: task.clone(),
                        outcome: TaskOutcome::Skipped,
                    });
                } else {
                    pending.push(task);
                }
            }
        }

        let pb = if self.progress {
            let pb = ProgressBar::new(pending.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                    )?
                    .progress_chars("#>-"),
            );
            pb
        } else {
            ProgressBar::hidden()
        };

        let work = || {
            pending
                .par_iter()
                .map(|task| {
                    let report = self.run_task(task)?;
                    pb.inc(1);
                    Ok(report)
                })
                .collect::<Result<Vec<TaskReport>>>()
        };

        let finished = match self.threads {
            Some(threads) => rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .context("Failed to build worker pool")?
                .install(work)?,
            None => work()?,
        };
        pb.finish_and_clear();
        reports.extend(finished);

        let mut summary = RunSummary::default();
        for report in &reports {
            summary.add(&report.outcome);
        }
        info!("Run finished: {}", summary);
        Ok((summary, reports))
    }

    fn run_task(&self, task: &Task) -> Result<TaskReport> {
        info!("Working on {}.", task);

        let outcome = match self.generator.generate(task) {
            Ok(output) => match self.exporter.write(&output) {
                Ok(files) => {
                    info!("Created files for {}.", task);
                    TaskOutcome::Generated { files }
                }
                Err(e) => {
                    warn!("Could not export polygons for '{}': {:#}", task, e);
                    TaskOutcome::Failed {
                        reason: format!("{e:#}"),
                    }
                }
            },
            Err(e) if e.is_empty_selection() => {
                info!("No admin areas for task '{}'.", task);
                TaskOutcome::Empty
            }
            Err(e) => {
                warn!("Could not generate polygons for '{}'. Reason: {}.", task, e);
                TaskOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };

        self.log
            .lock()
            .map_err(|_| anyhow!("completed-task log lock poisoned"))?
            .record(&task.label())?;

        Ok(TaskReport {
            task: task.clone(),
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::OutputFormat;
    use crate::geometry::square;
    use crate::models::{AdminCodes, AdminLevel, CountryOutline, Place};
    use geo::{Area, BooleanOps, MultiPolygon};

    fn level(l: u8) -> AdminLevel {
        AdminLevel::new(l).unwrap()
    }

    /// 6x6 lattice over [0,6]², west half in admin1 "01", east half in "02".
    /// Two lattice points are the ADM1 records themselves.
    fn gazetteer() -> Gazetteer {
        let mut places = Vec::new();
        let mut id = 1;
        for i in 0..6 {
            for j in 0..6 {
                let (x, y) = (i as f64 + 0.5, j as f64 + 0.5);
                let code = if i < 3 { "01" } else { "02" };
                let mut place = Place::new(id, &format!("p{id}"), "XX", y, x)
                    .with_admin_codes(AdminCodes::new([Some(code)]));
                if (i, j) == (1, 2) || (i, j) == (4, 2) {
                    place = place.with_feature("A", "ADM1");
                } else {
                    place = place.with_feature("P", "PPL");
                }
                places.push(place);
                id += 1;
            }
        }

        // Country YY has areas but no outline; ZZ has too few sites.
        for (k, (cc, code)) in [("YY", "01"), ("YY", "01"), ("YY", "02"), ("YY", "02"), ("ZZ", "01")]
            .into_iter()
            .enumerate()
        {
            let place = Place::new(100 + k as i64, "a", cc, k as f64, (k * k) as f64)
                .with_feature("A", "ADM1")
                .with_admin_codes(AdminCodes::new([Some(code)]));
            places.push(place);
        }
        places.push(
            Place::new(200, "b", "ZZ", 1.0, 1.0).with_admin_codes(AdminCodes::new([Some("01")])),
        );

        Gazetteer::new(places)
    }

    fn outlines() -> OutlineTable {
        OutlineTable::new(vec![
            CountryOutline {
                country_code: "XX".to_string(),
                geometry: MultiPolygon::new(vec![square(0.0, 0.0, 6.0)]),
            },
            CountryOutline {
                country_code: "ZZ".to_string(),
                geometry: MultiPolygon::new(vec![square(0.0, 0.0, 6.0)]),
            },
        ])
    }

    #[test]
    fn test_generate_two_areas() {
        let gazetteer = gazetteer();
        let outlines = outlines();
        let generator = Generator::new(&gazetteer, &outlines, CleanStrategy::Cutoff);

        let output = generator.generate(&Task::new("XX", level(1))).unwrap();
        let ids: Vec<i64> = output.areas.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![9, 27]);
        for area in &output.areas {
            assert_eq!(area.country_code, "XX");
            // 2x4 interior cells per half
            assert!((area.polygons.unsigned_area() - 8.0).abs() < 1e-6);
        }

        // Nothing generated outside the country
        let union = union_all(output.areas.iter().flat_map(|a| a.polygons.0.iter()));
        let outside = union.difference(&outlines.get("XX").unwrap().geometry);
        assert!(outside.unsigned_area() < 1e-9);
    }

    #[test]
    fn test_error_kinds() {
        let gazetteer = gazetteer();
        let outlines = outlines();
        let generator = Generator::new(&gazetteer, &outlines, CleanStrategy::Cutoff);

        let err = generator.generate(&Task::new("XX", level(2))).unwrap_err();
        assert!(err.is_empty_selection());

        let err = generator.generate(&Task::new("YY", level(1))).unwrap_err();
        assert!(matches!(err, GenerateError::MissingCountryOutline(ref c) if c == "YY"));

        let err = generator.generate(&Task::new("ZZ", level(1))).unwrap_err();
        assert!(matches!(err, GenerateError::DegenerateInput { sites: 2, .. }));
    }

    #[test]
    fn test_budget_exceeded() {
        let gazetteer = gazetteer();
        let outlines = outlines();
        let generator = Generator::new(&gazetteer, &outlines, CleanStrategy::Cutoff)
            .with_budget(Some(Duration::ZERO));

        let err = generator.generate(&Task::new("XX", level(1))).unwrap_err();
        assert!(matches!(err, GenerateError::BudgetExceeded { .. }));
    }

    #[test]
    fn test_completed_log_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");

        let mut log = CompletedLog::open(&path).unwrap();
        assert!(log.is_empty());
        log.record("XX-1").unwrap();
        log.record("XX-2").unwrap();
        drop(log);

        let log = CompletedLog::open(&path).unwrap();
        assert_eq!(log.len(), 2);
        assert!(log.contains("XX-1"));
        assert!(!log.contains("XX-3"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "XX-1\nXX-2\n");
    }

    fn json_runner<'a>(
        gazetteer: &'a Gazetteer,
        outlines: &'a OutlineTable,
        export_dir: &Path,
        log_path: &Path,
    ) -> BatchRunner<'a> {
        let generator = Generator::new(gazetteer, outlines, CleanStrategy::Cutoff);
        let exporter = Exporter::new(export_dir, &[OutputFormat::Json], false, 32).unwrap();
        let log = CompletedLog::open(log_path).unwrap();
        BatchRunner::new(generator, exporter, log).with_threads(Some(2))
    }

    #[test]
    fn test_run_isolates_failures_and_resumes() {
        let gazetteer = gazetteer();
        let outlines = outlines();
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("log.txt");
        let tasks = vec![
            Task::new("XX", level(1)),
            Task::new("XX", level(2)),
            Task::new("YY", level(1)),
            Task::new("ZZ", level(1)),
        ];

        let (summary, reports) = json_runner(&gazetteer, &outlines, dir.path(), &log_path)
            .run(&tasks)
            .unwrap();
        assert_eq!(
            summary,
            RunSummary {
                generated: 1,
                empty: 1,
                failed: 2,
                skipped: 0
            }
        );
        assert_eq!(reports.len(), 4);
        assert!(dir.path().join("XX-1.json").exists());
        assert!(!dir.path().join("YY-1.json").exists());

        let (summary, _) = json_runner(&gazetteer, &outlines, dir.path(), &log_path)
            .run(&tasks)
            .unwrap();
        assert_eq!(summary.skipped, 4);
        assert_eq!(summary.total(), 4);
    }

    #[test]
    fn test_disabled_log_reruns() {
        let gazetteer = gazetteer();
        let outlines = outlines();
        let dir = tempfile::tempdir().unwrap();
        let generator = Generator::new(&gazetteer, &outlines, CleanStrategy::None);
        let exporter = Exporter::new(dir.path(), &[OutputFormat::Txt], false, 32).unwrap();
        let runner = BatchRunner::new(generator, exporter, CompletedLog::disabled());

        let tasks = vec![Task::new("XX", level(1))];
        for _ in 0..2 {
            let (summary, _) = runner.run(&tasks).unwrap();
            assert_eq!(summary.generated, 1);
        }
    }
}
