//! Writing generated polygons to disk as GeoJSON, TSV and PNG previews.

pub mod geojson;
pub mod png;
pub mod tsv;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::models::TaskOutput;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// GeoJSON FeatureCollection
    Json,
    /// Tab-separated `geoNameId`, GeoJSON geometry
    Txt,
    /// Filled preview image
    Png,
}

impl OutputFormat {
    pub fn all() -> Vec<OutputFormat> {
        vec![OutputFormat::Json, OutputFormat::Txt, OutputFormat::Png]
    }

    /// File extension, also the subfolder name when formats are kept apart
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Txt => "txt",
            OutputFormat::Png => "png",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Writes each task's output in every requested format.
pub struct Exporter {
    export_dir: PathBuf,
    formats: Vec<OutputFormat>,
    combined: bool,
    png_size: u32,
}

impl Exporter {
    /// Creates the output folders up front. Formats share `export_dir` when
    /// `combine_format_folders` is set or only one format is requested.
    pub fn new(
        export_dir: &Path,
        formats: &[OutputFormat],
        combine_format_folders: bool,
        png_size: u32,
    ) -> Result<Self> {
        let mut unique: Vec<OutputFormat> = Vec::new();
        for &format in formats {
            if !unique.contains(&format) {
                unique.push(format);
            }
        }

        let exporter = Self {
            export_dir: export_dir.to_path_buf(),
            combined: combine_format_folders || unique.len() <= 1,
            formats: unique,
            png_size,
        };

        fs::create_dir_all(&exporter.export_dir).with_context(|| {
            format!("Failed to create export directory {}", export_dir.display())
        })?;
        for &format in &exporter.formats {
            let dir = exporter.dir_for(format);
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        Ok(exporter)
    }

    pub fn formats(&self) -> &[OutputFormat] {
        &self.formats
    }

    fn dir_for(&self, format: OutputFormat) -> PathBuf {
        if self.combined {
            self.export_dir.clone()
        } else {
            self.export_dir.join(format.extension())
        }
    }

    /// e.g. `export/json/US-1.json`
    pub fn path_for(&self, format: OutputFormat, label: &str) -> PathBuf {
        self.dir_for(format)
            .join(format!("{}.{}", label, format.extension()))
    }

    /// Write every format for one task; returns the files written.
    pub fn write(&self, output: &TaskOutput) -> Result<Vec<PathBuf>> {
        let label = output.task.label();
        let mut written = Vec::with_capacity(self.formats.len());

        for &format in &self.formats {
            let path = self.path_for(format, &label);
            write_atomic(&path, |file| match format {
                OutputFormat::Json => {
                    let mut writer = BufWriter::new(file);
                    geojson::write_feature_collection(&output.areas, &mut writer)?;
                    writer.flush()?;
                    Ok(())
                }
                OutputFormat::Txt => {
                    tsv::write_table(&output.areas, BufWriter::new(file))
                }
                OutputFormat::Png => png::write_preview(&output.areas, self.png_size, file),
            })
            .with_context(|| format!("Failed to write {}", path.display()))?;
            written.push(path);
        }

        Ok(written)
    }
}

/// Write into a temporary file next to `path`, then rename over it.
fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).context("create temp file")?;
    write(tmp.as_file_mut())?;
    tmp.as_file().sync_all().ok();
    tmp.persist(path)
        .with_context(|| format!("rename to {}", path.display()))?;
    Ok(())
}
