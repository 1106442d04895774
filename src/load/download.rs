//! Fetching GeoNames dump files.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{info, warn};

pub const GEONAMES_URL: &str = "http://download.geonames.org/export/dump/";

/// Directory under the data dir holding the raw dump files
pub const GEONAMES_DIR: &str = "GeoNames";

/// Local path of a GeoNames dump file, downloading it first if needed.
///
/// The plain file is tried first. GeoNames only publishes the big dumps as
/// `<stem>.zip`, so on failure the archive is fetched and the file extracted.
pub fn ensure_dataset_file(data_dir: &Path, file_name: &str) -> Result<PathBuf> {
    let dir = data_dir.join(GEONAMES_DIR);
    let target = dir.join(file_name);

    if target.exists() {
        info!("File {} exists.", file_name);
        return Ok(target);
    }

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    info!("Downloading {}...", file_name);
    if fetch(&format!("{GEONAMES_URL}{file_name}"), &target)? {
        return Ok(target);
    }
    let _ = std::fs::remove_file(&target);

    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    let zip_name = format!("{stem}.zip");
    let zip_path = dir.join(&zip_name);

    warn!("{} not found on GeoNames, trying {}", file_name, zip_name);
    if !fetch(&format!("{GEONAMES_URL}{zip_name}"), &zip_path)? {
        bail!("Failed to download {} or {}", file_name, zip_name);
    }

    let status = Command::new("unzip")
        .arg("-o")
        .arg(&zip_path)
        .arg(file_name)
        .arg("-d")
        .arg(&dir)
        .status()
        .context("Failed to run unzip")?;
    let _ = std::fs::remove_file(&zip_path);

    if !status.success() || !target.exists() {
        bail!("Could not extract {} from {}", file_name, zip_name);
    }

    info!("Extracted {}", file_name);
    Ok(target)
}

/// `curl --fail` into `dest`; Ok(false) when the server refuses
fn fetch(url: &str, dest: &Path) -> Result<bool> {
    let status = Command::new("curl")
        .args(["-L", "--fail", "-s", "-o"])
        .arg(dest)
        .arg(url)
        .status()
        .context("Failed to run curl")?;
    Ok(status.success())
}
