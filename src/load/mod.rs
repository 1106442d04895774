//! Loading the GeoNames inputs: gazetteer rows and country outlines.

pub mod cache;
pub mod download;
pub mod gazetteer;
pub mod outlines;

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::info;

use crate::models::{Gazetteer, OutlineTable};
use cache::DatasetCache;
use download::ensure_dataset_file;

pub const GAZETTEER_CACHE_KEY: &str = "geonames";
pub const OUTLINES_CACHE_KEY: &str = "shapes";

/// Open a file, gunzipping it when the extension is `.gz`
pub(crate) fn open_maybe_gz(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let reader: Box<dyn Read> = if path.extension().map_or(false, |e| e == "gz") {
        Box::new(GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(reader)
}

/// Everything a generation run reads
pub struct Datasets {
    pub gazetteer: Gazetteer,
    pub outlines: OutlineTable,
}

/// Load (downloading and caching as needed) the gazetteer and outlines.
pub fn load_datasets(data_dir: &Path, include_admin5: bool, refresh_cache: bool) -> Result<Datasets> {
    let cache = DatasetCache::open(&data_dir.join("cache"))?;
    if refresh_cache {
        info!("Dropping cached datasets");
        cache.invalidate(GAZETTEER_CACHE_KEY)?;
        cache.invalidate(OUTLINES_CACHE_KEY)?;
    }

    let gazetteer_path = ensure_dataset_file(data_dir, gazetteer::GAZETTEER_FILE)?;
    let admin5_path = if include_admin5 {
        Some(ensure_dataset_file(data_dir, gazetteer::ADMIN5_FILE)?)
    } else {
        None
    };

    let mut sources = vec![gazetteer_path.as_path()];
    sources.extend(admin5_path.as_deref());
    let fingerprint = DatasetCache::fingerprint(&sources)?;

    let places = cache.get_or_build(GAZETTEER_CACHE_KEY, fingerprint, || {
        let mut table = Gazetteer::new(gazetteer::read_gazetteer(&gazetteer_path)?);
        if let Some(path) = &admin5_path {
            let codes = gazetteer::read_admin5(path)?;
            let merged = table.merge_admin5(&codes);
            info!("Merged admin5 codes into {} places", merged);
        }
        Ok(table.into_places())
    })?;
    let gazetteer = Gazetteer::new(places);

    let shapes_path = ensure_dataset_file(data_dir, outlines::SHAPES_FILE)?;
    let fingerprint = DatasetCache::fingerprint(&[shapes_path.as_path(), gazetteer_path.as_path()])?;
    let shapes = cache.get_or_build(OUTLINES_CACHE_KEY, fingerprint, || {
        outlines::read_outlines(&shapes_path, &gazetteer)
    })?;

    Ok(Datasets {
        gazetteer,
        outlines: OutlineTable::new(shapes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_local_files() {
        let dir = tempfile::tempdir().unwrap();
        let geonames = dir.path().join(download::GEONAMES_DIR);
        std::fs::create_dir_all(&geonames).unwrap();
        std::fs::write(
            geonames.join(gazetteer::GAZETTEER_FILE),
            "10\tCountry X\tCountry X\t\t1.0\t1.0\tA\tPCLI\tXX\t\t00\t\t\t\t0\t\t0\t\t2020-01-01\n\
             11\tNorth\tNorth\t\t1.5\t1.0\tA\tADM1\tXX\t\t01\t\t\t\t0\t\t0\t\t2020-01-01\n",
        )
        .unwrap();
        std::fs::write(
            geonames.join(outlines::SHAPES_FILE),
            "geoNameId\tgeoJSON\n10\t{\"type\":\"Polygon\",\"coordinates\":[[[0,0],[2,0],[2,2],[0,2],[0,0]]]}\n",
        )
        .unwrap();

        for refresh in [false, false, true] {
            let datasets = load_datasets(dir.path(), false, refresh).unwrap();
            assert_eq!(datasets.gazetteer.len(), 2);
            assert_eq!(datasets.outlines.len(), 1);
            assert!(datasets.outlines.get("XX").is_some());
        }
    }
}
