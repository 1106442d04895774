//! Persistent memoization of built datasets.
//!
//! Parsing the full gazetteer dump takes minutes, so built tables are kept in
//! a sled store keyed by dataset name. Each entry records a fingerprint of the
//! source files it was built from and is rebuilt when they change.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Read;
use std::path::Path;
use std::time::UNIX_EPOCH;
use tracing::info;
use xxhash_rust::xxh64::Xxh64;

const FINGERPRINT_LEN: usize = 8;

pub struct DatasetCache {
    db: sled::Db,
}

impl DatasetCache {
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).context("Failed to create cache directory")?;
        let db = sled::open(dir).context("Failed to open dataset cache")?;
        Ok(Self { db })
    }

    /// Hash of the names, sizes and modification times of `paths`
    pub fn fingerprint(paths: &[&Path]) -> Result<u64> {
        let mut hasher = Xxh64::new(0);
        for path in paths {
            let meta = std::fs::metadata(path)
                .with_context(|| format!("Failed to stat {}", path.display()))?;
            let mtime = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_nanos())
                .unwrap_or(0);
            hasher.update(path.to_string_lossy().as_bytes());
            hasher.update(&meta.len().to_be_bytes());
            hasher.update(&mtime.to_be_bytes());
        }
        Ok(hasher.digest())
    }

    /// The cached value of `name`, if present and built from `fingerprint`
    pub fn get<T: DeserializeOwned>(&self, name: &str, fingerprint: u64) -> Result<Option<T>> {
        let Some(bytes) = self.db.get(name)? else {
            return Ok(None);
        };
        if bytes.len() < FINGERPRINT_LEN || bytes[..FINGERPRINT_LEN] != fingerprint.to_be_bytes() {
            return Ok(None);
        }

        let mut json = Vec::new();
        GzDecoder::new(&bytes[FINGERPRINT_LEN..])
            .read_to_end(&mut json)
            .with_context(|| format!("Corrupt cache entry '{name}'"))?;
        let value = serde_json::from_slice(&json)
            .with_context(|| format!("Failed to decode cache entry '{name}'"))?;
        Ok(Some(value))
    }

    pub fn put<T: Serialize>(&self, name: &str, fingerprint: u64, value: &T) -> Result<()> {
        let mut bytes = fingerprint.to_be_bytes().to_vec();
        let mut encoder = GzEncoder::new(&mut bytes, Compression::fast());
        serde_json::to_writer(&mut encoder, value)
            .with_context(|| format!("Failed to encode cache entry '{name}'"))?;
        encoder.finish()?;

        self.db.insert(name, bytes)?;
        self.db.flush()?;
        Ok(())
    }

    /// Return the cached `name`, or build, store and return it.
    pub fn get_or_build<T, F>(&self, name: &str, fingerprint: u64, build: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        if let Some(value) = self.get(name, fingerprint)? {
            info!("Loading cached '{}'", name);
            return Ok(value);
        }

        info!("Building '{}' from source files", name);
        let value = build()?;
        self.put(name, fingerprint, &value)?;
        info!("Saved '{}' to cache", name);
        Ok(value)
    }

    /// Drop an entry; returns whether it existed
    pub fn invalidate(&self, name: &str) -> Result<bool> {
        let existed = self.db.remove(name)?.is_some();
        self.db.flush()?;
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_build_once() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DatasetCache::open(dir.path()).unwrap();
        let builds = Cell::new(0);

        for _ in 0..2 {
            let value: Vec<i64> = cache
                .get_or_build("numbers", 7, || {
                    builds.set(builds.get() + 1);
                    Ok(vec![1, 2, 3])
                })
                .unwrap();
            assert_eq!(value, vec![1, 2, 3]);
        }
        assert_eq!(builds.get(), 1);
    }

    #[test]
    fn test_fingerprint_mismatch_rebuilds() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DatasetCache::open(dir.path()).unwrap();
        cache.put("numbers", 1, &vec![1]).unwrap();

        assert_eq!(cache.get::<Vec<i32>>("numbers", 1).unwrap(), Some(vec![1]));
        assert_eq!(cache.get::<Vec<i32>>("numbers", 2).unwrap(), None);
    }

    #[test]
    fn test_invalidate() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DatasetCache::open(dir.path()).unwrap();
        cache.put("numbers", 1, &vec![1]).unwrap();
        assert!(cache.invalidate("numbers").unwrap());
        assert!(!cache.invalidate("numbers").unwrap());
        assert_eq!(cache.get::<Vec<i32>>("numbers", 1).unwrap(), None);
    }

    #[test]
    fn test_fingerprint_tracks_content_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.txt");
        std::fs::write(&path, "abc").unwrap();
        let before = DatasetCache::fingerprint(&[&path]).unwrap();
        std::fs::write(&path, "abcdef").unwrap();
        let after = DatasetCache::fingerprint(&[&path]).unwrap();
        assert_ne!(before, after);
    }
}
