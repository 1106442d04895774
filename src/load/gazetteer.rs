//! GeoNames gazetteer dump parsing.

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use super::open_maybe_gz;
use crate::models::{AdminCodes, Place};

/// Dump of every GeoNames row
pub const GAZETTEER_FILE: &str = "allCountries.txt";

/// Supplementary geonameid → admin5 code table
pub const ADMIN5_FILE: &str = "adminCode5.txt";

// Column layout of allCountries.txt:
//
//   geonameid name asciiname alternatenames latitude longitude feature_class
//   feature_code country_code cc2 admin1 admin2 admin3 admin4 population
//   elevation dem timezone modification_date
const COL_ID: usize = 0;
const COL_NAME: usize = 1;
const COL_LATITUDE: usize = 4;
const COL_LONGITUDE: usize = 5;
const COL_FEATURE_CLASS: usize = 6;
const COL_FEATURE_CODE: usize = 7;
const COL_COUNTRY: usize = 8;
const COL_ADMIN1: usize = 10;
const ADMIN_COLUMNS: usize = 4;

/// Load places from a gazetteer dump (plain or `.gz`)
pub fn read_gazetteer(path: &Path) -> Result<Vec<Place>> {
    info!("Loading gazetteer from {}", path.display());
    let reader = open_maybe_gz(path).context("Failed to open gazetteer file")?;
    let places = parse_gazetteer(reader)?;
    info!("Loaded {} places", places.len());
    Ok(places)
}

/// Parse tab-separated, headerless gazetteer rows.
///
/// Rows without a numeric id or finite coordinates are skipped.
pub fn parse_gazetteer<R: Read>(reader: R) -> Result<Vec<Place>> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .quoting(false)
        .flexible(true)
        .from_reader(reader);

    let mut places = Vec::new();
    let mut skipped = 0usize;

    for result in csv_reader.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                skipped += 1;
                if skipped <= 10 {
                    warn!("Skipping unreadable gazetteer row: {}", e);
                }
                continue;
            }
        };

        let field = |i: usize| record.get(i).unwrap_or("").trim();

        let id = field(COL_ID).parse::<i64>();
        let lat = field(COL_LATITUDE).parse::<f64>();
        let lon = field(COL_LONGITUDE).parse::<f64>();
        let (Ok(id), Ok(lat), Ok(lon)) = (id, lat, lon) else {
            skipped += 1;
            continue;
        };
        if !lat.is_finite() || !lon.is_finite() {
            skipped += 1;
            continue;
        }

        let admin_codes = AdminCodes::new(
            (COL_ADMIN1..COL_ADMIN1 + ADMIN_COLUMNS).map(|i| Some(field(i))),
        );

        places.push(
            Place::new(id, field(COL_NAME), field(COL_COUNTRY), lat, lon)
                .with_feature(field(COL_FEATURE_CLASS), field(COL_FEATURE_CODE))
                .with_admin_codes(admin_codes),
        );
    }

    if skipped > 0 {
        warn!("Skipped {} malformed gazetteer rows", skipped);
    }

    Ok(places)
}

/// Load the geonameid → admin5 code table
pub fn read_admin5(path: &Path) -> Result<HashMap<i64, String>> {
    info!("Loading admin5 codes from {}", path.display());
    let reader = open_maybe_gz(path).context("Failed to open admin5 file")?;

    let mut csv_reader = ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .quoting(false)
        .flexible(true)
        .from_reader(reader);

    let mut codes = HashMap::new();
    for result in csv_reader.records() {
        let record = result.context("Failed to read admin5 row")?;
        let id = record.get(0).and_then(|s| s.trim().parse::<i64>().ok());
        let code = record.get(1).map(str::trim).filter(|c| !c.is_empty());
        if let (Some(id), Some(code)) = (id, code) {
            codes.insert(id, code.to_string());
        }
    }

    info!("Loaded {} admin5 codes", codes.len());
    Ok(codes)
}
