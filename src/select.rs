//! Selection of target admin areas and tessellation sites for one task.

use hashbrown::HashSet;
use tracing::debug;

use crate::models::{AdminLevel, Gazetteer, Place};

/// Admin-area records of `country` at `level`.
///
/// Only rows with a complete admin-code path down to `level` qualify. Rows
/// sharing the same path describe the same area; the first one in gazetteer
/// order is kept. The result follows gazetteer order and is empty when the
/// country has no such areas.
pub fn select_admin_areas<'a>(
    country: &str,
    level: AdminLevel,
    gazetteer: &'a Gazetteer,
) -> Vec<&'a Place> {
    let mut seen: HashSet<Vec<&str>> = HashSet::new();
    let mut areas = Vec::new();

    for place in gazetteer.in_country(country) {
        if !place.is_admin_area(level) {
            continue;
        }
        let Some(path) = place.admin_codes.path(level) else {
            continue;
        };
        if seen.insert(path) {
            areas.push(place);
        } else {
            debug!("Duplicate ADM{} record {} in {}", level, place.id, country);
        }
    }

    areas
}

/// Every place of `country` whose admin-code path at `level` belongs to one
/// of `admin_areas`, administrative or not, in gazetteer order.
pub fn select_tessellation_sites<'a>(
    country: &str,
    level: AdminLevel,
    admin_areas: &[&Place],
    gazetteer: &'a Gazetteer,
) -> Vec<&'a Place> {
    let paths: HashSet<Vec<&str>> = admin_areas
        .iter()
        .filter_map(|area| area.admin_codes.path(level))
        .collect();

    gazetteer
        .in_country(country)
        .filter(|place| {
            place
                .admin_codes
                .path(level)
                .is_some_and(|path| paths.contains(&path))
        })
        .collect()
}
