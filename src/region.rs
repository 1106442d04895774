//! Extraction of one admin area's raw region from the shared tessellation.

use geo::{MultiPolygon, Polygon};
use hashbrown::HashSet;
use tracing::debug;

use crate::error::GenerateError;
use crate::geometry::{intersection, union_all};
use crate::models::{CountryOutline, Place};
use crate::tessellation::Tessellation;

/// Raw polygon set of `area`: the union of the finite cells of every site
/// inside it, clipped to the country outline.
///
/// `sites` must be the exact site list `tessellation` was built from. A site
/// belongs to the area when each admin code present on the area is equal on
/// the site; absent codes on the area match anything. Cells reaching infinity
/// are dropped. An area without any finite cell yields an empty set.
pub fn extract_region(
    area: &Place,
    sites: &[&Place],
    tessellation: &Tessellation,
    outline: &CountryOutline,
) -> Result<MultiPolygon<f64>, GenerateError> {
    if sites.len() != tessellation.site_count() {
        return Err(GenerateError::GeometryOperation(format!(
            "{} sites given for a tessellation of {}",
            sites.len(),
            tessellation.site_count()
        )));
    }

    let mut seen_cells = HashSet::new();
    let mut cells: Vec<Polygon<f64>> = Vec::new();
    let mut matched = 0usize;
    let mut unbounded = 0usize;

    for (i, site) in sites.iter().enumerate() {
        if site.country_code != area.country_code
            || !area.admin_codes.is_refined_by(&site.admin_codes)
        {
            continue;
        }
        matched += 1;

        let Some(cell) = tessellation.cell_of_site(i) else {
            continue;
        };
        if !seen_cells.insert(cell) {
            continue;
        }
        match tessellation.cell_polygon(cell)? {
            Some(polygon) => cells.push(polygon),
            None => unbounded += 1,
        }
    }

    debug!(
        "Area {}: {} sites, {} finite cells, {} unbounded cells dropped",
        area.id,
        matched,
        cells.len(),
        unbounded
    );

    if cells.is_empty() {
        return Ok(MultiPolygon::new(vec![]));
    }

    let merged = union_all(&cells);
    Ok(intersection(&merged, &outline.geometry))
}
