use anyhow::{Context, Result};
use geo::{LineString, MultiPolygon, Polygon};
use serde_json::{json, Value};
use std::io::Write;

use crate::models::AreaPolygons;

fn ring_coords(ring: &LineString<f64>) -> Vec<[f64; 2]> {
    ring.coords().map(|c| [c.x, c.y]).collect()
}

fn polygon_coords(polygon: &Polygon<f64>) -> Vec<Vec<[f64; 2]>> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(ring_coords)
        .collect()
}

/// GeoJSON `MultiPolygon` geometry object
pub fn multipolygon_geometry(geometry: &MultiPolygon<f64>) -> Value {
    let coordinates: Vec<_> = geometry.0.iter().map(polygon_coords).collect();
    json!({
        "type": "MultiPolygon",
        "coordinates": coordinates,
    })
}

/// One feature per area, carrying its gazetteer id and country
pub fn feature_collection(areas: &[AreaPolygons]) -> Value {
    let features: Vec<Value> = areas
        .iter()
        .map(|area| {
            json!({
                "type": "Feature",
                "geometry": multipolygon_geometry(&area.polygons),
                "properties": {
                    "geoNameId": area.id,
                    "countryCode": area.country_code,
                }
            })
        })
        .collect();

    json!({
        "type": "FeatureCollection",
        "features": features,
    })
}

pub fn write_feature_collection<W: Write>(areas: &[AreaPolygons], writer: W) -> Result<()> {
    serde_json::to_writer(writer, &feature_collection(areas))
        .context("Failed to serialize GeoJSON")
}
