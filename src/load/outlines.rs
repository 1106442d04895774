//! Country outline shapes (GeoNames `shapes_all_low.txt`).

use anyhow::{anyhow, bail, Context, Result};
use csv::ReaderBuilder;
use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use super::open_maybe_gz;
use crate::geometry::repair;
use crate::models::{CountryOutline, Gazetteer};

/// Low-resolution country shapes, one GeoJSON geometry per row
pub const SHAPES_FILE: &str = "shapes_all_low.txt";

pub fn read_outlines(path: &Path, gazetteer: &Gazetteer) -> Result<Vec<CountryOutline>> {
    info!("Loading country shapes from {}", path.display());
    let reader = open_maybe_gz(path).context("Failed to open shapes file")?;
    let outlines = parse_outlines(reader, gazetteer)?;
    info!("Built outlines for {} countries", outlines.len());
    Ok(outlines)
}

/// Parse `geonameid \t geojson` rows (after one header row) and union every
/// shape of a country into its outline.
///
/// The country of a shape is the country of its geonameid in `gazetteer`.
pub fn parse_outlines<R: Read>(reader: R, gazetteer: &Gazetteer) -> Result<Vec<CountryOutline>> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(b'\t')
        .quoting(false)
        .flexible(true)
        .from_reader(reader);

    let mut shapes: BTreeMap<String, Vec<Polygon<f64>>> = BTreeMap::new();
    let mut unknown = 0usize;

    for result in csv_reader.records() {
        let record = result.context("Failed to read shapes row")?;
        let id: i64 = record
            .get(0)
            .unwrap_or("")
            .trim()
            .parse()
            .context("Invalid geonameid in shapes file")?;
        let geojson = record.get(1).unwrap_or("");

        let Some(country) = gazetteer.get(id).map(|p| p.country_code.clone()) else {
            unknown += 1;
            continue;
        };

        let value: Value = serde_json::from_str(geojson)
            .with_context(|| format!("Invalid GeoJSON for shape {id}"))?;
        let geometry = parse_geometry(&value).with_context(|| format!("Shape {id}"))?;

        shapes.entry(country).or_default().extend(repair(&geometry).0);
    }

    if unknown > 0 {
        warn!("Skipped {} shapes whose id is not in the gazetteer", unknown);
    }

    Ok(shapes
        .into_iter()
        .map(|(country_code, polygons)| CountryOutline {
            country_code,
            geometry: repair(&MultiPolygon::new(polygons)),
        })
        .collect())
}

/// Convert a GeoJSON `Polygon` or `MultiPolygon` geometry object.
pub fn parse_geometry(value: &Value) -> Result<MultiPolygon<f64>> {
    let coords = value["coordinates"]
        .as_array()
        .ok_or_else(|| anyhow!("Geometry has no coordinates"))?;

    match value["type"].as_str() {
        Some("Polygon") => Ok(MultiPolygon::new(vec![parse_polygon(coords)?])),
        Some("MultiPolygon") => {
            let polygons = coords
                .iter()
                .map(|p| {
                    p.as_array()
                        .ok_or_else(|| anyhow!("Invalid MultiPolygon member"))
                        .and_then(|rings| parse_polygon(rings))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(MultiPolygon::new(polygons))
        }
        other => bail!("Unsupported geometry type {:?}", other),
    }
}

fn parse_polygon(rings: &[Value]) -> Result<Polygon<f64>> {
    let mut parsed = rings.iter().map(|ring| {
        ring.as_array()
            .ok_or_else(|| anyhow!("Invalid ring"))
            .and_then(|points| parse_ring(points))
    });

    let exterior = parsed
        .next()
        .ok_or_else(|| anyhow!("Polygon without exterior ring"))??;
    let interiors = parsed.collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn parse_ring(points: &[Value]) -> Result<LineString<f64>> {
    let coords = points
        .iter()
        .map(|pt| {
            let x = pt[0].as_f64().ok_or_else(|| anyhow!("Invalid x coordinate"))?;
            let y = pt[1].as_f64().ok_or_else(|| anyhow!("Invalid y coordinate"))?;
            Ok(Coord { x, y })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(LineString::new(coords))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Place;
    use geo::Area;

    fn gazetteer() -> Gazetteer {
        Gazetteer::new(vec![
            Place::new(10, "Country X", "XX", 0.0, 0.0).with_feature("A", "PCLI"),
            Place::new(11, "Island of X", "XX", 0.0, 0.0).with_feature("T", "ISL"),
            Place::new(20, "Country Y", "YY", 0.0, 0.0).with_feature("A", "PCLI"),
        ])
    }

    const SHAPES: &str = "geoNameId\tgeoJSON
10\t{\"type\":\"Polygon\",\"coordinates\":[[[0,0],[2,0],[2,2],[0,2],[0,0]]]}
11\t{\"type\":\"MultiPolygon\",\"coordinates\":[[[[1,0],[3,0],[3,2],[1,2],[1,0]]],[[[10,10],[11,10],[11,11],[10,11],[10,10]]]]}
20\t{\"type\":\"Polygon\",\"coordinates\":[[[5,5],[6,5],[6,6],[5,6],[5,5]],[[5.2,5.2],[5.4,5.2],[5.4,5.4],[5.2,5.4],[5.2,5.2]]]}
99\t{\"type\":\"Polygon\",\"coordinates\":[[[0,0],[1,0],[1,1],[0,0]]]}
";

    #[test]
    fn test_shapes_unioned_per_country() {
        let outlines = parse_outlines(SHAPES.as_bytes(), &gazetteer()).unwrap();
        assert_eq!(outlines.len(), 2);

        let xx = &outlines[0];
        assert_eq!(xx.country_code, "XX");
        // [0,3]x[0,2] plus the separate unit island
        assert_eq!(xx.geometry.0.len(), 2);
        assert!((xx.geometry.unsigned_area() - 7.0).abs() < 1e-9);

        let yy = &outlines[1];
        assert!((yy.geometry.unsigned_area() - 0.96).abs() < 1e-9);
    }

    #[test]
    fn test_unsupported_geometry() {
        let value: Value = serde_json::from_str(r#"{"type":"Point","coordinates":[1,2]}"#).unwrap();
        assert!(parse_geometry(&value).is_err());
    }
}
