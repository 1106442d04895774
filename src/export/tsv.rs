//! Tab-separated export, in the layout of GeoNames' own shapes file.

use anyhow::{Context, Result};
use csv::{QuoteStyle, WriterBuilder};
use std::io::Write;

use super::geojson::multipolygon_geometry;
use crate::models::AreaPolygons;

pub fn write_table<W: Write>(areas: &[AreaPolygons], writer: W) -> Result<()> {
    let mut csv_writer = WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(QuoteStyle::Never)
        .from_writer(writer);

    csv_writer.write_record(["geoNameId", "geoJSON"])?;
    for area in areas {
        let geometry = serde_json::to_string(&multipolygon_geometry(&area.polygons))
            .context("Failed to serialize geometry")?;
        csv_writer.write_record([area.id.to_string(), geometry])?;
    }
    csv_writer.flush().context("Failed to flush table")?;
    Ok(())
}
