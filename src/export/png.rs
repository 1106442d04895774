//! Flat-colored preview rendering of a task's areas.

use anyhow::{Context, Result};
use geo::{Area, BoundingRect, LineString, Polygon, Rect};
use image::{ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;
use std::io::{Seek, Write};

use crate::models::AreaPolygons;

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Maps lon/lat onto pixels, north up
struct Viewport {
    min_x: f64,
    max_y: f64,
    scale: f64,
    width: u32,
    height: u32,
}

impl Viewport {
    fn fit(bounds: Option<Rect<f64>>, size: u32) -> Self {
        let size = size.max(1);
        let Some(rect) = bounds.filter(|r| r.width() > 0.0 || r.height() > 0.0) else {
            return Self {
                min_x: 0.0,
                max_y: 0.0,
                scale: 1.0,
                width: size,
                height: size,
            };
        };

        let scale = f64::from(size) / rect.width().max(rect.height());
        let extent = |d: f64| ((d * scale).ceil() as u32).clamp(1, size);
        Self {
            min_x: rect.min().x,
            max_y: rect.max().y,
            scale,
            width: extent(rect.width()),
            height: extent(rect.height()),
        }
    }

    /// Ring as an open pixel path without repeated points, or None if it
    /// collapses below a triangle
    fn project(&self, ring: &LineString<f64>) -> Option<Vec<Point<i32>>> {
        let mut points: Vec<Point<i32>> = Vec::with_capacity(ring.0.len());
        for c in ring.coords() {
            let p = Point::new(
                ((c.x - self.min_x) * self.scale).round() as i32,
                ((self.max_y - c.y) * self.scale).round() as i32,
            );
            if points.last() != Some(&p) {
                points.push(p);
            }
        }
        while points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        (points.len() >= 3).then_some(points)
    }
}

/// Evenly spaced hues around the color wheel
fn area_color(index: usize, count: usize) -> Rgba<u8> {
    let hue = index as f64 / count.max(1) as f64 * 6.0;
    let (s, v) = (0.65, 0.9);
    let c = v * s;
    let x = c * (1.0 - (hue % 2.0 - 1.0).abs());
    let (r, g, b) = match hue as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = v - c;
    let channel = |f: f64| ((f + m) * 255.0).round() as u8;
    Rgba([channel(r), channel(g), channel(b), 255])
}

/// Draw every area filled in its own color. Larger polygons go first so
/// enclaves painted later stay visible inside the holes punched for them.
pub fn render(areas: &[AreaPolygons], size: u32) -> RgbaImage {
    let mut bounds: Option<Rect<f64>> = None;
    for area in areas {
        if let Some(rect) = area.polygons.bounding_rect() {
            bounds = Some(match bounds {
                Some(b) => Rect::new(
                    (b.min().x.min(rect.min().x), b.min().y.min(rect.min().y)),
                    (b.max().x.max(rect.max().x), b.max().y.max(rect.max().y)),
                ),
                None => rect,
            });
        }
    }

    let viewport = Viewport::fit(bounds, size);
    let mut image = RgbaImage::from_pixel(viewport.width, viewport.height, BACKGROUND);

    let mut polygons: Vec<(f64, &Polygon<f64>, Rgba<u8>)> = areas
        .iter()
        .enumerate()
        .flat_map(|(i, area)| {
            let color = area_color(i, areas.len());
            area.polygons
                .0
                .iter()
                .map(move |p| (p.unsigned_area(), p, color))
        })
        .collect();
    polygons.sort_by(|a, b| b.0.total_cmp(&a.0));

    for (_, polygon, color) in polygons {
        if let Some(points) = viewport.project(polygon.exterior()) {
            draw_polygon_mut(&mut image, &points, color);
        }
        for hole in polygon.interiors() {
            if let Some(points) = viewport.project(hole) {
                draw_polygon_mut(&mut image, &points, BACKGROUND);
            }
        }
    }

    image
}

pub fn write_preview<W: Write + Seek>(areas: &[AreaPolygons], size: u32, mut writer: W) -> Result<()> {
    render(areas, size)
        .write_to(&mut writer, ImageFormat::Png)
        .context("Failed to encode PNG")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{difference, square};
    use geo::MultiPolygon;

    fn area(id: i64, polygons: MultiPolygon<f64>) -> AreaPolygons {
        AreaPolygons {
            id,
            name: format!("area {id}"),
            country_code: "XX".to_string(),
            polygons,
        }
    }

    #[test]
    fn test_longest_edge_matches_size() {
        let areas = vec![area(1, MultiPolygon::new(vec![square(0.0, 0.0, 2.0)])), area(2, MultiPolygon::new(vec![square(2.0, 0.0, 2.0)]))];
        let image = render(&areas, 100);
        assert_eq!(image.width(), 100);
        assert_eq!(image.height(), 50);
    }

    #[test]
    fn test_enclave_drawn_inside_hole() {
        let outer = difference(
            &MultiPolygon::new(vec![square(0.0, 0.0, 10.0)]),
            &square(4.0, 4.0, 2.0),
        );
        let areas = vec![
            area(1, outer),
            area(2, MultiPolygon::new(vec![square(4.0, 4.0, 2.0)])),
        ];
        let image = render(&areas, 100);

        let outer_px = *image.get_pixel(20, 20);
        let enclave_px = *image.get_pixel(50, 50);
        assert_ne!(outer_px, BACKGROUND);
        assert_ne!(enclave_px, BACKGROUND);
        assert_ne!(outer_px, enclave_px);
    }

    #[test]
    fn test_north_is_up() {
        let areas = vec![
            area(1, MultiPolygon::new(vec![square(0.0, 0.0, 1.0)])),
            area(2, MultiPolygon::new(vec![square(0.0, 1.0, 1.0)])),
        ];
        let image = render(&areas, 100);
        // area 2 lies north, so it fills the top half
        assert_eq!(*image.get_pixel(25, 25), area_color(1, 2));
        assert_eq!(*image.get_pixel(25, 75), area_color(0, 2));
    }

    #[test]
    fn test_empty_input() {
        let image = render(&[], 16);
        assert_eq!((image.width(), image.height()), (16, 16));
    }
}
