//! Proximity tessellation (Voronoi diagram) over a task's sites.
//!
//! The diagram is read off the dual of a Delaunay triangulation: every inner
//! triangle contributes its circumcenter as a Voronoi vertex, and the cell of
//! a site is the ring of circumcenters of the triangles around it. Cells of
//! sites on the convex hull run off to infinity; their rings contain the
//! `UNBOUNDED` sentinel and never become polygons.

use geo::{Coord, Polygon};
use spade::handles::VoronoiVertex;
use spade::{DelaunayTriangulation, Point2, Triangulation};

use crate::error::GenerateError;
use crate::geometry::polygon_from_ring;

/// Vertex id standing for the point at infinity
pub const UNBOUNDED: usize = usize::MAX;

/// Fewest sites a tessellation is built from
pub const MIN_SITES: usize = 4;

#[derive(Debug, Clone)]
pub struct Tessellation {
    /// Cell index of each input site, in input order
    site_cells: Vec<usize>,
    /// Voronoi vertices, indexed by vertex id
    vertices: Vec<Coord<f64>>,
    /// Vertex ids around each cell, in ring order
    cells: Vec<Vec<usize>>,
}

/// Build the tessellation of `sites`.
///
/// Sites at the same position share one cell. Fails with
/// `DegenerateInput` for fewer than `MIN_SITES` sites or when all sites are
/// collinear.
pub fn build_tessellation(sites: &[Coord<f64>]) -> Result<Tessellation, GenerateError> {
    if sites.len() < MIN_SITES {
        return Err(GenerateError::DegenerateInput {
            sites: sites.len(),
            reason: format!("at least {MIN_SITES} sites are required"),
        });
    }

    let mut triangulation: DelaunayTriangulation<Point2<f64>> = DelaunayTriangulation::new();
    let mut site_cells = Vec::with_capacity(sites.len());
    for site in sites {
        let handle = triangulation
            .insert(Point2::new(site.x, site.y))
            .map_err(|e| GenerateError::DegenerateInput {
                sites: sites.len(),
                reason: format!("site ({}, {}) rejected: {e:?}", site.x, site.y),
            })?;
        site_cells.push(handle.index());
    }

    if triangulation.num_inner_faces() == 0 {
        return Err(GenerateError::DegenerateInput {
            sites: sites.len(),
            reason: "all sites are collinear".to_string(),
        });
    }

    let mut vertices = vec![Coord { x: f64::NAN, y: f64::NAN }; triangulation.num_all_faces()];
    for face in triangulation.inner_faces() {
        let center = face.circumcenter();
        vertices[face.fix().index()] = Coord {
            x: center.x,
            y: center.y,
        };
    }

    let cells = triangulation
        .vertices()
        .map(|vertex| {
            vertex
                .as_voronoi_face()
                .adjacent_edges()
                .map(|edge| match edge.from() {
                    VoronoiVertex::Inner(face) => face.fix().index(),
                    VoronoiVertex::Outer(_) => UNBOUNDED,
                })
                .collect()
        })
        .collect();

    Ok(Tessellation {
        site_cells,
        vertices,
        cells,
    })
}

impl Tessellation {
    pub fn site_count(&self) -> usize {
        self.site_cells.len()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Cell index of the `site`-th input site
    pub fn cell_of_site(&self, site: usize) -> Option<usize> {
        self.site_cells.get(site).copied()
    }

    pub fn cell_vertices(&self, cell: usize) -> &[usize] {
        self.cells.get(cell).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_bounded(&self, cell: usize) -> bool {
        let ring = self.cell_vertices(cell);
        !ring.is_empty() && !ring.contains(&UNBOUNDED)
    }

    /// Polygon of a bounded cell; `None` for cells reaching infinity.
    pub fn cell_polygon(&self, cell: usize) -> Result<Option<Polygon<f64>>, GenerateError> {
        if !self.is_bounded(cell) {
            return Ok(None);
        }

        let mut ring: Vec<Coord<f64>> = self
            .cell_vertices(cell)
            .iter()
            .map(|&v| self.vertices[v])
            .collect();
        // Cocircular sites share circumcenters
        ring.dedup();
        if ring.len() > 1 && ring.first() == ring.last() {
            ring.pop();
        }

        polygon_from_ring(ring).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Area, Contains, Point};

    fn pentagon_with_center() -> Vec<Coord<f64>> {
        let mut sites: Vec<Coord<f64>> = (0..5)
            .map(|k| {
                let angle = (90.0 + 72.0 * k as f64).to_radians();
                Coord {
                    x: 10.0 * angle.cos(),
                    y: 10.0 * angle.sin(),
                }
            })
            .collect();
        sites.push(Coord { x: 0.0, y: 0.0 });
        sites
    }

    #[test]
    fn test_interior_cell_is_bounded() {
        let sites = pentagon_with_center();
        let tess = build_tessellation(&sites).unwrap();
        assert_eq!(tess.site_count(), 6);

        let center = tess.cell_of_site(5).unwrap();
        assert!(tess.is_bounded(center));
        let poly = tess.cell_polygon(center).unwrap().unwrap();
        assert!(poly.unsigned_area() > 0.0);
        assert!(poly.contains(&Point::new(0.0, 0.0)));
    }

    #[test]
    fn test_hull_cells_are_unbounded() {
        let sites = pentagon_with_center();
        let tess = build_tessellation(&sites).unwrap();
        for site in 0..5 {
            let cell = tess.cell_of_site(site).unwrap();
            assert!(tess.cell_vertices(cell).contains(&UNBOUNDED));
            assert!(!tess.is_bounded(cell));
            assert!(tess.cell_polygon(cell).unwrap().is_none());
        }
    }

    #[test]
    fn test_coincident_sites_share_a_cell() {
        let mut sites = pentagon_with_center();
        sites.push(Coord { x: 0.0, y: 0.0 });
        let tess = build_tessellation(&sites).unwrap();
        assert_eq!(tess.site_count(), 7);
        assert_eq!(tess.cell_count(), 6);
        assert_eq!(tess.cell_of_site(5), tess.cell_of_site(6));
    }

    #[test]
    fn test_too_few_sites() {
        let sites = vec![
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 1.0, y: 0.0 },
            Coord { x: 0.0, y: 1.0 },
        ];
        let err = build_tessellation(&sites).unwrap_err();
        assert!(matches!(err, GenerateError::DegenerateInput { sites: 3, .. }));
    }

    #[test]
    fn test_collinear_sites() {
        let sites: Vec<Coord<f64>> = (0..6).map(|i| Coord { x: i as f64, y: 2.0 * i as f64 }).collect();
        let err = build_tessellation(&sites).unwrap_err();
        assert!(matches!(err, GenerateError::DegenerateInput { .. }));
    }

    #[test]
    fn test_grid_cells_are_squares() {
        let sites: Vec<Coord<f64>> = (0..5)
            .flat_map(|x| (0..5).map(move |y| Coord { x: x as f64, y: y as f64 }))
            .collect();
        let tess = build_tessellation(&sites).unwrap();
        let middle = tess.cell_of_site(12).unwrap();
        let poly = tess.cell_polygon(middle).unwrap().unwrap();
        assert!((poly.unsigned_area() - 1.0).abs() < 1e-9);
    }
}
