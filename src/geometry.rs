//! Geometry capability used by the generation core.
//!
//! The core only needs a narrow set of operations (union, intersection,
//! difference, containment, hole filling, repair and area). They are all
//! funneled through this module and `FragmentIndex` so the rest of the crate
//! does not depend on the shape of the `geo` API.

use geo::{
    unary_union, Area, BooleanOps, BoundingRect, Contains, Coord, GeodesicArea, LineString,
    MultiPolygon, Polygon,
};
use rstar::{RTree, RTreeObject, AABB};

use crate::error::GenerateError;

/// Build a closed polygon from ring vertices.
pub fn polygon_from_ring(mut ring: Vec<Coord<f64>>) -> Result<Polygon<f64>, GenerateError> {
    if ring.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(GenerateError::GeometryOperation(
            "ring has a non-finite vertex".to_string(),
        ));
    }
    if ring.first() != ring.last() {
        if let Some(&first) = ring.first() {
            ring.push(first);
        }
    }
    if ring.len() < 4 {
        return Err(GenerateError::GeometryOperation(format!(
            "ring has only {} distinct vertices",
            ring.len().saturating_sub(1)
        )));
    }
    Ok(Polygon::new(LineString::new(ring), vec![]))
}

/// Union of many polygons in one overlay pass
pub fn union_all<'a, I>(polygons: I) -> MultiPolygon<f64>
where
    I: IntoIterator<Item = &'a Polygon<f64>>,
{
    unary_union(polygons)
}

pub fn intersection(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    a.intersection(b)
}

pub fn difference(a: &MultiPolygon<f64>, b: &Polygon<f64>) -> MultiPolygon<f64> {
    a.difference(&MultiPolygon::new(vec![b.clone()]))
}

/// Self-union, which resolves self-intersections and overlapping parts.
pub fn repair(geometry: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    unary_union(geometry.0.iter())
}

/// The polygon bounded by the exterior ring only
pub fn fill_holes(polygon: &Polygon<f64>) -> Polygon<f64> {
    Polygon::new(polygon.exterior().clone(), vec![])
}

/// `inner` lies entirely inside `outer` (not merely overlapping it).
pub fn is_within(inner: &Polygon<f64>, outer: &Polygon<f64>) -> bool {
    outer.contains(inner)
}

pub fn contains(outer: &MultiPolygon<f64>, inner: &Polygon<f64>) -> bool {
    outer.contains(inner)
}

pub fn planar_area(polygon: &Polygon<f64>) -> f64 {
    polygon.unsigned_area()
}

/// Area on the WGS84 ellipsoid in square kilometres
pub fn geodesic_area_km2(geometry: &MultiPolygon<f64>) -> f64 {
    geometry.geodesic_area_unsigned() / 1_000_000.0
}

fn envelope(polygon: &Polygon<f64>) -> Option<AABB<[f64; 2]>> {
    polygon
        .bounding_rect()
        .map(|r| AABB::from_corners([r.min().x, r.min().y], [r.max().x, r.max().y]))
}

/// A polygon tagged with the (area, fragment) position it came from
#[derive(Debug, Clone)]
pub struct IndexedFragment {
    pub area: usize,
    pub fragment: usize,
    pub polygon: Polygon<f64>,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedFragment {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// R-tree over the fragments of a batch, used to find containment candidates.
pub struct FragmentIndex {
    tree: RTree<IndexedFragment>,
}

impl FragmentIndex {
    /// Index `fragments[area][fragment]`
    pub fn build(fragments: &[Vec<Polygon<f64>>]) -> Self {
        let indexed: Vec<IndexedFragment> = fragments
            .iter()
            .enumerate()
            .flat_map(|(area, polys)| {
                polys.iter().enumerate().filter_map(move |(fragment, polygon)| {
                    Some(IndexedFragment {
                        area,
                        fragment,
                        envelope: envelope(polygon)?,
                        polygon: polygon.clone(),
                    })
                })
            })
            .collect();

        Self {
            tree: RTree::bulk_load(indexed),
        }
    }

    /// Fragments whose bounding box covers `polygon`'s, in (area, fragment) order.
    pub fn candidates_containing(&self, polygon: &Polygon<f64>) -> Vec<&IndexedFragment> {
        let Some(env) = envelope(polygon) else {
            return Vec::new();
        };
        let mut candidates: Vec<&IndexedFragment> = self
            .tree
            .locate_in_envelope_intersecting(&env)
            .filter(|f| {
                let (lo, hi) = (f.envelope.lower(), f.envelope.upper());
                let (plo, phi) = (env.lower(), env.upper());
                lo[0] <= plo[0] && lo[1] <= plo[1] && hi[0] >= phi[0] && hi[1] >= phi[1]
            })
            .collect();
        candidates.sort_by_key(|f| (f.area, f.fragment));
        candidates
    }

    /// Fragments whose bounding box lies inside `polygon`'s, in (area, fragment) order.
    pub fn candidates_within(&self, polygon: &Polygon<f64>) -> Vec<&IndexedFragment> {
        let Some(env) = envelope(polygon) else {
            return Vec::new();
        };
        let mut candidates: Vec<&IndexedFragment> = self.tree.locate_in_envelope(&env).collect();
        candidates.sort_by_key(|f| (f.area, f.fragment));
        candidates
    }

    /// Whether `polygon` lies within a fragment of an area accepted by `area_filter`
    pub fn is_contained<F>(&self, polygon: &Polygon<f64>, area_filter: F) -> bool
    where
        F: Fn(usize) -> bool,
    {
        self.candidates_containing(polygon)
            .into_iter()
            .filter(|f| area_filter(f.area))
            .any(|f| is_within(polygon, &f.polygon))
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

#[cfg(test)]
pub(crate) fn square(x0: f64, y0: f64, size: f64) -> Polygon<f64> {
    polygon_from_ring(vec![
        Coord { x: x0, y: y0 },
        Coord { x: x0 + size, y: y0 },
        Coord {
            x: x0 + size,
            y: y0 + size,
        },
        Coord { x: x0, y: y0 + size },
    ])
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_is_closed() {
        let poly = square(0.0, 0.0, 1.0);
        assert_eq!(poly.exterior().0.len(), 5);
        assert_eq!(planar_area(&poly), 1.0);
    }

    #[test]
    fn test_degenerate_ring_rejected() {
        let ring = vec![Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 0.0 }];
        assert!(polygon_from_ring(ring).is_err());
        let ring = vec![
            Coord { x: 0.0, y: 0.0 },
            Coord { x: f64::NAN, y: 0.0 },
            Coord { x: 1.0, y: 1.0 },
        ];
        assert!(polygon_from_ring(ring).is_err());
    }

    #[test]
    fn test_fill_holes() {
        let outer = MultiPolygon::new(vec![square(0.0, 0.0, 10.0)]);
        let holed = difference(&outer, &square(4.0, 4.0, 2.0));
        assert_eq!(holed.0.len(), 1);
        assert_eq!(holed.0[0].interiors().len(), 1);
        let filled = fill_holes(&holed.0[0]);
        assert!(filled.interiors().is_empty());
        assert!((planar_area(&filled) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_within_is_strict_containment() {
        let big = square(0.0, 0.0, 10.0);
        assert!(is_within(&square(1.0, 1.0, 2.0), &big));
        assert!(!is_within(&square(9.0, 9.0, 2.0), &big));
    }

    #[test]
    fn test_union_merges_adjacent_cells() {
        let cells = vec![square(0.0, 0.0, 1.0), square(1.0, 0.0, 1.0)];
        let merged = union_all(&cells);
        assert_eq!(merged.0.len(), 1);
        assert!((merged.unsigned_area() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_index_finds_containers() {
        let fragments = vec![
            vec![square(0.0, 0.0, 10.0)],
            vec![square(20.0, 0.0, 10.0), square(2.0, 2.0, 1.0)],
        ];
        let index = FragmentIndex::build(&fragments);
        assert_eq!(index.len(), 3);

        let probe = square(2.0, 2.0, 1.0);
        assert!(index.is_contained(&probe, |area| area != 1));
        assert!(!index.is_contained(&square(25.0, 5.0, 10.0), |_| true));
        assert!(!index.is_contained(&square(50.0, 50.0, 1.0), |_| true));
    }
}
