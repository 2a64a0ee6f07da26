//! Polygon type with holes
//!
//! Polygons are stored in a canonical form so that value equality means
//! geometric equality: the hull runs counter-clockwise, holes run clockwise,
//! redundant points are removed and every contour starts at its smallest
//! point. Holes are sorted.

use super::trans::ICplxTrans;
use super::types::{cross3, BBox, Coord, Edge, Point, Vector};
use serde::{Deserialize, Serialize};

/// A filled polygon with optional holes
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Polygon {
    hull: Vec<Point>,
    holes: Vec<Vec<Point>>,
}

impl Polygon {
    /// Polygon from a hull contour (any orientation)
    pub fn new(hull: Vec<Point>) -> Self {
        Self::with_holes(hull, Vec::new())
    }

    /// Polygon from a hull and hole contours (any orientation)
    pub fn with_holes(hull: Vec<Point>, holes: Vec<Vec<Point>>) -> Self {
        let hull = normalize_contour(hull, true);
        if hull.len() < 3 {
            return Self::default();
        }
        let mut holes: Vec<Vec<Point>> = holes
            .into_iter()
            .map(|h| normalize_contour(h, false))
            .filter(|h| h.len() >= 3)
            .collect();
        holes.sort();
        Self { hull, holes }
    }

    pub fn from_box(b: &BBox) -> Self {
        if b.is_empty() {
            return Self::default();
        }
        Self::new(vec![
            b.p1,
            Point::new(b.p2.x, b.p1.y),
            b.p2,
            Point::new(b.p1.x, b.p2.y),
        ])
    }

    pub fn hull(&self) -> &[Point] {
        &self.hull
    }

    pub fn holes(&self) -> &[Vec<Point>] {
        &self.holes
    }

    pub fn is_empty(&self) -> bool {
        self.hull.is_empty()
    }

    /// Total number of points over all contours
    pub fn vertices(&self) -> usize {
        self.hull.len() + self.holes.iter().map(|h| h.len()).sum::<usize>()
    }

    pub fn bbox(&self) -> BBox {
        let mut b = BBox::empty();
        for &p in &self.hull {
            b.add_point(p);
        }
        b
    }

    /// True for an axis-aligned rectangle without holes
    pub fn is_box(&self) -> bool {
        if self.hull.len() != 4 || !self.holes.is_empty() {
            return false;
        }
        (0..4).all(|i| {
            let a = self.hull[i];
            let b = self.hull[(i + 1) % 4];
            a.x == b.x || a.y == b.y
        })
    }

    /// Twice the signed area, hull minus holes
    pub fn area2(&self) -> i128 {
        contour_area2(&self.hull) + self.holes.iter().map(|h| contour_area2(h)).sum::<i128>()
    }

    pub fn area(&self) -> f64 {
        self.area2() as f64 * 0.5
    }

    /// Ratio of bounding box area to polygon area
    pub fn area_ratio(&self) -> f64 {
        let a = self.area();
        if a <= 0.0 {
            0.0
        } else {
            self.bbox().area() / a
        }
    }

    /// All contour edges, hull first, interior on the left
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        std::iter::once(&self.hull)
            .chain(self.holes.iter())
            .flat_map(|c| contour_edges(c))
    }

    /// Edges of the hull contour only
    pub fn hull_edges(&self) -> impl Iterator<Item = Edge> + '_ {
        contour_edges(&self.hull)
    }

    /// Classify a point: `Some(true)` inside, `Some(false)` outside, `None` on the boundary
    pub fn classify(&self, p: Point) -> Option<bool> {
        if !self.bbox().contains(p) {
            return Some(false);
        }
        let mut wn = 0;
        for e in self.edges() {
            if e.contains(p) {
                return None;
            }
            if e.p1.y <= p.y {
                if e.p2.y > p.y && cross3(e.p1, e.p2, p) > 0 {
                    wn += 1;
                }
            } else if e.p2.y <= p.y && cross3(e.p1, e.p2, p) < 0 {
                wn -= 1;
            }
        }
        Some(wn != 0)
    }

    /// True if the point is inside or on the boundary
    pub fn contains_point(&self, p: Point) -> bool {
        self.classify(p) != Some(false)
    }

    pub fn moved(&self, v: Vector) -> Polygon {
        if v.is_zero() {
            return self.clone();
        }
        Polygon {
            hull: self.hull.iter().map(|&p| p + v).collect(),
            holes: self
                .holes
                .iter()
                .map(|h| h.iter().map(|&p| p + v).collect())
                .collect(),
        }
    }

    pub fn transformed(&self, t: &ICplxTrans) -> Polygon {
        if t.is_identity() {
            return self.clone();
        }
        if t.is_displacement() {
            return self.moved(t.disp());
        }
        Polygon::with_holes(
            self.hull.iter().map(|&p| t.apply(p)).collect(),
            self.holes
                .iter()
                .map(|h| h.iter().map(|&p| t.apply(p)).collect())
                .collect(),
        )
    }
}

/// Edge interaction test between a polygon and an edge (closed sets)
pub fn polygon_interacts_with_edge(poly: &Polygon, e: &Edge) -> bool {
    if !poly.bbox().touches(&e.bbox()) {
        return false;
    }
    poly.contains_point(e.p1) || poly.edges().any(|pe| pe.intersects(e))
}

/// True if the boundaries of the polygons share at least one point
pub fn polygons_touch(a: &Polygon, b: &Polygon) -> bool {
    if !a.bbox().touches(&b.bbox()) {
        return false;
    }
    let bb = b.bbox();
    a.edges()
        .filter(|ea| ea.bbox().touches(&bb))
        .any(|ea| b.edges().any(|eb| ea.intersects(&eb)))
}

fn contour_edges(c: &[Point]) -> impl Iterator<Item = Edge> + '_ {
    let n = c.len();
    (0..n).map(move |i| Edge::new(c[i], c[(i + 1) % n]))
}

/// Twice the signed area of a closed contour
pub fn contour_area2(c: &[Point]) -> i128 {
    let n = c.len();
    let mut a: i128 = 0;
    for i in 0..n {
        let p = c[i];
        let q = c[(i + 1) % n];
        a += p.x as i128 * q.y as i128 - q.x as i128 * p.y as i128;
    }
    a
}

/// Remove duplicate and collinear points, orient and rotate to the smallest point
fn normalize_contour(mut pts: Vec<Point>, ccw: bool) -> Vec<Point> {
    // one point at a time, so spikes collapse completely
    let mut start = 0;
    while pts.len() >= 3 {
        let n = pts.len();
        let redundant = (0..n).map(|k| (start + k) % n).find(|&i| {
            let prev = pts[(i + n - 1) % n];
            pts[i] == prev || cross3(prev, pts[i], pts[(i + 1) % n]) == 0
        });
        match redundant {
            Some(i) => {
                pts.remove(i);
                start = i.saturating_sub(1);
            }
            None => break,
        }
    }
    if pts.len() < 3 {
        return Vec::new();
    }
    let a = contour_area2(&pts);
    if a == 0 {
        return Vec::new();
    }
    if (a > 0) != ccw {
        pts.reverse();
    }
    if let Some(min_idx) = pts.iter().enumerate().min_by_key(|(_, p)| **p).map(|(i, _)| i) {
        pts.rotate_left(min_idx);
    }
    pts
}

/// Box polygon helper used by tests and splitters
pub fn box_polygon(left: Coord, bottom: Coord, right: Coord, top: Coord) -> Polygon {
    Polygon::from_box(&BBox::from_coords(left, bottom, right, top))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_form() {
        let a = Polygon::new(vec![
            Point::new(10, 10),
            Point::new(0, 10),
            Point::new(0, 0),
            Point::new(5, 0),
            Point::new(10, 0),
        ]);
        let b = box_polygon(0, 0, 10, 10);
        assert_eq!(a, b);
        assert_eq!(a.hull().len(), 4);
        assert!(a.area2() > 0);
        assert!(a.is_box());
    }

    #[test]
    fn test_classify() {
        let p = box_polygon(0, 0, 10, 10);
        assert_eq!(p.classify(Point::new(5, 5)), Some(true));
        assert_eq!(p.classify(Point::new(10, 5)), None);
        assert_eq!(p.classify(Point::new(11, 5)), Some(false));
    }

    #[test]
    fn test_holes_reduce_area() {
        let p = Polygon::with_holes(
            box_polygon(0, 0, 10, 10).hull().to_vec(),
            vec![box_polygon(2, 2, 4, 4).hull().to_vec()],
        );
        assert_eq!(p.area(), 96.0);
        assert!(!p.is_box());
        assert_eq!(p.classify(Point::new(3, 3)), Some(false));
    }

    #[test]
    fn test_polygons_touch() {
        let a = box_polygon(0, 0, 10, 10);
        let b = box_polygon(10, 10, 20, 20);
        let c = box_polygon(11, 0, 20, 5);
        assert!(polygons_touch(&a, &b));
        assert!(!polygons_touch(&a, &c));
    }
}
