//! Core geometry types for hierarchical layout processing
//!
//! This module contains the fundamental integer primitives used throughout
//! the engine: points, vectors, boxes, edges, edge pairs and texts.
//! All coordinates are database units.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Neg, Sub};

/// Database unit coordinate
pub type Coord = i32;

/// A 2D point in database units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: Coord,
    pub y: Coord,
}

impl Point {
    pub const fn new(x: Coord, y: Coord) -> Self {
        Self { x, y }
    }

    pub fn to_f64(self) -> (f64, f64) {
        (self.x as f64, self.y as f64)
    }

    /// Point from floating-point coordinates, rounded to the grid
    pub fn from_f64(x: f64, y: f64) -> Self {
        Self {
            x: x.round() as Coord,
            y: y.round() as Coord,
        }
    }
}

/// A 2D displacement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Vector {
    pub x: Coord,
    pub y: Coord,
}

impl Vector {
    pub const fn new(x: Coord, y: Coord) -> Self {
        Self { x, y }
    }

    pub fn is_zero(self) -> bool {
        self.x == 0 && self.y == 0
    }

    /// Cross product (z component), widened
    pub fn cross(self, other: Vector) -> i64 {
        self.x as i64 * other.y as i64 - self.y as i64 * other.x as i64
    }

    /// Dot product, widened
    pub fn dot(self, other: Vector) -> i64 {
        self.x as i64 * other.x as i64 + self.y as i64 * other.y as i64
    }

    pub fn length(self) -> f64 {
        ((self.x as f64).powi(2) + (self.y as f64).powi(2)).sqrt()
    }
}

impl Add<Vector> for Point {
    type Output = Point;
    fn add(self, v: Vector) -> Point {
        Point::new(self.x + v.x, self.y + v.y)
    }
}

impl Sub<Vector> for Point {
    type Output = Point;
    fn sub(self, v: Vector) -> Point {
        Point::new(self.x - v.x, self.y - v.y)
    }
}

impl Sub<Point> for Point {
    type Output = Vector;
    fn sub(self, p: Point) -> Vector {
        Vector::new(self.x - p.x, self.y - p.y)
    }
}

impl Add for Vector {
    type Output = Vector;
    fn add(self, v: Vector) -> Vector {
        Vector::new(self.x + v.x, self.y + v.y)
    }
}

impl Neg for Vector {
    type Output = Vector;
    fn neg(self) -> Vector {
        Vector::new(-self.x, -self.y)
    }
}

/// Axis-aligned bounding box
///
/// An empty box has `p1` > `p2` in at least one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BBox {
    pub p1: Point,
    pub p2: Point,
}

impl Default for BBox {
    fn default() -> Self {
        Self::empty()
    }
}

impl BBox {
    /// Box from two arbitrary corners
    pub fn new(a: Point, b: Point) -> Self {
        Self {
            p1: Point::new(a.x.min(b.x), a.y.min(b.y)),
            p2: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn from_coords(left: Coord, bottom: Coord, right: Coord, top: Coord) -> Self {
        Self::new(Point::new(left, bottom), Point::new(right, top))
    }

    pub const fn empty() -> Self {
        Self {
            p1: Point::new(1, 1),
            p2: Point::new(-1, -1),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.p1.x > self.p2.x || self.p1.y > self.p2.y
    }

    pub fn left(&self) -> Coord {
        self.p1.x
    }

    pub fn bottom(&self) -> Coord {
        self.p1.y
    }

    pub fn right(&self) -> Coord {
        self.p2.x
    }

    pub fn top(&self) -> Coord {
        self.p2.y
    }

    pub fn width(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.p2.x as i64 - self.p1.x as i64
        }
    }

    pub fn height(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.p2.y as i64 - self.p1.y as i64
        }
    }

    pub fn area(&self) -> f64 {
        self.width() as f64 * self.height() as f64
    }

    pub fn center(&self) -> Point {
        Point::new(
            ((self.p1.x as i64 + self.p2.x as i64) / 2) as Coord,
            ((self.p1.y as i64 + self.p2.y as i64) / 2) as Coord,
        )
    }

    /// Extend the box to include a point
    pub fn add_point(&mut self, p: Point) {
        if self.is_empty() {
            *self = Self { p1: p, p2: p };
        } else {
            self.p1 = Point::new(self.p1.x.min(p.x), self.p1.y.min(p.y));
            self.p2 = Point::new(self.p2.x.max(p.x), self.p2.y.max(p.y));
        }
    }

    pub fn union(&self, other: &BBox) -> BBox {
        if self.is_empty() {
            *other
        } else if other.is_empty() {
            *self
        } else {
            BBox {
                p1: Point::new(self.p1.x.min(other.p1.x), self.p1.y.min(other.p1.y)),
                p2: Point::new(self.p2.x.max(other.p2.x), self.p2.y.max(other.p2.y)),
            }
        }
    }

    pub fn intersection(&self, other: &BBox) -> BBox {
        if self.is_empty() || other.is_empty() {
            return BBox::empty();
        }
        BBox {
            p1: Point::new(self.p1.x.max(other.p1.x), self.p1.y.max(other.p1.y)),
            p2: Point::new(self.p2.x.min(other.p2.x), self.p2.y.min(other.p2.y)),
        }
    }

    /// Box grown by `d` on every side (saturating)
    pub fn enlarged(&self, d: Coord) -> BBox {
        if self.is_empty() {
            return *self;
        }
        BBox {
            p1: Point::new(self.p1.x.saturating_sub(d), self.p1.y.saturating_sub(d)),
            p2: Point::new(self.p2.x.saturating_add(d), self.p2.y.saturating_add(d)),
        }
    }

    pub fn moved(&self, v: Vector) -> BBox {
        if self.is_empty() {
            return *self;
        }
        BBox {
            p1: self.p1 + v,
            p2: self.p2 + v,
        }
    }

    /// True if the boxes share at least one point (closed intervals)
    pub fn touches(&self, other: &BBox) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.p1.x <= other.p2.x
            && other.p1.x <= self.p2.x
            && self.p1.y <= other.p2.y
            && other.p1.y <= self.p2.y
    }

    /// True if the boxes share an area of non-zero size
    pub fn overlaps(&self, other: &BBox) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.p1.x < other.p2.x
            && other.p1.x < self.p2.x
            && self.p1.y < other.p2.y
            && other.p1.y < self.p2.y
    }

    pub fn contains(&self, p: Point) -> bool {
        !self.is_empty() && p.x >= self.p1.x && p.x <= self.p2.x && p.y >= self.p1.y && p.y <= self.p2.y
    }

    pub fn contains_box(&self, other: &BBox) -> bool {
        other.is_empty() || (self.contains(other.p1) && self.contains(other.p2))
    }
}

/// A directed edge between two points
///
/// For polygon contours the interior lies on the left side of the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub p1: Point,
    pub p2: Point,
}

impl Edge {
    pub const fn new(p1: Point, p2: Point) -> Self {
        Self { p1, p2 }
    }

    pub fn from_coords(x1: Coord, y1: Coord, x2: Coord, y2: Coord) -> Self {
        Self::new(Point::new(x1, y1), Point::new(x2, y2))
    }

    pub fn d(&self) -> Vector {
        self.p2 - self.p1
    }

    pub fn dx(&self) -> i64 {
        self.p2.x as i64 - self.p1.x as i64
    }

    pub fn dy(&self) -> i64 {
        self.p2.y as i64 - self.p1.y as i64
    }

    pub fn is_degenerate(&self) -> bool {
        self.p1 == self.p2
    }

    pub fn length(&self) -> f64 {
        (self.dx() as f64).hypot(self.dy() as f64)
    }

    pub fn sq_length(&self) -> i64 {
        self.dx() * self.dx() + self.dy() * self.dy()
    }

    pub fn swapped(&self) -> Edge {
        Edge::new(self.p2, self.p1)
    }

    pub fn moved(&self, v: Vector) -> Edge {
        Edge::new(self.p1 + v, self.p2 + v)
    }

    pub fn bbox(&self) -> BBox {
        BBox::new(self.p1, self.p2)
    }

    /// Sign of the side `p` is on: +1 left, -1 right, 0 on the line
    pub fn side_of(&self, p: Point) -> i32 {
        let c = cross3(self.p1, self.p2, p);
        c.signum() as i32
    }

    /// True if `p` lies on the closed segment
    pub fn contains(&self, p: Point) -> bool {
        if self.is_degenerate() {
            return p == self.p1;
        }
        cross3(self.p1, self.p2, p) == 0
            && p.x >= self.p1.x.min(self.p2.x)
            && p.x <= self.p1.x.max(self.p2.x)
            && p.y >= self.p1.y.min(self.p2.y)
            && p.y <= self.p1.y.max(self.p2.y)
    }

    /// True if `other` is a collinear sub-segment of this edge
    pub fn contains_edge(&self, other: &Edge) -> bool {
        self.contains(other.p1) && self.contains(other.p2)
    }

    pub fn is_parallel(&self, other: &Edge) -> bool {
        self.d().cross(other.d()) == 0
    }

    /// True if both edges lie on the same infinite line
    pub fn is_collinear(&self, other: &Edge) -> bool {
        cross3(self.p1, self.p2, other.p1) == 0 && cross3(self.p1, self.p2, other.p2) == 0
    }

    /// True if the closed segments share at least one point
    pub fn intersects(&self, other: &Edge) -> bool {
        if !self.bbox().touches(&other.bbox()) {
            return false;
        }
        let d1 = cross3(other.p1, other.p2, self.p1).signum();
        let d2 = cross3(other.p1, other.p2, self.p2).signum();
        let d3 = cross3(self.p1, self.p2, other.p1).signum();
        let d4 = cross3(self.p1, self.p2, other.p2).signum();
        if d1 * d2 < 0 && d3 * d4 < 0 {
            return true;
        }
        (d1 == 0 && other.contains(self.p1))
            || (d2 == 0 && other.contains(self.p2))
            || (d3 == 0 && self.contains(other.p1))
            || (d4 == 0 && self.contains(other.p2))
    }

    /// True if the segments cross in a single point interior to both
    pub fn crosses(&self, other: &Edge) -> bool {
        let d1 = cross3(other.p1, other.p2, self.p1).signum();
        let d2 = cross3(other.p1, other.p2, self.p2).signum();
        let d3 = cross3(self.p1, self.p2, other.p1).signum();
        let d4 = cross3(self.p1, self.p2, other.p2).signum();
        d1 * d2 < 0 && d3 * d4 < 0
    }

    /// Intersection point of two non-parallel segments, rounded to the grid
    pub fn intersection_point(&self, other: &Edge) -> Option<Point> {
        if !self.intersects(other) {
            return None;
        }
        let den = self.d().cross(other.d()) as i128;
        if den == 0 {
            return None;
        }
        let num = (other.p1 - self.p1).cross(other.d()) as i128;
        let x = self.p1.x as i128 * den + num * self.dx() as i128;
        let y = self.p1.y as i128 * den + num * self.dy() as i128;
        Some(Point::new(div_round(x, den) as Coord, div_round(y, den) as Coord))
    }

    /// Point at parameter `t` (0 = p1, 1 = p2), rounded to the grid
    pub fn point_at(&self, t: f64) -> Point {
        let (x1, y1) = self.p1.to_f64();
        Point::from_f64(x1 + t * self.dx() as f64, y1 + t * self.dy() as f64)
    }

    /// Parameter of the orthogonal projection of `p` onto the edge's line
    pub fn param_of(&self, p: Point) -> f64 {
        let l2 = self.sq_length() as f64;
        if l2 == 0.0 {
            return 0.0;
        }
        (p - self.p1).dot(self.d()) as f64 / l2
    }

    /// Euclidean distance from `p` to the closed segment
    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        let (x1, y1) = self.p1.to_f64();
        let (dx, dy) = (self.dx() as f64, self.dy() as f64);
        let l2 = dx * dx + dy * dy;
        if l2 == 0.0 {
            return (x - x1).hypot(y - y1);
        }
        let t = (((x - x1) * dx + (y - y1) * dy) / l2).clamp(0.0, 1.0);
        (x - (x1 + t * dx)).hypot(y - (y1 + t * dy))
    }
}

/// Cross product of (b - a) and (c - a)
pub fn cross3(a: Point, b: Point, c: Point) -> i64 {
    (b - a).cross(c - a)
}

/// Integer division rounding half away from zero
pub fn div_round(num: i128, den: i128) -> i128 {
    let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
    if num >= 0 {
        (2 * num + den) / (2 * den)
    } else {
        -((-2 * num + den) / (2 * den))
    }
}

/// An ordered pair of edges, typically marking a DRC violation
///
/// Symmetric pairs compare equal regardless of the order of their edges:
/// the constructor stores them in a canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgePair {
    pub first: Edge,
    pub second: Edge,
    pub symmetric: bool,
}

impl EdgePair {
    pub fn new(first: Edge, second: Edge) -> Self {
        Self {
            first,
            second,
            symmetric: false,
        }
    }

    pub fn symmetric(a: Edge, b: Edge) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self {
            first,
            second,
            symmetric: true,
        }
    }

    /// A pair whose second edge repeats the first one
    pub fn self_paired(e: Edge) -> Self {
        Self::new(e, e)
    }

    pub fn bbox(&self) -> BBox {
        self.first.bbox().union(&self.second.bbox())
    }

    pub fn swapped_edges(&self) -> EdgePair {
        EdgePair {
            first: self.second,
            second: self.first,
            symmetric: self.symmetric,
        }
    }

    pub fn moved(&self, v: Vector) -> EdgePair {
        EdgePair {
            first: self.first.moved(v),
            second: self.second.moved(v),
            symmetric: self.symmetric,
        }
    }
}

/// A text label anchored at a point
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Text {
    pub string: String,
    pub pos: Point,
}

impl Text {
    pub fn new(string: impl Into<String>, pos: Point) -> Self {
        Self {
            string: string.into(),
            pos,
        }
    }

    pub fn bbox(&self) -> BBox {
        BBox::new(self.pos, self.pos)
    }
}

/// Parameter intervals along `e` covered by collinear sub-edges in `parts`
fn covered_intervals(e: &Edge, parts: &[Edge]) -> Vec<(f64, f64)> {
    let mut spans: Vec<(f64, f64)> = parts
        .iter()
        .filter(|p| !p.is_degenerate() && e.is_collinear(p))
        .map(|p| {
            let (a, b) = (e.param_of(p.p1), e.param_of(p.p2));
            (a.min(b).max(0.0), a.max(b).min(1.0))
        })
        .filter(|(a, b)| b > a)
        .collect();
    spans.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut merged: Vec<(f64, f64)> = Vec::with_capacity(spans.len());
    for (a, b) in spans {
        match merged.last_mut() {
            Some(last) if a <= last.1 => last.1 = last.1.max(b),
            _ => merged.push((a, b)),
        }
    }
    merged
}

/// Parts of `e` covered by the collinear edges in `parts`
pub fn edge_intersections(e: &Edge, parts: &[Edge]) -> Vec<Edge> {
    covered_intervals(e, parts)
        .into_iter()
        .map(|(a, b)| Edge::new(e.point_at(a), e.point_at(b)))
        .filter(|p| !p.is_degenerate())
        .collect()
}

/// Parts of `e` not covered by the collinear edges in `parts`
pub fn edge_differences(e: &Edge, parts: &[Edge]) -> Vec<Edge> {
    let mut out = Vec::new();
    let mut t = 0.0;
    for (a, b) in covered_intervals(e, parts) {
        if a > t {
            out.push(Edge::new(e.point_at(t), e.point_at(a)));
        }
        t = t.max(b);
    }
    if t < 1.0 {
        out.push(Edge::new(e.point_at(t), e.p2));
    }
    out.retain(|p| !p.is_degenerate());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_overlap_vs_touch() {
        let a = BBox::from_coords(0, 0, 10, 10);
        let b = BBox::from_coords(10, 0, 20, 10);
        assert!(a.touches(&b));
        assert!(!a.overlaps(&b));
        assert!(a.enlarged(1).overlaps(&b));
        assert!(BBox::empty().is_empty());
    }

    #[test]
    fn test_edge_intersection() {
        let a = Edge::from_coords(0, 0, 10, 10);
        let b = Edge::from_coords(0, 10, 10, 0);
        assert!(a.crosses(&b));
        assert_eq!(a.intersection_point(&b), Some(Point::new(5, 5)));

        let c = Edge::from_coords(10, 10, 20, 10);
        assert!(a.intersects(&c));
        assert!(!a.crosses(&c));
    }

    #[test]
    fn test_edge_differences() {
        let e = Edge::from_coords(0, 0, 100, 0);
        let parts = vec![Edge::from_coords(20, 0, 40, 0), Edge::from_coords(30, 0, 60, 0)];
        let diff = edge_differences(&e, &parts);
        assert_eq!(diff, vec![Edge::from_coords(0, 0, 20, 0), Edge::from_coords(60, 0, 100, 0)]);
        let common = edge_intersections(&e, &parts);
        assert_eq!(common, vec![Edge::from_coords(20, 0, 60, 0)]);
    }

    #[test]
    fn test_symmetric_edge_pair() {
        let a = Edge::from_coords(0, 0, 10, 0);
        let b = Edge::from_coords(10, 5, 0, 5);
        assert_eq!(EdgePair::symmetric(a, b), EdgePair::symmetric(b, a));
        assert_ne!(EdgePair::new(a, b), EdgePair::new(b, a));
    }

    #[test]
    fn test_div_round() {
        assert_eq!(div_round(5, 2), 3);
        assert_eq!(div_round(-5, 2), -3);
        assert_eq!(div_round(4, 3), 1);
        assert_eq!(div_round(7, -2), -4);
    }
}
