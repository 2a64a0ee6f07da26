//! Edge relation filter
//!
//! Decides whether two edges violate a width, space, overlap or inside
//! (enclosure) rule and computes the violating edge parts.
//!
//! All relations are reduced to one normalized form: both edges "look"
//! to their left side and the other edge must be found there, closer
//! than the check distance. Space reverses both edges, inside reverses
//! the subject edge only.

use super::options::{MetricsType, RegionCheckOptions};
use crate::geometry::{Coord, Edge, EdgePair};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeRelationType {
    /// Interior-facing edges of the same layer
    WidthRelation,
    /// Exterior-facing edges of the same layer
    SpaceRelation,
    /// Interior-facing edges of two layers
    OverlapRelation,
    /// Subject edges enclosed by the other layer's edges
    InsideRelation,
}

/// Tolerance for the open region boundaries
const EPS: f64 = 1e-9;

/// Iterations of the Euclidean boundary search
const SEARCH_STEPS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeRelationFilter {
    relation: EdgeRelationType,
    distance: Coord,
    metrics: MetricsType,
    ignore_angle: f64,
    min_projection: Coord,
    max_projection: Option<Coord>,
    whole_edges: bool,
}

/// Edge geometry in f64 with a local frame (u along, v to the left)
#[derive(Clone, Copy)]
struct Frame {
    x1: f64,
    y1: f64,
    ux: f64,
    uy: f64,
    len: f64,
}

impl Frame {
    fn new(e: &Edge) -> Self {
        let (x1, y1) = e.p1.to_f64();
        let len = e.length();
        Self {
            x1,
            y1,
            ux: e.dx() as f64 / len,
            uy: e.dy() as f64 / len,
            len,
        }
    }

    fn u(&self, x: f64, y: f64) -> f64 {
        (x - self.x1) * self.ux + (y - self.y1) * self.uy
    }

    fn v(&self, x: f64, y: f64) -> f64 {
        self.ux * (y - self.y1) - self.uy * (x - self.x1)
    }

    fn distance(&self, x: f64, y: f64) -> f64 {
        let u = self.u(x, y).clamp(0.0, self.len);
        let (px, py) = (self.x1 + u * self.ux, self.y1 + u * self.uy);
        (x - px).hypot(y - py)
    }
}

/// Parameter range of `t` in `lo <= g0 + t * g1 <= hi`, within `[t0, t1]`
fn clip_linear(g0: f64, g1: f64, lo: f64, hi: f64, t0: f64, t1: f64) -> Option<(f64, f64)> {
    if g1.abs() < 1e-12 {
        return (g0 >= lo && g0 <= hi).then_some((t0, t1));
    }
    let (a, b) = ((lo - g0) / g1, (hi - g0) / g1);
    let (a, b) = if a <= b { (a, b) } else { (b, a) };
    let (s0, s1) = (t0.max(a), t1.min(b));
    (s1 > s0).then_some((s0, s1))
}

impl EdgeRelationFilter {
    pub fn new(relation: EdgeRelationType, distance: Coord, options: &RegionCheckOptions) -> Self {
        Self {
            relation,
            distance,
            metrics: options.metrics,
            ignore_angle: options.ignore_angle,
            min_projection: options.min_projection,
            max_projection: options.max_projection,
            whole_edges: options.whole_edges,
        }
    }

    pub fn relation(&self) -> EdgeRelationType {
        self.relation
    }

    pub fn distance(&self) -> Coord {
        self.distance
    }

    pub fn metrics(&self) -> MetricsType {
        self.metrics
    }

    pub fn whole_edges(&self) -> bool {
        self.whole_edges
    }

    /// The same filter with another distance (e.g. scaled for a cell variant)
    pub fn with_distance(&self, distance: Coord) -> Self {
        Self { distance, ..*self }
    }

    /// The symmetric relations report the same violation for both edge orders
    pub fn is_symmetric(&self) -> bool {
        matches!(self.relation, EdgeRelationType::WidthRelation | EdgeRelationType::SpaceRelation)
    }

    fn normalized(&self, a: &Edge, b: &Edge) -> (Edge, Edge) {
        match self.relation {
            EdgeRelationType::WidthRelation | EdgeRelationType::OverlapRelation => (*a, *b),
            EdgeRelationType::SpaceRelation => (a.swapped(), b.swapped()),
            EdgeRelationType::InsideRelation => (a.swapped(), *b),
        }
    }

    /// Angle (degree) between `a` and the reverse of `b`: 0 for edges facing each other
    fn facing_angle(a: &Edge, b: &Edge) -> f64 {
        let (ax, ay) = (a.dx() as f64, a.dy() as f64);
        let (bx, by) = (-b.dx() as f64, -b.dy() as f64);
        let c = (ax * bx + ay * by) / (a.length() * b.length());
        c.clamp(-1.0, 1.0).acos().to_degrees()
    }

    /// Parameter interval of `f` inside the check region of `e`
    fn clip(&self, e: &Edge, f: &Edge) -> Option<(f64, f64)> {
        let frame = Frame::new(e);
        let d = self.distance as f64;
        let (fx, fy) = f.p1.to_f64();
        let (gx, gy) = (f.dx() as f64, f.dy() as f64);

        let u0 = frame.u(fx, fy);
        let u1 = frame.u(fx + gx, fy + gy) - u0;
        let v0 = frame.v(fx, fy);
        let v1 = frame.v(fx + gx, fy + gy) - v0;

        // the other edge must be on the looking side
        let (t0, t1) = clip_linear(v0, v1, EPS, f64::INFINITY, 0.0, 1.0)?;

        match self.metrics {
            MetricsType::Projection => {
                let (t0, t1) = clip_linear(v0, v1, f64::NEG_INFINITY, d - EPS, t0, t1)?;
                clip_linear(u0, u1, 0.0, frame.len, t0, t1)
            }
            MetricsType::Square => {
                let (t0, t1) = clip_linear(v0, v1, f64::NEG_INFINITY, d - EPS, t0, t1)?;
                clip_linear(u0, u1, -d + EPS, frame.len + d - EPS, t0, t1)
            }
            MetricsType::Euclidean => {
                let dist = |t: f64| frame.distance(fx + t * gx, fy + t * gy);

                // the distance is convex along f: find its minimum first
                let (mut lo, mut hi) = (t0, t1);
                for _ in 0..SEARCH_STEPS {
                    let m1 = lo + (hi - lo) / 3.0;
                    let m2 = hi - (hi - lo) / 3.0;
                    if dist(m1) < dist(m2) {
                        hi = m2;
                    } else {
                        lo = m1;
                    }
                }
                let tmin = 0.5 * (lo + hi);
                if dist(tmin) >= d - EPS {
                    return None;
                }

                let boundary = |inside: f64, outside: f64| {
                    if dist(outside) < d - EPS {
                        return outside;
                    }
                    let (mut a, mut b) = (inside, outside);
                    for _ in 0..SEARCH_STEPS {
                        let m = 0.5 * (a + b);
                        if dist(m) < d - EPS {
                            a = m;
                        } else {
                            b = m;
                        }
                    }
                    a
                };
                let (s0, s1) = (boundary(tmin, t0), boundary(tmin, t1));
                (s1 > s0).then_some((s0, s1))
            }
        }
    }

    /// Projected length of the `f` interval onto `e`
    fn projection(e: &Edge, f: &Edge, (t0, t1): (f64, f64)) -> f64 {
        let frame = Frame::new(e);
        let (fx, fy) = f.p1.to_f64();
        let (gx, gy) = (f.dx() as f64, f.dy() as f64);
        let a = frame.u(fx + t0 * gx, fy + t0 * gy).clamp(0.0, frame.len);
        let b = frame.u(fx + t1 * gx, fy + t1 * gy).clamp(0.0, frame.len);
        (b - a).abs()
    }

    /// Check `a` (subject side) against `b`; returns the violation in the
    /// original edge orientation
    pub fn check(&self, a: &Edge, b: &Edge) -> Option<EdgePair> {
        if a.is_degenerate() || b.is_degenerate() || self.distance <= 0 {
            return None;
        }
        let (an, bn) = self.normalized(a, b);

        if Self::facing_angle(&an, &bn) >= self.ignore_angle - EPS {
            return None;
        }

        let ta = self.clip(&bn, &an)?;
        let tb = self.clip(&an, &bn)?;

        let proj = Self::projection(&an, &bn, tb).min(Self::projection(&bn, &an, ta));
        if self.min_projection > 0 && proj < self.min_projection as f64 {
            return None;
        }
        if let Some(max) = self.max_projection {
            if proj >= max as f64 {
                return None;
            }
        }

        if self.whole_edges {
            return Some(EdgePair::new(*a, *b));
        }

        let part = |orig: &Edge, norm: &Edge, (t0, t1): (f64, f64)| {
            let e = Edge::new(norm.point_at(t0), norm.point_at(t1));
            if norm.p1 == orig.p1 {
                e
            } else {
                e.swapped()
            }
        };
        let pa = part(a, &an, ta);
        let pb = part(b, &bn, tb);
        if pa.is_degenerate() || pb.is_degenerate() {
            return None;
        }
        Some(EdgePair::new(pa, pb))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(relation: EdgeRelationType, d: Coord, metrics: MetricsType) -> EdgeRelationFilter {
        let opts = RegionCheckOptions {
            metrics,
            ..Default::default()
        };
        EdgeRelationFilter::new(relation, d, &opts)
    }

    #[test]
    fn test_width_of_thin_box() {
        // box 0,0..100,5: bottom edge runs right, top edge runs left
        let bottom = Edge::from_coords(0, 0, 100, 0);
        let top = Edge::from_coords(100, 5, 0, 5);
        let f = filter(EdgeRelationType::WidthRelation, 10, MetricsType::Euclidean);
        let ep = f.check(&bottom, &top).unwrap();
        assert_eq!(ep.first, bottom);
        assert_eq!(ep.second, top);

        let f = filter(EdgeRelationType::WidthRelation, 5, MetricsType::Euclidean);
        assert!(f.check(&bottom, &top).is_none());
    }

    #[test]
    fn test_space_between_boxes() {
        // right edge of 0,0..10,10 and left edge of 15,0..25,10
        let a = Edge::from_coords(10, 0, 10, 10);
        let b = Edge::from_coords(15, 10, 15, 0);
        let f = filter(EdgeRelationType::SpaceRelation, 10, MetricsType::Euclidean);
        let ep = f.check(&a, &b).unwrap();
        assert_eq!(ep.first, a);
        assert_eq!(ep.second, b);

        // the width relation looks the other way
        let f = filter(EdgeRelationType::WidthRelation, 10, MetricsType::Euclidean);
        assert!(f.check(&a, &b).is_none());
    }

    #[test]
    fn test_partial_projection() {
        let a = Edge::from_coords(0, 0, 100, 0);
        let b = Edge::from_coords(150, 5, 50, 5);
        let f = filter(EdgeRelationType::WidthRelation, 10, MetricsType::Projection);
        let ep = f.check(&a, &b).unwrap();
        assert_eq!(ep.first, Edge::from_coords(50, 0, 100, 0));
        assert_eq!(ep.second, Edge::from_coords(100, 5, 50, 5));
    }

    #[test]
    fn test_corner_metrics() {
        // edges offset diagonally: 5 apart in y, 5 apart in x beyond the end
        let a = Edge::from_coords(0, 0, 10, 0);
        let b = Edge::from_coords(25, 5, 15, 5);
        assert!(filter(EdgeRelationType::WidthRelation, 10, MetricsType::Projection)
            .check(&a, &b)
            .is_none());
        assert!(filter(EdgeRelationType::WidthRelation, 10, MetricsType::Square)
            .check(&a, &b)
            .is_some());
        // sqrt(50) < 10
        assert!(filter(EdgeRelationType::WidthRelation, 10, MetricsType::Euclidean)
            .check(&a, &b)
            .is_some());
        assert!(filter(EdgeRelationType::WidthRelation, 7, MetricsType::Euclidean)
            .check(&a, &b)
            .is_none());
    }

    #[test]
    fn test_perpendicular_edges_ignored() {
        let a = Edge::from_coords(0, 0, 10, 0);
        let b = Edge::from_coords(5, 2, 5, 8);
        let f = filter(EdgeRelationType::WidthRelation, 10, MetricsType::Euclidean);
        assert!(f.check(&a, &b).is_none());
    }

    #[test]
    fn test_enclosure() {
        // inner box right edge at x=10 (upwards), outer box right edge at x=13 (upwards)
        let inner = Edge::from_coords(10, 0, 10, 10);
        let outer = Edge::from_coords(13, -5, 13, 15);
        let f = filter(EdgeRelationType::InsideRelation, 5, MetricsType::Euclidean);
        let ep = f.check(&inner, &outer).unwrap();
        assert_eq!(ep.first, inner);
        // sqrt(3^2 + 4^2) = 5 bounds the outer edge part
        assert_eq!(ep.second, Edge::from_coords(13, -4, 13, 14));

        let f = filter(EdgeRelationType::InsideRelation, 3, MetricsType::Projection);
        assert!(f.check(&inner, &outer).is_none());
    }

    #[test]
    fn test_projection_limits() {
        let a = Edge::from_coords(0, 0, 100, 0);
        let b = Edge::from_coords(150, 5, 50, 5);
        let opts = RegionCheckOptions {
            metrics: MetricsType::Projection,
            min_projection: 60,
            ..Default::default()
        };
        assert!(EdgeRelationFilter::new(EdgeRelationType::WidthRelation, 10, &opts)
            .check(&a, &b)
            .is_none());
        let opts = RegionCheckOptions {
            min_projection: 0,
            max_projection: Some(40),
            ..opts
        };
        assert!(EdgeRelationFilter::new(EdgeRelationType::WidthRelation, 10, &opts)
            .check(&a, &b)
            .is_none());
    }
}
