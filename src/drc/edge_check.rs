//! Edge-to-edge checking with shielding and negative output
//!
//! `Poly2PolyCheck` collects the edges of the polygons involved in a check
//! and feeds candidate pairs to `Edge2EdgeCheckNegativeOrPositive`. The
//! check runs in passes: pass 0 collects the violations, pass 1 (only
//! when needed) removes shielded violations and computes the negative
//! output.

use super::relation::EdgeRelationFilter;
use crate::geometry::{edge_differences, BBox, BoxScanner, Coord, Edge, EdgePair, Point, Polygon};
use crate::ops::EdgeToEdgeSetGenerator;
use std::collections::{HashMap, HashSet};

/// Input layer of subject edges
pub const SUBJECT_LAYER: u8 = 0;
/// Input layer of intruder edges
pub const INTRUDER_LAYER: u8 = 1;

/// An edge tagged with its polygon and input layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckEdge {
    pub edge: Edge,
    pub poly_id: usize,
    pub layer: u8,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    pair: EdgePair,
    first: usize,
    second: usize,
    intra: bool,
}

pub struct Edge2EdgeCheckNegativeOrPositive {
    filter: EdgeRelationFilter,
    different_polygons: bool,
    has_other: bool,
    shielded: bool,
    symmetric_edges: bool,
    negative: bool,
    pass: u32,
    candidates: Vec<Candidate>,
    result: HashSet<EdgePair>,
    intra_polygon_result: HashSet<EdgePair>,
    negative_result: HashSet<EdgePair>,
}

impl Edge2EdgeCheckNegativeOrPositive {
    pub fn new(
        filter: EdgeRelationFilter,
        different_polygons: bool,
        has_other: bool,
        shielded: bool,
        symmetric_edges: bool,
        negative: bool,
    ) -> Self {
        Self {
            filter,
            different_polygons,
            has_other,
            shielded,
            symmetric_edges,
            negative,
            pass: 0,
            candidates: Vec::new(),
            result: HashSet::new(),
            intra_polygon_result: HashSet::new(),
            negative_result: HashSet::new(),
        }
    }

    pub fn pass(&self) -> u32 {
        self.pass
    }

    pub fn distance(&self) -> Coord {
        self.filter.distance()
    }

    /// Pass 0: check a candidate pair of edges in both directions
    pub fn add(&mut self, i: usize, a: &CheckEdge, j: usize, b: &CheckEdge) {
        if self.pass != 0 {
            return;
        }

        if self.has_other {
            match (a.layer, b.layer) {
                (SUBJECT_LAYER, INTRUDER_LAYER) => self.check(i, a, j, b),
                (INTRUDER_LAYER, SUBJECT_LAYER) => self.check(j, b, i, a),
                _ => {}
            }
            return;
        }

        if self.different_polygons && a.poly_id == b.poly_id {
            return;
        }
        // the first edge of a reported pair is always a subject edge
        if a.layer == SUBJECT_LAYER {
            self.check(i, a, j, b);
        }
        if b.layer == SUBJECT_LAYER {
            self.check(j, b, i, a);
        }
    }

    fn check(&mut self, i: usize, a: &CheckEdge, j: usize, b: &CheckEdge) {
        if let Some(pair) = self.filter.check(&a.edge, &b.edge) {
            self.candidates.push(Candidate {
                pair,
                first: i,
                second: j,
                intra: a.poly_id == b.poly_id,
            });
        }
    }

    /// Advance to the next pass; false when the check is complete
    pub fn prepare_next_pass(&mut self) -> bool {
        if self.pass == 0 && ((self.shielded && !self.candidates.is_empty()) || self.negative) {
            self.pass = 1;
            return true;
        }
        if self.pass == 0 {
            self.commit(&[]);
        }
        false
    }

    /// Pass 1: shielding and negative output
    pub fn finish(&mut self, edges: &[CheckEdge], scanner: &BoxScanner) {
        let shielded: Vec<bool> = if self.shielded {
            self.candidates
                .iter()
                .map(|c| is_shielded(c, edges, scanner))
                .collect()
        } else {
            vec![false; self.candidates.len()]
        };
        self.commit(&shielded);

        if self.negative {
            self.collect_negative(edges);
        }
    }

    fn commit(&mut self, shielded: &[bool]) {
        for (k, c) in self.candidates.iter().enumerate() {
            if shielded.get(k).copied().unwrap_or(false) {
                continue;
            }
            let pair = if self.symmetric_edges {
                EdgePair::symmetric(c.pair.first, c.pair.second)
            } else {
                c.pair
            };
            if c.intra {
                self.intra_polygon_result.insert(pair);
            } else {
                self.result.insert(pair);
            }
        }
        // shielded candidates do not mask edges in the negative output
        let keep: Vec<Candidate> = self
            .candidates
            .iter()
            .enumerate()
            .filter(|(k, _)| !shielded.get(*k).copied().unwrap_or(false))
            .map(|(_, c)| *c)
            .collect();
        self.candidates = keep;
    }

    fn collect_negative(&mut self, edges: &[CheckEdge]) {
        let mut violating: HashMap<usize, Vec<Edge>> = HashMap::new();
        for c in &self.candidates {
            violating.entry(c.first).or_default().push(c.pair.first);
            violating.entry(c.second).or_default().push(c.pair.second);
        }

        let mut subject_parts: Vec<Edge> = Vec::new();
        {
            let mut generator = EdgeToEdgeSetGenerator::new(1 << SUBJECT_LAYER, &mut subject_parts, None);
            for (k, ce) in edges.iter().enumerate() {
                let parts = violating.get(&k).map(Vec::as_slice).unwrap_or(&[]);
                for part in edge_differences(&ce.edge, parts) {
                    generator.put(part, 1 << ce.layer);
                }
            }
        }
        self.negative_result
            .extend(subject_parts.into_iter().map(EdgePair::self_paired));
    }

    pub fn result(&self) -> &HashSet<EdgePair> {
        &self.result
    }

    pub fn intra_polygon_result(&self) -> &HashSet<EdgePair> {
        &self.intra_polygon_result
    }

    pub fn negative_result(&self) -> &HashSet<EdgePair> {
        &self.negative_result
    }

    pub fn into_results(self) -> (HashSet<EdgePair>, HashSet<EdgePair>, HashSet<EdgePair>) {
        (self.result, self.intra_polygon_result, self.negative_result)
    }
}

/// The quadrilateral spanned by the two edges of a violation
pub(crate) fn violation_quad(pair: &EdgePair) -> Option<Polygon> {
    let (a, b) = (pair.first, pair.second);
    let pts: Vec<Point> = if a.d().dot(b.d()) > 0 {
        vec![a.p1, a.p2, b.p2, b.p1]
    } else {
        vec![a.p1, a.p2, b.p1, b.p2]
    };
    let quad = Polygon::new(pts);
    (!quad.is_empty() && quad.area2() != 0).then_some(quad)
}

/// True if an edge other than the violating ones cuts into the space between them
fn is_shielded(c: &Candidate, edges: &[CheckEdge], scanner: &BoxScanner) -> bool {
    let Some(quad) = violation_quad(&c.pair) else {
        return false;
    };
    let qbox: BBox = quad.bbox();
    scanner
        .query(&qbox, 0)
        .filter(|&k| k != c.first && k != c.second)
        .any(|k| cuts_into(&quad, &edges[k].edge))
}

/// True if `e` reaches into the interior of `quad`
pub(crate) fn cuts_into(quad: &Polygon, e: &Edge) -> bool {
    let inside = |p: Point| quad.classify(p) == Some(true);
    let mid = Point::from_f64(
        0.5 * (e.p1.x as f64 + e.p2.x as f64),
        0.5 * (e.p1.y as f64 + e.p2.y as f64),
    );
    inside(e.p1) || inside(e.p2) || inside(mid) || quad.edges().any(|q| q.crosses(e))
}

/// Edge collection of the polygons taking part in a check
#[derive(Debug, Default)]
pub struct Poly2PolyCheck {
    edges: Vec<CheckEdge>,
}

impl Poly2PolyCheck {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn clear(&mut self) {
        self.edges.clear();
    }

    pub fn insert(&mut self, poly: &Polygon, poly_id: usize, layer: u8) {
        self.edges.extend(poly.edges().map(|edge| CheckEdge { edge, poly_id, layer }));
    }

    /// Insert only the edges touching `within`
    pub fn insert_restricted(&mut self, poly: &Polygon, poly_id: usize, layer: u8, within: &BBox) {
        self.edges.extend(
            poly.edges()
                .filter(|e| e.bbox().touches(within))
                .map(|edge| CheckEdge { edge, poly_id, layer }),
        );
    }

    /// Run the current pass of `check` over the collected edges
    pub fn process(&self, check: &mut Edge2EdgeCheckNegativeOrPositive) {
        let scanner = BoxScanner::new(self.edges.iter().enumerate().map(|(i, e)| (i, e.edge.bbox())));
        if check.pass() == 0 {
            let dist = check.distance();
            scanner.scan_pairs(dist, |i, j| check.add(i, &self.edges[i], j, &self.edges[j]));
        } else {
            check.finish(&self.edges, &scanner);
        }
    }

    /// Run all passes of `check`
    pub fn run(&self, check: &mut Edge2EdgeCheckNegativeOrPositive) {
        loop {
            self.process(check);
            if !check.prepare_next_pass() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drc::{EdgeRelationType, RegionCheckOptions};
    use crate::geometry::box_polygon;

    fn space(d: i32) -> EdgeRelationFilter {
        EdgeRelationFilter::new(EdgeRelationType::SpaceRelation, d, &RegionCheckOptions::default())
    }

    #[test]
    fn test_space_between_two_boxes() {
        let mut pp = Poly2PolyCheck::new();
        pp.insert(&box_polygon(0, 0, 10, 10), 0, SUBJECT_LAYER);
        pp.insert(&box_polygon(15, 0, 25, 10), 1, SUBJECT_LAYER);
        let mut check = Edge2EdgeCheckNegativeOrPositive::new(space(10), false, false, true, true, false);
        pp.run(&mut check);

        let (result, intra, negative) = check.into_results();
        assert!(intra.is_empty());
        assert!(negative.is_empty());
        assert_eq!(result.len(), 1);
        let ep = result.iter().next().unwrap();
        assert!(ep.symmetric);
        let edges = [ep.first, ep.second];
        assert!(edges.contains(&Edge::from_coords(10, 0, 10, 10)));
        assert!(edges.contains(&Edge::from_coords(15, 10, 15, 0)));
    }

    #[test]
    fn test_shielding() {
        // a thin wall between the two boxes hides their space violation
        let mut pp = Poly2PolyCheck::new();
        pp.insert(&box_polygon(0, 0, 10, 10), 0, SUBJECT_LAYER);
        pp.insert(&box_polygon(18, 0, 28, 10), 1, SUBJECT_LAYER);
        pp.insert(&box_polygon(13, -5, 15, 15), 2, INTRUDER_LAYER);

        let mut shielded = Edge2EdgeCheckNegativeOrPositive::new(space(10), false, false, true, true, false);
        pp.run(&mut shielded);
        let pairs_between: Vec<_> = shielded
            .result()
            .iter()
            .filter(|ep| ep.first.p1.x.min(ep.second.p1.x) == 10 && ep.first.p1.x.max(ep.second.p1.x) == 18)
            .collect();
        assert!(pairs_between.is_empty());

        let mut unshielded = Edge2EdgeCheckNegativeOrPositive::new(space(10), false, false, false, true, false);
        pp.run(&mut unshielded);
        assert!(unshielded
            .result()
            .iter()
            .any(|ep| ep.first.p1.x.min(ep.second.p1.x) == 10 && ep.first.p1.x.max(ep.second.p1.x) == 18));
    }

    #[test]
    fn test_negative_output() {
        // width check of an L-shaped polygon: only the thin leg violates
        let poly = Polygon::new(vec![
            Point::new(0, 0),
            Point::new(100, 0),
            Point::new(100, 5),
            Point::new(20, 5),
            Point::new(20, 40),
            Point::new(0, 40),
        ]);
        let filter = EdgeRelationFilter::new(
            EdgeRelationType::WidthRelation,
            10,
            &RegionCheckOptions {
                metrics: crate::drc::MetricsType::Projection,
                ..Default::default()
            },
        );
        let mut pp = Poly2PolyCheck::new();
        pp.insert(&poly, 0, SUBJECT_LAYER);
        let mut check = Edge2EdgeCheckNegativeOrPositive::new(filter, false, false, true, true, true);
        pp.run(&mut check);

        assert!(!check.intra_polygon_result().is_empty());
        let negative = check.negative_result();
        // the right end of the leg does not violate
        assert!(negative.contains(&EdgePair::self_paired(Edge::from_coords(100, 0, 100, 5))));
        // the violating parts of the leg edges are missing
        assert!(!negative.iter().any(|ep| ep.first.p1.y == 5 && ep.first.p1.x > 20));
    }
}
