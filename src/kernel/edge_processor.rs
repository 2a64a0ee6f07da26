//! Scanline edge processor
//!
//! Edges are inserted with an integer property id. `process` splits them at
//! mutual crossings, sweeps horizontal slabs between all vertex y levels and
//! tracks a winding count per property. An `InsideEvaluator` decides which
//! slab intervals belong to the result. Boundary pieces are collected per
//! evaluator and stitched back into polygons by the polygon generator.

use crate::geometry::{div_round, BBox, BoxScanner, Coord, Edge, Point, Polygon};
use std::cmp::Ordering;
use std::collections::HashMap;

use super::generator::assemble_polygons;
use super::ops::{InsideEvaluator, WindingState};

/// Exact x position of a segment at a slab level
#[derive(Clone, Copy, Debug)]
pub(crate) struct Frac {
    num: i128,
    den: i128,
}

impl Frac {
    fn round(&self) -> Coord {
        div_round(self.num, self.den) as Coord
    }

    fn to_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

impl PartialEq for Frac {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frac {}

impl PartialOrd for Frac {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frac {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.num * other.den).cmp(&(other.num * self.den))
    }
}

/// Non-horizontal edge piece, normalized upwards
#[derive(Clone, Copy, Debug)]
pub(crate) struct Segment {
    lo: Point,
    hi: Point,
    /// winding change when crossing the segment in +x direction
    dir: i32,
    prop: usize,
}

impl Segment {
    fn from_edge(e: &Edge, prop: usize) -> Option<Self> {
        match e.p1.y.cmp(&e.p2.y) {
            Ordering::Less => Some(Self {
                lo: e.p1,
                hi: e.p2,
                dir: -1,
                prop,
            }),
            Ordering::Greater => Some(Self {
                lo: e.p2,
                hi: e.p1,
                dir: 1,
                prop,
            }),
            Ordering::Equal => None,
        }
    }

    fn x_at(&self, y: Coord) -> Frac {
        let den = self.hi.y as i128 - self.lo.y as i128;
        let num = self.lo.x as i128 * den + (y as i128 - self.lo.y as i128) * (self.hi.x as i128 - self.lo.x as i128);
        Frac { num, den }
    }

    fn point_at(&self, y: Coord) -> Point {
        if y == self.lo.y {
            self.lo
        } else if y == self.hi.y {
            self.hi
        } else {
            Point::new(self.x_at(y).round(), y)
        }
    }

    fn key(&self) -> (Point, Point) {
        (self.lo, self.hi)
    }
}

/// Group of coincident segments crossed together inside one slab
pub(crate) struct Crossing {
    x0: Frac,
    x1: Frac,
    segs: Vec<usize>,
    rep: usize,
}

/// Boundary piece of one slab: representative segment and orientation
#[derive(Clone, Copy, Debug)]
struct Piece {
    rep: usize,
    y0: Coord,
    y1: Coord,
    up: bool,
}

/// Per-evaluator state while sweeping
#[derive(Default)]
struct Collector {
    pieces: Vec<Piece>,
    horizontal: Vec<Edge>,
    below: Vec<(Frac, Frac)>,
    below_y: Option<Coord>,
    area: f64,
}

/// Overlap areas between "first" (even) and "second" (odd) property ids
#[derive(Debug, Default, Clone)]
pub struct InteractionAreas {
    pub area: HashMap<usize, f64>,
    pub overlap: HashMap<(usize, usize), f64>,
}

impl InteractionAreas {
    pub fn area_of(&self, p: usize) -> f64 {
        self.area.get(&p).copied().unwrap_or(0.0)
    }

    pub fn overlap_of(&self, even: usize, odd: usize) -> f64 {
        self.overlap.get(&(even, odd)).copied().unwrap_or(0.0)
    }
}

/// Scanline edge processor with tagged edge insertion
#[derive(Default, Clone)]
pub struct EdgeProcessor {
    edges: Vec<(Edge, usize)>,
}

impl EdgeProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserve(&mut self, n: usize) {
        self.edges.reserve(n);
    }

    pub fn clear(&mut self) {
        self.edges.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Insert a single edge; degenerate edges are dropped
    pub fn insert(&mut self, e: Edge, prop: usize) {
        if !e.is_degenerate() {
            self.edges.push((e, prop));
        }
    }

    pub fn insert_polygon(&mut self, poly: &Polygon, prop: usize) {
        for e in poly.edges() {
            self.insert(e, prop);
        }
    }

    pub fn bbox(&self) -> BBox {
        self.edges.iter().fold(BBox::empty(), |b, (e, _)| b.union(&e.bbox()))
    }

    /// Run one evaluator and return the resulting polygons
    pub fn process(&self, op: &dyn InsideEvaluator) -> Vec<Polygon> {
        self.process_multi(&[op]).pop().unwrap_or_default()
    }

    /// Run several evaluators over one shared sweep
    pub fn process_multi(&self, ops: &[&dyn InsideEvaluator]) -> Vec<Vec<Polygon>> {
        let segs = self.segments();
        let mut collectors: Vec<Collector> = ops.iter().map(|_| Collector::default()).collect();
        sweep(&segs, |y0, y1, crossings| {
            collect_slab(&segs, ops, &mut collectors, y0, y1, crossings);
        });

        collectors
            .into_iter()
            .map(|mut c| {
                if let Some(y) = c.below_y.take() {
                    let below = std::mem::take(&mut c.below);
                    horizontal_edges(y, &below, &[], &mut c.horizontal);
                }
                let mut edges = merge_pieces(&segs, &c.pieces);
                edges.append(&mut c.horizontal);
                assemble_polygons(edges)
            })
            .collect()
    }

    /// Area of the region selected by the evaluator
    pub fn area(&self, op: &dyn InsideEvaluator) -> f64 {
        let segs = self.segments();
        let mut area = 0.0;
        sweep(&segs, |y0, y1, crossings| {
            let h = (y1 as i64 - y0 as i64) as f64;
            let mut state = WindingState::default();
            let mut start: Option<&Crossing> = None;
            for c in crossings {
                let before = op.is_inside(&state);
                for &i in &c.segs {
                    state.apply(segs[i].prop, segs[i].dir);
                }
                let after = op.is_inside(&state);
                if !before && after {
                    start = Some(c);
                } else if before && !after {
                    if let Some(s) = start.take() {
                        area += trapezoid(h, s, c);
                    }
                }
            }
        });
        area
    }

    /// Pairwise overlap areas between even and odd property ids
    pub fn interaction_areas(&self) -> InteractionAreas {
        let segs = self.segments();
        let mut result = InteractionAreas::default();
        sweep(&segs, |y0, y1, crossings| {
            let h = (y1 as i64 - y0 as i64) as f64;
            let mut state = WindingState::default();
            for (k, c) in crossings.iter().enumerate() {
                for &i in &c.segs {
                    state.apply(segs[i].prop, segs[i].dir);
                }
                let Some(next) = crossings.get(k + 1) else {
                    continue;
                };
                let a = trapezoid(h, c, next);
                if a <= 0.0 || state.is_empty() {
                    continue;
                }
                let (evens, odds): (Vec<usize>, Vec<usize>) = state.active().partition(|p| p % 2 == 0);
                for &p in evens.iter().chain(odds.iter()) {
                    *result.area.entry(p).or_insert(0.0) += a;
                }
                for &e in &evens {
                    for &o in &odds {
                        *result.overlap.entry((e, o)).or_insert(0.0) += a;
                    }
                }
            }
        });
        result
    }

    /// Non-horizontal segments split at all mutual crossings
    fn segments(&self) -> Vec<Segment> {
        let edges: Vec<(Edge, usize)> = self
            .edges
            .iter()
            .filter(|(e, _)| e.p1.y != e.p2.y)
            .copied()
            .collect();

        let scanner = BoxScanner::new(edges.iter().enumerate().map(|(i, (e, _))| (i, e.bbox())));
        let mut cuts: Vec<Vec<Point>> = vec![Vec::new(); edges.len()];
        scanner.scan_pairs(0, |i, j| {
            let (a, b) = (edges[i].0, edges[j].0);
            if a.crosses(&b) {
                if let Some(p) = a.intersection_point(&b) {
                    cuts[i].push(p);
                    cuts[j].push(p);
                }
            }
        });

        let mut segs = Vec::with_capacity(edges.len());
        for (i, (e, prop)) in edges.iter().enumerate() {
            let mut pts = std::mem::take(&mut cuts[i]);
            if pts.is_empty() {
                segs.extend(Segment::from_edge(e, *prop));
                continue;
            }
            pts.push(e.p1);
            pts.push(e.p2);
            pts.sort_by(|a, b| e.param_of(*a).total_cmp(&e.param_of(*b)));
            pts.dedup();
            for w in pts.windows(2) {
                segs.extend(Segment::from_edge(&Edge::new(w[0], w[1]), *prop));
            }
        }
        segs
    }
}

fn trapezoid(h: f64, left: &Crossing, right: &Crossing) -> f64 {
    let wb = right.x0.to_f64() - left.x0.to_f64();
    let wt = right.x1.to_f64() - left.x1.to_f64();
    h * (wb + wt) * 0.5
}

/// Sweep all slabs bottom-up, handing the sorted crossing groups of each slab to `f`
fn sweep<F>(segs: &[Segment], mut f: F)
where
    F: FnMut(Coord, Coord, &[Crossing]),
{
    let mut ys: Vec<Coord> = segs.iter().flat_map(|s| [s.lo.y, s.hi.y]).collect();
    ys.sort_unstable();
    ys.dedup();

    let mut order: Vec<usize> = (0..segs.len()).collect();
    order.sort_by_key(|&i| segs[i].lo.y);

    let mut active: Vec<usize> = Vec::new();
    let mut next = 0;
    for w in ys.windows(2) {
        let (y0, y1) = (w[0], w[1]);
        active.retain(|&i| segs[i].hi.y > y0);
        while next < order.len() && segs[order[next]].lo.y <= y0 {
            active.push(order[next]);
            next += 1;
        }

        let mut items: Vec<(Frac, Frac, usize)> = active
            .iter()
            .map(|&i| (segs[i].x_at(y0), segs[i].x_at(y1), i))
            .collect();
        items.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut crossings: Vec<Crossing> = Vec::new();
        for (x0, x1, i) in items {
            match crossings.last_mut() {
                Some(c) if c.x0 == x0 && c.x1 == x1 => {
                    c.segs.push(i);
                    if segs[i].key() < segs[c.rep].key() {
                        c.rep = i;
                    }
                }
                _ => crossings.push(Crossing {
                    x0,
                    x1,
                    segs: vec![i],
                    rep: i,
                }),
            }
        }
        f(y0, y1, &crossings);
    }
}

fn collect_slab(
    segs: &[Segment],
    ops: &[&dyn InsideEvaluator],
    collectors: &mut [Collector],
    y0: Coord,
    y1: Coord,
    crossings: &[Crossing],
) {
    let mut state = WindingState::default();
    let mut inside = vec![false; ops.len()];
    let mut starts: Vec<Option<usize>> = vec![None; ops.len()];
    let mut bottom: Vec<Vec<(Frac, Frac)>> = vec![Vec::new(); ops.len()];
    let mut top: Vec<Vec<(Frac, Frac)>> = vec![Vec::new(); ops.len()];
    let h = (y1 as i64 - y0 as i64) as f64;

    for (k, c) in crossings.iter().enumerate() {
        for &i in &c.segs {
            state.apply(segs[i].prop, segs[i].dir);
        }
        for (j, op) in ops.iter().enumerate() {
            let after = op.is_inside(&state);
            if after == inside[j] {
                continue;
            }
            collectors[j].pieces.push(Piece {
                rep: c.rep,
                y0,
                y1,
                up: inside[j],
            });
            if after {
                starts[j] = Some(k);
            } else if let Some(s) = starts[j].take() {
                let sc = &crossings[s];
                push_interval(&mut bottom[j], sc.x0, c.x0);
                push_interval(&mut top[j], sc.x1, c.x1);
                collectors[j].area += trapezoid(h, sc, c);
            }
            inside[j] = after;
        }
    }

    for (j, c) in collectors.iter_mut().enumerate() {
        let below = std::mem::take(&mut c.below);
        match c.below_y {
            Some(y) if y == y0 => horizontal_edges(y0, &below, &bottom[j], &mut c.horizontal),
            Some(y) => {
                horizontal_edges(y, &below, &[], &mut c.horizontal);
                horizontal_edges(y0, &[], &bottom[j], &mut c.horizontal);
            }
            None => horizontal_edges(y0, &[], &bottom[j], &mut c.horizontal),
        }
        c.below = std::mem::take(&mut top[j]);
        c.below_y = Some(y1);
    }
}

/// Append an interval, merging with a touching predecessor
fn push_interval(list: &mut Vec<(Frac, Frac)>, l: Frac, r: Frac) {
    if l >= r {
        return;
    }
    match list.last_mut() {
        Some(last) if last.1 >= l => {
            if r > last.1 {
                last.1 = r;
            }
        }
        _ => list.push((l, r)),
    }
}

/// Horizontal boundary edges at level `y` from the inside intervals below and above
fn horizontal_edges(y: Coord, below: &[(Frac, Frac)], above: &[(Frac, Frac)], out: &mut Vec<Edge>) {
    if below.is_empty() && above.is_empty() {
        return;
    }
    let mut xs: Vec<Frac> = below.iter().chain(above.iter()).flat_map(|&(l, r)| [l, r]).collect();
    xs.sort();
    xs.dedup();

    let covered = |list: &[(Frac, Frac)], idx: &mut usize, a: Frac, b: Frac| -> bool {
        while *idx < list.len() && list[*idx].1 <= a {
            *idx += 1;
        }
        *idx < list.len() && list[*idx].0 <= a && b <= list[*idx].1
    };

    // runs of (start, end, state): state +1 = inside below only, -1 = inside above only
    let (mut ib, mut ia) = (0usize, 0usize);
    let mut run: Option<(Frac, Frac, i32)> = None;
    let flush = |run: Option<(Frac, Frac, i32)>, out: &mut Vec<Edge>| {
        if let Some((l, r, s)) = run {
            let (pl, pr) = (Point::new(l.round(), y), Point::new(r.round(), y));
            if pl != pr {
                out.push(if s > 0 { Edge::new(pr, pl) } else { Edge::new(pl, pr) });
            }
        }
    };
    for w in xs.windows(2) {
        let (a, b) = (w[0], w[1]);
        let in_below = covered(below, &mut ib, a, b);
        let in_above = covered(above, &mut ia, a, b);
        let s = match (in_below, in_above) {
            (true, false) => 1,
            (false, true) => -1,
            _ => 0,
        };
        match run {
            Some((l, r, rs)) if rs == s && r == a && s != 0 => run = Some((l, b, rs)),
            _ => {
                flush(run.take(), out);
                if s != 0 {
                    run = Some((a, b, s));
                }
            }
        }
    }
    flush(run, out);
}

/// Join slab pieces of the same segment and turn them into directed edges
fn merge_pieces(segs: &[Segment], pieces: &[Piece]) -> Vec<Edge> {
    let mut groups: HashMap<(usize, bool), Vec<(Coord, Coord)>> = HashMap::new();
    for p in pieces {
        groups.entry((p.rep, p.up)).or_default().push((p.y0, p.y1));
    }

    let mut keys: Vec<(usize, bool)> = groups.keys().copied().collect();
    keys.sort_unstable();

    let mut edges = Vec::new();
    for key in keys {
        let (rep, up) = key;
        let mut spans = groups.remove(&key).unwrap_or_default();
        spans.sort_unstable();
        let mut merged: Vec<(Coord, Coord)> = Vec::with_capacity(spans.len());
        for (a, b) in spans {
            match merged.last_mut() {
                Some(last) if last.1 == a => last.1 = b,
                _ => merged.push((a, b)),
            }
        }
        let s = &segs[rep];
        for (a, b) in merged {
            let (pa, pb) = (s.point_at(a), s.point_at(b));
            if pa == pb {
                continue;
            }
            edges.push(if up { Edge::new(pa, pb) } else { Edge::new(pb, pa) });
        }
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::box_polygon;
    use crate::kernel::ops::{BooleanOp, MergeOp};

    #[test]
    fn test_and_of_overlapping_squares() {
        let mut ep = EdgeProcessor::new();
        ep.insert_polygon(&box_polygon(0, 0, 10, 10), 0);
        ep.insert_polygon(&box_polygon(5, 5, 15, 15), 1);
        let res = ep.process(&BooleanOp::And);
        assert_eq!(res, vec![box_polygon(5, 5, 10, 10)]);
    }

    #[test]
    fn test_not_gives_l_shape() {
        let mut ep = EdgeProcessor::new();
        ep.insert_polygon(&box_polygon(0, 0, 10, 10), 0);
        ep.insert_polygon(&box_polygon(5, 5, 15, 15), 1);
        let res = ep.process(&BooleanOp::ANotB);
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].area(), 75.0);
        assert_eq!(res[0].hull().len(), 6);
    }

    #[test]
    fn test_merge_creates_hole() {
        let mut ep = EdgeProcessor::new();
        ep.insert_polygon(&box_polygon(0, 0, 30, 10), 0);
        ep.insert_polygon(&box_polygon(0, 20, 30, 30), 0);
        ep.insert_polygon(&box_polygon(0, 0, 10, 30), 0);
        ep.insert_polygon(&box_polygon(20, 0, 30, 30), 0);
        let res = ep.process(&MergeOp::new(0));
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].holes().len(), 1);
        assert_eq!(res[0].area(), 800.0);
    }

    #[test]
    fn test_touching_corners_stay_separate() {
        let mut ep = EdgeProcessor::new();
        ep.insert_polygon(&box_polygon(0, 0, 10, 10), 0);
        ep.insert_polygon(&box_polygon(10, 10, 20, 20), 0);
        let res = ep.process(&MergeOp::new(0));
        assert_eq!(res.len(), 2);
    }

    #[test]
    fn test_crossing_diagonals() {
        let mut ep = EdgeProcessor::new();
        let diamond = Polygon::new(vec![
            Point::new(10, 0),
            Point::new(20, 10),
            Point::new(10, 20),
            Point::new(0, 10),
        ]);
        ep.insert_polygon(&diamond, 0);
        ep.insert_polygon(&box_polygon(0, 0, 10, 20), 1);
        let area = ep.area(&BooleanOp::And);
        assert!((area - 100.0).abs() < 1e-9);
        let res = ep.process(&BooleanOp::And);
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].area(), 100.0);
    }

    #[test]
    fn test_interaction_areas() {
        let mut ep = EdgeProcessor::new();
        ep.insert_polygon(&box_polygon(0, 0, 10, 10), 0);
        ep.insert_polygon(&box_polygon(5, 0, 15, 10), 1);
        ep.insert_polygon(&box_polygon(20, 0, 30, 10), 3);
        let ia = ep.interaction_areas();
        assert_eq!(ia.area_of(0), 100.0);
        assert_eq!(ia.overlap_of(0, 1), 50.0);
        assert_eq!(ia.overlap_of(0, 3), 0.0);
    }

    #[test]
    fn test_min_wrap_count() {
        let mut ep = EdgeProcessor::new();
        ep.insert_polygon(&box_polygon(0, 0, 10, 10), 0);
        ep.insert_polygon(&box_polygon(5, 0, 15, 10), 2);
        ep.insert_polygon(&box_polygon(8, 0, 20, 10), 4);
        let twice = ep.process(&MergeOp::new(1));
        assert_eq!(twice, vec![box_polygon(5, 0, 15, 10)]);
        let thrice = ep.process(&MergeOp::new(2));
        assert_eq!(thrice, vec![box_polygon(8, 0, 10, 10)]);
    }
}
