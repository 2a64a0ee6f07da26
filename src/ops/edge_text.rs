//! Selections between polygons, edges and texts
//!
//! Edges and texts take no part in polygon merging, so these operations
//! pair the shapes with a two-layer box scan and evaluate the interaction
//! predicate on each candidate pair.

use super::interacting::{emit_selected, selection_hint, InteractingOutputMode};
use super::interactions::{separate_interactions_to_interactions_by_properties, ShapeInteractions};
use super::local_operation::{LocalOperation, LocalProcessorBase};
use super::sinks::ResultCountingInserter;
use super::types::{pc_norm, EdgeLike, OnEmptyIntruderHint, PolygonLike, PropertyConstraint, TextLike};
use crate::geometry::{polygon_interacts_with_edge, scan_two_layers, BBox, BoxScanner, Coord, Edge, Polygon, Point};
use crate::kernel::merge_polygons;
use crate::layout::{CellIndex, Layout, PropertiesId};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::marker::PhantomData;

/// Route counted subjects by their interaction count
fn select_by_count<TS: Clone + Eq + Hash>(
    counts: HashMap<TS, usize>,
    min_count: usize,
    max_count: usize,
    output_mode: InteractingOutputMode,
    results: &mut [HashSet<TS>],
) {
    for (s, c) in counts {
        let good = c >= min_count && c <= max_count;
        emit_selected(output_mode, good, &s, results);
    }
}

/// Polygons selected by the number of edges they interact with
pub struct InteractingWithEdgeLocalOperation<TS, TI> {
    output_mode: InteractingOutputMode,
    min_count: usize,
    max_count: usize,
    pc: PropertyConstraint,
    _marker: PhantomData<fn() -> (TS, TI)>,
}

impl<TS, TI> InteractingWithEdgeLocalOperation<TS, TI> {
    pub fn new(output_mode: InteractingOutputMode, min_count: usize, max_count: usize) -> Self {
        Self::new_with_properties(output_mode, min_count, max_count, PropertyConstraint::IgnoreProperties)
    }

    pub fn new_with_properties(
        output_mode: InteractingOutputMode,
        min_count: usize,
        max_count: usize,
        pc: PropertyConstraint,
    ) -> Self {
        Self {
            output_mode,
            min_count: min_count.max(1),
            max_count,
            pc,
            _marker: PhantomData,
        }
    }
}

impl<TS: PolygonLike, TI: EdgeLike> InteractingWithEdgeLocalOperation<TS, TI> {
    fn select(&self, interactions: &ShapeInteractions<TS, TI>, prop_id: PropertiesId, results: &mut [HashSet<TS>]) {
        let edges: Vec<Edge> = interactions
            .referenced_intruders()
            .into_iter()
            .map(|(_, (_, e))| e.edge())
            .collect();
        let scanner = BoxScanner::new(edges.iter().enumerate().map(|(k, e)| (k, e.bbox())));

        let subjects: Vec<(TS, Polygon)> = interactions
            .iter()
            .map(|(sid, _)| {
                let s = interactions.subject_shape(sid);
                (s.with_properties_id(prop_id), s.to_polygon())
            })
            .collect();
        let first: Vec<(usize, BBox)> = subjects.iter().enumerate().map(|(i, (_, p))| (i, p.bbox())).collect();

        let mut counts: HashMap<TS, usize> = HashMap::new();
        let mut inserter = ResultCountingInserter::new(&mut counts);
        for (s, _) in &subjects {
            inserter.init(s);
        }
        scan_two_layers(&first, &scanner, 0, |i, k| {
            if polygon_interacts_with_edge(&subjects[i].1, &edges[k]) {
                inserter.insert(&subjects[i].0);
            }
        });

        select_by_count(counts, self.min_count, self.max_count, self.output_mode, results);
    }
}

impl<TS, TI> LocalOperation<TS, TI, TS> for InteractingWithEdgeLocalOperation<TS, TI>
where
    TS: PolygonLike,
    TI: EdgeLike,
{
    fn output_channels(&self) -> usize {
        self.output_mode.channels()
    }

    fn do_compute_local(
        &self,
        _layout: &Layout,
        _cell: CellIndex,
        interactions: &ShapeInteractions<TS, TI>,
        results: &mut [HashSet<TS>],
        _proc: &dyn LocalProcessorBase,
    ) {
        for (key, bucket) in separate_interactions_to_interactions_by_properties(interactions, self.pc) {
            self.select(&bucket, pc_norm(self.pc, key), results);
        }
    }

    fn property_constraint(&self) -> PropertyConstraint {
        self.pc
    }

    fn on_empty_intruder_hint(&self) -> OnEmptyIntruderHint {
        selection_hint(self.output_mode, false)
    }

    fn dist(&self) -> Coord {
        1
    }

    fn description(&self) -> String {
        "Select regions interacting with edges".to_string()
    }
}

/// Polygons selected by the number of texts they contain
pub struct InteractingWithTextLocalOperation<TS, TI> {
    output_mode: InteractingOutputMode,
    min_count: usize,
    max_count: usize,
    pc: PropertyConstraint,
    _marker: PhantomData<fn() -> (TS, TI)>,
}

impl<TS, TI> InteractingWithTextLocalOperation<TS, TI> {
    pub fn new(output_mode: InteractingOutputMode, min_count: usize, max_count: usize) -> Self {
        Self::new_with_properties(output_mode, min_count, max_count, PropertyConstraint::IgnoreProperties)
    }

    pub fn new_with_properties(
        output_mode: InteractingOutputMode,
        min_count: usize,
        max_count: usize,
        pc: PropertyConstraint,
    ) -> Self {
        Self {
            output_mode,
            min_count: min_count.max(1),
            max_count,
            pc,
            _marker: PhantomData,
        }
    }
}

impl<TS: PolygonLike, TI: TextLike> InteractingWithTextLocalOperation<TS, TI> {
    fn select(&self, interactions: &ShapeInteractions<TS, TI>, prop_id: PropertiesId, results: &mut [HashSet<TS>]) {
        let positions: Vec<Point> = interactions
            .referenced_intruders()
            .into_iter()
            .map(|(_, (_, t))| t.text().pos)
            .collect();
        let scanner = BoxScanner::new(positions.iter().enumerate().map(|(k, p)| (k, BBox::new(*p, *p))));

        let mut counts: HashMap<TS, usize> = HashMap::new();
        let mut inserter = ResultCountingInserter::new(&mut counts);
        for (sid, _) in interactions.iter() {
            let s = interactions.subject_shape(sid);
            let poly = s.to_polygon();
            let tagged = s.with_properties_id(prop_id);
            inserter.init(&tagged);
            for k in scanner.query(&poly.bbox(), 0) {
                if poly.contains_point(positions[k]) {
                    inserter.insert(&tagged);
                }
            }
        }

        select_by_count(counts, self.min_count, self.max_count, self.output_mode, results);
    }
}

impl<TS, TI> LocalOperation<TS, TI, TS> for InteractingWithTextLocalOperation<TS, TI>
where
    TS: PolygonLike,
    TI: TextLike,
{
    fn output_channels(&self) -> usize {
        self.output_mode.channels()
    }

    fn do_compute_local(
        &self,
        _layout: &Layout,
        _cell: CellIndex,
        interactions: &ShapeInteractions<TS, TI>,
        results: &mut [HashSet<TS>],
        _proc: &dyn LocalProcessorBase,
    ) {
        for (key, bucket) in separate_interactions_to_interactions_by_properties(interactions, self.pc) {
            self.select(&bucket, pc_norm(self.pc, key), results);
        }
    }

    fn property_constraint(&self) -> PropertyConstraint {
        self.pc
    }

    fn on_empty_intruder_hint(&self) -> OnEmptyIntruderHint {
        selection_hint(self.output_mode, false)
    }

    fn dist(&self) -> Coord {
        1
    }

    fn description(&self) -> String {
        "Select regions interacting with texts".to_string()
    }
}

/// True if the edge runs completely inside or on the boundary of the polygon
fn edge_inside_polygon(e: &Edge, poly: &Polygon) -> bool {
    if !poly.contains_point(e.p1) || !poly.contains_point(e.p2) {
        return false;
    }
    if poly.edges().any(|pe| pe.crosses(e)) {
        return false;
    }
    // touching vertices may still let the edge leave the polygon in between
    let mut cuts: Vec<f64> = vec![0.0, 1.0];
    for pe in poly.edges() {
        for p in [pe.p1, pe.p2] {
            if e.contains(p) {
                cuts.push(e.param_of(p));
            }
        }
    }
    cuts.sort_by(f64::total_cmp);
    cuts.windows(2)
        .filter(|w| w[1] > w[0])
        .all(|w| {
            let (x1, y1) = e.p1.to_f64();
            let (x2, y2) = e.p2.to_f64();
            let t = 0.5 * (w[0] + w[1]);
            let mid = Point::from_f64(x1 + (x2 - x1) * t, y1 + (y2 - y1) * t);
            poly.contains_point(mid)
        })
}

/// Edges selected by their relation to polygons
///
/// `mode`: 0 interacting, -1 inside, 1 outside.
pub struct EdgeToPolygonInteractingLocalOperation<TS, TI> {
    mode: i32,
    output_mode: InteractingOutputMode,
    pc: PropertyConstraint,
    _marker: PhantomData<fn() -> (TS, TI)>,
}

impl<TS, TI> EdgeToPolygonInteractingLocalOperation<TS, TI> {
    pub fn new(mode: i32, output_mode: InteractingOutputMode) -> Self {
        Self::new_with_properties(mode, output_mode, PropertyConstraint::IgnoreProperties)
    }

    pub fn new_with_properties(mode: i32, output_mode: InteractingOutputMode, pc: PropertyConstraint) -> Self {
        Self {
            mode,
            output_mode,
            pc,
            _marker: PhantomData,
        }
    }
}

impl<TS: EdgeLike, TI: PolygonLike> EdgeToPolygonInteractingLocalOperation<TS, TI> {
    fn select(&self, interactions: &ShapeInteractions<TS, TI>, prop_id: PropertiesId, results: &mut [HashSet<TS>]) {
        let intruders: Vec<Polygon> = interactions
            .referenced_intruders()
            .into_iter()
            .map(|(_, (_, p))| p.to_polygon())
            .collect();
        let polys = if self.mode == -1 {
            merge_polygons(&intruders, 0)
        } else {
            intruders
        };
        let scanner = BoxScanner::new(polys.iter().enumerate().map(|(k, p)| (k, p.bbox())));

        for (sid, _) in interactions.iter() {
            let s = interactions.subject_shape(sid);
            let e = s.edge();
            let mut candidates = scanner.query(&e.bbox(), 0);
            let good = match self.mode {
                -1 => candidates.any(|k| edge_inside_polygon(&e, &polys[k])),
                m if m > 0 => !candidates.any(|k| polygon_interacts_with_edge(&polys[k], &e)),
                _ => candidates.any(|k| polygon_interacts_with_edge(&polys[k], &e)),
            };
            emit_selected(self.output_mode, good, &s.with_properties_id(prop_id), results);
        }
    }
}

impl<TS, TI> LocalOperation<TS, TI, TS> for EdgeToPolygonInteractingLocalOperation<TS, TI>
where
    TS: EdgeLike,
    TI: PolygonLike,
{
    fn output_channels(&self) -> usize {
        self.output_mode.channels()
    }

    fn do_compute_local(
        &self,
        _layout: &Layout,
        _cell: CellIndex,
        interactions: &ShapeInteractions<TS, TI>,
        results: &mut [HashSet<TS>],
        _proc: &dyn LocalProcessorBase,
    ) {
        for (key, bucket) in separate_interactions_to_interactions_by_properties(interactions, self.pc) {
            self.select(&bucket, pc_norm(self.pc, key), results);
        }
    }

    fn property_constraint(&self) -> PropertyConstraint {
        self.pc
    }

    fn on_empty_intruder_hint(&self) -> OnEmptyIntruderHint {
        selection_hint(self.output_mode, self.mode > 0)
    }

    fn dist(&self) -> Coord {
        1
    }

    fn description(&self) -> String {
        "Select edges interacting with regions".to_string()
    }
}

/// Returns the edges interacting with the subject polygons
pub struct PullWithEdgeLocalOperation<TS, TI> {
    pc: PropertyConstraint,
    _marker: PhantomData<fn() -> (TS, TI)>,
}

impl<TS, TI> PullWithEdgeLocalOperation<TS, TI> {
    pub fn new() -> Self {
        Self::new_with_properties(PropertyConstraint::IgnoreProperties)
    }

    pub fn new_with_properties(pc: PropertyConstraint) -> Self {
        Self {
            pc,
            _marker: PhantomData,
        }
    }
}

impl<TS, TI> Default for PullWithEdgeLocalOperation<TS, TI> {
    fn default() -> Self {
        Self::new()
    }
}

impl<TS, TI> LocalOperation<TS, TI, TI> for PullWithEdgeLocalOperation<TS, TI>
where
    TS: PolygonLike,
    TI: EdgeLike,
{
    fn do_compute_local(
        &self,
        _layout: &Layout,
        _cell: CellIndex,
        interactions: &ShapeInteractions<TS, TI>,
        results: &mut [HashSet<TI>],
        _proc: &dyn LocalProcessorBase,
    ) {
        for (key, bucket) in separate_interactions_to_interactions_by_properties(interactions, self.pc) {
            let prop_id = pc_norm(self.pc, key);
            let subjects: Vec<Polygon> = bucket
                .iter()
                .map(|(sid, _)| bucket.subject_shape(sid).to_polygon())
                .collect();
            let scanner = BoxScanner::new(subjects.iter().enumerate().map(|(i, p)| (i, p.bbox())));
            for (_, (_, shape)) in bucket.referenced_intruders() {
                let e = shape.edge();
                if scanner.query(&e.bbox(), 0).any(|i| polygon_interacts_with_edge(&subjects[i], &e)) {
                    results[0].insert(shape.with_properties_id(prop_id));
                }
            }
        }
    }

    fn property_constraint(&self) -> PropertyConstraint {
        self.pc
    }

    fn on_empty_intruder_hint(&self) -> OnEmptyIntruderHint {
        OnEmptyIntruderHint::Drop
    }

    fn dist(&self) -> Coord {
        1
    }

    fn description(&self) -> String {
        "Pull edges".to_string()
    }
}

/// Returns the texts placed inside or on the subject polygons
pub struct PullWithTextLocalOperation<TS, TI> {
    pc: PropertyConstraint,
    _marker: PhantomData<fn() -> (TS, TI)>,
}

impl<TS, TI> PullWithTextLocalOperation<TS, TI> {
    pub fn new() -> Self {
        Self::new_with_properties(PropertyConstraint::IgnoreProperties)
    }

    pub fn new_with_properties(pc: PropertyConstraint) -> Self {
        Self {
            pc,
            _marker: PhantomData,
        }
    }
}

impl<TS, TI> Default for PullWithTextLocalOperation<TS, TI> {
    fn default() -> Self {
        Self::new()
    }
}

impl<TS, TI> LocalOperation<TS, TI, TI> for PullWithTextLocalOperation<TS, TI>
where
    TS: PolygonLike,
    TI: TextLike,
{
    fn do_compute_local(
        &self,
        _layout: &Layout,
        _cell: CellIndex,
        interactions: &ShapeInteractions<TS, TI>,
        results: &mut [HashSet<TI>],
        _proc: &dyn LocalProcessorBase,
    ) {
        for (key, bucket) in separate_interactions_to_interactions_by_properties(interactions, self.pc) {
            let prop_id = pc_norm(self.pc, key);
            let subjects: Vec<Polygon> = bucket
                .iter()
                .map(|(sid, _)| bucket.subject_shape(sid).to_polygon())
                .collect();
            let scanner = BoxScanner::new(subjects.iter().enumerate().map(|(i, p)| (i, p.bbox())));
            for (_, (_, shape)) in bucket.referenced_intruders() {
                let pos = shape.text().pos;
                if scanner
                    .query(&BBox::new(pos, pos), 0)
                    .any(|i| subjects[i].contains_point(pos))
                {
                    results[0].insert(shape.with_properties_id(prop_id));
                }
            }
        }
    }

    fn property_constraint(&self) -> PropertyConstraint {
        self.pc
    }

    fn on_empty_intruder_hint(&self) -> OnEmptyIntruderHint {
        OnEmptyIntruderHint::Drop
    }

    fn dist(&self) -> Coord {
        1
    }

    fn description(&self) -> String {
        "Pull texts".to_string()
    }
}
