//! Boolean AND / NOT local operations

use super::interactions::{separate_interactions_to_interactions_by_properties, ShapeInteractions};
use super::local_operation::{LocalOperation, LocalProcessorBase};
use super::sinks::{PolygonRefGenerator, PolygonSink, PolygonSplitter};
use super::types::{pc_norm, OnEmptyIntruderHint, PolygonLike, PolygonResult, PropertyConstraint};
use crate::geometry::Polygon;
use crate::kernel::{BooleanOp, EdgeProcessor, InsideEvaluator};
use crate::layout::{CellIndex, Layout, PropertiesId, ShapeRepository};
use std::collections::HashSet;
use std::marker::PhantomData;

/// Subjects of one property bucket, classified for the boolean
struct Classified {
    identical: Vec<Polygon>,
    lonely: Vec<Polygon>,
    ep: EdgeProcessor,
}

/// Sort subjects into "identical to an intruder", "no intruders" and the
/// rest, which goes into the edge processor along with its intruders
fn classify<TS: PolygonLike, TI: PolygonLike>(interactions: &ShapeInteractions<TS, TI>) -> Classified {
    let others: HashSet<Polygon> = interactions
        .referenced_intruders()
        .into_iter()
        .map(|(_, (_, shape))| shape.to_polygon())
        .collect();

    let mut res = Classified {
        identical: Vec::new(),
        lonely: Vec::new(),
        ep: EdgeProcessor::new(),
    };
    let mut intruders: HashSet<usize> = HashSet::new();
    let mut n = 0;
    for (sid, iids) in interactions.iter() {
        let poly = interactions.subject_shape(sid).to_polygon();
        if others.contains(&poly) {
            res.identical.push(poly);
        } else if iids.is_empty() {
            res.lonely.push(poly);
        } else {
            res.ep.insert_polygon(&poly, 2 * n);
            n += 1;
            intruders.extend(iids.iter().copied());
        }
    }

    if !res.ep.is_empty() {
        let mut ids: Vec<usize> = intruders.into_iter().collect();
        ids.sort_unstable();
        for (k, i) in ids.into_iter().enumerate() {
            if let Some((_, shape)) = interactions.intruder_shape(i) {
                res.ep.insert_polygon(&shape.to_polygon(), 2 * k + 1);
            }
        }
    }
    res
}

fn emit<TR: PolygonResult>(
    polys: &[Polygon],
    repo: &ShapeRepository,
    prop_id: PropertiesId,
    out: &mut HashSet<TR>,
    proc: &dyn LocalProcessorBase,
) {
    let mut generator = PolygonRefGenerator::with_properties(repo, prop_id, out);
    let mut splitter = PolygonSplitter::new(&mut generator, proc.area_ratio(), proc.max_vertex_count());
    for p in polys {
        splitter.put(p);
    }
}

/// AND (`is_and`) or NOT of subjects against intruders
pub struct BoolAndOrNotLocalOperation<TS, TI, TR> {
    is_and: bool,
    pc: PropertyConstraint,
    _marker: PhantomData<fn() -> (TS, TI, TR)>,
}

impl<TS, TI, TR> BoolAndOrNotLocalOperation<TS, TI, TR> {
    pub fn new(is_and: bool) -> Self {
        Self::new_with_properties(is_and, PropertyConstraint::IgnoreProperties)
    }

    pub fn new_with_properties(is_and: bool, pc: PropertyConstraint) -> Self {
        Self {
            is_and,
            pc,
            _marker: PhantomData,
        }
    }
}

impl<TS, TI, TR> LocalOperation<TS, TI, TR> for BoolAndOrNotLocalOperation<TS, TI, TR>
where
    TS: PolygonLike,
    TI: PolygonLike,
    TR: PolygonResult,
{
    fn do_compute_local(
        &self,
        layout: &Layout,
        _cell: CellIndex,
        interactions: &ShapeInteractions<TS, TI>,
        results: &mut [HashSet<TR>],
        proc: &dyn LocalProcessorBase,
    ) {
        let repo = layout.shape_repository();
        for (key, bucket) in separate_interactions_to_interactions_by_properties(interactions, self.pc) {
            let prop_id = pc_norm(self.pc, key);
            let c = classify(&bucket);
            let op = if self.is_and { BooleanOp::And } else { BooleanOp::ANotB };
            let mut polys = if self.is_and { c.identical } else { c.lonely };
            if !c.ep.is_empty() {
                polys.extend(c.ep.process(&op));
            }
            emit(&polys, repo, prop_id, &mut results[0], proc);
        }
    }

    fn property_constraint(&self) -> PropertyConstraint {
        self.pc
    }

    fn on_empty_intruder_hint(&self) -> OnEmptyIntruderHint {
        if self.is_and {
            OnEmptyIntruderHint::Drop
        } else {
            OnEmptyIntruderHint::Copy
        }
    }

    fn description(&self) -> String {
        if self.is_and {
            "AND operation".to_string()
        } else {
            "NOT operation".to_string()
        }
    }
}

/// AND into the first and NOT into the second channel, from one edge pass
pub struct TwoBoolAndNotLocalOperation<TS, TI, TR> {
    pc: PropertyConstraint,
    _marker: PhantomData<fn() -> (TS, TI, TR)>,
}

impl<TS, TI, TR> TwoBoolAndNotLocalOperation<TS, TI, TR> {
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

impl<TS, TI, TR> Default for TwoBoolAndNotLocalOperation<TS, TI, TR> {
    fn default() -> Self {
        Self::new()
    }
}

impl<TS, TI, TR> LocalOperation<TS, TI, TR> for TwoBoolAndNotLocalOperation<TS, TI, TR>
where
    TS: PolygonLike,
    TI: PolygonLike,
    TR: PolygonResult,
{
    fn output_channels(&self) -> usize {
        2
    }

    fn do_compute_local(
        &self,
        layout: &Layout,
        _cell: CellIndex,
        interactions: &ShapeInteractions<TS, TI>,
        results: &mut [HashSet<TR>],
        proc: &dyn LocalProcessorBase,
    ) {
        let repo = layout.shape_repository();
        for (key, bucket) in separate_interactions_to_interactions_by_properties(interactions, self.pc) {
            let prop_id = pc_norm(self.pc, key);
            let c = classify(&bucket);
            let mut and_polys = c.identical;
            let mut not_polys = c.lonely;
            if !c.ep.is_empty() {
                let ops: [&dyn InsideEvaluator; 2] = [&BooleanOp::And, &BooleanOp::ANotB];
                let mut res = c.ep.process_multi(&ops).into_iter();
                and_polys.extend(res.next().unwrap_or_default());
                not_polys.extend(res.next().unwrap_or_default());
            }
            let (and_out, not_out) = results.split_at_mut(1);
            emit(&and_polys, repo, prop_id, &mut and_out[0], proc);
            emit(&not_polys, repo, prop_id, &mut not_out[0], proc);
        }
    }

    fn property_constraint(&self) -> PropertyConstraint {
        self.pc
    }

    fn on_empty_intruder_hint(&self) -> OnEmptyIntruderHint {
        OnEmptyIntruderHint::CopyToSecond
    }

    fn description(&self) -> String {
        "AND and NOT operation".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::box_polygon;
    use crate::layout::{ObjectWithProperties, PolygonRef};
    use crate::ops::FlatProcessor;

    type P = PolygonRef;

    fn interactions(layout: &Layout, a: &[Polygon], b: &[Polygon]) -> ShapeInteractions<P, P> {
        let repo = layout.shape_repository();
        let mut si = ShapeInteractions::new();
        for (i, p) in a.iter().enumerate() {
            si.add_subject(i, PolygonRef::new(p, repo));
        }
        for (j, q) in b.iter().enumerate() {
            si.add_intruder_shape(1000 + j, 0, PolygonRef::new(q, repo));
            for (i, p) in a.iter().enumerate() {
                if p.bbox().overlaps(&q.bbox()) {
                    si.add_interaction(i, 1000 + j);
                }
            }
        }
        si
    }

    fn polygons(set: &HashSet<P>) -> Vec<Polygon> {
        let mut v: Vec<Polygon> = set.iter().map(|p| p.instantiate()).collect();
        v.sort();
        v
    }

    #[test]
    fn test_and_not_of_squares() {
        let layout = Layout::new();
        let si = interactions(&layout, &[box_polygon(0, 0, 10, 10)], &[box_polygon(5, 5, 15, 15)]);
        let proc = FlatProcessor::default();

        let mut and_res: Vec<HashSet<P>> = vec![HashSet::new()];
        BoolAndOrNotLocalOperation::new(true).compute_local(&layout, 0, &si, &mut and_res, &proc);
        assert_eq!(polygons(&and_res[0]), vec![box_polygon(5, 5, 10, 10)]);

        let mut not_res: Vec<HashSet<P>> = vec![HashSet::new()];
        BoolAndOrNotLocalOperation::new(false).compute_local(&layout, 0, &si, &mut not_res, &proc);
        let not_polys = polygons(&not_res[0]);
        assert_eq!(not_polys.len(), 1);
        assert_eq!(not_polys[0].area(), 75.0);

        let mut both: Vec<HashSet<P>> = vec![HashSet::new(), HashSet::new()];
        TwoBoolAndNotLocalOperation::new().compute_local(&layout, 0, &si, &mut both, &proc);
        assert_eq!(both[0], and_res[0]);
        assert_eq!(both[1], not_res[0]);
    }

    #[test]
    fn test_identical_and_lonely_shortcuts() {
        let layout = Layout::new();
        let a = [box_polygon(0, 0, 10, 10), box_polygon(100, 0, 110, 10)];
        let si = interactions(&layout, &a, &[box_polygon(0, 0, 10, 10)]);
        let proc = FlatProcessor::default();

        let mut both: Vec<HashSet<P>> = vec![HashSet::new(), HashSet::new()];
        TwoBoolAndNotLocalOperation::new().compute_local(&layout, 0, &si, &mut both, &proc);
        assert_eq!(polygons(&both[0]), vec![box_polygon(0, 0, 10, 10)]);
        assert_eq!(polygons(&both[1]), vec![box_polygon(100, 0, 110, 10)]);
    }

    #[test]
    #[should_panic]
    fn test_channel_mismatch_panics() {
        let layout = Layout::new();
        let si = interactions(&layout, &[box_polygon(0, 0, 10, 10)], &[]);
        let mut res: Vec<HashSet<P>> = vec![HashSet::new()];
        TwoBoolAndNotLocalOperation::new().compute_local(&layout, 0, &si, &mut res, &FlatProcessor::default());
    }

    #[test]
    fn test_property_buckets() {
        let layout = Layout::new();
        let repo = layout.shape_repository();
        type PP = ObjectWithProperties<PolygonRef>;
        let mut si: ShapeInteractions<PP, PP> = ShapeInteractions::new();
        si.add_subject(0, ObjectWithProperties::new(PolygonRef::new(&box_polygon(0, 0, 10, 10), repo), 1));
        si.add_intruder_shape(1, 0, ObjectWithProperties::new(PolygonRef::new(&box_polygon(5, 0, 15, 10), repo), 2));
        si.add_interaction(0, 1);

        let proc = FlatProcessor::default();
        let mut same: Vec<HashSet<PP>> = vec![HashSet::new()];
        BoolAndOrNotLocalOperation::new_with_properties(false, PropertyConstraint::SamePropertiesConstraint)
            .compute_local(&layout, 0, &si, &mut same, &proc);
        let got: Vec<PP> = same[0].iter().cloned().collect();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].prop_id, 1);
        assert_eq!(got[0].obj.instantiate(), box_polygon(0, 0, 10, 10));

        let mut diff: Vec<HashSet<PP>> = vec![HashSet::new()];
        BoolAndOrNotLocalOperation::new_with_properties(false, PropertyConstraint::DifferentPropertiesConstraintDrop)
            .compute_local(&layout, 0, &si, &mut diff, &proc);
        let got: Vec<PP> = diff[0].iter().cloned().collect();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].prop_id, 0);
        assert_eq!(got[0].obj.instantiate(), box_polygon(0, 0, 5, 10));
    }

    #[test]
    fn test_drop_constraint_keeps_subjects_apart() {
        // both results end up under id 0, but only s1 may see the VDD intruder
        let layout = Layout::new();
        let repo = layout.shape_repository();
        type PP = ObjectWithProperties<PolygonRef>;
        let mut si: ShapeInteractions<PP, PP> = ShapeInteractions::new();
        si.add_subject(0, ObjectWithProperties::new(PolygonRef::new(&box_polygon(0, 0, 10, 10), repo), 1));
        si.add_subject(1, ObjectWithProperties::new(PolygonRef::new(&box_polygon(20, 0, 30, 10), repo), 2));
        si.add_intruder_shape(2, 0, ObjectWithProperties::new(PolygonRef::new(&box_polygon(5, 0, 25, 10), repo), 1));
        si.add_interaction(0, 2);
        si.add_interaction(1, 2);

        let mut res: Vec<HashSet<PP>> = vec![HashSet::new()];
        BoolAndOrNotLocalOperation::new_with_properties(true, PropertyConstraint::SamePropertiesConstraintDrop)
            .compute_local(&layout, 0, &si, &mut res, &FlatProcessor::default());
        let got: Vec<(Polygon, PropertiesId)> = res[0].iter().map(|p| (p.obj.instantiate(), p.prop_id)).collect();
        assert_eq!(got, vec![(box_polygon(5, 0, 10, 10), 0)]);
    }
}
