//! Self-overlap merge: keeps the area covered by at least `wrap_count` shapes

use super::interactions::{separate_interactions_to_interactions_by_properties, ShapeInteractions};
use super::local_operation::{LocalOperation, LocalProcessorBase};
use super::sinks::{PolygonRefGenerator, PolygonSink, PolygonSplitter};
use super::types::{pc_norm, OnEmptyIntruderHint, PolygonLike, PolygonResult, PropertyConstraint};
use crate::kernel::{EdgeProcessor, InsideEvaluator, WindingState};
use crate::layout::{CellIndex, Layout};
use std::collections::HashSet;
use std::marker::PhantomData;

/// Coverage by more than `min_wc` shapes, restricted to the subjects (even ids)
struct CoverageOnSubjects {
    min_wc: usize,
}

impl InsideEvaluator for CoverageOnSubjects {
    fn is_inside(&self, state: &WindingState) -> bool {
        state.nonzero_even() > 0 && state.nonzero_total() > self.min_wc
    }
}

pub struct SelfOverlapMergeLocalOperation<TS, TR> {
    wrap_count: usize,
    pc: PropertyConstraint,
    _marker: PhantomData<fn() -> (TS, TR)>,
}

impl<TS, TR> SelfOverlapMergeLocalOperation<TS, TR> {
    pub fn new(wrap_count: usize) -> Self {
        Self::new_with_properties(wrap_count, PropertyConstraint::IgnoreProperties)
    }

    /// Only shapes matching under `pc` add to each other's wrap count
    pub fn new_with_properties(wrap_count: usize, pc: PropertyConstraint) -> Self {
        Self {
            wrap_count,
            pc,
            _marker: PhantomData,
        }
    }
}

impl<TS, TR> LocalOperation<TS, TS, TR> for SelfOverlapMergeLocalOperation<TS, TR>
where
    TS: PolygonLike,
    TR: PolygonResult,
{
    fn do_compute_local(
        &self,
        layout: &Layout,
        _cell: CellIndex,
        interactions: &ShapeInteractions<TS, TS>,
        results: &mut [HashSet<TR>],
        proc: &dyn LocalProcessorBase,
    ) {
        if self.wrap_count == 0 {
            return;
        }

        for (key, bucket) in separate_interactions_to_interactions_by_properties(interactions, self.pc) {
            // a shape may show up as subject and as intruder under the same id
            let mut seen: HashSet<usize> = HashSet::new();
            let mut ep = EdgeProcessor::new();
            for (sid, _) in bucket.iter() {
                if seen.insert(sid) {
                    ep.insert_polygon(&bucket.subject_shape(sid).to_polygon(), 2 * sid);
                }
            }
            for (iid, (_, shape)) in bucket.referenced_intruders() {
                if seen.insert(iid) {
                    ep.insert_polygon(&shape.to_polygon(), 2 * iid + 1);
                }
            }

            let polys = ep.process(&CoverageOnSubjects {
                min_wc: self.wrap_count - 1,
            });
            let mut generator =
                PolygonRefGenerator::with_properties(layout.shape_repository(), pc_norm(self.pc, key), &mut results[0]);
            let mut splitter = PolygonSplitter::new(&mut generator, proc.area_ratio(), proc.max_vertex_count());
            for p in &polys {
                splitter.put(p);
            }
        }
    }

    fn property_constraint(&self) -> PropertyConstraint {
        self.pc
    }

    fn on_empty_intruder_hint(&self) -> OnEmptyIntruderHint {
        if self.wrap_count == 1 {
            OnEmptyIntruderHint::Copy
        } else {
            OnEmptyIntruderHint::Drop
        }
    }

    fn description(&self) -> String {
        format!("Self-overlap (wrap count {})", self.wrap_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{box_polygon, Polygon};
    use crate::layout::ObjectWithProperties;
    use crate::ops::FlatProcessor;

    fn cluster() -> ShapeInteractions<Polygon, Polygon> {
        let shapes = [box_polygon(0, 0, 10, 10), box_polygon(5, 0, 15, 10), box_polygon(8, 0, 20, 10)];
        let mut si = ShapeInteractions::new();
        for (i, p) in shapes.iter().enumerate() {
            si.add_subject(i, p.clone());
            si.add_intruder_shape(i, 0, p.clone());
        }
        for i in 0..3 {
            for j in 0..3 {
                if i != j {
                    si.add_interaction(i, j);
                }
            }
        }
        si
    }

    fn run(wrap_count: usize) -> Vec<Polygon> {
        let layout = Layout::new();
        let op: SelfOverlapMergeLocalOperation<Polygon, Polygon> = SelfOverlapMergeLocalOperation::new(wrap_count);
        let mut res = vec![HashSet::new()];
        op.compute_local(&layout, 0, &cluster(), &mut res, &FlatProcessor::default());
        let mut v: Vec<Polygon> = res.pop().unwrap_or_default().into_iter().collect();
        v.sort();
        v
    }

    #[test]
    fn test_wrap_counts() {
        assert!(run(0).is_empty());
        assert_eq!(run(1), vec![box_polygon(0, 0, 20, 10)]);
        assert_eq!(run(2), vec![box_polygon(5, 0, 15, 10)]);
        assert_eq!(run(3), vec![box_polygon(8, 0, 10, 10)]);
        assert!(run(4).is_empty());
    }

    #[test]
    fn test_wrap_count_with_properties() {
        type P = ObjectWithProperties<Polygon>;
        let shapes = [
            P::new(box_polygon(0, 0, 10, 10), 5),
            P::new(box_polygon(5, 0, 15, 10), 5),
            P::new(box_polygon(8, 0, 20, 10), 6),
        ];
        let mut si: ShapeInteractions<P, P> = ShapeInteractions::new();
        for (i, p) in shapes.iter().enumerate() {
            si.add_subject(i, p.clone());
            si.add_intruder_shape(i, 0, p.clone());
        }
        for i in 0..3 {
            for j in 0..3 {
                if i != j {
                    si.add_interaction(i, j);
                }
            }
        }

        let run_pc = |pc: PropertyConstraint| {
            let op: SelfOverlapMergeLocalOperation<P, P> = SelfOverlapMergeLocalOperation::new_with_properties(2, pc);
            let mut res = vec![HashSet::new()];
            op.compute_local(&Layout::new(), 0, &si, &mut res, &FlatProcessor::default());
            let mut v: Vec<P> = res.pop().unwrap_or_default().into_iter().collect();
            v.sort();
            v
        };

        // only the two shapes with id 5 overlap each other
        assert_eq!(
            run_pc(PropertyConstraint::SamePropertiesConstraint),
            vec![P::new(box_polygon(5, 0, 10, 10), 5)]
        );
        assert_eq!(
            run_pc(PropertyConstraint::SamePropertiesConstraintDrop),
            vec![P::new(box_polygon(5, 0, 10, 10), 0)]
        );
        assert_eq!(run_pc(PropertyConstraint::IgnoreProperties), vec![P::new(box_polygon(5, 0, 15, 10), 0)]);
    }
}
