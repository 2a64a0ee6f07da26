//! The local operation contract
//!
//! A local operation turns one interaction cluster (subjects plus the
//! intruders interacting with them) into one or two result sets. The
//! hierarchical processor decides which clusters exist; the operation only
//! sees one of them at a time.

use super::interactions::ShapeInteractions;
use super::types::{LocalShape, OnEmptyIntruderHint, PropertyConstraint};
use crate::geometry::Coord;
use crate::hier::TransformationReducer;
use crate::layout::{CellIndex, Layout};
use std::collections::HashSet;

/// Settings and queries of the processor that runs an operation
pub trait LocalProcessorBase: Sync {
    /// Maximum bounding box to area ratio of result polygons (0 disables splitting)
    fn area_ratio(&self) -> f64;

    /// Maximum vertex count of result polygons (0 disables splitting)
    fn max_vertex_count(&self) -> usize;

    fn base_verbosity(&self) -> i32;

    /// A distance in the coordinate system of the given cell
    fn dist_for_cell(&self, _cell: CellIndex, dist: Coord) -> Coord {
        dist
    }
}

/// Plain settings, used when an operation runs outside of a hierarchy
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatProcessor {
    pub area_ratio: f64,
    pub max_vertex_count: usize,
}

impl LocalProcessorBase for FlatProcessor {
    fn area_ratio(&self) -> f64 {
        self.area_ratio
    }

    fn max_vertex_count(&self) -> usize {
        self.max_vertex_count
    }

    fn base_verbosity(&self) -> i32 {
        0
    }
}

pub trait LocalOperation<TS: LocalShape, TI: LocalShape, TR: LocalShape>: Send + Sync {
    /// Number of result sets `compute_local` expects
    fn output_channels(&self) -> usize {
        1
    }

    /// Entry point used by the processor
    ///
    /// Panics if `results` does not match `output_channels()`.
    fn compute_local(
        &self,
        layout: &Layout,
        cell: CellIndex,
        interactions: &ShapeInteractions<TS, TI>,
        results: &mut [HashSet<TR>],
        proc: &dyn LocalProcessorBase,
    ) {
        assert_eq!(
            results.len(),
            self.output_channels(),
            "{}: result channel count mismatch",
            self.description()
        );
        if self.requests_single_subjects() && interactions.num_subjects() > 1 {
            for (sid, _) in interactions.iter() {
                let single = interactions.single_subject(sid);
                self.do_compute_local(layout, cell, &single, results, proc);
            }
        } else {
            self.do_compute_local(layout, cell, interactions, results, proc);
        }
    }

    /// Computes the results for one cluster, appending to `results`
    fn do_compute_local(
        &self,
        layout: &Layout,
        cell: CellIndex,
        interactions: &ShapeInteractions<TS, TI>,
        results: &mut [HashSet<TR>],
        proc: &dyn LocalProcessorBase,
    );

    fn on_empty_intruder_hint(&self) -> OnEmptyIntruderHint {
        OnEmptyIntruderHint::Ignore
    }

    /// Property policy; subjects copied by a hint take its normalized property id
    fn property_constraint(&self) -> PropertyConstraint {
        PropertyConstraint::NoPropertyConstraint
    }

    fn requests_single_subjects(&self) -> bool {
        false
    }

    /// Interaction distance: 0 requires overlap, 1 accepts touching
    fn dist(&self) -> Coord {
        0
    }

    /// Transformation components that make cell variants necessary
    fn vars(&self) -> Option<&dyn TransformationReducer> {
        None
    }

    fn description(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drc::{CheckLocalOperation, EdgeRelationFilter, EdgeRelationType, RegionCheckOptions};
    use crate::geometry::{box_polygon, Edge, EdgePair, Polygon};
    use crate::layout::ObjectWithProperties;
    use crate::ops::{
        pc_norm, BoolAndOrNotLocalOperation, EdgeToPolygonInteractingLocalOperation, FromSubject,
        InteractingLocalOperation, InteractingOutputMode, PropertyConstraint, SelfOverlapMergeLocalOperation,
        TwoBoolAndNotLocalOperation,
    };

    /// Runs `op` on a lonely subject and compares with what the hint promises
    fn assert_hint_agrees<TS, TI, TR, Op>(op: &Op, subject: TS)
    where
        TS: LocalShape,
        TI: LocalShape,
        TR: LocalShape + FromSubject<TS>,
        Op: LocalOperation<TS, TI, TR>,
    {
        let mut si: ShapeInteractions<TS, TI> = ShapeInteractions::new();
        si.add_subject(0, subject.clone());
        let mut computed: Vec<HashSet<TR>> = vec![HashSet::new(); op.output_channels()];
        op.compute_local(&Layout::new(), 0, &si, &mut computed, &FlatProcessor::default());

        let mut hinted: Vec<HashSet<TR>> = vec![HashSet::new(); op.output_channels()];
        let channel = match op.on_empty_intruder_hint() {
            OnEmptyIntruderHint::Ignore => return,
            OnEmptyIntruderHint::Drop => None,
            OnEmptyIntruderHint::Copy => Some(0),
            OnEmptyIntruderHint::CopyToSecond => Some(1),
        };
        if let Some(ch) = channel {
            let copy = TR::from_subject(&subject).expect("copy hint needs a subject conversion");
            let prop_id = pc_norm(op.property_constraint(), subject.properties_id());
            hinted[ch].insert(copy.with_properties_id(prop_id));
        }
        assert_eq!(computed, hinted, "{}", op.description());
    }

    fn square() -> Polygon {
        box_polygon(0, 0, 10, 10)
    }

    fn selection(mode: i32, output_mode: InteractingOutputMode) -> InteractingLocalOperation<Polygon, Polygon> {
        InteractingLocalOperation::new(mode, false, output_mode, 1, usize::MAX, false)
    }

    #[test]
    fn test_booleans_without_intruders() {
        let and: BoolAndOrNotLocalOperation<Polygon, Polygon, Polygon> = BoolAndOrNotLocalOperation::new(true);
        assert_hint_agrees(&and, square());
        let not: BoolAndOrNotLocalOperation<Polygon, Polygon, Polygon> = BoolAndOrNotLocalOperation::new(false);
        assert_hint_agrees(&not, square());
        let both: TwoBoolAndNotLocalOperation<Polygon, Polygon, Polygon> = TwoBoolAndNotLocalOperation::new();
        assert_hint_agrees(&both, square());

        // copied subjects lose their properties like computed ones do
        type PP = ObjectWithProperties<Polygon>;
        let not: BoolAndOrNotLocalOperation<PP, PP, PP> =
            BoolAndOrNotLocalOperation::new_with_properties(false, PropertyConstraint::SamePropertiesConstraintDrop);
        assert_hint_agrees(&not, PP::new(square(), 4));
        let not: BoolAndOrNotLocalOperation<PP, PP, PP> =
            BoolAndOrNotLocalOperation::new_with_properties(false, PropertyConstraint::SamePropertiesConstraint);
        assert_hint_agrees(&not, PP::new(square(), 4));
    }

    #[test]
    fn test_selections_without_intruders() {
        for output_mode in [
            InteractingOutputMode::Positive,
            InteractingOutputMode::Negative,
            InteractingOutputMode::PositiveAndNegative,
        ] {
            for mode in [0, -1, 1, -2] {
                assert_hint_agrees(&selection(mode, output_mode), square());
            }
            let edges: EdgeToPolygonInteractingLocalOperation<Edge, Polygon> =
                EdgeToPolygonInteractingLocalOperation::new(1, output_mode);
            assert_hint_agrees(&edges, Edge::from_coords(0, 0, 10, 0));
        }
    }

    #[test]
    fn test_merge_and_check_without_intruders() {
        for wc in [1, 2] {
            let op: SelfOverlapMergeLocalOperation<Polygon, Polygon> = SelfOverlapMergeLocalOperation::new(wc);
            assert_hint_agrees(&op, square());
        }

        let space: CheckLocalOperation<Polygon, Polygon, EdgePair> = CheckLocalOperation::new(
            EdgeRelationFilter::new(EdgeRelationType::SpaceRelation, 20, &RegionCheckOptions::default()),
            false,
            true,
            true,
            RegionCheckOptions::default(),
        );
        assert_eq!(space.on_empty_intruder_hint(), OnEmptyIntruderHint::Drop);
        assert_hint_agrees(&space, square());
    }
}
