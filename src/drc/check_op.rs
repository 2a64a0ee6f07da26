//! DRC check as a local operation
//!
//! `CheckAlgorithm` runs one edge relation check for a single subject
//! polygon and the polygons around it, then applies the opposite and
//! rectangle error filters. `CheckLocalOperation` wraps it for the
//! hierarchical processor.

use super::edge_check::{
    cuts_into, violation_quad, Edge2EdgeCheckNegativeOrPositive, Poly2PolyCheck, INTRUDER_LAYER, SUBJECT_LAYER,
};
use super::options::{MetricsType, OppositeFilter, RegionCheckOptions};
use super::relation::{EdgeRelationFilter, EdgeRelationType};
use crate::geometry::{edge_differences, BBox, Coord, Edge, EdgePair, Polygon};
use crate::hier::{MagnificationReducer, TransformationReducer};
use crate::kernel::{boolean, merge_polygons, BooleanOp};
use crate::layout::{CellIndex, Layout, ObjectWithProperties, PolygonRef};
use crate::ops::{
    separate_interactions_by_properties, EdgePairResult, LocalOperation, LocalProcessorBase, OnEmptyIntruderHint,
    PolygonLike, PropertyConstraint, ShapeInteractions,
};
use std::collections::HashSet;
use std::marker::PhantomData;

/// One edge relation check with its error filters
#[derive(Debug, Clone)]
pub struct CheckAlgorithm {
    filter: EdgeRelationFilter,
    different_polygons: bool,
    has_other: bool,
    is_merged: bool,
    options: RegionCheckOptions,
}

impl CheckAlgorithm {
    pub fn new(
        filter: EdgeRelationFilter,
        different_polygons: bool,
        has_other: bool,
        is_merged: bool,
        options: RegionCheckOptions,
    ) -> Self {
        Self {
            filter,
            different_polygons,
            has_other,
            is_merged,
            options,
        }
    }

    pub fn filter(&self) -> &EdgeRelationFilter {
        &self.filter
    }

    pub fn options(&self) -> &RegionCheckOptions {
        &self.options
    }

    pub fn has_other(&self) -> bool {
        self.has_other
    }

    /// Violations of the subjects against themselves and the intruders
    pub fn compute_results(
        &self,
        cell: CellIndex,
        subjects: &[Polygon],
        intruders: &[Polygon],
        proc: &dyn LocalProcessorBase,
    ) -> HashSet<EdgePair> {
        let symmetric = !self.has_other
            && self.filter.is_symmetric()
            && self.options.opposite_filter == OppositeFilter::NoOppositeFilter
            && self.options.rect_filter.is_empty();

        let dist = proc.dist_for_cell(cell, self.filter.distance());
        let filter = self.filter.with_distance(dist);

        // without a negative output only edges near the subjects matter
        let take_all = self.options.negative || intruders.is_empty();
        let subject_box = subjects
            .iter()
            .fold(BBox::empty(), |b, p| b.union(&p.bbox()))
            .enlarged(dist);

        let mut pp = Poly2PolyCheck::new();
        let mut next_id = 0;
        let insert_intruder = |pp: &mut Poly2PolyCheck, p: &Polygon, id: usize| {
            if take_all {
                pp.insert(p, id, INTRUDER_LAYER);
            } else {
                pp.insert_restricted(p, id, INTRUDER_LAYER, &subject_box);
            }
        };

        if self.has_other {
            for s in subjects {
                pp.insert(s, next_id, SUBJECT_LAYER);
                next_id += 1;
            }
            for i in intruders {
                insert_intruder(&mut pp, i, next_id);
                next_id += 1;
            }
        } else {
            // same layer: a subject may come back as its own intruder
            let subject_set: HashSet<&Polygon> = subjects.iter().collect();
            let others: Vec<&Polygon> = intruders.iter().filter(|p| !subject_set.contains(p)).collect();

            if self.is_merged {
                for s in subjects {
                    pp.insert(s, next_id, SUBJECT_LAYER);
                    next_id += 1;
                }
                for i in &others {
                    insert_intruder(&mut pp, *i, next_id);
                    next_id += 1;
                }
            } else {
                // unmerged input: internal boundaries would show up as errors
                let merged = merge_polygons(subjects.iter().chain(others.iter().copied()), 0);
                for m in &merged {
                    let is_subject = subjects
                        .iter()
                        .any(|s| s.bbox().overlaps(&m.bbox()) && !boolean([s], [m], BooleanOp::And).is_empty());
                    if is_subject {
                        pp.insert(m, next_id, SUBJECT_LAYER);
                    } else {
                        insert_intruder(&mut pp, m, next_id);
                    }
                    next_id += 1;
                }
            }
        }

        let mut check = Edge2EdgeCheckNegativeOrPositive::new(
            filter,
            self.different_polygons,
            self.has_other,
            self.options.shielded,
            symmetric,
            self.options.negative,
        );
        pp.run(&mut check);

        let (mut result, intra_polygon_result, negative_result) = check.into_results();
        if self.options.negative {
            return negative_result;
        }

        if !self.different_polygons {
            result.extend(intra_polygon_result);
        }

        if self.options.opposite_filter != OppositeFilter::NoOppositeFilter && !result.is_empty() {
            result = self.apply_opposite_filter(subjects, &result);
        }
        if !self.options.rect_filter.is_empty() && !result.is_empty() {
            result = self.apply_rectangle_filter(subjects, result);
        }
        result
    }

    /// Keep (or drop) the error parts that face another error across the subject
    pub fn apply_opposite_filter(&self, subjects: &[Polygon], result: &HashSet<EdgePair>) -> HashSet<EdgePair> {
        let facing = EdgeRelationFilter::new(
            EdgeRelationType::WidthRelation,
            Coord::MAX,
            &RegionCheckOptions {
                metrics: MetricsType::Projection,
                ..Default::default()
            },
        );
        let subject_edges: Vec<Edge> = subjects.iter().flat_map(|s| s.edges()).collect();
        let on_subject = |e: &Edge| subject_edges.iter().any(|s| s.contains_edge(e));

        let mut pairs: Vec<&EdgePair> = result.iter().filter(|ep| on_subject(&ep.first)).collect();
        pairs.sort();

        let mut filtered = HashSet::new();
        for ep in &pairs {
            let mut opposite: Vec<Edge> = Vec::new();
            for other in &pairs {
                let Some(facing_pair) = facing.check(&ep.first, &other.first) else {
                    continue;
                };
                // another part of the subject between the errors hides the opposite side
                let hidden = violation_quad(&facing_pair).is_some_and(|quad| {
                    subject_edges.iter().any(|s| {
                        !s.contains_edge(&ep.first) && !s.contains_edge(&other.first) && cuts_into(&quad, s)
                    })
                });
                if !hidden {
                    opposite.push(facing_pair.first);
                }
            }

            let parts = match self.options.opposite_filter {
                OppositeFilter::OnlyOpposite => {
                    let remaining = edge_differences(&ep.first, &opposite);
                    edge_differences(&ep.first, &remaining)
                }
                _ => edge_differences(&ep.first, &opposite),
            };
            for part in parts {
                if self.has_other {
                    filtered.insert(EdgePair::new(part, ep.second));
                } else {
                    filtered.insert(EdgePair::self_paired(part));
                }
            }
        }
        filtered
    }

    /// Waive errors on rectangles according to the pattern of violated sides
    pub fn apply_rectangle_filter(&self, subjects: &[Polygon], mut result: HashSet<EdgePair>) -> HashSet<EdgePair> {
        for s in subjects.iter().filter(|s| s.is_box()) {
            let sides: Vec<Edge> = s.hull_edges().collect();
            let mut pattern = 0u8;
            for (i, side) in sides.iter().enumerate() {
                if result.iter().any(|ep| side.contains_edge(&ep.first)) {
                    pattern |= 1 << i;
                }
            }
            if self.options.rect_filter.waives(pattern) {
                result.retain(|ep| !sides.iter().any(|side| side.contains_edge(&ep.first)));
            }
        }

        if self.has_other {
            result
        } else {
            result.into_iter().map(|ep| EdgePair::self_paired(ep.first)).collect()
        }
    }
}

/// Check operation for the hierarchical processor
///
/// Each subject is checked on its own; magnified instances need their own
/// cell variants since the check distance does not scale.
pub struct CheckLocalOperation<TS, TI, TR> {
    algo: CheckAlgorithm,
    vars: MagnificationReducer,
    _marker: PhantomData<fn() -> (TS, TI, TR)>,
}

/// Check operation carrying property ids through to the edge pairs
pub type CheckLocalOperationWithProperties = CheckLocalOperation<
    ObjectWithProperties<PolygonRef>,
    ObjectWithProperties<PolygonRef>,
    ObjectWithProperties<EdgePair>,
>;

impl<TS, TI, TR> CheckLocalOperation<TS, TI, TR> {
    pub fn new(
        filter: EdgeRelationFilter,
        different_polygons: bool,
        has_other: bool,
        is_merged: bool,
        options: RegionCheckOptions,
    ) -> Self {
        Self {
            algo: CheckAlgorithm::new(filter, different_polygons, has_other, is_merged, options),
            vars: MagnificationReducer,
            _marker: PhantomData,
        }
    }

    pub fn algorithm(&self) -> &CheckAlgorithm {
        &self.algo
    }
}

impl<TS, TI, TR> LocalOperation<TS, TI, TR> for CheckLocalOperation<TS, TI, TR>
where
    TS: PolygonLike,
    TI: PolygonLike,
    TR: EdgePairResult,
{
    fn do_compute_local(
        &self,
        _layout: &Layout,
        cell: CellIndex,
        interactions: &ShapeInteractions<TS, TI>,
        results: &mut [HashSet<TR>],
        proc: &dyn LocalProcessorBase,
    ) {
        let pc = self.algo.options().prop_constraint;
        for (prop_id, (subjects, intruders)) in separate_interactions_by_properties(interactions, pc) {
            let subjects: Vec<Polygon> = subjects.iter().map(|s| s.to_polygon()).collect();
            let mut intruders: Vec<Polygon> = intruders.iter().map(|i| i.to_polygon()).collect();
            intruders.sort();

            for ep in self.algo.compute_results(cell, &subjects, &intruders, proc) {
                results[0].insert(TR::from_edge_pair(ep, prop_id));
            }
        }
    }

    fn on_empty_intruder_hint(&self) -> OnEmptyIntruderHint {
        if self.algo.has_other() && !self.algo.options().negative {
            OnEmptyIntruderHint::Drop
        } else {
            OnEmptyIntruderHint::Ignore
        }
    }

    fn property_constraint(&self) -> PropertyConstraint {
        self.algo.options().prop_constraint
    }

    fn requests_single_subjects(&self) -> bool {
        true
    }

    fn dist(&self) -> Coord {
        self.algo.filter().distance()
    }

    fn vars(&self) -> Option<&dyn TransformationReducer> {
        Some(&self.vars)
    }

    fn description(&self) -> String {
        format!(
            "{:?} check (d={})",
            self.algo.filter().relation(),
            self.algo.filter().distance()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drc::RectFilter;
    use crate::geometry::box_polygon;
    use crate::ops::FlatProcessor;

    fn algo(relation: EdgeRelationType, d: Coord, has_other: bool, options: RegionCheckOptions) -> CheckAlgorithm {
        CheckAlgorithm::new(EdgeRelationFilter::new(relation, d, &options), false, has_other, true, options)
    }

    #[test]
    fn test_width_of_thin_box() {
        let a = algo(EdgeRelationType::WidthRelation, 10, false, RegionCheckOptions::default());
        let res = a.compute_results(0, &[box_polygon(0, 0, 100, 5)], &[], &FlatProcessor::default());
        assert_eq!(res.len(), 1);
        let ep = res.iter().next().unwrap();
        assert!(ep.symmetric);
        assert_eq!(ep.bbox(), BBox::from_coords(0, 0, 100, 5));
    }

    #[test]
    fn test_rectangle_filter_opposite_sides() {
        // a 5 x 5 square fails the width check on all sides
        let square = box_polygon(0, 0, 5, 5);
        let opts = RegionCheckOptions {
            rect_filter: RectFilter::FOUR_SIDES_ALLOWED,
            ..Default::default()
        };
        let a = algo(EdgeRelationType::WidthRelation, 10, false, opts);
        assert!(a.compute_results(0, &[square.clone()], &[], &FlatProcessor::default()).is_empty());

        // a 5 x 100 box fails on its two long sides only
        let bar = box_polygon(0, 0, 100, 5);
        let opts = RegionCheckOptions {
            rect_filter: RectFilter::TWO_OPPOSITE_SIDES_ALLOWED,
            ..Default::default()
        };
        let a = algo(EdgeRelationType::WidthRelation, 10, false, opts);
        assert!(a.compute_results(0, &[bar.clone()], &[], &FlatProcessor::default()).is_empty());

        let opts = RegionCheckOptions {
            rect_filter: RectFilter::ONE_SIDE_ALLOWED,
            ..Default::default()
        };
        let a = algo(EdgeRelationType::WidthRelation, 10, false, opts);
        let res = a.compute_results(0, &[bar], &[], &FlatProcessor::default());
        // the surviving errors collapse to self pairs of the violating sides
        assert_eq!(res.len(), 2);
        assert!(res.contains(&EdgePair::self_paired(Edge::from_coords(0, 0, 100, 0))));
        assert!(res.contains(&EdgePair::self_paired(Edge::from_coords(100, 5, 0, 5))));
    }

    #[test]
    fn test_opposite_filter() {
        // both long sides of the bar violate and face each other
        let poly = Polygon::new(vec![
            crate::geometry::Point::new(0, 0),
            crate::geometry::Point::new(100, 0),
            crate::geometry::Point::new(100, 20),
            crate::geometry::Point::new(0, 20),
        ]);
        let opts = RegionCheckOptions {
            metrics: MetricsType::Projection,
            opposite_filter: OppositeFilter::OnlyOpposite,
            ..Default::default()
        };
        let a = algo(EdgeRelationType::WidthRelation, 30, false, opts);
        let res = a.compute_results(0, &[poly.clone()], &[], &FlatProcessor::default());
        assert!(res.contains(&EdgePair::self_paired(Edge::from_coords(0, 0, 100, 0))));

        let opts = RegionCheckOptions {
            opposite_filter: OppositeFilter::NotOpposite,
            ..opts
        };
        let a = algo(EdgeRelationType::WidthRelation, 30, false, opts);
        assert!(a.compute_results(0, &[poly], &[], &FlatProcessor::default()).is_empty());
    }

    #[test]
    fn test_unmerged_input_is_merged_first() {
        // two abutting halves of a 20 wide box: no width error at the seam
        let opts = RegionCheckOptions::default();
        let a = CheckAlgorithm::new(
            EdgeRelationFilter::new(EdgeRelationType::WidthRelation, 15, &opts),
            false,
            false,
            false,
            opts,
        );
        let left = box_polygon(0, 0, 10, 20);
        let right = box_polygon(10, 0, 20, 20);
        let res = a.compute_results(0, &[left.clone()], &[left, right], &FlatProcessor::default());
        assert!(res.is_empty());
    }

    #[test]
    fn test_two_layer_space_and_hint() {
        let op: CheckLocalOperation<Polygon, Polygon, EdgePair> = CheckLocalOperation::new(
            EdgeRelationFilter::new(EdgeRelationType::SpaceRelation, 10, &RegionCheckOptions::default()),
            false,
            true,
            true,
            RegionCheckOptions::default(),
        );
        assert_eq!(op.on_empty_intruder_hint(), OnEmptyIntruderHint::Drop);
        assert!(op.requests_single_subjects());
        assert_eq!(op.dist(), 10);

        let mut si = ShapeInteractions::new();
        si.add_subject(0, box_polygon(0, 0, 10, 10));
        si.add_intruder_shape(1, 0, box_polygon(15, 0, 25, 10));
        si.add_interaction(0, 1);
        let mut res = vec![HashSet::new()];
        op.compute_local(&Layout::new(), 0, &si, &mut res, &FlatProcessor::default());
        assert_eq!(
            res[0],
            HashSet::from([EdgePair::new(
                Edge::from_coords(10, 0, 10, 10),
                Edge::from_coords(15, 10, 15, 0)
            )])
        );
    }
}
