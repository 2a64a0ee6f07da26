//! Interaction based selection between polygon layers
//!
//! Overlap areas come from one edge processor pass: subjects get even ids,
//! intruder groups odd ids, and the interaction areas of the sweep tell
//! whether a subject overlaps, lies inside or encloses a group.

use super::interactions::{separate_interactions_to_interactions_by_properties, ShapeInteractions};
use super::local_operation::{LocalOperation, LocalProcessorBase};
use super::types::{pc_norm, OnEmptyIntruderHint, PolygonLike, PropertyConstraint};
use crate::geometry::{polygons_touch, BBox, BoxScanner, Coord, Polygon};
use crate::kernel::{merge_polygons, EdgeProcessor, InteractionAreas};
use crate::layout::{CellIndex, Layout, PropertiesId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::Hash;
use std::marker::PhantomData;

/// Which result channels receive selected and rejected subjects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InteractingOutputMode {
    None,
    Positive,
    Negative,
    PositiveAndNegative,
}

impl InteractingOutputMode {
    pub fn channels(self) -> usize {
        if self == InteractingOutputMode::PositiveAndNegative {
            2
        } else {
            1
        }
    }
}

/// Hint for a selection whose empty-intruder outcome is `good_without`
pub(crate) fn selection_hint(output_mode: InteractingOutputMode, good_without: bool) -> OnEmptyIntruderHint {
    match output_mode {
        InteractingOutputMode::None => OnEmptyIntruderHint::Drop,
        InteractingOutputMode::Positive if good_without => OnEmptyIntruderHint::Copy,
        InteractingOutputMode::Positive => OnEmptyIntruderHint::Drop,
        InteractingOutputMode::Negative if good_without => OnEmptyIntruderHint::Drop,
        InteractingOutputMode::Negative => OnEmptyIntruderHint::Copy,
        InteractingOutputMode::PositiveAndNegative if good_without => OnEmptyIntruderHint::Copy,
        InteractingOutputMode::PositiveAndNegative => OnEmptyIntruderHint::CopyToSecond,
    }
}

/// Route a subject according to the output mode
///
/// With a single channel, rejected subjects go to `results[0]` as well.
pub(crate) fn emit_selected<T: Clone + Eq + Hash>(
    output_mode: InteractingOutputMode,
    good: bool,
    shape: &T,
    results: &mut [HashSet<T>],
) {
    match (output_mode, good) {
        (InteractingOutputMode::Positive, true) | (InteractingOutputMode::PositiveAndNegative, true) => {
            results[0].insert(shape.clone());
        }
        (InteractingOutputMode::Negative, false) => {
            results[0].insert(shape.clone());
        }
        (InteractingOutputMode::PositiveAndNegative, false) => {
            results[1].insert(shape.clone());
        }
        _ => {}
    }
}

/// True if `overlap` accounts for all of `area`, up to summation noise
pub(crate) fn covers(overlap: f64, area: f64) -> bool {
    area > 0.0 && overlap >= area * (1.0 - 1e-9) - 1e-6
}

/// Selects subjects by the number of intruder groups they interact with
///
/// `mode`: 0 interacting, -1 inside, 1 outside, -2 and below enclosing.
pub struct InteractingLocalOperation<TS, TI> {
    mode: i32,
    touching: bool,
    output_mode: InteractingOutputMode,
    min_count: usize,
    max_count: usize,
    other_is_merged: bool,
    pc: PropertyConstraint,
    _marker: PhantomData<fn() -> (TS, TI)>,
}

impl<TS, TI> InteractingLocalOperation<TS, TI> {
    pub fn new(
        mode: i32,
        touching: bool,
        output_mode: InteractingOutputMode,
        min_count: usize,
        max_count: usize,
        other_is_merged: bool,
    ) -> Self {
        Self::new_with_properties(
            mode,
            touching,
            output_mode,
            min_count,
            max_count,
            other_is_merged,
            PropertyConstraint::IgnoreProperties,
        )
    }

    pub fn new_with_properties(
        mode: i32,
        touching: bool,
        output_mode: InteractingOutputMode,
        min_count: usize,
        max_count: usize,
        other_is_merged: bool,
        pc: PropertyConstraint,
    ) -> Self {
        Self {
            mode,
            touching,
            output_mode,
            min_count: min_count.max(1),
            max_count,
            other_is_merged,
            pc,
            _marker: PhantomData,
        }
    }

    /// Plain "interacting" selection with default counts
    pub fn interacting(touching: bool, output_mode: InteractingOutputMode) -> Self {
        Self::new(0, touching, output_mode, 1, usize::MAX, false)
    }

    fn counting(&self) -> bool {
        self.min_count > 1 || self.max_count != usize::MAX
    }

    /// Intruder groups: single intruders, merged islands or one union
    ///
    /// Enclosing always works on islands, since a subject only has to
    /// cover the intruders it actually touches.
    fn groups(&self, intruders: Vec<Polygon>) -> Vec<Vec<Polygon>> {
        if intruders.is_empty() {
            return Vec::new();
        }
        if self.other_is_merged {
            intruders.into_iter().map(|p| vec![p]).collect()
        } else if self.counting() || self.mode <= -2 {
            merge_polygons(&intruders, 0).into_iter().map(|p| vec![p]).collect()
        } else {
            vec![merge_polygons(&intruders, 0)]
        }
    }

    fn interacts(&self, ia: &InteractionAreas, s: usize, g: usize, subject: &Polygon, group: &[Polygon]) -> bool {
        let overlap = ia.overlap_of(2 * s, 2 * g + 1);
        if self.mode == -1 {
            covers(overlap, subject.area())
        } else if self.mode <= -2 {
            covers(overlap, group.iter().map(|p| p.area()).sum())
        } else {
            overlap > 0.0 || (self.touching && group.iter().any(|q| polygons_touch(subject, q)))
        }
    }
}

impl<TS: PolygonLike, TI: PolygonLike> InteractingLocalOperation<TS, TI> {
    /// Selection within one property bucket
    fn select(&self, interactions: &ShapeInteractions<TS, TI>, prop_id: PropertiesId, results: &mut [HashSet<TS>]) {
        let subjects: Vec<(&TS, Polygon)> = interactions
            .iter()
            .map(|(sid, _)| {
                let s = interactions.subject_shape(sid);
                (s, s.to_polygon())
            })
            .collect();
        let intruders: Vec<Polygon> = interactions
            .referenced_intruders()
            .into_iter()
            .map(|(_, (_, shape))| shape.to_polygon())
            .collect();
        let groups = self.groups(intruders);

        let mut ep = EdgeProcessor::new();
        for (i, (_, p)) in subjects.iter().enumerate() {
            ep.insert_polygon(p, 2 * i);
        }
        for (g, pieces) in groups.iter().enumerate() {
            for p in pieces {
                ep.insert_polygon(p, 2 * g + 1);
            }
        }
        let ia = if groups.is_empty() {
            InteractionAreas::default()
        } else {
            ep.interaction_areas()
        };

        let group_boxes = BoxScanner::new(
            groups
                .iter()
                .enumerate()
                .map(|(g, pieces)| (g, pieces.iter().fold(BBox::empty(), |b, p| b.union(&p.bbox())))),
        );
        let search_dist: Coord = if self.touching { 1 } else { 0 };

        for (i, (shape, poly)) in subjects.iter().enumerate() {
            let count = group_boxes
                .query(&poly.bbox(), search_dist)
                .filter(|&g| self.interacts(&ia, i, g, poly, &groups[g]))
                .count();
            let good = if self.mode > 0 {
                count == 0
            } else {
                count >= self.min_count && count <= self.max_count
            };
            emit_selected(self.output_mode, good, &shape.with_properties_id(prop_id), results);
        }
    }
}

impl<TS, TI> LocalOperation<TS, TI, TS> for InteractingLocalOperation<TS, TI>
where
    TS: PolygonLike,
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
        if self.output_mode == InteractingOutputMode::None {
            return;
        }
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
        if self.touching {
            1
        } else {
            0
        }
    }

    fn description(&self) -> String {
        match self.mode {
            0 => "Select interacting".to_string(),
            -1 => "Select inside".to_string(),
            m if m > 0 => "Select outside".to_string(),
            _ => "Select enclosing".to_string(),
        }
    }
}

/// Selects subjects that are identical to an intruder
pub struct ContainedLocalOperation<TS, TI> {
    output_mode: InteractingOutputMode,
    pc: PropertyConstraint,
    _marker: PhantomData<fn() -> (TS, TI)>,
}

impl<TS, TI> ContainedLocalOperation<TS, TI> {
    pub fn new(output_mode: InteractingOutputMode) -> Self {
        Self::new_with_properties(output_mode, PropertyConstraint::IgnoreProperties)
    }

    pub fn new_with_properties(output_mode: InteractingOutputMode, pc: PropertyConstraint) -> Self {
        Self {
            output_mode,
            pc,
            _marker: PhantomData,
        }
    }
}

impl<TS, TI> LocalOperation<TS, TI, TS> for ContainedLocalOperation<TS, TI>
where
    TS: PolygonLike,
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
            let prop_id = pc_norm(self.pc, key);
            let others: HashSet<Polygon> = bucket
                .referenced_intruders()
                .into_iter()
                .map(|(_, (_, shape))| shape.to_polygon())
                .collect();
            for (sid, _) in bucket.iter() {
                let s = bucket.subject_shape(sid);
                let good = others.contains(&s.to_polygon());
                emit_selected(self.output_mode, good, &s.with_properties_id(prop_id), results);
            }
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
        "Select contained".to_string()
    }
}

/// Returns the intruders interacting with (mode 0) or inside (mode -1) the subjects
///
/// Pulled intruders carry the property id of the subjects they were found with.
pub struct PullLocalOperation<TS, TI> {
    mode: i32,
    touching: bool,
    pc: PropertyConstraint,
    _marker: PhantomData<fn() -> (TS, TI)>,
}

impl<TS, TI> PullLocalOperation<TS, TI> {
    pub fn new(mode: i32, touching: bool) -> Self {
        Self::new_with_properties(mode, touching, PropertyConstraint::IgnoreProperties)
    }

    pub fn new_with_properties(mode: i32, touching: bool, pc: PropertyConstraint) -> Self {
        Self {
            mode,
            touching,
            pc,
            _marker: PhantomData,
        }
    }
}

impl<TS: PolygonLike, TI: PolygonLike> PullLocalOperation<TS, TI> {
    fn pull(&self, interactions: &ShapeInteractions<TS, TI>, prop_id: PropertiesId, out: &mut HashSet<TI>) {
        let intruders = interactions.referenced_intruders();
        if intruders.is_empty() {
            return;
        }

        let subjects: Vec<Polygon> = interactions
            .iter()
            .map(|(sid, _)| interactions.subject_shape(sid).to_polygon())
            .collect();
        let mut ep = EdgeProcessor::new();
        for p in &subjects {
            ep.insert_polygon(p, 0);
        }
        let intruder_polys: Vec<Polygon> = intruders.iter().map(|(_, (_, shape))| shape.to_polygon()).collect();
        for (k, q) in intruder_polys.iter().enumerate() {
            ep.insert_polygon(q, 2 * k + 1);
        }
        let ia = ep.interaction_areas();
        let subject_boxes = BoxScanner::new(subjects.iter().enumerate().map(|(i, p)| (i, p.bbox())));

        for (k, (_, (_, shape))) in intruders.iter().enumerate() {
            let q = &intruder_polys[k];
            let overlap = ia.overlap_of(0, 2 * k + 1);
            let selected = if self.mode == -1 {
                covers(overlap, q.area())
            } else {
                overlap > 0.0
                    || (self.touching
                        && subject_boxes
                            .query(&q.bbox(), 1)
                            .any(|i| polygons_touch(&subjects[i], q)))
            };
            if selected {
                out.insert(shape.with_properties_id(prop_id));
            }
        }
    }
}

impl<TS, TI> LocalOperation<TS, TI, TI> for PullLocalOperation<TS, TI>
where
    TS: PolygonLike,
    TI: PolygonLike,
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
            self.pull(&bucket, pc_norm(self.pc, key), &mut results[0]);
        }
    }

    fn property_constraint(&self) -> PropertyConstraint {
        self.pc
    }

    fn on_empty_intruder_hint(&self) -> OnEmptyIntruderHint {
        OnEmptyIntruderHint::Drop
    }

    fn dist(&self) -> Coord {
        if self.touching {
            1
        } else {
            0
        }
    }

    fn description(&self) -> String {
        "Pull regions".to_string()
    }
}
