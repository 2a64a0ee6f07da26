//! Subject/intruder interaction sets
//!
//! A `ShapeInteractions` is built for one (cell, context) pair and handed to
//! a single `compute_local` call. Subject and intruder ids are opaque
//! within that call; a shape that is subject and intruder at the same time
//! carries the same id in both roles.

use super::types::{pc_match, pc_norm, pc_skip, LocalShape, PropertyConstraint};
use crate::layout::PropertiesId;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Intruder layer role plus the intruder shape
pub type IntruderEntry<TI> = (usize, TI);

#[derive(Debug, Clone)]
pub struct ShapeInteractions<TS, TI> {
    subjects: BTreeMap<usize, TS>,
    intruders: HashMap<usize, IntruderEntry<TI>>,
    interactions: BTreeMap<usize, Vec<usize>>,
}

impl<TS, TI> Default for ShapeInteractions<TS, TI> {
    fn default() -> Self {
        Self {
            subjects: BTreeMap::new(),
            intruders: HashMap::new(),
            interactions: BTreeMap::new(),
        }
    }
}

impl<TS: LocalShape, TI: LocalShape> ShapeInteractions<TS, TI> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subject; subjects without interactions are kept as well
    pub fn add_subject(&mut self, id: usize, shape: TS) {
        self.subjects.insert(id, shape);
        self.interactions.entry(id).or_default();
    }

    pub fn add_intruder_shape(&mut self, id: usize, layer: usize, shape: TI) {
        self.intruders.insert(id, (layer, shape));
    }

    pub fn add_interaction(&mut self, subject_id: usize, intruder_id: usize) {
        let list = self.interactions.entry(subject_id).or_default();
        if !list.contains(&intruder_id) {
            list.push(intruder_id);
        }
    }

    pub fn has_subject_shape_id(&self, id: usize) -> bool {
        self.subjects.contains_key(&id)
    }

    pub fn subject_shape(&self, id: usize) -> &TS {
        &self.subjects[&id]
    }

    /// Layer role and shape of an intruder
    pub fn intruder_shape(&self, id: usize) -> Option<&IntruderEntry<TI>> {
        self.intruders.get(&id)
    }

    /// Subject ids with their intruder ids, in subject id order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[usize])> + '_ {
        self.interactions.iter().map(|(s, i)| (*s, i.as_slice()))
    }

    /// Subjects with their resolved intruders
    pub fn subjects_with_intruders(&self) -> impl Iterator<Item = (&TS, Vec<&IntruderEntry<TI>>)> + '_ {
        self.iter().map(move |(sid, iids)| {
            (
                self.subject_shape(sid),
                iids.iter().filter_map(|i| self.intruder_shape(*i)).collect(),
            )
        })
    }

    /// All intruders referenced by at least one subject, each once
    pub fn referenced_intruders(&self) -> Vec<(usize, &IntruderEntry<TI>)> {
        let mut ids: Vec<usize> = self.interactions.values().flatten().copied().collect();
        ids.sort_unstable();
        ids.dedup();
        ids.into_iter()
            .filter_map(|i| self.intruder_shape(i).map(|e| (i, e)))
            .collect()
    }

    pub fn num_subjects(&self) -> usize {
        self.subjects.len()
    }

    pub fn num_intruders(&self) -> usize {
        self.intruders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    /// The interaction set restricted to one subject
    pub fn single_subject(&self, id: usize) -> ShapeInteractions<TS, TI> {
        let mut res = ShapeInteractions::new();
        res.add_subject(id, self.subject_shape(id).clone());
        for &i in self.interactions.get(&id).into_iter().flatten() {
            if let Some((layer, shape)) = self.intruder_shape(i) {
                res.add_intruder_shape(i, *layer, shape.clone());
                res.add_interaction(id, i);
            }
        }
        res
    }
}

/// Flat property buckets: subjects and the matching intruders
pub type PropertyBucket<TS, TI> = (Vec<TS>, HashSet<TI>);

/// Bucket subjects by normalized property id, with the intruders matching the constraint
pub fn separate_interactions_by_properties<TS, TI>(
    interactions: &ShapeInteractions<TS, TI>,
    pc: PropertyConstraint,
) -> BTreeMap<PropertiesId, PropertyBucket<TS, TI>>
where
    TS: LocalShape,
    TI: LocalShape,
{
    let mut by_prop: BTreeMap<PropertiesId, PropertyBucket<TS, TI>> = BTreeMap::new();
    for (subject, intruders) in interactions.subjects_with_intruders() {
        let sp = subject.properties_id();
        let bucket = by_prop.entry(pc_norm(pc, sp)).or_default();
        bucket.0.push(subject.clone());
        for (_, i) in intruders {
            if pc_match(pc, sp, i.properties_id()) {
                bucket.1.insert(i.clone());
            }
        }
    }
    by_prop
}

/// Like `separate_interactions_by_properties`, but keeps the interaction structure per bucket
///
/// Buckets are keyed by the subject property id (0 throughout if properties
/// are ignored), so all subjects of a bucket see the same intruders. Results
/// of a bucket carry `pc_norm(pc, key)`.
pub fn separate_interactions_to_interactions_by_properties<TS, TI>(
    interactions: &ShapeInteractions<TS, TI>,
    pc: PropertyConstraint,
) -> BTreeMap<PropertiesId, ShapeInteractions<TS, TI>>
where
    TS: LocalShape,
    TI: LocalShape,
{
    let mut by_prop: BTreeMap<PropertiesId, ShapeInteractions<TS, TI>> = BTreeMap::new();
    for (sid, iids) in interactions.iter() {
        let subject = interactions.subject_shape(sid);
        let sp = subject.properties_id();
        let key = if pc_skip(pc) { 0 } else { sp };
        let bucket = by_prop.entry(key).or_default();
        bucket.add_subject(sid, subject.clone());
        for &i in iids {
            let Some((layer, intruder)) = interactions.intruder_shape(i) else {
                continue;
            };
            if pc_match(pc, sp, intruder.properties_id()) {
                bucket.add_intruder_shape(i, *layer, intruder.clone());
                bucket.add_interaction(sid, i);
            }
        }
    }
    by_prop
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Edge;
    use crate::layout::ObjectWithProperties;

    type E = ObjectWithProperties<Edge>;

    fn e(x: i32, prop: PropertiesId) -> E {
        ObjectWithProperties::new(Edge::from_coords(x, 0, x, 10), prop)
    }

    fn sample() -> ShapeInteractions<E, E> {
        let mut si = ShapeInteractions::new();
        si.add_subject(1, e(0, 1));
        si.add_subject(2, e(10, 2));
        si.add_subject(3, e(20, 2));
        si.add_intruder_shape(10, 0, e(5, 1));
        si.add_intruder_shape(11, 0, e(15, 2));
        si.add_interaction(1, 10);
        si.add_interaction(1, 11);
        si.add_interaction(2, 11);
        si
    }

    #[test]
    fn test_same_properties_buckets() {
        let si = sample();
        let buckets = separate_interactions_to_interactions_by_properties(&si, PropertyConstraint::SamePropertiesConstraint);
        assert_eq!(buckets.len(), 2);
        let b1 = &buckets[&1];
        assert_eq!(b1.iter().collect::<Vec<_>>(), vec![(1, &[10usize][..])]);
        let b2 = &buckets[&2];
        assert_eq!(b2.num_subjects(), 2);
        assert_eq!(b2.iter().next(), Some((2, &[11usize][..])));
    }

    #[test]
    fn test_drop_constraint_keeps_subject_buckets_apart() {
        let si = sample();
        let buckets =
            separate_interactions_to_interactions_by_properties(&si, PropertyConstraint::DifferentPropertiesConstraintDrop);
        assert_eq!(buckets.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(buckets[&1].iter().collect::<Vec<_>>(), vec![(1, &[11usize][..])]);
        assert!(buckets[&2].referenced_intruders().is_empty());

        let ignored = separate_interactions_to_interactions_by_properties(&si, PropertyConstraint::IgnoreProperties);
        assert_eq!(ignored.len(), 1);
        assert_eq!(ignored[&0].num_subjects(), 3);
    }

    #[test]
    fn test_flat_separation_drops_properties() {
        let si = sample();
        let buckets = separate_interactions_by_properties(&si, PropertyConstraint::DifferentPropertiesConstraintDrop);
        assert_eq!(buckets.len(), 1);
        let (subjects, intruders) = &buckets[&0];
        assert_eq!(subjects.len(), 3);
        assert_eq!(intruders.len(), 1);
        assert!(intruders.contains(&e(15, 2)));
    }

    #[test]
    fn test_single_subject() {
        let si = sample();
        let one = si.single_subject(1);
        assert_eq!(one.num_subjects(), 1);
        assert_eq!(one.referenced_intruders().len(), 2);
    }
}
