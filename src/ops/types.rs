//! Shape capabilities and policies shared by all local operations
//!
//! The operations are generic over the shape representation. A shape type
//! only needs to expose its bounding box and, optionally, a property id.
//! Types without properties report id 0, so there is one code path for
//! plain shapes and shapes with properties.

use crate::geometry::{BBox, Edge, EdgePair, ICplxTrans, Polygon, Text};
use crate::layout::{ObjectWithProperties, PolygonRef, PropertiesId, ShapeRepository, Shapes};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;

/// Policy between subject and intruder property ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PropertyConstraint {
    /// Properties are ignored and dropped from the output
    #[default]
    IgnoreProperties,
    /// All pairs interact, subject properties are kept
    NoPropertyConstraint,
    SamePropertiesConstraint,
    SamePropertiesConstraintDrop,
    DifferentPropertiesConstraint,
    DifferentPropertiesConstraintDrop,
}

pub fn pc_skip(pc: PropertyConstraint) -> bool {
    pc == PropertyConstraint::IgnoreProperties
}

pub fn pc_always_different(pc: PropertyConstraint) -> bool {
    matches!(
        pc,
        PropertyConstraint::DifferentPropertiesConstraint | PropertyConstraint::DifferentPropertiesConstraintDrop
    )
}

/// Whether a subject/intruder pair with these property ids is processed
pub fn pc_match(pc: PropertyConstraint, a: PropertiesId, b: PropertiesId) -> bool {
    match pc {
        PropertyConstraint::SamePropertiesConstraint | PropertyConstraint::SamePropertiesConstraintDrop => a == b,
        PropertyConstraint::DifferentPropertiesConstraint | PropertyConstraint::DifferentPropertiesConstraintDrop => {
            a != b
        }
        PropertyConstraint::IgnoreProperties | PropertyConstraint::NoPropertyConstraint => true,
    }
}

/// Whether the output carries no properties
pub fn pc_remove(pc: PropertyConstraint) -> bool {
    matches!(
        pc,
        PropertyConstraint::IgnoreProperties
            | PropertyConstraint::SamePropertiesConstraintDrop
            | PropertyConstraint::DifferentPropertiesConstraintDrop
    )
}

pub fn pc_norm(pc: PropertyConstraint, id: PropertiesId) -> PropertiesId {
    if pc_remove(pc) {
        0
    } else {
        id
    }
}

/// What the processor does with a subject that has no intruders at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnEmptyIntruderHint {
    /// Run the operation anyway
    Ignore,
    /// Copy the subject into the first output
    Copy,
    /// Copy the subject into the second output
    CopyToSecond,
    /// The subject produces nothing
    Drop,
}

/// Basic capabilities of every shape handled by local operations
pub trait LocalShape: Clone + Eq + Hash + Ord + Debug + Send + Sync {
    fn bbox(&self) -> BBox;

    fn properties_id(&self) -> PropertiesId {
        0
    }

    /// The same shape under another property id; plain shapes stay as they are
    fn with_properties_id(&self, _prop_id: PropertiesId) -> Self {
        self.clone()
    }
}

/// Shapes that describe an area
pub trait PolygonLike: LocalShape {
    fn to_polygon(&self) -> Polygon;
}

pub trait EdgeLike: LocalShape {
    fn edge(&self) -> Edge;
}

pub trait TextLike: LocalShape {
    fn text(&self) -> &Text;
}

/// Polygon-type results built from raw polygons
pub trait PolygonResult: LocalShape {
    fn from_polygon(poly: &Polygon, prop_id: PropertiesId, repo: &ShapeRepository) -> Self;
}

/// Edge pair results of checks
pub trait EdgePairResult: LocalShape {
    fn from_edge_pair(ep: EdgePair, prop_id: PropertiesId) -> Self;
}

/// Conversion of a subject into a result for the copy hints
///
/// Identity for equal types; operations with a different result type
/// never request a copy and get `None`.
pub trait FromSubject<TS> {
    fn from_subject(s: &TS) -> Option<Self>
    where
        Self: Sized;
}

impl<T: Clone> FromSubject<T> for T {
    fn from_subject(s: &T) -> Option<T> {
        Some(s.clone())
    }
}

macro_rules! no_subject_conversion {
    ($($from:ty => $to:ty),* $(,)?) => {
        $(
            impl FromSubject<$from> for $to {
                fn from_subject(_s: &$from) -> Option<$to> {
                    None
                }
            }
        )*
    };
}

no_subject_conversion!(
    PolygonRef => EdgePair,
    PolygonRef => Edge,
    PolygonRef => Text,
    Polygon => EdgePair,
    Edge => PolygonRef,
    ObjectWithProperties<PolygonRef> => ObjectWithProperties<EdgePair>,
    ObjectWithProperties<PolygonRef> => ObjectWithProperties<Edge>,
    ObjectWithProperties<PolygonRef> => ObjectWithProperties<Text>,
);

/// Shapes that can be read from and written to cell shape containers
pub trait HierShape: LocalShape {
    fn fetch(shapes: &Shapes, out: &mut Vec<Self>);

    fn store(&self, shapes: &mut Shapes, repo: &ShapeRepository);

    fn transformed(&self, t: &ICplxTrans, repo: &ShapeRepository) -> Self;
}

fn transform_edge(e: &Edge, t: &ICplxTrans) -> Edge {
    Edge::new(t.apply(e.p1), t.apply(e.p2))
}

impl LocalShape for Polygon {
    fn bbox(&self) -> BBox {
        Polygon::bbox(self)
    }
}

impl PolygonLike for Polygon {
    fn to_polygon(&self) -> Polygon {
        self.clone()
    }
}

impl PolygonResult for Polygon {
    fn from_polygon(poly: &Polygon, _prop_id: PropertiesId, _repo: &ShapeRepository) -> Self {
        poly.clone()
    }
}

impl LocalShape for PolygonRef {
    fn bbox(&self) -> BBox {
        PolygonRef::bbox(self)
    }
}

impl PolygonLike for PolygonRef {
    fn to_polygon(&self) -> Polygon {
        self.instantiate()
    }
}

impl PolygonResult for PolygonRef {
    fn from_polygon(poly: &Polygon, _prop_id: PropertiesId, repo: &ShapeRepository) -> Self {
        PolygonRef::new(poly, repo)
    }
}

impl HierShape for PolygonRef {
    fn fetch(shapes: &Shapes, out: &mut Vec<Self>) {
        out.extend(shapes.polygons().iter().map(|p| p.obj.clone()));
    }

    fn store(&self, shapes: &mut Shapes, _repo: &ShapeRepository) {
        shapes.insert_polygon_ref(self.clone(), 0);
    }

    fn transformed(&self, t: &ICplxTrans, repo: &ShapeRepository) -> Self {
        PolygonRef::transformed(self, t, repo)
    }
}

impl LocalShape for Edge {
    fn bbox(&self) -> BBox {
        Edge::bbox(self)
    }
}

impl EdgeLike for Edge {
    fn edge(&self) -> Edge {
        *self
    }
}

impl HierShape for Edge {
    fn fetch(shapes: &Shapes, out: &mut Vec<Self>) {
        out.extend(shapes.edges().iter().map(|e| e.obj));
    }

    fn store(&self, shapes: &mut Shapes, _repo: &ShapeRepository) {
        shapes.insert_edge(*self, 0);
    }

    fn transformed(&self, t: &ICplxTrans, _repo: &ShapeRepository) -> Self {
        transform_edge(self, t)
    }
}

impl LocalShape for EdgePair {
    fn bbox(&self) -> BBox {
        EdgePair::bbox(self)
    }
}

impl EdgePairResult for EdgePair {
    fn from_edge_pair(ep: EdgePair, _prop_id: PropertiesId) -> Self {
        ep
    }
}

impl HierShape for EdgePair {
    fn fetch(shapes: &Shapes, out: &mut Vec<Self>) {
        out.extend(shapes.edge_pairs().iter().map(|e| e.obj));
    }

    fn store(&self, shapes: &mut Shapes, _repo: &ShapeRepository) {
        shapes.insert_edge_pair(*self, 0);
    }

    fn transformed(&self, t: &ICplxTrans, _repo: &ShapeRepository) -> Self {
        let (first, second) = (transform_edge(&self.first, t), transform_edge(&self.second, t));
        // rotations may change the canonical order
        if self.symmetric {
            EdgePair::symmetric(first, second)
        } else {
            EdgePair::new(first, second)
        }
    }
}

impl LocalShape for Text {
    fn bbox(&self) -> BBox {
        Text::bbox(self)
    }
}

impl TextLike for Text {
    fn text(&self) -> &Text {
        self
    }
}

impl HierShape for Text {
    fn fetch(shapes: &Shapes, out: &mut Vec<Self>) {
        out.extend(shapes.texts().iter().map(|t| t.obj.clone()));
    }

    fn store(&self, shapes: &mut Shapes, _repo: &ShapeRepository) {
        shapes.insert_text(self.clone(), 0);
    }

    fn transformed(&self, t: &ICplxTrans, _repo: &ShapeRepository) -> Self {
        Text::new(self.string.clone(), t.apply(self.pos))
    }
}

impl<T: LocalShape> LocalShape for ObjectWithProperties<T> {
    fn bbox(&self) -> BBox {
        self.obj.bbox()
    }

    fn properties_id(&self) -> PropertiesId {
        self.prop_id
    }

    fn with_properties_id(&self, prop_id: PropertiesId) -> Self {
        ObjectWithProperties::new(self.obj.clone(), prop_id)
    }
}

impl<T: PolygonLike> PolygonLike for ObjectWithProperties<T> {
    fn to_polygon(&self) -> Polygon {
        self.obj.to_polygon()
    }
}

impl<T: PolygonResult> PolygonResult for ObjectWithProperties<T> {
    fn from_polygon(poly: &Polygon, prop_id: PropertiesId, repo: &ShapeRepository) -> Self {
        ObjectWithProperties::new(T::from_polygon(poly, prop_id, repo), prop_id)
    }
}

impl<T: EdgeLike> EdgeLike for ObjectWithProperties<T> {
    fn edge(&self) -> Edge {
        self.obj.edge()
    }
}

impl<T: TextLike> TextLike for ObjectWithProperties<T> {
    fn text(&self) -> &Text {
        self.obj.text()
    }
}

impl<T: EdgePairResult> EdgePairResult for ObjectWithProperties<T> {
    fn from_edge_pair(ep: EdgePair, prop_id: PropertiesId) -> Self {
        ObjectWithProperties::new(T::from_edge_pair(ep, prop_id), prop_id)
    }
}

impl HierShape for ObjectWithProperties<PolygonRef> {
    fn fetch(shapes: &Shapes, out: &mut Vec<Self>) {
        out.extend(shapes.polygons().iter().cloned());
    }

    fn store(&self, shapes: &mut Shapes, _repo: &ShapeRepository) {
        shapes.insert_polygon_ref(self.obj.clone(), self.prop_id);
    }

    fn transformed(&self, t: &ICplxTrans, repo: &ShapeRepository) -> Self {
        ObjectWithProperties::new(self.obj.transformed(t, repo), self.prop_id)
    }
}

impl HierShape for ObjectWithProperties<Edge> {
    fn fetch(shapes: &Shapes, out: &mut Vec<Self>) {
        out.extend(shapes.edges().iter().cloned());
    }

    fn store(&self, shapes: &mut Shapes, _repo: &ShapeRepository) {
        shapes.insert_edge(self.obj, self.prop_id);
    }

    fn transformed(&self, t: &ICplxTrans, _repo: &ShapeRepository) -> Self {
        ObjectWithProperties::new(transform_edge(&self.obj, t), self.prop_id)
    }
}

impl HierShape for ObjectWithProperties<EdgePair> {
    fn fetch(shapes: &Shapes, out: &mut Vec<Self>) {
        out.extend(shapes.edge_pairs().iter().cloned());
    }

    fn store(&self, shapes: &mut Shapes, _repo: &ShapeRepository) {
        shapes.insert_edge_pair(self.obj, self.prop_id);
    }

    fn transformed(&self, t: &ICplxTrans, repo: &ShapeRepository) -> Self {
        ObjectWithProperties::new(self.obj.transformed(t, repo), self.prop_id)
    }
}

impl HierShape for ObjectWithProperties<Text> {
    fn fetch(shapes: &Shapes, out: &mut Vec<Self>) {
        out.extend(shapes.texts().iter().cloned());
    }

    fn store(&self, shapes: &mut Shapes, _repo: &ShapeRepository) {
        shapes.insert_text(self.obj.clone(), self.prop_id);
    }

    fn transformed(&self, t: &ICplxTrans, repo: &ShapeRepository) -> Self {
        ObjectWithProperties::new(self.obj.transformed(t, repo), self.prop_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PropertyConstraint::*;

    #[test]
    fn test_constraint_predicates() {
        assert!(pc_skip(IgnoreProperties));
        assert!(!pc_skip(NoPropertyConstraint));
        assert!(pc_always_different(DifferentPropertiesConstraintDrop));
        assert!(!pc_always_different(SamePropertiesConstraint));

        assert!(pc_match(NoPropertyConstraint, 1, 2));
        assert!(pc_match(SamePropertiesConstraint, 3, 3));
        assert!(!pc_match(SamePropertiesConstraintDrop, 3, 4));
        assert!(pc_match(DifferentPropertiesConstraint, 3, 4));
        assert!(!pc_match(DifferentPropertiesConstraint, 3, 3));
    }

    #[test]
    fn test_norm_drops_properties() {
        assert_eq!(pc_norm(IgnoreProperties, 5), 0);
        assert_eq!(pc_norm(SamePropertiesConstraintDrop, 5), 0);
        assert_eq!(pc_norm(DifferentPropertiesConstraintDrop, 5), 0);
        assert_eq!(pc_norm(SamePropertiesConstraint, 5), 5);
        assert_eq!(pc_norm(NoPropertyConstraint, 5), 5);
    }

    #[test]
    fn test_retag_properties() {
        let e = Edge::from_coords(0, 0, 10, 0);
        assert_eq!(e.with_properties_id(7), e);
        let tagged = ObjectWithProperties::new(e, 3);
        assert_eq!(tagged.with_properties_id(7), ObjectWithProperties::new(e, 7));
    }

    #[test]
    fn test_copy_conversion() {
        let e = Edge::from_coords(0, 0, 10, 0);
        assert_eq!(<Edge as FromSubject<Edge>>::from_subject(&e), Some(e));
        let repo = ShapeRepository::new();
        let p = PolygonRef::new(&crate::geometry::box_polygon(0, 0, 1, 1), &repo);
        assert_eq!(<EdgePair as FromSubject<PolygonRef>>::from_subject(&p), None);
    }
}
