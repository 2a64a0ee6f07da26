//! Per-cell shape containers and shared polygon bodies
//!
//! Polygons are stored as `PolygonRef`: an interned body normalized to its
//! lower-left bounding box corner plus a displacement. Equality and hashing
//! go by value, so two refs reached on different paths compare equal when
//! they describe the same geometry.

use crate::geometry::{BBox, Edge, EdgePair, ICplxTrans, Point, Polygon, Text, Vector};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use super::properties::PropertiesId;

/// Interning store for polygon bodies, safe for concurrent insertion
#[derive(Debug, Default)]
pub struct ShapeRepository {
    bodies: Mutex<HashSet<Arc<Polygon>>>,
}

impl ShapeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&self, poly: &Polygon) -> Arc<Polygon> {
        let mut bodies = self.bodies.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(b) = bodies.get(poly) {
            return b.clone();
        }
        let b = Arc::new(poly.clone());
        bodies.insert(b.clone());
        b
    }

    pub fn len(&self) -> usize {
        self.bodies.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shared polygon body plus a displacement
#[derive(Debug, Clone)]
pub struct PolygonRef {
    body: Arc<Polygon>,
    disp: Vector,
}

impl PolygonRef {
    pub fn new(poly: &Polygon, repo: &ShapeRepository) -> Self {
        let b = poly.bbox();
        let disp = if b.is_empty() { Vector::default() } else { b.p1 - Point::default() };
        let body = repo.intern(&poly.moved(-disp));
        Self { body, disp }
    }

    /// The normalized body
    pub fn body(&self) -> &Polygon {
        &self.body
    }

    pub fn disp(&self) -> Vector {
        self.disp
    }

    /// The polygon in its actual position
    pub fn instantiate(&self) -> Polygon {
        self.body.moved(self.disp)
    }

    pub fn bbox(&self) -> BBox {
        self.body.bbox().moved(self.disp)
    }

    pub fn transformed(&self, t: &ICplxTrans, repo: &ShapeRepository) -> PolygonRef {
        if t.is_displacement() {
            return PolygonRef {
                body: self.body.clone(),
                disp: self.disp + t.disp(),
            };
        }
        PolygonRef::new(&self.instantiate().transformed(t), repo)
    }
}

impl PartialEq for PolygonRef {
    fn eq(&self, other: &Self) -> bool {
        self.disp == other.disp && (Arc::ptr_eq(&self.body, &other.body) || *self.body == *other.body)
    }
}

impl Eq for PolygonRef {}

impl Hash for PolygonRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.body.hash(state);
        self.disp.hash(state);
    }
}

impl PartialOrd for PolygonRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PolygonRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.disp.cmp(&other.disp).then_with(|| self.body.cmp(&other.body))
    }
}

/// Any shape with an attached property id
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectWithProperties<T> {
    pub obj: T,
    pub prop_id: PropertiesId,
}

impl<T> ObjectWithProperties<T> {
    pub fn new(obj: T, prop_id: PropertiesId) -> Self {
        Self { obj, prop_id }
    }
}

/// Shape container of one cell and layer
#[derive(Debug, Default, Clone)]
pub struct Shapes {
    polygons: Vec<ObjectWithProperties<PolygonRef>>,
    edges: Vec<ObjectWithProperties<Edge>>,
    edge_pairs: Vec<ObjectWithProperties<EdgePair>>,
    texts: Vec<ObjectWithProperties<Text>>,
}

impl Shapes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_polygon_ref(&mut self, p: PolygonRef, prop_id: PropertiesId) {
        self.polygons.push(ObjectWithProperties::new(p, prop_id));
    }

    pub fn insert_polygon(&mut self, p: &Polygon, prop_id: PropertiesId, repo: &ShapeRepository) {
        if !p.is_empty() {
            self.insert_polygon_ref(PolygonRef::new(p, repo), prop_id);
        }
    }

    pub fn insert_edge(&mut self, e: Edge, prop_id: PropertiesId) {
        self.edges.push(ObjectWithProperties::new(e, prop_id));
    }

    pub fn insert_edge_pair(&mut self, ep: EdgePair, prop_id: PropertiesId) {
        self.edge_pairs.push(ObjectWithProperties::new(ep, prop_id));
    }

    pub fn insert_text(&mut self, t: Text, prop_id: PropertiesId) {
        self.texts.push(ObjectWithProperties::new(t, prop_id));
    }

    pub fn polygons(&self) -> &[ObjectWithProperties<PolygonRef>] {
        &self.polygons
    }

    pub fn edges(&self) -> &[ObjectWithProperties<Edge>] {
        &self.edges
    }

    pub fn edge_pairs(&self) -> &[ObjectWithProperties<EdgePair>] {
        &self.edge_pairs
    }

    pub fn texts(&self) -> &[ObjectWithProperties<Text>] {
        &self.texts
    }

    pub fn len(&self) -> usize {
        self.polygons.len() + self.edges.len() + self.edge_pairs.len() + self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.polygons.clear();
        self.edges.clear();
        self.edge_pairs.clear();
        self.texts.clear();
    }

    pub fn bbox(&self) -> BBox {
        let mut b = BBox::empty();
        for p in &self.polygons {
            b = b.union(&p.obj.bbox());
        }
        for e in &self.edges {
            b = b.union(&e.obj.bbox());
        }
        for ep in &self.edge_pairs {
            b = b.union(&ep.obj.bbox());
        }
        for t in &self.texts {
            b = b.union(&t.obj.bbox());
        }
        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::box_polygon;
    use std::collections::HashSet;

    #[test]
    fn test_polygon_refs_share_bodies() {
        let repo = ShapeRepository::new();
        let a = PolygonRef::new(&box_polygon(0, 0, 10, 10), &repo);
        let b = PolygonRef::new(&box_polygon(100, 50, 110, 60), &repo);
        assert_eq!(repo.len(), 1);
        assert_ne!(a, b);
        assert_eq!(b.instantiate(), box_polygon(100, 50, 110, 60));

        let moved = a.transformed(&ICplxTrans::from_disp(Vector::new(100, 50)), &repo);
        assert_eq!(moved, b);
    }

    #[test]
    fn test_value_equality_across_repositories() {
        let r1 = ShapeRepository::new();
        let r2 = ShapeRepository::new();
        let a = PolygonRef::new(&box_polygon(0, 0, 10, 10), &r1);
        let b = PolygonRef::new(&box_polygon(0, 0, 10, 10), &r2);
        let set: HashSet<PolygonRef> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }
}
