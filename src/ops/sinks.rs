//! Result sinks and adapters between the kernel and result containers

use super::types::{LocalShape, PolygonResult};
use crate::geometry::{Edge, Polygon};
use crate::kernel::split_polygon;
use crate::layout::{ObjectWithProperties, PolygonRef, PropertiesId, ShapeRepository, Shapes};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Receiver of generated polygons
pub trait PolygonSink {
    fn put(&mut self, poly: &Polygon);
}

/// Receiver of plain shapes
pub trait ShapeSink<T> {
    fn insert(&mut self, t: T);
}

impl<T: Eq + Hash> ShapeSink<T> for HashSet<T> {
    fn insert(&mut self, t: T) {
        HashSet::insert(self, t);
    }
}

impl<T> ShapeSink<T> for Vec<T> {
    fn insert(&mut self, t: T) {
        self.push(t);
    }
}

/// Turns raw polygons into result shapes, interning bodies in the repository
pub struct PolygonRefGenerator<'a, T> {
    repo: &'a ShapeRepository,
    prop_id: PropertiesId,
    out: &'a mut HashSet<T>,
}

impl<'a, T: PolygonResult> PolygonRefGenerator<'a, T> {
    pub fn new(repo: &'a ShapeRepository, out: &'a mut HashSet<T>) -> Self {
        Self::with_properties(repo, 0, out)
    }

    pub fn with_properties(repo: &'a ShapeRepository, prop_id: PropertiesId, out: &'a mut HashSet<T>) -> Self {
        Self { repo, prop_id, out }
    }
}

impl<T: PolygonResult> PolygonSink for PolygonRefGenerator<'_, T> {
    fn put(&mut self, poly: &Polygon) {
        if !poly.is_empty() {
            self.out.insert(T::from_polygon(poly, self.prop_id, self.repo));
        }
    }
}

/// Writes polygons directly into a cell's shape container
pub struct PolygonRefToShapesGenerator<'a> {
    shapes: &'a mut Shapes,
    repo: &'a ShapeRepository,
    prop_id: PropertiesId,
}

impl<'a> PolygonRefToShapesGenerator<'a> {
    pub fn new(shapes: &'a mut Shapes, repo: &'a ShapeRepository, prop_id: PropertiesId) -> Self {
        Self { shapes, repo, prop_id }
    }
}

impl PolygonSink for PolygonRefToShapesGenerator<'_> {
    fn put(&mut self, poly: &Polygon) {
        if !poly.is_empty() {
            self.shapes.insert_polygon_ref(PolygonRef::new(poly, self.repo), self.prop_id);
        }
    }
}

/// Bisects polygons that are too complex or too sparse before forwarding them
pub struct PolygonSplitter<'a, S: PolygonSink> {
    sink: &'a mut S,
    max_area_ratio: f64,
    max_vertex_count: usize,
}

impl<'a, S: PolygonSink> PolygonSplitter<'a, S> {
    pub fn new(sink: &'a mut S, max_area_ratio: f64, max_vertex_count: usize) -> Self {
        Self {
            sink,
            max_area_ratio,
            max_vertex_count,
        }
    }

    fn needs_split(&self, poly: &Polygon) -> bool {
        (self.max_vertex_count > 0 && poly.vertices() > self.max_vertex_count)
            || (self.max_area_ratio > 0.0 && poly.area_ratio() > self.max_area_ratio)
    }
}

impl<S: PolygonSink> PolygonSink for PolygonSplitter<'_, S> {
    fn put(&mut self, poly: &Polygon) {
        if !self.needs_split(poly) {
            self.sink.put(poly);
            return;
        }
        let parts = split_polygon(poly);
        if parts.len() == 1 && parts[0] == *poly {
            self.sink.put(poly);
            return;
        }
        for p in &parts {
            self.put(p);
        }
    }
}

/// Presents a property-aware set as a plain one, attaching a fixed property id
pub struct PropertyInjector<'a, T> {
    out: &'a mut HashSet<ObjectWithProperties<T>>,
    prop_id: PropertiesId,
}

impl<'a, T> PropertyInjector<'a, T> {
    pub fn new(out: &'a mut HashSet<ObjectWithProperties<T>>, prop_id: PropertiesId) -> Self {
        Self { out, prop_id }
    }
}

impl<T: Eq + Hash> ShapeSink<T> for PropertyInjector<'_, T> {
    fn insert(&mut self, t: T) {
        self.out.insert(ObjectWithProperties::new(t, self.prop_id));
    }
}

/// Routes edges tagged 1 (first input) and 2 (second input) into separate containers
pub struct EdgeToEdgeSetGenerator<'a> {
    tag_filter: u8,
    first: &'a mut dyn ShapeSink<Edge>,
    second: Option<&'a mut dyn ShapeSink<Edge>>,
}

impl<'a> EdgeToEdgeSetGenerator<'a> {
    /// `tag_filter` is a bit set: 1 accepts first-input edges, 2 second-input edges
    pub fn new(tag_filter: u8, first: &'a mut dyn ShapeSink<Edge>, second: Option<&'a mut dyn ShapeSink<Edge>>) -> Self {
        Self {
            tag_filter,
            first,
            second,
        }
    }

    pub fn put(&mut self, e: Edge, tag: u8) {
        if tag & self.tag_filter == 0 {
            return;
        }
        match (tag, self.second.as_mut()) {
            (2, Some(second)) => second.insert(e),
            _ => self.first.insert(e),
        }
    }
}

/// Counts interactions per subject; subjects registered with `init` start at zero
pub struct ResultCountingInserter<'a, T> {
    counts: &'a mut HashMap<T, usize>,
}

impl<'a, T: LocalShape> ResultCountingInserter<'a, T> {
    pub fn new(counts: &'a mut HashMap<T, usize>) -> Self {
        Self { counts }
    }

    pub fn init(&mut self, t: &T) {
        self.counts.entry(t.clone()).or_insert(0);
    }

    pub fn insert(&mut self, t: &T) {
        *self.counts.entry(t.clone()).or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{box_polygon, Point};

    #[test]
    fn test_splitter_respects_vertex_limit() {
        let repo = ShapeRepository::new();
        let mut out: HashSet<Polygon> = HashSet::new();
        let comb = Polygon::new(vec![
            Point::new(0, 0),
            Point::new(50, 0),
            Point::new(50, 30),
            Point::new(40, 30),
            Point::new(40, 10),
            Point::new(30, 10),
            Point::new(30, 30),
            Point::new(20, 30),
            Point::new(20, 10),
            Point::new(10, 10),
            Point::new(10, 30),
            Point::new(0, 30),
        ]);
        {
            let mut generator = PolygonRefGenerator::new(&repo, &mut out);
            let mut splitter = PolygonSplitter::new(&mut generator, 0.0, 8);
            splitter.put(&comb);
        }
        assert!(out.len() > 1);
        assert!(out.iter().all(|p| p.vertices() <= 8));
        let area: f64 = out.iter().map(|p| p.area()).sum();
        assert_eq!(area, comb.area());
    }

    #[test]
    fn test_property_injector_and_edge_router() {
        let mut with_props: HashSet<ObjectWithProperties<Edge>> = HashSet::new();
        let mut plain: Vec<Edge> = Vec::new();
        let e1 = Edge::from_coords(0, 0, 10, 0);
        let e2 = Edge::from_coords(0, 5, 10, 5);
        {
            let mut injector = PropertyInjector::new(&mut with_props, 7);
            let second: &mut dyn ShapeSink<Edge> = &mut injector;
            let mut router = EdgeToEdgeSetGenerator::new(3, &mut plain, Some(second));
            router.put(e1, 1);
            router.put(e2, 2);
        }
        assert_eq!(plain, vec![e1]);
        assert!(with_props.contains(&ObjectWithProperties::new(e2, 7)));
    }

    #[test]
    fn test_shapes_generator() {
        let repo = ShapeRepository::new();
        let mut shapes = Shapes::new();
        PolygonRefToShapesGenerator::new(&mut shapes, &repo, 3).put(&box_polygon(0, 0, 5, 5));
        assert_eq!(shapes.polygons().len(), 1);
        assert_eq!(shapes.polygons()[0].prop_id, 3);
    }
}
