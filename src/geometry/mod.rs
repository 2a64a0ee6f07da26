//! Geometry module for hierarchical layout processing
//!
//! This module provides the integer geometric primitives consumed by the
//! edge processor and the local operations.
//!
//! # Submodules
//! - `types` - Core primitives (Point, Vector, BBox, Edge, EdgePair, Text)
//! - `polygon` - Canonical polygons with holes
//! - `trans` - Orthogonal transformations with magnification
//! - `spatial` - R-tree based box scanners

mod types;
mod polygon;
mod trans;
mod spatial;

pub use types::{
    Coord,
    Point,
    Vector,
    BBox,
    Edge,
    EdgePair,
    Text,
    cross3,
    div_round,
    edge_differences,
    edge_intersections,
};

pub use polygon::{
    Polygon,
    box_polygon,
    contour_area2,
    polygon_interacts_with_edge,
    polygons_touch,
};

pub use trans::{
    ICplxTrans,
    orientation,
};

pub use spatial::{
    BoxEntry,
    BoxScanner,
    scan_two_layers,
};
