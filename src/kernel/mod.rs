//! Geometry kernel for booleans and merges
//!
//! # Submodules
//! - `edge_processor` - Scanline edge processor with tagged edges
//! - `ops` - Winding state and inside evaluators
//! - `generator` - Polygon reconstruction from boundary edges
//! - `split` - Polygon bisection

mod edge_processor;
mod generator;
mod ops;
mod split;

pub use edge_processor::{EdgeProcessor, InteractionAreas};
pub use generator::assemble_polygons;
pub use ops::{BooleanOp, InsideEvaluator, MergeOp, WindingState};
pub use split::split_polygon;

use crate::geometry::Polygon;

/// Merge a polygon set; regions covered by more than `min_wc` polygons survive
pub fn merge_polygons<'a, I>(polygons: I, min_wc: usize) -> Vec<Polygon>
where
    I: IntoIterator<Item = &'a Polygon>,
{
    let mut ep = EdgeProcessor::new();
    for (i, p) in polygons.into_iter().enumerate() {
        ep.insert_polygon(p, i);
    }
    ep.process(&MergeOp::new(min_wc))
}

/// Boolean between two polygon sets
pub fn boolean<'a, A, B>(a: A, b: B, op: BooleanOp) -> Vec<Polygon>
where
    A: IntoIterator<Item = &'a Polygon>,
    B: IntoIterator<Item = &'a Polygon>,
{
    let mut ep = EdgeProcessor::new();
    for (i, p) in a.into_iter().enumerate() {
        ep.insert_polygon(p, 2 * i);
    }
    for (i, p) in b.into_iter().enumerate() {
        ep.insert_polygon(p, 2 * i + 1);
    }
    ep.process(&op)
}
