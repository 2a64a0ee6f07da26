//! Design Rule Checking (DRC) module
//!
//! Width, space, overlap and enclosure checks run as local operations, so
//! the hierarchical processor can evaluate them per cell context.
//!
//! # Submodules
//! - `options` - Check options, metrics and error filters
//! - `relation` - Edge relation filter (the distance test between two edges)
//! - `edge_check` - Edge collection, shielding and negative output
//! - `check_op` - The check algorithm and its local operation

mod options;
mod relation;
mod edge_check;
mod check_op;

pub use options::{
    MetricsType,
    OppositeFilter,
    RectFilter,
    RegionCheckOptions,
};

pub use relation::{
    EdgeRelationFilter,
    EdgeRelationType,
};

pub use edge_check::{
    CheckEdge,
    Edge2EdgeCheckNegativeOrPositive,
    Poly2PolyCheck,
    INTRUDER_LAYER,
    SUBJECT_LAYER,
};

pub use check_op::{
    CheckAlgorithm,
    CheckLocalOperation,
    CheckLocalOperationWithProperties,
};
