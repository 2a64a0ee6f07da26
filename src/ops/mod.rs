//! Local operations
//!
//! This module provides the local operation contract and its concrete
//! boolean, selection and merge operations. Checks live in `drc`.
//!
//! # Submodules
//! - `types` - Shape capabilities, property constraints, empty-intruder hints
//! - `interactions` - Subject/intruder interaction sets and property separation
//! - `local_operation` - The `LocalOperation` trait and processor queries
//! - `sinks` - Polygon generators, splitter and result adapters
//! - `boolean` - AND / NOT and the two-channel AND+NOT
//! - `interacting` - Polygon interaction selection, containment and pull
//! - `edge_text` - Selections involving edges and texts
//! - `self_overlap` - Wrap count merge

mod types;
mod interactions;
mod local_operation;
mod sinks;
mod boolean;
mod interacting;
mod edge_text;
mod self_overlap;

pub use types::{
    EdgeLike,
    EdgePairResult,
    FromSubject,
    HierShape,
    LocalShape,
    OnEmptyIntruderHint,
    PolygonLike,
    PolygonResult,
    PropertyConstraint,
    TextLike,
    pc_always_different,
    pc_match,
    pc_norm,
    pc_remove,
    pc_skip,
};

pub use interactions::{
    IntruderEntry,
    PropertyBucket,
    ShapeInteractions,
    separate_interactions_by_properties,
    separate_interactions_to_interactions_by_properties,
};

pub use local_operation::{
    FlatProcessor,
    LocalOperation,
    LocalProcessorBase,
};

pub use sinks::{
    EdgeToEdgeSetGenerator,
    PolygonRefGenerator,
    PolygonRefToShapesGenerator,
    PolygonSink,
    PolygonSplitter,
    PropertyInjector,
    ResultCountingInserter,
    ShapeSink,
};

pub use boolean::{
    BoolAndOrNotLocalOperation,
    TwoBoolAndNotLocalOperation,
};

pub use interacting::{
    ContainedLocalOperation,
    InteractingLocalOperation,
    InteractingOutputMode,
    PullLocalOperation,
};

pub use edge_text::{
    EdgeToPolygonInteractingLocalOperation,
    InteractingWithEdgeLocalOperation,
    InteractingWithTextLocalOperation,
    PullWithEdgeLocalOperation,
    PullWithTextLocalOperation,
};

pub use self_overlap::SelfOverlapMergeLocalOperation;
