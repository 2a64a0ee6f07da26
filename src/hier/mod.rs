//! Hierarchical processing
//!
//! # Submodules
//! - `variants` - Transformation reducers and cell variant separation
//! - `processor` - Context computation, parallel evaluation and result propagation

mod variants;
mod processor;

pub use variants::{
    MagnificationAndOrientationReducer,
    MagnificationReducer,
    OrientationReducer,
    TransformationReducer,
    VariantsCollector,
};

pub use processor::{
    LocalProcessor,
    ProcessorSettings,
};
