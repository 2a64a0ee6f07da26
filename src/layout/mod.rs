//! Layout data model
//!
//! A minimal hierarchical layout: cells holding shapes per layer and
//! instance arrays of other cells, a shared polygon body repository and a
//! property repository.
//!
//! # Submodules
//! - `properties` - Property sets, ids and id mapping
//! - `shapes` - Polygon references and per-cell shape containers
//! - `cell` - Cells, instance arrays and the layout

mod properties;
mod shapes;
mod cell;

pub use properties::{
    PropertiesId,
    PropertiesRepository,
    PropertyMapper,
    PropertySet,
    PropertyValue,
};

pub use shapes::{
    ObjectWithProperties,
    PolygonRef,
    ShapeRepository,
    Shapes,
};

pub use cell::{
    Cell,
    CellIndex,
    CellInstArray,
    LayerIndex,
    Layout,
};
