//! Hierarchical local operations
//!
//! Boolean, interaction selection, self-overlap merge and design rule
//! checks between polygon, edge and text collections stored in a cell
//! hierarchy. Results are computed per cell and per context and stay in
//! the cells where they are common to every use.
//!
//! # Modules
//! - `geometry` - Integer primitives, transformations and box scanners
//! - `kernel` - Edge processor, merge and boolean evaluation
//! - `layout` - Cells, shapes and properties
//! - `ops` - The local operation contract and its operations
//! - `drc` - Width, space, overlap and enclosure checks
//! - `hier` - Cell variants and the hierarchical processor
//! - `config` - Processor configuration

pub mod geometry;
pub mod kernel;
pub mod layout;
pub mod ops;
pub mod drc;
pub mod hier;
pub mod config;

pub use config::ProcessorConfig;
pub use hier::LocalProcessor;
