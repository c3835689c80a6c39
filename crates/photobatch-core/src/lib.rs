//! Core types for `photobatch` reconstruction runs.
//!
//! This crate provides the building blocks used by the pipeline and CLI
//! crates in the workspace:
//!
//! - folder classification and reconstruction/texture pairing by name suffix,
//! - the processing unit model and its lifecycle,
//! - the insertion-ordered [`UnitRegistry`] keyed by unit path,
//! - the [`ReconstructionEngine`] capability trait implemented per target engine.
//!
//! Folder convention (conceptually):
//! `<root>/<name>_2/` holds reconstruction photos, `<root>/<name>_1/` the
//! matching texture photos.
//!
//! # Modules
//!
//! - \[`classify`\]: suffix classification and counterpart path derivation.
//! - \[`unit`\]: processing units, statuses and artifacts.
//! - \[`registry`\]: the two path-keyed unit mappings.
//! - \[`engine`\]: the external engine interface and its parameter enums.
//! - \[`test_utils`\]: a recording engine used by workspace tests and dry runs.
//!
//! # Example
//!
//! ```
//! use photobatch_core::{Classification, UnitKind, classify, counterpart};
//!
//! assert_eq!(classify("Site_2"), Classification::Unit(UnitKind::Reconstruction));
//! assert_eq!(counterpart("/data/Site_2/").unwrap(), "/data/Site_1/");
//! ```

/// Folder name classification and pairing.
mod classify;
/// External reconstruction engine interface.
mod engine;
/// Image discovery inside unit folders.
mod images;
/// Path-keyed unit registry.
mod registry;
/// Processing unit model.
mod unit;

/// Helpers shared by workspace tests and dry runs.
///
/// This module is public to allow use across workspace test suites and the
/// CLI's `--dry-run` mode, but it performs no reconstruction.
pub mod test_utils;

pub use classify::{
    Classification, PathError, RECONSTRUCTION_SUFFIX, TEXTURE_SUFFIX, UnitKind, classify,
    counterpart, source_counterpart, unit_path,
};
pub use engine::{
    AlignAccuracy, BlendMode, DenseQuality, EngineError, Interpolation, Preselection,
    ReconstructionEngine, SurfaceType, UvMapping,
};
pub use images::{DEFAULT_IMAGE_EXTENSIONS, list_images};
pub use registry::{RegistryError, UnitRegistry};
pub use unit::{
    ArtifactKind, ArtifactSet, PreconditionError, ProcessingUnit, UnitHandle, UnitStatus,
};
