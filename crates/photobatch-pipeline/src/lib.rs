//! Staged batch reconstruction over paired photo folders.
//!
//! This crate drives a [`ReconstructionEngine`](photobatch_core::ReconstructionEngine)
//! through the two-stage workflow:
//!
//! ## Stage 1
//!
//! Discovery registers every `<name>_2` folder as a reconstruction unit and
//! every `<name>_1` folder as a texture unit, then loads, aligns and densely
//! reconstructs the former and loads the latter.
//!
//! ## Stage 2
//!
//! After the operator has cleaned the dense data, Stage 2 meshes, exports
//! `cameras.xml` and `model.obj` from each reconstruction unit, imports them
//! into the paired texture unit, builds textures and saves the project.
//!
//! ```no_run
//! use photobatch_core::test_utils::RecordingEngine;
//! use photobatch_pipeline::{
//!     LogSink, ReconstructionSession, run_finish, run_select_folder, step_build_mesh,
//! };
//! # fn main() -> anyhow::Result<()> {
//!
//! let mut engine = RecordingEngine::new();
//! let mut session = ReconstructionSession::new();
//! let outcome = run_select_folder(
//!     &mut session,
//!     &mut engine,
//!     &mut LogSink,
//!     "/data/site".as_ref(),
//!     || Some("/data/site/site".into()),
//! )?;
//! println!("{}", outcome.report.summary());
//!
//! // Option 1: step by step
//! step_build_mesh(&mut session, &mut engine, &mut LogSink)?;
//! run_finish(&mut session, &mut engine, &mut LogSink)?;
//!
//! // Option 2: everything after the checkpoint
//! // run_stage2(&mut session, &mut engine, &mut LogSink)?;
//! # Ok(())
//! # }
//! ```

// Core session framework
pub mod session;

pub mod bridge;
pub mod config;
pub mod events;
pub mod listing;
pub mod project;
pub mod report;
pub mod scanner;
pub mod steps;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports
// ─────────────────────────────────────────────────────────────────────────────

pub use crate::session::{LogEntry, ReconstructionSession, RunState, SessionMetadata};

pub use crate::bridge::{
    PairOutcome, artifact_path, bridge, import_artifact, resolve_pair, source_of,
};
pub use crate::config::{DEFAULT_PROJECT_EXTENSION, PipelineConfig};
pub use crate::events::{CollectingSink, EventSink, LogSink, PipelineEvent};
pub use crate::listing::format_units;
pub use crate::project::{SaveTarget, normalize_project_path};
pub use crate::report::{FailureKind, RunReport, StepReport, UnitError, UnitFailure};
pub use crate::scanner::{discover_children, scan};
pub use crate::steps::{
    SelectFolderOutcome, run_finish, run_select_folder, run_stage1, run_stage2,
    step_build_mesh, step_build_texture, step_export_cameras, step_export_model,
    step_import_cameras, step_import_model, step_save_project,
};
