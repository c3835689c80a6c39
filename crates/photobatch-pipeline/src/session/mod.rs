//! Reconstruction session framework.
//!
//! A session is the state of one workflow run: configuration, the unit
//! registry, the run state machine, the chosen project path and an audit
//! log. Step functions mutate it in place, and it serializes to JSON so the
//! second stage can run in a different process after the manual checkpoint.
//!
//! ```no_run
//! use photobatch_core::test_utils::RecordingEngine;
//! use photobatch_pipeline::session::ReconstructionSession;
//! use photobatch_pipeline::{LogSink, run_stage1, run_stage2};
//! # fn main() -> anyhow::Result<()> {
//!
//! let mut engine = RecordingEngine::new();
//! let mut session = ReconstructionSession::new();
//! run_stage1(&mut session, &mut engine, &mut LogSink, "/data/site".as_ref())?;
//! let json = session.to_json()?;
//!
//! // ... operator cleans dense clouds, possibly in another process ...
//! let mut session = ReconstructionSession::from_json(&json)?;
//! session.reattach(&mut engine)?;
//! session.set_project_path("/data/site/site")?;
//! run_stage2(&mut session, &mut engine, &mut LogSink)?;
//! # Ok(())
//! # }
//! ```

mod recon_session;
mod state;
mod types;

pub use recon_session::ReconstructionSession;
pub use state::RunState;
pub use types::{LogEntry, SCHEMA_VERSION, SessionMetadata, WORKFLOW_NAME};
