//! Session header and audit trail.

use std::time::SystemTime;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::report::StepReport;

/// Workflow identifier stored in session metadata.
pub const WORKFLOW_NAME: &str = "photobatch_reconstruction";
/// Current schema version of the serialized session.
pub const SCHEMA_VERSION: u32 = 1;

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

/// Identifies a session file and the build that last wrote it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub workflow: String,
    pub schema_version: u32,
    /// `photobatch-pipeline` version that created the session.
    pub created_by: String,
    /// Seconds since the Unix epoch.
    pub created_at: u64,
    pub last_modified: u64,
}

impl SessionMetadata {
    /// Header for a session created by this build.
    pub fn current() -> Self {
        let now = unix_seconds();
        Self {
            workflow: WORKFLOW_NAME.to_string(),
            schema_version: SCHEMA_VERSION,
            created_by: env!("CARGO_PKG_VERSION").to_string(),
            created_at: now,
            last_modified: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_modified = unix_seconds();
    }

    /// Refuse sessions of another workflow or from a newer schema.
    ///
    /// # Errors
    ///
    /// Returns an error naming the mismatching field.
    pub fn check_compatible(&self) -> Result<()> {
        if self.workflow != WORKFLOW_NAME {
            bail!(
                "session workflow {:?} is not {WORKFLOW_NAME:?}",
                self.workflow
            );
        }
        if self.schema_version > SCHEMA_VERSION {
            bail!(
                "session schema version {} is newer than supported version {} \
                 (written by photobatch {})",
                self.schema_version,
                SCHEMA_VERSION,
                self.created_by
            );
        }
        Ok(())
    }
}

/// What one pipeline step did, kept with the session.
///
/// A later process reads these entries to see which units the earlier stage
/// finished, skipped or left behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
    pub operation: String,
    /// No unit failed.
    pub success: bool,
    #[serde(default)]
    pub completed: Vec<String>,
    #[serde(default)]
    pub skipped: Vec<String>,
    #[serde(default)]
    pub failed: Vec<String>,
    /// Extra context for entries not tied to units, e.g. the chosen project path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl LogEntry {
    pub fn from_report(report: &StepReport) -> Self {
        Self {
            timestamp: unix_seconds(),
            operation: report.operation.clone(),
            success: report.is_success(),
            completed: report.completed.clone(),
            skipped: report.skipped.clone(),
            failed: report
                .failures
                .iter()
                .map(|failure| failure.path.clone())
                .collect(),
            detail: None,
        }
    }

    /// Entry for a run-level decision that touches no unit.
    pub fn decision(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            timestamp: unix_seconds(),
            operation: operation.into(),
            success: true,
            completed: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
            detail: Some(detail.into()),
        }
    }
}
