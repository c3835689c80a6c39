//! Per-step outcome reports.

use std::fmt;

use photobatch_core::{ArtifactKind, EngineError, PathError, PreconditionError, RegistryError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::{EventSink, PipelineEvent};

/// Why a unit did not complete a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The unit had not reached the status the step needs.
    Precondition,
    /// The engine call itself failed; reported unchanged, not retried.
    Engine,
    /// The unit path could not be paired (malformed suffix).
    Pairing,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Precondition => f.write_str("precondition"),
            Self::Engine => f.write_str("engine"),
            Self::Pairing => f.write_str("pairing"),
        }
    }
}

/// Error raised while moving a single unit through a step.
#[derive(Debug, Error)]
pub enum UnitError {
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Pairing(#[from] PathError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// The unit never produced (or received) an artifact the step reads.
    #[error("{operation} on {path} needs the {artifact} artifact, which is missing")]
    MissingArtifact {
        path: String,
        operation: &'static str,
        artifact: ArtifactKind,
    },
    /// A paired texture unit got nothing because its reconstruction unit fell behind.
    #[error("{path} received no artifacts from {reconstruction}, which did not export them")]
    NothingImported {
        path: String,
        reconstruction: String,
    },
}

impl UnitError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Precondition(_)
            | Self::MissingArtifact { .. }
            | Self::NothingImported { .. } => FailureKind::Precondition,
            Self::Engine(_) => FailureKind::Engine,
            Self::Pairing(_) | Self::Registry(_) => FailureKind::Pairing,
        }
    }
}

/// A unit that failed a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFailure {
    pub path: String,
    pub operation: String,
    pub kind: FailureKind,
    pub reason: String,
}

impl UnitFailure {
    pub fn new(path: impl Into<String>, operation: impl Into<String>, error: &UnitError) -> Self {
        Self {
            path: path.into(),
            operation: operation.into(),
            kind: error.kind(),
            reason: error.to_string(),
        }
    }
}

impl fmt::Display for UnitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} error) on {}: {}",
            self.operation, self.kind, self.path, self.reason
        )
    }
}

/// Outcome of one batched step across all units it visits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    pub operation: String,
    /// Units that completed the step.
    pub completed: Vec<String>,
    /// Units left alone because they have no counterpart.
    pub skipped: Vec<String>,
    pub failures: Vec<UnitFailure>,
}

impl StepReport {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            completed: Vec::new(),
            skipped: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// True when no unit failed; skipped units do not count as failures.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Record that `path` failed `operation` and tell the sink.
    pub(crate) fn record_failure(
        &mut self,
        sink: &mut dyn EventSink,
        path: &str,
        operation: &'static str,
        error: &UnitError,
    ) {
        sink.emit(PipelineEvent::UnitFailed {
            path: path.to_string(),
            operation,
            reason: error.to_string(),
        });
        self.failures.push(UnitFailure::new(path, operation, error));
    }

    /// Whether `path` failed this step.
    pub fn failed(&self, path: &str) -> bool {
        self.failures.iter().any(|failure| failure.path == path)
    }

    /// One-line summary for the session log.
    pub fn summary(&self) -> String {
        format!(
            "{} done, {} skipped, {} failed",
            self.completed.len(),
            self.skipped.len(),
            self.failures.len()
        )
    }
}

/// Reports of every step run by a multi-step entry point, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub steps: Vec<StepReport>,
}

impl RunReport {
    pub fn push(&mut self, step: StepReport) {
        self.steps.push(step);
    }

    pub fn is_success(&self) -> bool {
        self.steps.iter().all(StepReport::is_success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &UnitFailure> {
        self.steps.iter().flat_map(|step| step.failures.iter())
    }

    pub fn step(&self, operation: &str) -> Option<&StepReport> {
        self.steps.iter().find(|step| step.operation == operation)
    }
}
