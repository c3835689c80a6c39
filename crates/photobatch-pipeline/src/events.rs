//! Progress events emitted while a run advances.
//!
//! Engine calls can block for hours, so every significant action is
//! reported. Callers choose where events go by passing an [`EventSink`]:
//! [`LogSink`] forwards to the `log` facade, [`CollectingSink`] keeps them.

use std::fmt;

use log::{info, warn};
use photobatch_core::{ArtifactKind, ProcessingUnit, UnitKind, UnitStatus};

use crate::session::RunState;

/// Something observable that happened during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// A controller step started.
    StageEntered { stage: &'static str },
    /// A controller step finished; `failed` units did not complete it.
    StageLeft {
        stage: &'static str,
        completed: usize,
        failed: usize,
    },
    /// The run state machine moved.
    RunStateChanged { state: RunState },
    /// A unit reached a new lifecycle status.
    UnitAdvanced {
        path: String,
        kind: UnitKind,
        status: UnitStatus,
    },
    ImagesLoaded { path: String, count: usize },
    ArtifactExported {
        path: String,
        artifact: ArtifactKind,
        file: String,
    },
    ArtifactImported {
        path: String,
        artifact: ArtifactKind,
        source: String,
    },
    /// A unit had no counterpart and was left where it was.
    PairingSkipped {
        path: String,
        kind: UnitKind,
        expected: Option<String>,
    },
    /// A unit failed a step; siblings carry on.
    UnitFailed {
        path: String,
        operation: &'static str,
        reason: String,
    },
    ProjectSaved { path: String },
    /// The operator declined to pick a project path.
    SaveCancelled,
}

impl PipelineEvent {
    /// Whether the event signals something the operator should look at.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Self::PairingSkipped { .. } | Self::UnitFailed { .. } | Self::SaveCancelled
        )
    }
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StageEntered { stage } => write!(f, "{stage}: started"),
            Self::StageLeft {
                stage,
                completed,
                failed,
            } => write!(f, "{stage}: {completed} done, {failed} failed"),
            Self::RunStateChanged { state } => write!(f, "run state -> {state}"),
            Self::UnitAdvanced { path, kind, status } => {
                write!(f, "{kind} unit {path} -> {status}")
            }
            Self::ImagesLoaded { path, count } => write!(f, "loaded {count} photos into {path}"),
            Self::ArtifactExported {
                path,
                artifact,
                file,
            } => write!(f, "exported {artifact} of {path} to {file}"),
            Self::ArtifactImported {
                path,
                artifact,
                source,
            } => write!(f, "imported {artifact} from {source} into {path}"),
            Self::PairingSkipped {
                path,
                kind,
                expected: Some(expected),
            } => write!(f, "{kind} unit {path} has no counterpart at {expected}; skipped"),
            Self::PairingSkipped {
                path,
                kind,
                expected: None,
            } => write!(f, "{kind} unit {path} has no counterpart; skipped"),
            Self::UnitFailed {
                path,
                operation,
                reason,
            } => write!(f, "{operation} failed for {path}: {reason}"),
            Self::ProjectSaved { path } => write!(f, "project saved to {path}"),
            Self::SaveCancelled => f.write_str("no project path chosen; save aborted"),
        }
    }
}

/// Receiver of [`PipelineEvent`]s.
pub trait EventSink {
    fn emit(&mut self, event: PipelineEvent);
}

/// Forwards events to the `log` facade; warnings at `warn`, the rest at `info`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&mut self, event: PipelineEvent) {
        if event.is_warning() {
            warn!("{event}");
        } else {
            info!("{event}");
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    pub events: Vec<PipelineEvent>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &PipelineEvent> {
        self.events.iter().filter(|event| event.is_warning())
    }

    /// Statuses `path` passed through, in order.
    pub fn statuses_of(&self, path: &str) -> Vec<UnitStatus> {
        self.events
            .iter()
            .filter_map(|event| match event {
                PipelineEvent::UnitAdvanced {
                    path: p, status, ..
                } if p == path => Some(*status),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for CollectingSink {
    fn emit(&mut self, event: PipelineEvent) {
        self.events.push(event);
    }
}

impl<F: FnMut(PipelineEvent)> EventSink for F {
    fn emit(&mut self, event: PipelineEvent) {
        self(event)
    }
}

/// Move `unit` to `status` and announce it.
pub(crate) fn advance(unit: &mut ProcessingUnit, status: UnitStatus, sink: &mut dyn EventSink) {
    unit.status = status;
    sink.emit(PipelineEvent::UnitAdvanced {
        path: unit.path.clone(),
        kind: unit.kind,
        status,
    });
}
