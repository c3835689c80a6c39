use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classify::UnitKind;

/// Opaque key the engine assigned to a unit it created.
///
/// The handle is borrowed by the unit: the engine owns the underlying
/// container, the registry only remembers how to address it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitHandle(String);

impl UnitHandle {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle position of a processing unit.
///
/// Reconstruction units move `Created → Loaded → Aligned → Reconstructed →
/// Meshed → Exported`; texture units move `Created → Loaded → Imported →
/// Textured → Saved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Discovered,
    Created,
    Loaded,
    Aligned,
    Reconstructed,
    Meshed,
    Exported,
    Imported,
    Textured,
    Saved,
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Discovered => "discovered",
            Self::Created => "created",
            Self::Loaded => "loaded",
            Self::Aligned => "aligned",
            Self::Reconstructed => "reconstructed",
            Self::Meshed => "meshed",
            Self::Exported => "exported",
            Self::Imported => "imported",
            Self::Textured => "textured",
            Self::Saved => "saved",
        };
        f.write_str(name)
    }
}

/// Data exchanged between a reconstruction unit and its texture unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Cameras,
    Model,
}

impl ArtifactKind {
    /// File name written inside the reconstruction unit folder.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Cameras => "cameras.xml",
            Self::Model => "model.obj",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cameras => f.write_str("cameras"),
            Self::Model => f.write_str("model"),
        }
    }
}

/// Which artifacts a unit has exported (reconstruction) or imported (texture).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSet {
    pub cameras: bool,
    pub model: bool,
}

impl ArtifactSet {
    pub fn contains(&self, kind: ArtifactKind) -> bool {
        match kind {
            ArtifactKind::Cameras => self.cameras,
            ArtifactKind::Model => self.model,
        }
    }

    pub fn insert(&mut self, kind: ArtifactKind) {
        match kind {
            ArtifactKind::Cameras => self.cameras = true,
            ArtifactKind::Model => self.model = true,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.cameras && self.model
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// A step was requested on a unit that has not reached the required state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{operation} on {path} requires status {expected}, found {actual}")]
pub struct PreconditionError {
    pub path: String,
    pub operation: String,
    pub expected: String,
    pub actual: UnitStatus,
}

/// One photo-set folder turned into an engine unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingUnit {
    /// Folder path with trailing separator; the identity key.
    pub path: String,
    pub kind: UnitKind,
    pub handle: UnitHandle,
    pub status: UnitStatus,
    pub image_count: usize,
    /// Exported artifacts for reconstruction units, imported ones for texture units.
    #[serde(default)]
    pub artifacts: ArtifactSet,
}

impl ProcessingUnit {
    /// Wrap a freshly created engine unit.
    pub fn new(path: impl Into<String>, kind: UnitKind, handle: UnitHandle) -> Self {
        Self {
            path: path.into(),
            kind,
            handle,
            status: UnitStatus::Created,
            image_count: 0,
            artifacts: ArtifactSet::default(),
        }
    }

    /// Label used for the engine container; the path itself.
    pub fn label(&self) -> &str {
        &self.path
    }

    /// Fail unless the unit is in one of `allowed`.
    pub fn require_status(
        &self,
        operation: &str,
        allowed: &[UnitStatus],
    ) -> Result<(), PreconditionError> {
        if allowed.contains(&self.status) {
            return Ok(());
        }
        let expected = allowed
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" | ");
        Err(PreconditionError {
            path: self.path.clone(),
            operation: operation.to_string(),
            expected,
            actual: self.status,
        })
    }
}
