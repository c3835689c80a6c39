//! Run-level state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Position of a whole run in the two-stage workflow.
///
/// Variants are declared in workflow order, so `>=` answers "has the run
/// got at least this far". The manual checkpoint sits between
/// [`RunState::Stage1Complete`] and [`RunState::Stage2Requested`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Nothing discovered yet.
    #[default]
    New,
    Scanning,
    Stage1Complete,
    Stage2Requested,
    MeshBuilt,
    ArtifactsExported,
    ArtifactsImported,
    TextureBuilt,
    Saved,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::New => "new",
            Self::Scanning => "scanning",
            Self::Stage1Complete => "stage1_complete",
            Self::Stage2Requested => "stage2_requested",
            Self::MeshBuilt => "mesh_built",
            Self::ArtifactsExported => "artifacts_exported",
            Self::ArtifactsImported => "artifacts_imported",
            Self::TextureBuilt => "texture_built",
            Self::Saved => "saved",
        };
        f.write_str(name)
    }
}
