use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::unit::UnitHandle;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine ran the operation and reported a failure.
    #[error("{operation} failed: {message}")]
    CallFailed {
        operation: &'static str,
        message: String,
    },
    /// The handle does not address a unit this engine knows about.
    #[error("unknown unit handle {0}")]
    UnknownHandle(UnitHandle),
    #[error("engine i/o error: {0}")]
    Io(#[from] std::io::Error),
}

macro_rules! engine_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Name passed to engine adapters.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

engine_enum! {
    /// Feature matching accuracy used during alignment.
    AlignAccuracy {
        Lowest => "lowest",
        Low => "low",
        Medium => "medium",
        High => "high",
        Highest => "highest",
    }
}

engine_enum! {
    /// Image pair preselection strategy used during alignment.
    Preselection {
        Disabled => "disabled",
        Generic => "generic",
        Reference => "reference",
    }
}

engine_enum! {
    /// Dense reconstruction quality.
    DenseQuality {
        Lowest => "lowest",
        Low => "low",
        Medium => "medium",
        High => "high",
        Ultra => "ultra",
    }
}

engine_enum! {
    SurfaceType {
        Arbitrary => "arbitrary",
        HeightField => "height_field",
    }
}

engine_enum! {
    Interpolation {
        Disabled => "disabled",
        Enabled => "enabled",
        Extrapolated => "extrapolated",
    }
}

engine_enum! {
    /// UV parameterization used before texture baking.
    UvMapping {
        Generic => "generic",
        Orthophoto => "orthophoto",
        Adaptive => "adaptive",
        Spherical => "spherical",
        Camera => "camera",
    }
}

engine_enum! {
    /// How overlapping photos are blended into the texture atlas.
    BlendMode {
        Average => "average",
        Mosaic => "mosaic",
        Min => "min",
        Max => "max",
        Disabled => "disabled",
    }
}

/// Capabilities the pipeline needs from a photogrammetry engine.
///
/// Every call is synchronous and may take minutes to hours on large photo
/// sets. Implementations must not retry failed calls on their own.
pub trait ReconstructionEngine {
    /// Create an empty unit labelled `label` inside the current project.
    fn create_unit(&mut self, label: &str) -> Result<UnitHandle, EngineError>;

    /// Add every photo in `dir` to the unit; returns the number added.
    fn load_images(&mut self, unit: &UnitHandle, dir: &Path) -> Result<usize, EngineError>;

    /// Match features and align cameras.
    fn align(
        &mut self,
        unit: &UnitHandle,
        accuracy: AlignAccuracy,
        preselection: Preselection,
    ) -> Result<(), EngineError>;

    fn build_dense_reconstruction(
        &mut self,
        unit: &UnitHandle,
        quality: DenseQuality,
    ) -> Result<(), EngineError>;

    fn build_mesh(
        &mut self,
        unit: &UnitHandle,
        surface: SurfaceType,
        interpolation: Interpolation,
    ) -> Result<(), EngineError>;

    fn export_cameras(&mut self, unit: &UnitHandle, path: &Path) -> Result<(), EngineError>;

    fn export_model(&mut self, unit: &UnitHandle, path: &Path) -> Result<(), EngineError>;

    fn import_cameras(&mut self, unit: &UnitHandle, path: &Path) -> Result<(), EngineError>;

    fn import_model(&mut self, unit: &UnitHandle, path: &Path) -> Result<(), EngineError>;

    fn build_uv(&mut self, unit: &UnitHandle, mapping: UvMapping) -> Result<(), EngineError>;

    fn build_texture(
        &mut self,
        unit: &UnitHandle,
        blend: BlendMode,
        atlas_size: u32,
    ) -> Result<(), EngineError>;

    /// Persist the whole project (every unit) to `path`.
    fn save_project(&mut self, path: &Path) -> Result<(), EngineError>;

    /// Make a unit created by an earlier process addressable again.
    ///
    /// Engines whose handles stay valid across processes keep the default.
    fn reattach_unit(&mut self, unit: &UnitHandle, label: &str) -> Result<(), EngineError> {
        let _ = (unit, label);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_names_match_serde() {
        assert_eq!(SurfaceType::HeightField.as_str(), "height_field");
        assert_eq!(
            serde_json::to_string(&SurfaceType::HeightField).unwrap(),
            "\"height_field\""
        );
        assert_eq!(BlendMode::Mosaic.to_string(), "mosaic");
        let parsed: AlignAccuracy = serde_json::from_str("\"highest\"").unwrap();
        assert_eq!(parsed, AlignAccuracy::Highest);
    }

    #[test]
    fn call_failure_message() {
        let err = EngineError::CallFailed {
            operation: "build_mesh",
            message: "not enough points".into(),
        };
        assert_eq!(err.to_string(), "build_mesh failed: not enough points");
    }
}
