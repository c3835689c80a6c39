//! Camera and model hand-off from reconstruction units to texture units.
//!
//! A reconstruction unit writes its artifacts next to its photos; the paired
//! texture unit, found by [`counterpart`] and an explicit registry lookup,
//! reads them back. Paths are deterministic and unversioned, so a second
//! export overwrites the first.

use std::path::PathBuf;

use photobatch_core::{
    ArtifactKind, ProcessingUnit, ReconstructionEngine, UnitKind, UnitRegistry, UnitStatus,
    counterpart, source_counterpart,
};

use crate::events::{EventSink, PipelineEvent, advance};
use crate::report::UnitError;
use crate::steps::{EXPORT_CAMERAS, EXPORT_MODEL, IMPORT_CAMERAS, IMPORT_MODEL};

/// Where `unit` writes (and its texture unit reads) `artifact`.
pub fn artifact_path(unit: &ProcessingUnit, artifact: ArtifactKind) -> PathBuf {
    PathBuf::from(format!("{}{}", unit.path, artifact.file_name()))
}

/// Result of looking up the texture unit for a reconstruction unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairOutcome {
    Matched { texture_path: String },
    /// No texture unit is registered at `expected`.
    Unpaired { expected: String },
}

/// Texture unit path paired with `reconstruction_path`, if registered.
///
/// # Errors
///
/// Returns an error if the path does not carry the reconstruction suffix.
pub fn resolve_pair(
    registry: &UnitRegistry,
    reconstruction_path: &str,
) -> Result<PairOutcome, UnitError> {
    let expected = counterpart(reconstruction_path)?;
    if registry.contains(UnitKind::Texture, &expected) {
        Ok(PairOutcome::Matched {
            texture_path: expected,
        })
    } else {
        Ok(PairOutcome::Unpaired { expected })
    }
}

/// Registered reconstruction unit that feeds `texture_path`, if any.
pub fn source_of(registry: &UnitRegistry, texture_path: &str) -> Option<String> {
    source_counterpart(texture_path)
        .ok()
        .filter(|path| registry.contains(UnitKind::Reconstruction, path))
}

/// Have a meshed reconstruction unit write `artifact` into its folder.
///
/// Cameras need a meshed unit and move it to `Exported`; the model needs the
/// cameras to have been exported first.
pub(crate) fn export_artifact(
    unit: &mut ProcessingUnit,
    artifact: ArtifactKind,
    engine: &mut dyn ReconstructionEngine,
    sink: &mut dyn EventSink,
) -> Result<(), UnitError> {
    let operation = export_operation(artifact);
    match artifact {
        ArtifactKind::Cameras => {
            unit.require_status(operation, &[UnitStatus::Meshed, UnitStatus::Exported])?
        }
        ArtifactKind::Model => {
            unit.require_status(operation, &[UnitStatus::Exported])?;
            if !unit.artifacts.cameras {
                return Err(missing_artifact(unit, operation, ArtifactKind::Cameras));
            }
        }
    }

    let file = artifact_path(unit, artifact);
    match artifact {
        ArtifactKind::Cameras => engine.export_cameras(&unit.handle, &file)?,
        ArtifactKind::Model => engine.export_model(&unit.handle, &file)?,
    }
    unit.artifacts.insert(artifact);
    sink.emit(PipelineEvent::ArtifactExported {
        path: unit.path.clone(),
        artifact,
        file: file.display().to_string(),
    });
    if unit.status != UnitStatus::Exported {
        advance(unit, UnitStatus::Exported, sink);
    }
    Ok(())
}

/// Import one artifact of a reconstruction unit into its paired texture unit.
///
/// Importing cameras starts a fresh hand-off and forgets any model imported
/// earlier; the model may only follow the cameras.
///
/// # Errors
///
/// Fails if the reconstruction path is malformed or unregistered, if the unit
/// has not exported `artifact`, if the texture unit is not ready, or if the
/// engine fails. A missing texture unit is not an error: it yields
/// [`PairOutcome::Unpaired`] before any artifact is checked.
pub fn import_artifact(
    registry: &mut UnitRegistry,
    reconstruction_path: &str,
    artifact: ArtifactKind,
    engine: &mut dyn ReconstructionEngine,
    sink: &mut dyn EventSink,
) -> Result<PairOutcome, UnitError> {
    let operation = import_operation(artifact);
    let texture_path = match resolve_pair(registry, reconstruction_path)? {
        PairOutcome::Matched { texture_path } => texture_path,
        unpaired @ PairOutcome::Unpaired { .. } => return Ok(unpaired),
    };

    let source = registry.get(UnitKind::Reconstruction, reconstruction_path)?;
    if !source.artifacts.contains(artifact) {
        return Err(missing_artifact(source, operation, artifact));
    }
    let file = artifact_path(source, artifact);
    let target = registry.get_mut(UnitKind::Texture, &texture_path)?;
    target.require_status(
        operation,
        &[
            UnitStatus::Loaded,
            UnitStatus::Imported,
            UnitStatus::Textured,
            UnitStatus::Saved,
        ],
    )?;

    match artifact {
        ArtifactKind::Cameras => {
            engine.import_cameras(&target.handle, &file)?;
            target.artifacts.clear();
        }
        ArtifactKind::Model => {
            if !target.artifacts.cameras {
                return Err(missing_artifact(target, operation, ArtifactKind::Cameras));
            }
            engine.import_model(&target.handle, &file)?;
        }
    }
    target.artifacts.insert(artifact);
    sink.emit(PipelineEvent::ArtifactImported {
        path: texture_path.clone(),
        artifact,
        source: file.display().to_string(),
    });
    if target.status != UnitStatus::Imported {
        advance(target, UnitStatus::Imported, sink);
    }
    Ok(PairOutcome::Matched { texture_path })
}

/// Hand both artifacts of one reconstruction unit to its texture unit.
///
/// Cameras go first, then the model. The pipeline runs the two imports as
/// separate passes over all units; this is the single-unit form.
///
/// # Errors
///
/// See [`import_artifact`].
pub fn bridge(
    registry: &mut UnitRegistry,
    reconstruction_path: &str,
    engine: &mut dyn ReconstructionEngine,
    sink: &mut dyn EventSink,
) -> Result<PairOutcome, UnitError> {
    match import_artifact(
        registry,
        reconstruction_path,
        ArtifactKind::Cameras,
        engine,
        sink,
    )? {
        PairOutcome::Matched { .. } => import_artifact(
            registry,
            reconstruction_path,
            ArtifactKind::Model,
            engine,
            sink,
        ),
        unpaired => Ok(unpaired),
    }
}

pub(crate) fn export_operation(artifact: ArtifactKind) -> &'static str {
    match artifact {
        ArtifactKind::Cameras => EXPORT_CAMERAS,
        ArtifactKind::Model => EXPORT_MODEL,
    }
}

pub(crate) fn import_operation(artifact: ArtifactKind) -> &'static str {
    match artifact {
        ArtifactKind::Cameras => IMPORT_CAMERAS,
        ArtifactKind::Model => IMPORT_MODEL,
    }
}

pub(crate) fn missing_artifact(
    unit: &ProcessingUnit,
    operation: &'static str,
    artifact: ArtifactKind,
) -> UnitError {
    UnitError::MissingArtifact {
        path: unit.path.clone(),
        operation,
        artifact,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingSink;
    use photobatch_core::test_utils::RecordingEngine;
    use photobatch_core::unit_path;
    use std::path::Path;

    struct Fixture {
        _dir: tempfile::TempDir,
        registry: UnitRegistry,
        engine: RecordingEngine,
        sink: CollectingSink,
        recon: String,
        texture: String,
    }

    fn fixture(with_texture: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir(root.join("A_2")).unwrap();
        std::fs::create_dir(root.join("A_1")).unwrap();

        let mut engine = RecordingEngine::new();
        let mut registry = UnitRegistry::new();
        let recon = unit_path(root, "A_2");
        let texture = unit_path(root, "A_1");

        let handle = engine.create_unit(&recon).unwrap();
        let mut unit = ProcessingUnit::new(recon.clone(), UnitKind::Reconstruction, handle);
        unit.status = UnitStatus::Meshed;
        registry.insert(unit).unwrap();

        if with_texture {
            let handle = engine.create_unit(&texture).unwrap();
            let mut unit = ProcessingUnit::new(texture.clone(), UnitKind::Texture, handle);
            unit.status = UnitStatus::Loaded;
            registry.insert(unit).unwrap();
        }

        Fixture {
            _dir: dir,
            registry,
            engine,
            sink: CollectingSink::new(),
            recon,
            texture,
        }
    }

    fn export_both(f: &mut Fixture) {
        for artifact in [ArtifactKind::Cameras, ArtifactKind::Model] {
            let unit = f
                .registry
                .get_mut(UnitKind::Reconstruction, &f.recon)
                .unwrap();
            export_artifact(unit, artifact, &mut f.engine, &mut f.sink).unwrap();
        }
    }

    #[test]
    fn artifact_paths_are_deterministic() {
        let unit = ProcessingUnit::new(
            "/d/Site_2/",
            UnitKind::Reconstruction,
            photobatch_core::UnitHandle::new("h"),
        );
        assert_eq!(
            artifact_path(&unit, ArtifactKind::Cameras),
            Path::new("/d/Site_2/cameras.xml")
        );
        assert_eq!(
            artifact_path(&unit, ArtifactKind::Model),
            Path::new("/d/Site_2/model.obj")
        );
    }

    #[test]
    fn export_writes_files_and_marks_exported() {
        let mut f = fixture(true);
        export_both(&mut f);
        let unit = f.registry.get(UnitKind::Reconstruction, &f.recon).unwrap();
        assert_eq!(unit.status, UnitStatus::Exported);
        assert!(unit.artifacts.is_complete());
        assert!(artifact_path(unit, ArtifactKind::Cameras).is_file());
        assert!(artifact_path(unit, ArtifactKind::Model).is_file());
    }

    #[test]
    fn model_export_needs_cameras_first() {
        let mut f = fixture(true);
        let unit = f
            .registry
            .get_mut(UnitKind::Reconstruction, &f.recon)
            .unwrap();
        let err = export_artifact(unit, ArtifactKind::Model, &mut f.engine, &mut f.sink)
            .unwrap_err();
        assert!(matches!(
            err,
            UnitError::MissingArtifact {
                artifact: ArtifactKind::Cameras,
                ..
            }
        ));
        assert_eq!(f.engine.count("export_model"), 0);
    }

    #[test]
    fn bridge_imports_cameras_then_model() {
        let mut f = fixture(true);
        export_both(&mut f);

        let outcome = bridge(&mut f.registry, &f.recon, &mut f.engine, &mut f.sink).unwrap();
        assert_eq!(
            outcome,
            PairOutcome::Matched {
                texture_path: f.texture.clone()
            }
        );
        let texture = f.registry.get(UnitKind::Texture, &f.texture).unwrap();
        assert_eq!(texture.status, UnitStatus::Imported);
        assert!(texture.artifacts.is_complete());
        assert_eq!(
            f.engine.operations_for(&f.texture),
            vec!["create_unit", "import_cameras", "import_model"]
        );
    }

    #[test]
    fn bridge_without_texture_unit_is_unpaired() {
        let mut f = fixture(false);
        export_both(&mut f);
        let outcome = bridge(&mut f.registry, &f.recon, &mut f.engine, &mut f.sink).unwrap();
        assert_eq!(
            outcome,
            PairOutcome::Unpaired {
                expected: f.texture.clone()
            }
        );
        assert_eq!(f.engine.count("import_cameras"), 0);
    }

    #[test]
    fn import_requires_exported_artifact() {
        let mut f = fixture(true);
        let err = import_artifact(
            &mut f.registry,
            &f.recon,
            ArtifactKind::Cameras,
            &mut f.engine,
            &mut f.sink,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(
                "import_cameras on {} needs the cameras artifact, which is missing",
                f.recon
            )
        );
        assert_eq!(f.engine.count("import_cameras"), 0);
    }

    #[test]
    fn model_import_requires_camera_import() {
        let mut f = fixture(true);
        export_both(&mut f);
        let err = import_artifact(
            &mut f.registry,
            &f.recon,
            ArtifactKind::Model,
            &mut f.engine,
            &mut f.sink,
        )
        .unwrap_err();
        assert!(matches!(
            &err,
            UnitError::MissingArtifact { path, operation: "import_model", .. } if *path == f.texture
        ));
        assert_eq!(f.engine.count("import_model"), 0);
    }

    #[test]
    fn resolve_pair_rejects_malformed_paths() {
        let registry = UnitRegistry::new();
        assert!(matches!(
            resolve_pair(&registry, "/d/A_1/"),
            Err(UnitError::Pairing(_))
        ));
    }

    #[test]
    fn source_of_finds_registered_reconstruction_unit() {
        let f = fixture(true);
        assert_eq!(source_of(&f.registry, &f.texture), Some(f.recon.clone()));
        assert_eq!(source_of(&f.registry, &f.recon), None);

        let orphan = f.texture.replace("A_1", "C_1");
        assert_eq!(source_of(&f.registry, &orphan), None);
    }
}
