//! Pipeline controller: staged entry points over a [`ReconstructionSession`].
//!
//! Stage 1 runs on folder selection. Stage 2 runs only when asked for, after
//! the operator has cleaned the dense data, and each of its steps visits every
//! unit before the next step starts. Every step checks the run state first;
//! a run-state violation fails the whole call, while a unit that is not ready
//! or whose engine call fails is reported and skipped by that step only.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use photobatch_core::{
    ArtifactKind, ArtifactSet, ProcessingUnit, ReconstructionEngine, UnitKind, UnitStatus,
};

use crate::bridge::{
    PairOutcome, export_artifact, export_operation, import_artifact, import_operation,
    missing_artifact, source_of,
};
use crate::config::PipelineConfig;
use crate::events::{EventSink, PipelineEvent, advance};
use crate::project::SaveTarget;
use crate::report::{RunReport, StepReport, UnitError};
use crate::scanner::{SCAN, plan_scan, run_scan};
use crate::session::{ReconstructionSession, RunState};

pub const BUILD_MESH: &str = "build_mesh";
pub const EXPORT_CAMERAS: &str = "export_cameras";
pub const EXPORT_MODEL: &str = "export_model";
pub const IMPORT_CAMERAS: &str = "import_cameras";
pub const IMPORT_MODEL: &str = "import_model";
pub const BUILD_TEXTURE: &str = "build_texture";
pub const SAVE_PROJECT: &str = "save_project";
const SELECT_PROJECT_PATH: &str = "select_project_path";

/// Result of [`run_select_folder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectFolderOutcome {
    pub report: StepReport,
    pub save: SaveTarget,
}

// ─────────────────────────────────────────────────────────────────────────────
// Helper Functions
// ─────────────────────────────────────────────────────────────────────────────

fn transition(session: &mut ReconstructionSession, sink: &mut dyn EventSink, state: RunState) {
    if session.state() != state {
        session.set_state(state);
        sink.emit(PipelineEvent::RunStateChanged { state });
    }
}

fn enter(sink: &mut dyn EventSink, stage: &'static str) -> StepReport {
    sink.emit(PipelineEvent::StageEntered { stage });
    StepReport::new(stage)
}

fn leave(
    session: &mut ReconstructionSession,
    sink: &mut dyn EventSink,
    stage: &'static str,
    report: StepReport,
) -> StepReport {
    sink.emit(PipelineEvent::StageLeft {
        stage,
        completed: report.completed.len(),
        failed: report.failures.len(),
    });
    session.record_step(&report);
    report
}

fn mesh_unit(
    unit: &mut ProcessingUnit,
    config: &PipelineConfig,
    engine: &mut dyn ReconstructionEngine,
    sink: &mut dyn EventSink,
) -> Result<(), UnitError> {
    unit.require_status(
        BUILD_MESH,
        &[
            UnitStatus::Reconstructed,
            UnitStatus::Meshed,
            UnitStatus::Exported,
        ],
    )?;
    engine.build_mesh(&unit.handle, config.surface, config.interpolation)?;
    // Artifacts of an older mesh are stale.
    unit.artifacts.clear();
    advance(unit, UnitStatus::Meshed, sink);
    Ok(())
}

fn texture_unit(
    unit: &mut ProcessingUnit,
    config: &PipelineConfig,
    engine: &mut dyn ReconstructionEngine,
    sink: &mut dyn EventSink,
) -> Result<(), UnitError> {
    for artifact in [ArtifactKind::Cameras, ArtifactKind::Model] {
        if !unit.artifacts.contains(artifact) {
            return Err(missing_artifact(unit, BUILD_TEXTURE, artifact));
        }
    }
    unit.require_status(
        BUILD_TEXTURE,
        &[
            UnitStatus::Imported,
            UnitStatus::Textured,
            UnitStatus::Saved,
        ],
    )?;
    engine.build_uv(&unit.handle, config.uv_mapping)?;
    engine.build_texture(&unit.handle, config.blend_mode, config.atlas_size)?;
    advance(unit, UnitStatus::Textured, sink);
    Ok(())
}

fn export_step(
    session: &mut ReconstructionSession,
    engine: &mut dyn ReconstructionEngine,
    sink: &mut dyn EventSink,
    artifact: ArtifactKind,
) -> Result<StepReport> {
    let stage = export_operation(artifact);
    session.require_state(RunState::MeshBuilt, stage)?;
    let mut report = enter(sink, stage);

    for path in session.registry.paths(UnitKind::Reconstruction) {
        let unit = session.registry.get_mut(UnitKind::Reconstruction, &path)?;
        match export_artifact(unit, artifact, engine, sink) {
            Ok(()) => report.completed.push(path),
            Err(err) => report.record_failure(sink, &path, stage, &err),
        }
    }

    let state = match artifact {
        ArtifactKind::Cameras => RunState::MeshBuilt,
        ArtifactKind::Model => RunState::ArtifactsExported,
    };
    transition(session, sink, state);
    Ok(leave(session, sink, stage, report))
}

fn import_step(
    session: &mut ReconstructionSession,
    engine: &mut dyn ReconstructionEngine,
    sink: &mut dyn EventSink,
    artifact: ArtifactKind,
) -> Result<StepReport> {
    let stage = import_operation(artifact);
    session.require_state(RunState::ArtifactsExported, stage)?;
    let mut report = enter(sink, stage);

    for path in session.registry.paths(UnitKind::Reconstruction) {
        match import_artifact(&mut session.registry, &path, artifact, engine, sink) {
            Ok(PairOutcome::Matched { texture_path }) => report.completed.push(texture_path),
            Ok(PairOutcome::Unpaired { expected }) => {
                sink.emit(PipelineEvent::PairingSkipped {
                    path: path.clone(),
                    kind: UnitKind::Reconstruction,
                    expected: Some(expected),
                });
                report.skipped.push(path);
            }
            Err(err) => report.record_failure(sink, &path, stage, &err),
        }
    }

    let state = match artifact {
        ArtifactKind::Cameras => RunState::ArtifactsExported,
        ArtifactKind::Model => RunState::ArtifactsImported,
    };
    transition(session, sink, state);
    Ok(leave(session, sink, stage, report))
}

// ─────────────────────────────────────────────────────────────────────────────
// Stage 1
// ─────────────────────────────────────────────────────────────────────────────

/// Discover units under `root` and run Stage 1 on each of them.
///
/// # Errors
///
/// See [`scan`](crate::scanner::scan): a populated session, an unreadable
/// root or a duplicate unit path fail the call. Per-unit engine failures are
/// in the report.
pub fn run_stage1(
    session: &mut ReconstructionSession,
    engine: &mut dyn ReconstructionEngine,
    sink: &mut dyn EventSink,
    root: &Path,
) -> Result<StepReport> {
    let plan = plan_scan(session, root)?;
    sink.emit(PipelineEvent::StageEntered { stage: SCAN });
    let report = run_scan(session, engine, sink, plan)?;
    transition(session, sink, RunState::Stage1Complete);
    Ok(leave(session, sink, SCAN, report))
}

/// Run Stage 1, then ask for the project path.
///
/// `prompt` is called once after Stage 1. Returning `None` cancels cleanly:
/// the processed units stay in the session and a path can be supplied later.
///
/// # Errors
///
/// Fails like [`run_stage1`], or if the chosen path is empty.
pub fn run_select_folder<P>(
    session: &mut ReconstructionSession,
    engine: &mut dyn ReconstructionEngine,
    sink: &mut dyn EventSink,
    root: &Path,
    prompt: P,
) -> Result<SelectFolderOutcome>
where
    P: FnOnce() -> Option<PathBuf>,
{
    let report = run_stage1(session, engine, sink, root)?;
    let save = match prompt() {
        Some(path) => {
            let path = session.set_project_path(path)?.to_path_buf();
            session.record_decision(SELECT_PROJECT_PATH, path.display().to_string());
            SaveTarget::Path(path)
        }
        None => {
            sink.emit(PipelineEvent::SaveCancelled);
            session.record_decision(SELECT_PROJECT_PATH, "cancelled");
            SaveTarget::Cancelled
        }
    };
    Ok(SelectFolderOutcome { report, save })
}

// ─────────────────────────────────────────────────────────────────────────────
// Stage 2 Step Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Build a mesh for every reconstruction unit.
///
/// May be re-run after further manual cleanup; a rebuilt mesh invalidates
/// the unit's exported artifacts.
///
/// # Errors
///
/// Returns an error if Stage 1 has not completed.
pub fn step_build_mesh(
    session: &mut ReconstructionSession,
    engine: &mut dyn ReconstructionEngine,
    sink: &mut dyn EventSink,
) -> Result<StepReport> {
    session.require_state(RunState::Stage1Complete, BUILD_MESH)?;
    let mut report = enter(sink, BUILD_MESH);
    transition(session, sink, RunState::Stage2Requested);

    for path in session.registry.paths(UnitKind::Reconstruction) {
        let unit = session.registry.get_mut(UnitKind::Reconstruction, &path)?;
        match mesh_unit(unit, &session.config, engine, sink) {
            Ok(()) => report.completed.push(path),
            Err(err) => report.record_failure(sink, &path, BUILD_MESH, &err),
        }
    }

    transition(session, sink, RunState::MeshBuilt);
    Ok(leave(session, sink, BUILD_MESH, report))
}

/// Export every meshed unit's cameras to `<unit>cameras.xml`.
///
/// # Errors
///
/// Returns an error if meshes have not been built.
pub fn step_export_cameras(
    session: &mut ReconstructionSession,
    engine: &mut dyn ReconstructionEngine,
    sink: &mut dyn EventSink,
) -> Result<StepReport> {
    export_step(session, engine, sink, ArtifactKind::Cameras)
}

/// Export every unit's model to `<unit>model.obj`.
///
/// # Errors
///
/// Returns an error if meshes have not been built.
pub fn step_export_model(
    session: &mut ReconstructionSession,
    engine: &mut dyn ReconstructionEngine,
    sink: &mut dyn EventSink,
) -> Result<StepReport> {
    export_step(session, engine, sink, ArtifactKind::Model)
}

/// Import each reconstruction unit's cameras into its paired texture unit.
///
/// Unpaired reconstruction units are skipped with a warning.
///
/// # Errors
///
/// Returns an error if artifacts have not been exported.
pub fn step_import_cameras(
    session: &mut ReconstructionSession,
    engine: &mut dyn ReconstructionEngine,
    sink: &mut dyn EventSink,
) -> Result<StepReport> {
    import_step(session, engine, sink, ArtifactKind::Cameras)
}

/// Import each reconstruction unit's model into its paired texture unit.
///
/// # Errors
///
/// Returns an error if artifacts have not been exported.
pub fn step_import_model(
    session: &mut ReconstructionSession,
    engine: &mut dyn ReconstructionEngine,
    sink: &mut dyn EventSink,
) -> Result<StepReport> {
    import_step(session, engine, sink, ArtifactKind::Model)
}

/// Build UV layout and texture for every texture unit holding both imports.
///
/// Texture units with no registered reconstruction unit are skipped with a
/// warning. A paired unit that received nothing failed upstream and is
/// reported as a failure naming its reconstruction unit.
///
/// # Errors
///
/// Returns an error if the model import pass has not run.
pub fn step_build_texture(
    session: &mut ReconstructionSession,
    engine: &mut dyn ReconstructionEngine,
    sink: &mut dyn EventSink,
) -> Result<StepReport> {
    session.require_state(RunState::ArtifactsImported, BUILD_TEXTURE)?;
    let mut report = enter(sink, BUILD_TEXTURE);

    for path in session.registry.paths(UnitKind::Texture) {
        let source = source_of(&session.registry, &path);
        let unit = session.registry.get_mut(UnitKind::Texture, &path)?;
        if unit.artifacts == ArtifactSet::default() {
            match source {
                None => {
                    sink.emit(PipelineEvent::PairingSkipped {
                        path: path.clone(),
                        kind: UnitKind::Texture,
                        expected: None,
                    });
                    report.skipped.push(path);
                }
                Some(reconstruction) => {
                    let err = UnitError::NothingImported {
                        path: path.clone(),
                        reconstruction,
                    };
                    report.record_failure(sink, &path, BUILD_TEXTURE, &err);
                }
            }
            continue;
        }
        match texture_unit(unit, &session.config, engine, sink) {
            Ok(()) => report.completed.push(path),
            Err(err) => report.record_failure(sink, &path, BUILD_TEXTURE, &err),
        }
    }

    transition(session, sink, RunState::TextureBuilt);
    Ok(leave(session, sink, BUILD_TEXTURE, report))
}

/// Persist the project to the session's project path.
///
/// # Errors
///
/// Returns an error if textures have not been built, no project path was
/// chosen, or the engine fails to save.
pub fn step_save_project(
    session: &mut ReconstructionSession,
    engine: &mut dyn ReconstructionEngine,
    sink: &mut dyn EventSink,
) -> Result<StepReport> {
    session.require_state(RunState::TextureBuilt, SAVE_PROJECT)?;
    let project = session.require_project_path()?.to_path_buf();
    let mut report = enter(sink, SAVE_PROJECT);

    engine
        .save_project(&project)
        .with_context(|| format!("failed to save project to {}", project.display()))?;

    for path in session.registry.paths(UnitKind::Texture) {
        let unit = session.registry.get_mut(UnitKind::Texture, &path)?;
        if unit.status == UnitStatus::Textured {
            advance(unit, UnitStatus::Saved, sink);
            report.completed.push(path);
        }
    }
    sink.emit(PipelineEvent::ProjectSaved {
        path: project.display().to_string(),
    });

    transition(session, sink, RunState::Saved);
    Ok(leave(session, sink, SAVE_PROJECT, report))
}

// ─────────────────────────────────────────────────────────────────────────────
// Stage 2 Entry Points
// ─────────────────────────────────────────────────────────────────────────────

/// Run Stage 2 after the mesh: export, import, texture, save.
///
/// # Errors
///
/// Returns an error if meshes have not been built or no project path is set;
/// both are checked before any engine call.
pub fn run_finish(
    session: &mut ReconstructionSession,
    engine: &mut dyn ReconstructionEngine,
    sink: &mut dyn EventSink,
) -> Result<RunReport> {
    session.require_state(RunState::MeshBuilt, "finish")?;
    session
        .require_project_path()
        .context("finish saves the project")?;

    let mut run = RunReport::default();
    run.push(step_export_cameras(session, engine, sink)?);
    run.push(step_export_model(session, engine, sink)?);
    run.push(step_import_cameras(session, engine, sink)?);
    run.push(step_import_model(session, engine, sink)?);
    run.push(step_build_texture(session, engine, sink)?);
    run.push(step_save_project(session, engine, sink)?);
    Ok(run)
}

/// Run all of Stage 2: build mesh, then [`run_finish`].
///
/// # Errors
///
/// Returns an error if Stage 1 has not completed or no project path is set.
pub fn run_stage2(
    session: &mut ReconstructionSession,
    engine: &mut dyn ReconstructionEngine,
    sink: &mut dyn EventSink,
) -> Result<RunReport> {
    session.require_state(RunState::Stage1Complete, "create_model")?;
    session
        .require_project_path()
        .context("create_model saves the project")?;

    let mut run = RunReport::default();
    run.push(step_build_mesh(session, engine, sink)?);
    run.steps.extend(run_finish(session, engine, sink)?.steps);
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingSink;
    use photobatch_core::test_utils::{RecordingEngine, make_photo_folder};
    use photobatch_core::unit_path;

    struct Run {
        dir: tempfile::TempDir,
        session: ReconstructionSession,
        engine: RecordingEngine,
        sink: CollectingSink,
    }

    impl Run {
        fn new(folders: &[(&str, usize)]) -> Self {
            let dir = tempfile::tempdir().unwrap();
            for (name, images) in folders {
                make_photo_folder(dir.path(), name, *images);
            }
            Self {
                dir,
                session: ReconstructionSession::new(),
                engine: RecordingEngine::new(),
                sink: CollectingSink::new(),
            }
        }

        fn path(&self, name: &str) -> String {
            unit_path(self.dir.path(), name)
        }

        fn stage1(&mut self) -> StepReport {
            let root = self.dir.path().to_path_buf();
            run_stage1(&mut self.session, &mut self.engine, &mut self.sink, &root).unwrap()
        }

        fn status(&self, kind: UnitKind, name: &str) -> UnitStatus {
            self.session.registry.get(kind, &self.path(name)).unwrap().status
        }
    }

    #[test]
    fn stage2_requires_stage1() {
        let mut run = Run::new(&[("A_2", 2)]);
        let err = step_build_mesh(&mut run.session, &mut run.engine, &mut run.sink).unwrap_err();
        assert!(err.to_string().contains("build_mesh requires"));
        assert!(run.engine.calls().is_empty());
    }

    #[test]
    fn finish_requires_mesh() {
        let mut run = Run::new(&[("A_2", 2)]);
        run.stage1();
        run.session.set_project_path("out").unwrap();
        assert!(run_finish(&mut run.session, &mut run.engine, &mut run.sink).is_err());
        assert_eq!(run.engine.count("export_cameras"), 0);
    }

    #[test]
    fn unreconstructed_unit_is_not_meshed_or_exported() {
        let mut run = Run::new(&[("A_2", 2), ("B_2", 2)]);
        let bad = run.path("A_2");
        run.engine.fail_on("build_dense_reconstruction", bad.clone());
        run.stage1();
        assert_eq!(run.status(UnitKind::Reconstruction, "A_2"), UnitStatus::Aligned);

        let mesh = step_build_mesh(&mut run.session, &mut run.engine, &mut run.sink).unwrap();
        assert!(mesh.failed(&bad));
        assert_eq!(mesh.failures[0].kind, crate::report::FailureKind::Precondition);
        assert_eq!(mesh.completed, vec![run.path("B_2")]);

        let export =
            step_export_cameras(&mut run.session, &mut run.engine, &mut run.sink).unwrap();
        assert!(export.failed(&bad));
        assert_eq!(
            run.engine.operations_for(&bad),
            vec![
                "create_unit",
                "load_images",
                "align",
                "build_dense_reconstruction"
            ]
        );
        assert_eq!(run.status(UnitKind::Reconstruction, "B_2"), UnitStatus::Exported);
    }

    #[test]
    fn steps_follow_run_state_order() {
        let mut run = Run::new(&[("A_2", 2), ("A_1", 2)]);
        run.stage1();
        assert_eq!(run.session.state(), RunState::Stage1Complete);

        step_build_mesh(&mut run.session, &mut run.engine, &mut run.sink).unwrap();
        assert_eq!(run.session.state(), RunState::MeshBuilt);
        assert!(step_import_cameras(&mut run.session, &mut run.engine, &mut run.sink).is_err());

        step_export_cameras(&mut run.session, &mut run.engine, &mut run.sink).unwrap();
        step_export_model(&mut run.session, &mut run.engine, &mut run.sink).unwrap();
        assert_eq!(run.session.state(), RunState::ArtifactsExported);
        assert!(step_build_texture(&mut run.session, &mut run.engine, &mut run.sink).is_err());

        step_import_cameras(&mut run.session, &mut run.engine, &mut run.sink).unwrap();
        step_import_model(&mut run.session, &mut run.engine, &mut run.sink).unwrap();
        assert_eq!(run.session.state(), RunState::ArtifactsImported);

        step_build_texture(&mut run.session, &mut run.engine, &mut run.sink).unwrap();
        assert_eq!(run.status(UnitKind::Texture, "A_1"), UnitStatus::Textured);

        let err = step_save_project(&mut run.session, &mut run.engine, &mut run.sink)
            .unwrap_err();
        assert!(err.to_string().contains("project path not set"));
        assert_eq!(run.engine.count("save_project"), 0);
    }

    #[test]
    fn each_step_visits_all_units_before_the_next() {
        let mut run = Run::new(&[("A_2", 1), ("B_2", 1), ("A_1", 1), ("B_1", 1)]);
        run.stage1();
        run.session.set_project_path(run.dir.path().join("site")).unwrap();
        let report = run_stage2(&mut run.session, &mut run.engine, &mut run.sink).unwrap();
        assert!(report.is_success());
        assert_eq!(report.steps.len(), 7);

        let stage2: Vec<&str> = run
            .engine
            .calls()
            .iter()
            .map(|call| call.operation)
            .skip_while(|op| *op != "build_mesh")
            .collect();
        let mut seen = stage2;
        seen.dedup();
        assert_eq!(
            seen,
            vec![
                "build_mesh",
                "export_cameras",
                "export_model",
                "import_cameras",
                "import_model",
                "build_uv",
                "build_texture",
                "build_uv",
                "build_texture",
                "save_project"
            ]
        );
        assert_eq!(run.session.state(), RunState::Saved);
    }

    #[test]
    fn engine_failure_is_reported_with_unit_path() {
        let mut run = Run::new(&[("A_2", 1), ("A_1", 1), ("B_2", 1), ("B_1", 1)]);
        let bad = run.path("A_1");
        run.engine.fail_on("build_uv", bad.clone());
        run.stage1();
        run.session.set_project_path(run.dir.path().join("site")).unwrap();

        let report = run_stage2(&mut run.session, &mut run.engine, &mut run.sink).unwrap();
        assert!(!report.is_success());
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path, bad);
        assert_eq!(failures[0].operation, BUILD_TEXTURE);
        assert!(failures[0].reason.contains("build_uv failed"));

        assert_eq!(run.status(UnitKind::Texture, "A_1"), UnitStatus::Imported);
        assert_eq!(run.status(UnitKind::Texture, "B_1"), UnitStatus::Saved);
        assert_eq!(run.engine.count("save_project"), 1);
        assert!(
            run.session
                .log
                .iter()
                .any(|entry| entry.operation == BUILD_TEXTURE && !entry.success)
        );
    }

    #[test]
    fn rebuilt_mesh_invalidates_exports() {
        let mut run = Run::new(&[("A_2", 1)]);
        run.stage1();
        step_build_mesh(&mut run.session, &mut run.engine, &mut run.sink).unwrap();
        step_export_cameras(&mut run.session, &mut run.engine, &mut run.sink).unwrap();
        step_build_mesh(&mut run.session, &mut run.engine, &mut run.sink).unwrap();

        let unit = run
            .session
            .registry
            .get(UnitKind::Reconstruction, &run.path("A_2"))
            .unwrap();
        assert_eq!(unit.status, UnitStatus::Meshed);
        assert!(!unit.artifacts.cameras);
        assert_eq!(run.session.state(), RunState::MeshBuilt);
    }

    #[test]
    fn cancelled_prompt_keeps_stage1_work() {
        let mut run = Run::new(&[("A_2", 2)]);
        let root = run.dir.path().to_path_buf();
        let outcome = run_select_folder(
            &mut run.session,
            &mut run.engine,
            &mut run.sink,
            &root,
            || None,
        )
        .unwrap();
        assert_eq!(outcome.save, SaveTarget::Cancelled);
        assert!(run.session.project_path().is_none());
        assert_eq!(run.session.state(), RunState::Stage1Complete);
        assert!(run.sink.events.contains(&PipelineEvent::SaveCancelled));
    }

    #[test]
    fn prompt_answer_is_normalized() {
        let mut run = Run::new(&[("A_2", 2)]);
        let root = run.dir.path().to_path_buf();
        let target = root.join("site");
        let outcome = run_select_folder(
            &mut run.session,
            &mut run.engine,
            &mut run.sink,
            &root,
            || Some(target),
        )
        .unwrap();
        let expected = root.join("site.psz");
        assert_eq!(outcome.save, SaveTarget::Path(expected.clone()));
        assert_eq!(run.session.project_path(), Some(expected.as_path()));
    }

    #[test]
    fn failed_save_keeps_textured_work_and_can_be_retried() {
        let mut run = Run::new(&[("A_2", 1), ("A_1", 1)]);
        run.stage1();
        let project = run.dir.path().join("site.psz");
        run.session.set_project_path(&project).unwrap();
        step_build_mesh(&mut run.session, &mut run.engine, &mut run.sink).unwrap();
        for step in [
            step_export_cameras,
            step_export_model,
            step_import_cameras,
            step_import_model,
            step_build_texture,
        ] {
            step(&mut run.session, &mut run.engine, &mut run.sink).unwrap();
        }

        run.engine.fail_on("save_project", "");
        let err = step_save_project(&mut run.session, &mut run.engine, &mut run.sink)
            .unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains(&project.display().to_string()));
        assert!(message.contains("save_project failed"));
        assert_eq!(run.session.state(), RunState::TextureBuilt);
        assert_eq!(run.status(UnitKind::Texture, "A_1"), UnitStatus::Textured);
        assert!(
            !run.sink
                .events
                .iter()
                .any(|event| matches!(event, PipelineEvent::ProjectSaved { .. }))
        );

        run.engine.clear_failures();
        let report =
            step_save_project(&mut run.session, &mut run.engine, &mut run.sink).unwrap();
        assert_eq!(report.completed, vec![run.path("A_1")]);
        assert_eq!(run.status(UnitKind::Texture, "A_1"), UnitStatus::Saved);
        assert_eq!(run.session.state(), RunState::Saved);
        assert_eq!(run.engine.count("save_project"), 2);
    }

    #[test]
    fn rejected_stage1_is_never_announced() {
        let mut run = Run::new(&[("A_2", 1)]);
        let missing = run.dir.path().join("absent");
        assert!(run_stage1(&mut run.session, &mut run.engine, &mut run.sink, &missing).is_err());
        assert!(run.sink.events.is_empty());

        run.stage1();
        let mut sink = CollectingSink::new();
        let root = run.dir.path().to_path_buf();
        assert!(run_stage1(&mut run.session, &mut run.engine, &mut sink, &root).is_err());
        assert!(
            !sink
                .events
                .iter()
                .any(|event| matches!(event, PipelineEvent::StageEntered { .. }))
        );
    }

    #[test]
    fn paired_unit_behind_a_failed_export_is_a_failure_not_a_skip() {
        let mut run = Run::new(&[("A_2", 1), ("A_1", 1), ("C_1", 1)]);
        let source = run.path("A_2");
        let texture = run.path("A_1");
        run.engine.fail_on("export_cameras", source.clone());
        run.stage1();
        run.session.set_project_path(run.dir.path().join("site")).unwrap();

        let report = run_stage2(&mut run.session, &mut run.engine, &mut run.sink).unwrap();
        let texture_step = report.step(BUILD_TEXTURE).unwrap();
        assert_eq!(texture_step.skipped, vec![run.path("C_1")]);
        assert!(texture_step.failed(&texture));
        let failure = texture_step
            .failures
            .iter()
            .find(|failure| failure.path == texture)
            .unwrap();
        assert!(failure.reason.contains(&source));
        assert!(!run.sink.events.iter().any(|event| matches!(
            event,
            PipelineEvent::PairingSkipped { path, .. } if *path == texture
        )));
    }

    #[test]
    fn partial_import_names_the_missing_artifact() {
        let mut run = Run::new(&[("A_2", 1), ("A_1", 1)]);
        let texture = run.path("A_1");
        run.engine.fail_on("import_model", texture.clone());
        run.stage1();
        run.session.set_project_path(run.dir.path().join("site")).unwrap();

        let report = run_stage2(&mut run.session, &mut run.engine, &mut run.sink).unwrap();
        let failure = report
            .step(BUILD_TEXTURE)
            .unwrap()
            .failures
            .first()
            .unwrap();
        assert_eq!(
            failure.reason,
            format!("build_texture on {texture} needs the model artifact, which is missing")
        );
        assert_eq!(run.engine.count("build_uv"), 0);
    }

    #[test]
    fn step_log_lists_units_by_outcome() {
        let mut run = Run::new(&[("A_2", 1), ("B_2", 1)]);
        let bad = run.path("A_2");
        run.engine.fail_on("build_mesh", bad.clone());
        run.stage1();
        step_build_mesh(&mut run.session, &mut run.engine, &mut run.sink).unwrap();

        let entry = run.session.last_entry(BUILD_MESH).unwrap();
        assert!(!entry.success);
        assert_eq!(entry.completed, vec![run.path("B_2")]);
        assert_eq!(entry.failed, vec![bad]);
        assert!(run.session.last_entry(SCAN).unwrap().success);
    }
}
