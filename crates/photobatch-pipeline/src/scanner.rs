//! Directory discovery and Stage-1 processing.
//!
//! Only immediate children of the root are considered. Each classified child
//! becomes an engine unit, is registered under its path and is processed to
//! its Stage-1 terminal status before the next child is looked at.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail, ensure};
use log::{debug, warn};
use photobatch_core::{
    Classification, ProcessingUnit, ReconstructionEngine, UnitKind, UnitStatus, classify,
    unit_path,
};
use walkdir::WalkDir;

use crate::config::PipelineConfig;
use crate::events::{EventSink, PipelineEvent, advance};
use crate::report::{StepReport, UnitError};
use crate::session::{ReconstructionSession, RunState};

/// Operation name used in reports and events for discovery + Stage 1.
pub const SCAN: &str = "stage1";

/// Classified immediate child folders of `root`, sorted by name.
///
/// Unrelated folders and plain files are skipped without error.
///
/// # Errors
///
/// Returns an error if `root` is not a readable directory.
pub fn discover_children(root: &Path) -> Result<Vec<(String, UnitKind)>> {
    ensure!(root.is_dir(), "{} is not a directory", root.display());

    let mut found = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("failed to read {}", root.display()))?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            warn!("skipping folder with non UTF-8 name {}", entry.path().display());
            continue;
        };
        match classify(name) {
            Classification::Unit(kind) => found.push((name.to_string(), kind)),
            Classification::Unrelated => debug!("skipping unrelated folder {name}"),
        }
    }
    Ok(found)
}

/// A validated scan: the resolved root and the children to process.
#[derive(Debug)]
pub(crate) struct ScanPlan {
    root: PathBuf,
    children: Vec<(String, UnitKind)>,
}

/// Check that `session` can take a new run and list what `root` holds.
///
/// A relative `root` is resolved against the current directory here, so
/// every stored unit path stays valid for a later process started elsewhere.
pub(crate) fn plan_scan(session: &ReconstructionSession, root: &Path) -> Result<ScanPlan> {
    if session.state() != RunState::New || !session.is_empty() {
        bail!(
            "session already holds a run at state {}; start a new session to scan {}",
            session.state(),
            root.display()
        );
    }
    let root = std::path::absolute(root)
        .with_context(|| format!("cannot resolve scan root {}", root.display()))?;
    let children = discover_children(&root)?;
    Ok(ScanPlan { root, children })
}

/// Discover units under `root`, register them and run Stage 1 on each.
///
/// Reconstruction units are loaded, aligned and densely reconstructed;
/// texture units are only loaded. A unit whose engine call fails stays at
/// its last status and is listed in the report; its siblings still run.
///
/// # Errors
///
/// Fails without touching the session if it already holds a run or `root`
/// cannot be listed, and fails fatally on a duplicate unit path.
pub fn scan(
    session: &mut ReconstructionSession,
    engine: &mut dyn ReconstructionEngine,
    sink: &mut dyn EventSink,
    root: &Path,
) -> Result<StepReport> {
    let plan = plan_scan(session, root)?;
    run_scan(session, engine, sink, plan)
}

pub(crate) fn run_scan(
    session: &mut ReconstructionSession,
    engine: &mut dyn ReconstructionEngine,
    sink: &mut dyn EventSink,
    plan: ScanPlan,
) -> Result<StepReport> {
    let ScanPlan { root, children } = plan;
    session.begin_scan(&root);
    sink.emit(PipelineEvent::RunStateChanged {
        state: RunState::Scanning,
    });

    let mut report = StepReport::new(SCAN);
    for (name, kind) in children {
        let path = unit_path(&root, &name);
        sink.emit(PipelineEvent::UnitAdvanced {
            path: path.clone(),
            kind,
            status: UnitStatus::Discovered,
        });

        let handle = match engine.create_unit(&path) {
            Ok(handle) => handle,
            Err(err) => {
                report.record_failure(sink, &path, SCAN, &UnitError::from(err));
                continue;
            }
        };
        let unit = session
            .registry
            .insert(ProcessingUnit::new(path.clone(), kind, handle))
            .with_context(|| format!("cannot register {kind} unit {path}"))?;
        sink.emit(PipelineEvent::UnitAdvanced {
            path: path.clone(),
            kind,
            status: UnitStatus::Created,
        });

        let outcome = match kind {
            UnitKind::Reconstruction => reconstruct_unit(unit, &session.config, engine, sink),
            UnitKind::Texture => load_unit(unit, engine, sink),
        };
        match outcome {
            Ok(()) => report.completed.push(path),
            Err(err) => report.record_failure(sink, &path, SCAN, &err),
        }
    }
    Ok(report)
}

/// Ingest the unit folder's photos.
pub(crate) fn load_unit(
    unit: &mut ProcessingUnit,
    engine: &mut dyn ReconstructionEngine,
    sink: &mut dyn EventSink,
) -> Result<(), UnitError> {
    unit.require_status("load_images", &[UnitStatus::Created])?;
    let count = engine.load_images(&unit.handle, Path::new(&unit.path))?;
    unit.image_count = count;
    sink.emit(PipelineEvent::ImagesLoaded {
        path: unit.path.clone(),
        count,
    });
    if count == 0 {
        warn!("no photos found in {}", unit.path);
    }
    advance(unit, UnitStatus::Loaded, sink);
    Ok(())
}

/// Load, align and densely reconstruct a reconstruction unit.
pub(crate) fn reconstruct_unit(
    unit: &mut ProcessingUnit,
    config: &PipelineConfig,
    engine: &mut dyn ReconstructionEngine,
    sink: &mut dyn EventSink,
) -> Result<(), UnitError> {
    load_unit(unit, engine, sink)?;

    engine.align(&unit.handle, config.align_accuracy, config.preselection)?;
    advance(unit, UnitStatus::Aligned, sink);

    engine.build_dense_reconstruction(&unit.handle, config.dense_quality)?;
    advance(unit, UnitStatus::Reconstructed, sink);
    Ok(())
}
