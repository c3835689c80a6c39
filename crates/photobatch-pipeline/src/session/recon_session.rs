//! Reconstruction session container with mutable state.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use photobatch_core::{ReconstructionEngine, UnitKind, UnitRegistry};
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::project::normalize_project_path;
use crate::report::StepReport;

use super::state::RunState;
use super::types::{LogEntry, SessionMetadata};

/// State of one reconstruction run.
///
/// The session owns the unit registry for the lifetime of the run and
/// threads the chosen project path from folder selection to the final save.
///
/// # Design Principles
///
/// - **One run per session**: discovery only runs into an empty session; a
///   new run starts from a new session.
/// - **Durable checkpoint**: everything Stage 2 needs is serialized.
/// - **Config travels with the run**: Stage 2 reads the config Stage 1 used
///   unless it is explicitly replaced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconstructionSession {
    /// Workflow, schema version, writer and timestamps.
    pub metadata: SessionMetadata,

    /// Engine parameters (defaults if not explicitly set).
    pub config: PipelineConfig,

    /// Folder scanned by Stage 1. `None` until discovery starts.
    root: Option<PathBuf>,

    state: RunState,

    /// Normalized project file path. `None` until chosen.
    project_path: Option<PathBuf>,

    /// Every unit created during the run.
    pub registry: UnitRegistry,

    /// One entry per step run against the session.
    pub log: Vec<LogEntry>,
}

impl ReconstructionSession {
    // ─────────────────────────────────────────────────────────────────────────
    // Construction
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a new empty session with default configuration.
    pub fn new() -> Self {
        Self {
            metadata: SessionMetadata::current(),
            config: PipelineConfig::default(),
            root: None,
            state: RunState::New,
            project_path: None,
            registry: UnitRegistry::new(),
            log: Vec::new(),
        }
    }

    /// Create a new session with a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if [`PipelineConfig::validate`] fails.
    pub fn with_config(config: PipelineConfig) -> Result<Self> {
        let mut session = Self::new();
        session.set_config(config)?;
        Ok(session)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Configuration Management
    // ─────────────────────────────────────────────────────────────────────────

    /// Set configuration after validating it.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails; the old config is kept.
    pub fn set_config(&mut self, config: PipelineConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        self.metadata.touch();
        Ok(())
    }

    /// Update configuration with a closure, then validate it.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails after the update.
    pub fn update_config<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut PipelineConfig),
    {
        let mut new_config = self.config.clone();
        f(&mut new_config);
        self.set_config(new_config)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Run State
    // ─────────────────────────────────────────────────────────────────────────

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub(crate) fn begin_scan(&mut self, root: &Path) {
        self.root = Some(root.to_path_buf());
        self.state = RunState::Scanning;
        self.metadata.touch();
    }

    pub(crate) fn set_state(&mut self, state: RunState) {
        self.state = state;
        self.metadata.touch();
    }

    /// Fail unless the run has reached at least `minimum`.
    ///
    /// # Errors
    ///
    /// Returns an error naming `operation` and both states.
    pub fn require_state(&self, minimum: RunState, operation: &str) -> Result<()> {
        if self.state < minimum {
            bail!(
                "{operation} requires the run to reach {minimum}, but it is at {}",
                self.state
            );
        }
        Ok(())
    }

    /// True when no unit has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Project Path
    // ─────────────────────────────────────────────────────────────────────────

    /// Store the project path, appending the configured extension if missing.
    ///
    /// A relative path is resolved against the current directory now, not
    /// when the project is finally saved.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is empty or cannot be resolved.
    pub fn set_project_path(&mut self, path: impl AsRef<Path>) -> Result<&Path> {
        let normalized = normalize_project_path(path.as_ref(), &self.config.project_extension)?;
        let normalized = std::path::absolute(&normalized)
            .with_context(|| format!("cannot resolve project path {}", normalized.display()))?;
        self.metadata.touch();
        Ok(self.project_path.insert(normalized).as_path())
    }

    pub fn project_path(&self) -> Option<&Path> {
        self.project_path.as_deref()
    }

    /// Get the project path, or error if none was chosen.
    ///
    /// # Errors
    ///
    /// Returns an error if the project path is not set.
    pub fn require_project_path(&self) -> Result<&Path> {
        self.project_path
            .as_deref()
            .ok_or_else(|| anyhow!("project path not set; choose one before saving"))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Engine Handles
    // ─────────────────────────────────────────────────────────────────────────

    /// Hand every registered unit back to `engine` after a process restart.
    ///
    /// # Errors
    ///
    /// Returns the first engine error, naming the unit path.
    pub fn reattach(&self, engine: &mut dyn ReconstructionEngine) -> Result<()> {
        for kind in [UnitKind::Reconstruction, UnitKind::Texture] {
            for (path, unit) in self.registry.iter(kind) {
                engine
                    .reattach_unit(&unit.handle, unit.label())
                    .with_context(|| format!("failed to reattach {kind} unit {path}"))?;
            }
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Audit Trail
    // ─────────────────────────────────────────────────────────────────────────

    pub(crate) fn record_step(&mut self, report: &StepReport) {
        self.log.push(LogEntry::from_report(report));
        self.metadata.touch();
    }

    pub(crate) fn record_decision(
        &mut self,
        operation: impl Into<String>,
        detail: impl Into<String>,
    ) {
        self.log.push(LogEntry::decision(operation, detail));
        self.metadata.touch();
    }

    /// Latest log entry for `operation`.
    pub fn last_entry(&self, operation: &str) -> Option<&LogEntry> {
        self.log.iter().rev().find(|entry| entry.operation == operation)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Serialization
    // ─────────────────────────────────────────────────────────────────────────

    /// Serialize session to JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Into::into)
    }

    /// Deserialize session from JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Deserialization fails
    /// - The session belongs to another workflow
    /// - Schema version is newer than supported
    pub fn from_json(json: &str) -> Result<Self> {
        let session: Self = serde_json::from_str(json)?;
        session.metadata.check_compatible()?;
        session.config.validate()?;

        Ok(session)
    }

    /// Write the session as pretty JSON to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        fs::write(path, json)
            .with_context(|| format!("failed to write session file {}", path.display()))
    }

    /// Read a session written by [`save_to_file`](Self::save_to_file).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read session file {}", path.display()))?;
        Self::from_json(&json)
            .with_context(|| format!("invalid session file {}", path.display()))
    }
}

impl Default for ReconstructionSession {
    fn default() -> Self {
        Self::new()
    }
}
