//! A [`ReconstructionEngine`] that records calls instead of reconstructing.
//!
//! Photos are counted from the real folder, export calls write small
//! placeholder artifacts and import calls require those files to exist, so
//! tests can assert on the files the pipeline hands between units.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::{
    AlignAccuracy, BlendMode, DenseQuality, EngineError, Interpolation, Preselection,
    ReconstructionEngine, SurfaceType, UvMapping,
};
use crate::images::{DEFAULT_IMAGE_EXTENSIONS, list_images};
use crate::unit::UnitHandle;

/// A single recorded engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCall {
    /// Capability name, e.g. `"build_mesh"`.
    pub operation: &'static str,
    /// Label of the addressed unit (`None` for project-level calls).
    pub label: Option<String>,
    /// File or folder argument, if any.
    pub path: Option<PathBuf>,
}

/// Recording test double for [`ReconstructionEngine`].
#[derive(Debug, Default)]
pub struct RecordingEngine {
    labels: HashMap<UnitHandle, String>,
    calls: Vec<EngineCall>,
    image_extensions: Vec<String>,
    failures: Vec<(&'static str, String)>,
    next_id: usize,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::with_extensions(DEFAULT_IMAGE_EXTENSIONS)
    }

    pub fn with_extensions<S: AsRef<str>>(extensions: &[S]) -> Self {
        Self {
            image_extensions: extensions.iter().map(|e| e.as_ref().to_string()).collect(),
            ..Self::default()
        }
    }

    /// Make `operation` fail whenever it targets the unit labelled `label`.
    pub fn fail_on(&mut self, operation: &'static str, label: impl Into<String>) {
        self.failures.push((operation, label.into()));
    }

    /// Drop every failure injected with [`fail_on`](Self::fail_on).
    pub fn clear_failures(&mut self) {
        self.failures.clear();
    }

    pub fn calls(&self) -> &[EngineCall] {
        &self.calls
    }

    /// Number of recorded calls of `operation`.
    pub fn count(&self, operation: &str) -> usize {
        self.calls
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    /// Operations issued against the unit labelled `label`, in call order.
    pub fn operations_for(&self, label: &str) -> Vec<&'static str> {
        self.calls
            .iter()
            .filter(|call| call.label.as_deref() == Some(label))
            .map(|call| call.operation)
            .collect()
    }

    fn record(
        &mut self,
        operation: &'static str,
        unit: Option<&UnitHandle>,
        path: Option<&Path>,
    ) -> Result<String, EngineError> {
        let label = match unit {
            Some(handle) => Some(
                self.labels
                    .get(handle)
                    .cloned()
                    .ok_or_else(|| EngineError::UnknownHandle(handle.clone()))?,
            ),
            None => None,
        };
        self.calls.push(EngineCall {
            operation,
            label: label.clone(),
            path: path.map(Path::to_path_buf),
        });
        let label = label.unwrap_or_default();
        let injected = self
            .failures
            .iter()
            .any(|(op, target)| *op == operation && *target == label);
        if injected {
            return Err(EngineError::CallFailed {
                operation,
                message: format!("injected failure for {label}"),
            });
        }
        Ok(label)
    }

    fn write_artifact(
        &mut self,
        operation: &'static str,
        unit: &UnitHandle,
        path: &Path,
        body: &str,
    ) -> Result<(), EngineError> {
        let label = self.record(operation, Some(unit), Some(path))?;
        fs::write(path, format!("{body} {label}\n"))?;
        Ok(())
    }

    fn read_artifact(
        &mut self,
        operation: &'static str,
        unit: &UnitHandle,
        path: &Path,
    ) -> Result<(), EngineError> {
        self.record(operation, Some(unit), Some(path))?;
        if !path.is_file() {
            return Err(EngineError::CallFailed {
                operation,
                message: format!("artifact {} not found", path.display()),
            });
        }
        Ok(())
    }
}

impl ReconstructionEngine for RecordingEngine {
    fn create_unit(&mut self, label: &str) -> Result<UnitHandle, EngineError> {
        let mut handle = UnitHandle::new(format!("unit-{}", self.next_id));
        while self.labels.contains_key(&handle) {
            self.next_id += 1;
            handle = UnitHandle::new(format!("unit-{}", self.next_id));
        }
        self.next_id += 1;
        self.labels.insert(handle.clone(), label.to_string());
        self.record("create_unit", Some(&handle), None)?;
        Ok(handle)
    }

    fn load_images(&mut self, unit: &UnitHandle, dir: &Path) -> Result<usize, EngineError> {
        self.record("load_images", Some(unit), Some(dir))?;
        Ok(list_images(dir, self.image_extensions.as_slice())?.len())
    }

    fn align(
        &mut self,
        unit: &UnitHandle,
        _accuracy: AlignAccuracy,
        _preselection: Preselection,
    ) -> Result<(), EngineError> {
        self.record("align", Some(unit), None).map(drop)
    }

    fn build_dense_reconstruction(
        &mut self,
        unit: &UnitHandle,
        _quality: DenseQuality,
    ) -> Result<(), EngineError> {
        self.record("build_dense_reconstruction", Some(unit), None)
            .map(drop)
    }

    fn build_mesh(
        &mut self,
        unit: &UnitHandle,
        _surface: SurfaceType,
        _interpolation: Interpolation,
    ) -> Result<(), EngineError> {
        self.record("build_mesh", Some(unit), None).map(drop)
    }

    fn export_cameras(&mut self, unit: &UnitHandle, path: &Path) -> Result<(), EngineError> {
        self.write_artifact("export_cameras", unit, path, "<!-- cameras of")
    }

    fn export_model(&mut self, unit: &UnitHandle, path: &Path) -> Result<(), EngineError> {
        self.write_artifact("export_model", unit, path, "# model of")
    }

    fn import_cameras(&mut self, unit: &UnitHandle, path: &Path) -> Result<(), EngineError> {
        self.read_artifact("import_cameras", unit, path)
    }

    fn import_model(&mut self, unit: &UnitHandle, path: &Path) -> Result<(), EngineError> {
        self.read_artifact("import_model", unit, path)
    }

    fn build_uv(&mut self, unit: &UnitHandle, _mapping: UvMapping) -> Result<(), EngineError> {
        self.record("build_uv", Some(unit), None).map(drop)
    }

    fn build_texture(
        &mut self,
        unit: &UnitHandle,
        _blend: BlendMode,
        _atlas_size: u32,
    ) -> Result<(), EngineError> {
        self.record("build_texture", Some(unit), None).map(drop)
    }

    fn save_project(&mut self, path: &Path) -> Result<(), EngineError> {
        self.record("save_project", None, Some(path)).map(drop)
    }

    fn reattach_unit(&mut self, unit: &UnitHandle, label: &str) -> Result<(), EngineError> {
        self.labels.insert(unit.clone(), label.to_string());
        Ok(())
    }
}

/// Create `root/<name>` holding `images` empty `.jpg` files.
///
/// # Panics
///
/// Panics if the folder or files cannot be created; meant for tests only.
pub fn make_photo_folder(root: &Path, name: &str, images: usize) -> PathBuf {
    let dir = root.join(name);
    fs::create_dir_all(&dir).expect("create photo folder");
    for idx in 0..images {
        fs::write(dir.join(format!("IMG_{idx:04}.jpg")), b"").expect("write photo");
    }
    dir
}
