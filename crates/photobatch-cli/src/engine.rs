//! Engine adapter that runs an external executable per capability call.
//!
//! Each call spawns `<program> [args..] <operation> ...` and waits for it.
//! `create-unit --label <label>` prints the new handle. `load-images` is sent
//! the folder plus one `--image <file>` per photo matching the configured
//! extensions, and prints the number of photos it ingested. Every other call
//! is addressed with `--unit <handle>` and produces no output of interest. A
//! non-zero exit is reported with the program's stderr and never retried.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, warn};
use photobatch_core::{
    AlignAccuracy, BlendMode, DEFAULT_IMAGE_EXTENSIONS, DenseQuality, EngineError,
    Interpolation, Preselection, ReconstructionEngine, SurfaceType, UnitHandle, UvMapping,
    list_images,
};

#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: PathBuf,
    args: Vec<OsString>,
    image_extensions: Vec<String>,
}

impl CommandEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            image_extensions: DEFAULT_IMAGE_EXTENSIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }

    /// Photo extensions handed to `load-images`, matched case-insensitively.
    pub fn with_extensions<S: AsRef<str>>(mut self, extensions: &[S]) -> Self {
        self.image_extensions = extensions.iter().map(|e| e.as_ref().to_string()).collect();
        self
    }

    /// Arguments placed before the operation name on every call.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    fn call(&self, operation: &'static str, args: Vec<OsString>) -> Result<String, EngineError> {
        let subcommand = operation.replace('_', "-");
        debug!("{} {subcommand} {args:?}", self.program.display());

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&subcommand)
            .args(&args)
            .output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("engine exited with {}", output.status)
            } else {
                stderr
            };
            return Err(EngineError::CallFailed { operation, message });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn unit_call(
        &self,
        operation: &'static str,
        unit: &UnitHandle,
        options: &[(&str, &str)],
    ) -> Result<String, EngineError> {
        let mut args: Vec<OsString> = vec!["--unit".into(), unit.as_str().into()];
        for (flag, value) in options {
            args.push(format!("--{flag}").into());
            args.push((*value).into());
        }
        self.call(operation, args)
    }

    fn path_call(
        &self,
        operation: &'static str,
        unit: &UnitHandle,
        path: &Path,
    ) -> Result<(), EngineError> {
        let args = vec![
            "--unit".into(),
            unit.as_str().into(),
            "--path".into(),
            path.as_os_str().to_owned(),
        ];
        self.call(operation, args).map(drop)
    }
}

/// Last non-empty line of `stdout`.
fn last_line(stdout: &str) -> Option<&str> {
    stdout.lines().map(str::trim).rfind(|line| !line.is_empty())
}

impl ReconstructionEngine for CommandEngine {
    fn create_unit(&mut self, label: &str) -> Result<UnitHandle, EngineError> {
        let stdout = self.call("create_unit", vec!["--label".into(), label.into()])?;
        last_line(&stdout)
            .map(UnitHandle::new)
            .ok_or_else(|| EngineError::CallFailed {
                operation: "create_unit",
                message: format!("no handle printed for {label}"),
            })
    }

    fn load_images(&mut self, unit: &UnitHandle, dir: &Path) -> Result<usize, EngineError> {
        let photos = list_images(dir, self.image_extensions.as_slice())?;
        if photos.is_empty() {
            warn!(
                "no files matching {:?} in {}",
                self.image_extensions,
                dir.display()
            );
        }
        let mut args: Vec<OsString> = vec![
            "--unit".into(),
            unit.as_str().into(),
            "--path".into(),
            dir.as_os_str().to_owned(),
        ];
        for photo in photos {
            args.push("--image".into());
            args.push(photo.into_os_string());
        }
        let stdout = self.call("load_images", args)?;
        let line = last_line(&stdout).unwrap_or_default();
        line.parse().map_err(|_| EngineError::CallFailed {
            operation: "load_images",
            message: format!("expected an image count, got {line:?}"),
        })
    }

    fn align(
        &mut self,
        unit: &UnitHandle,
        accuracy: AlignAccuracy,
        preselection: Preselection,
    ) -> Result<(), EngineError> {
        self.unit_call(
            "align",
            unit,
            &[
                ("accuracy", accuracy.as_str()),
                ("preselection", preselection.as_str()),
            ],
        )
        .map(drop)
    }

    fn build_dense_reconstruction(
        &mut self,
        unit: &UnitHandle,
        quality: DenseQuality,
    ) -> Result<(), EngineError> {
        self.unit_call(
            "build_dense_reconstruction",
            unit,
            &[("quality", quality.as_str())],
        )
        .map(drop)
    }

    fn build_mesh(
        &mut self,
        unit: &UnitHandle,
        surface: SurfaceType,
        interpolation: Interpolation,
    ) -> Result<(), EngineError> {
        self.unit_call(
            "build_mesh",
            unit,
            &[
                ("surface", surface.as_str()),
                ("interpolation", interpolation.as_str()),
            ],
        )
        .map(drop)
    }

    fn export_cameras(&mut self, unit: &UnitHandle, path: &Path) -> Result<(), EngineError> {
        self.path_call("export_cameras", unit, path)
    }

    fn export_model(&mut self, unit: &UnitHandle, path: &Path) -> Result<(), EngineError> {
        self.path_call("export_model", unit, path)
    }

    fn import_cameras(&mut self, unit: &UnitHandle, path: &Path) -> Result<(), EngineError> {
        self.path_call("import_cameras", unit, path)
    }

    fn import_model(&mut self, unit: &UnitHandle, path: &Path) -> Result<(), EngineError> {
        self.path_call("import_model", unit, path)
    }

    fn build_uv(&mut self, unit: &UnitHandle, mapping: UvMapping) -> Result<(), EngineError> {
        self.unit_call("build_uv", unit, &[("mapping", mapping.as_str())])
            .map(drop)
    }

    fn build_texture(
        &mut self,
        unit: &UnitHandle,
        blend: BlendMode,
        atlas_size: u32,
    ) -> Result<(), EngineError> {
        let size = atlas_size.to_string();
        self.unit_call(
            "build_texture",
            unit,
            &[("blend", blend.as_str()), ("atlas-size", size.as_str())],
        )
        .map(drop)
    }

    fn save_project(&mut self, path: &Path) -> Result<(), EngineError> {
        self.call(
            "save_project",
            vec!["--path".into(), path.as_os_str().to_owned()],
        )
        .map(drop)
    }
}
