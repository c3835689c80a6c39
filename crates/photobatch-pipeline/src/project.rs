//! Project file path handling.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Result, ensure};

/// Append `extension` unless `path` already ends with it (ASCII case-insensitive).
///
/// # Errors
///
/// Returns an error if `path` is empty.
pub fn normalize_project_path(path: &Path, extension: &str) -> Result<PathBuf> {
    ensure!(!path.as_os_str().is_empty(), "project path is empty");
    let text = path.to_string_lossy();
    let has_extension = text.len() >= extension.len()
        && text.is_char_boundary(text.len() - extension.len())
        && text[text.len() - extension.len()..].eq_ignore_ascii_case(extension);
    if has_extension {
        return Ok(path.to_path_buf());
    }
    let mut raw = OsString::from(path.as_os_str());
    raw.push(extension);
    Ok(PathBuf::from(raw))
}

/// Outcome of asking the operator where to save the project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveTarget {
    /// Normalized project path.
    Path(PathBuf),
    /// The operator declined; nothing is saved and processed work is kept.
    Cancelled,
}

impl SaveTarget {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Path(path) => Some(path),
            Self::Cancelled => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_missing_extension() {
        let path = normalize_project_path(Path::new("/out/site"), ".psz").unwrap();
        assert_eq!(path, PathBuf::from("/out/site.psz"));

        let path = normalize_project_path(Path::new("/out/site.zip"), ".psz").unwrap();
        assert_eq!(path, PathBuf::from("/out/site.zip.psz"));
    }

    #[test]
    fn keeps_existing_extension_case_insensitive() {
        for raw in ["/out/site.psz", "/out/site.PSZ", "/out/site.Psz"] {
            let path = normalize_project_path(Path::new(raw), ".psz").unwrap();
            assert_eq!(path, PathBuf::from(raw));
        }
    }

    #[test]
    fn short_paths_get_extension() {
        let path = normalize_project_path(Path::new("a"), ".psz").unwrap();
        assert_eq!(path, PathBuf::from("a.psz"));
    }

    #[test]
    fn rejects_empty_path() {
        assert!(normalize_project_path(Path::new(""), ".psz").is_err());
    }

    #[test]
    fn save_target_path() {
        assert!(SaveTarget::Cancelled.path().is_none());
        let target = SaveTarget::Path(PathBuf::from("x.psz"));
        assert_eq!(target.path(), Some(Path::new("x.psz")));
    }
}
