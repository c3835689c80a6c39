use std::path::{Path, PathBuf};

use log::debug;
use walkdir::WalkDir;

/// Extensions ingested when no other list is configured.
pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &["jpg"];

/// List the photos directly inside `dir`, sorted by file name.
///
/// Only regular files whose extension matches one of `extensions`
/// (case-insensitive) are returned; subfolders are not searched.
///
/// # Errors
///
/// Returns an error if `dir` cannot be read.
pub fn list_images<S: AsRef<str>>(dir: &Path, extensions: &[S]) -> std::io::Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| {
                extensions
                    .iter()
                    .any(|wanted| wanted.as_ref().eq_ignore_ascii_case(&ext))
            });
        if matches {
            images.push(entry.into_path());
        } else {
            debug!("skipping non-image file {}", entry.path().display());
        }
    }
    Ok(images)
}
