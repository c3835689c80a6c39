use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Folder name suffix marking a reconstruction (projection) photo set.
pub const RECONSTRUCTION_SUFFIX: &str = "_2";
/// Folder name suffix marking a texture photo set.
pub const TEXTURE_SUFFIX: &str = "_1";

/// Role of a processing unit in the two-stage workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// Photo set aligned, densified and meshed.
    Reconstruction,
    /// Photo set that receives the exported cameras and model and is textured.
    Texture,
}

impl UnitKind {
    /// The folder name suffix identifying this kind.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Reconstruction => RECONSTRUCTION_SUFFIX,
            Self::Texture => TEXTURE_SUFFIX,
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reconstruction => f.write_str("reconstruction"),
            Self::Texture => f.write_str("texture"),
        }
    }
}

/// Result of classifying a directory name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Unit(UnitKind),
    Unrelated,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path {path:?} is shorter than the {suffix:?} suffix")]
    TooShort { path: String, suffix: &'static str },
    #[error("path {path:?} does not end with the {suffix:?} suffix")]
    MissingSuffix { path: String, suffix: &'static str },
}

/// Classify a directory name by its suffix.
///
/// The comparison is exact and case-sensitive on the last two characters;
/// a suffix appearing anywhere else in the name does not count.
pub fn classify(name: &str) -> Classification {
    if name.ends_with(RECONSTRUCTION_SUFFIX) {
        Classification::Unit(UnitKind::Reconstruction)
    } else if name.ends_with(TEXTURE_SUFFIX) {
        Classification::Unit(UnitKind::Texture)
    } else {
        Classification::Unrelated
    }
}

/// Derive the texture unit path paired with a reconstruction unit path.
///
/// The reconstruction suffix is replaced by the texture suffix; everything
/// else, including one trailing path separator, is kept verbatim.
///
/// # Errors
///
/// Returns [`PathError::TooShort`] when the path (without its trailing
/// separator) is shorter than the suffix, and [`PathError::MissingSuffix`]
/// when it does not end with the reconstruction suffix.
pub fn counterpart(reconstruction_path: &str) -> Result<String, PathError> {
    swap_suffix(reconstruction_path, RECONSTRUCTION_SUFFIX, TEXTURE_SUFFIX)
}

/// Inverse of [`counterpart`]: the reconstruction unit path that feeds a
/// texture unit.
///
/// # Errors
///
/// As [`counterpart`], with the texture suffix expected.
pub fn source_counterpart(texture_path: &str) -> Result<String, PathError> {
    swap_suffix(texture_path, TEXTURE_SUFFIX, RECONSTRUCTION_SUFFIX)
}

fn swap_suffix(path: &str, from: &'static str, to: &str) -> Result<String, PathError> {
    let (body, separator) = split_trailing_separator(path);
    if body.len() < from.len() {
        return Err(PathError::TooShort {
            path: path.to_string(),
            suffix: from,
        });
    }
    let stem = body
        .strip_suffix(from)
        .ok_or_else(|| PathError::MissingSuffix {
            path: path.to_string(),
            suffix: from,
        })?;
    Ok(format!("{stem}{to}{separator}"))
}

/// Build the registry key for a child folder of `root`.
///
/// Keys always end with the platform separator so that artifact file names
/// can be appended directly.
pub fn unit_path(root: &Path, name: &str) -> String {
    let mut key = root.join(name).to_string_lossy().into_owned();
    if !key.ends_with(std::path::MAIN_SEPARATOR) {
        key.push(std::path::MAIN_SEPARATOR);
    }
    key
}

fn split_trailing_separator(path: &str) -> (&str, &str) {
    match path.char_indices().next_back() {
        Some((idx, '/' | '\\')) => path.split_at(idx),
        _ => (path, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_by_suffix() {
        assert_eq!(
            classify("Site_2"),
            Classification::Unit(UnitKind::Reconstruction)
        );
        assert_eq!(classify("Site_1"), Classification::Unit(UnitKind::Texture));
        assert_eq!(classify("Site_3"), Classification::Unrelated);
        assert_eq!(classify("Site"), Classification::Unrelated);
        assert_eq!(classify(""), Classification::Unrelated);
    }

    #[test]
    fn classify_ignores_embedded_suffix() {
        assert_eq!(classify("Site_2_backup"), Classification::Unrelated);
        assert_eq!(classify("A_1B"), Classification::Unrelated);
    }

    #[test]
    fn counterpart_keeps_trailing_separator() {
        assert_eq!(counterpart("/data/Site_2/").unwrap(), "/data/Site_1/");
        assert_eq!(counterpart("C:\\data\\Site_2\\").unwrap(), "C:\\data\\Site_1\\");
        assert_eq!(counterpart("/data/Site_2").unwrap(), "/data/Site_1");
    }

    #[test]
    fn counterpart_result_classifies_as_texture() {
        for path in ["A_2", "/x/y/A_2/", "long name with spaces_2/", "_2"] {
            let texture = counterpart(path).unwrap();
            let name = texture.trim_end_matches(['/', '\\']);
            assert_eq!(classify(name), Classification::Unit(UnitKind::Texture));
        }
    }

    #[test]
    fn counterpart_is_deterministic() {
        let a = counterpart("/data/Block_2/").unwrap();
        let b = counterpart("/data/Block_2/").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn counterpart_rejects_short_paths() {
        assert!(matches!(counterpart("2"), Err(PathError::TooShort { .. })));
        assert!(matches!(counterpart("/"), Err(PathError::TooShort { .. })));
        assert!(matches!(counterpart(""), Err(PathError::TooShort { .. })));
    }

    #[test]
    fn counterpart_rejects_missing_suffix() {
        assert!(matches!(
            counterpart("/data/Site_1/"),
            Err(PathError::MissingSuffix { .. })
        ));
        assert!(matches!(
            counterpart("/data/Site_2x/"),
            Err(PathError::MissingSuffix { .. })
        ));
    }

    #[test]
    fn unit_path_appends_separator() {
        let key = unit_path(Path::new("data"), "Site_2");
        assert!(key.ends_with(std::path::MAIN_SEPARATOR));
        assert!(key.contains("Site_2"));
        assert_eq!(
            counterpart(&key).unwrap(),
            unit_path(Path::new("data"), "Site_1")
        );
    }

    #[test]
    fn source_counterpart_inverts_counterpart() {
        let texture = counterpart("/data/Site_2/").unwrap();
        assert_eq!(source_counterpart(&texture).unwrap(), "/data/Site_2/");
        assert!(matches!(
            source_counterpart("/data/Site_2/"),
            Err(PathError::MissingSuffix { suffix: "_1", .. })
        ));
        assert!(matches!(source_counterpart("1"), Err(PathError::TooShort { .. })));
    }
}
