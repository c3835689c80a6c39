//! Engine parameters for a reconstruction run.

use anyhow::{Result, ensure};
use photobatch_core::{
    AlignAccuracy, BlendMode, DEFAULT_IMAGE_EXTENSIONS, DenseQuality, Interpolation,
    Preselection, SurfaceType, UvMapping,
};
use serde::{Deserialize, Serialize};

/// Extension appended to project paths that lack it.
pub const DEFAULT_PROJECT_EXTENSION: &str = ".psz";

/// Configuration for both stages of a run.
///
/// Stored in the session so that Stage 2, possibly run by a later process,
/// uses the parameters Stage 1 was started with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    // ─────────────────────────────────────────────────────────────────────────
    // Stage 1
    // ─────────────────────────────────────────────────────────────────────────
    /// Extensions of the photos ingested from each unit folder.
    pub image_extensions: Vec<String>,
    /// Feature matching accuracy.
    pub align_accuracy: AlignAccuracy,
    /// Pair preselection used while matching.
    pub preselection: Preselection,
    /// Dense reconstruction quality.
    pub dense_quality: DenseQuality,

    // ─────────────────────────────────────────────────────────────────────────
    // Stage 2
    // ─────────────────────────────────────────────────────────────────────────
    pub surface: SurfaceType,
    pub interpolation: Interpolation,
    pub uv_mapping: UvMapping,
    pub blend_mode: BlendMode,
    /// Texture atlas edge length in pixels.
    pub atlas_size: u32,
    /// Extension the saved project must carry, including the dot.
    pub project_extension: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            image_extensions: DEFAULT_IMAGE_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            align_accuracy: AlignAccuracy::Medium,
            preselection: Preselection::Generic,
            dense_quality: DenseQuality::Medium,
            surface: SurfaceType::Arbitrary,
            interpolation: Interpolation::Enabled,
            uv_mapping: UvMapping::Generic,
            blend_mode: BlendMode::Mosaic,
            atlas_size: 4096,
            project_extension: DEFAULT_PROJECT_EXTENSION.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.image_extensions.is_empty(),
            "image_extensions must list at least one extension"
        );
        ensure!(
            self.image_extensions
                .iter()
                .all(|ext| !ext.is_empty() && !ext.starts_with('.')),
            "image_extensions must be bare extensions such as \"jpg\""
        );
        ensure!(
            self.atlas_size.is_power_of_two() && (256..=32768).contains(&self.atlas_size),
            "atlas_size must be a power of two in [256, 32768], got {}",
            self.atlas_size
        );
        ensure!(
            self.project_extension.len() > 1 && self.project_extension.starts_with('.'),
            "project_extension must start with '.', got {:?}",
            self.project_extension
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.atlas_size, 4096);
        assert_eq!(config.blend_mode, BlendMode::Mosaic);
        assert_eq!(config.image_extensions, vec!["jpg".to_string()]);
    }

    #[test]
    fn rejects_bad_atlas_size() {
        let config = PipelineConfig {
            atlas_size: 5000,
            ..PipelineConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("atlas_size"));
    }

    #[test]
    fn rejects_bad_extensions() {
        let config = PipelineConfig {
            image_extensions: vec![".jpg".into()],
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());

        let config = PipelineConfig {
            project_extension: "psz".into(),
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "dense_quality": "high", "atlas_size": 8192 }"#).unwrap();
        assert_eq!(config.dense_quality, DenseQuality::High);
        assert_eq!(config.atlas_size, 8192);
        assert_eq!(config.align_accuracy, AlignAccuracy::Medium);
    }
}
