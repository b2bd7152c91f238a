//! Configuration structures for the signature and overlay pipelines.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{InksealError, Result};

/// Main configuration for inkseal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InksealConfig {
    /// Signature digitization configuration.
    pub signature: SignatureConfig,

    /// Watermark rendering configuration.
    pub watermark: WatermarkConfig,

    /// Output and scratch file configuration.
    pub output: OutputConfig,

    /// Segmentation model configuration.
    pub models: ModelConfig,
}

/// Which background removal implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmenterKind {
    /// Luminance keying against the border-sampled background, no model.
    LumaKey,
    /// U^2-Net salient-object model through ONNX Runtime.
    Onnx,
}

/// Signature pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureConfig {
    /// Crop to the signature bounds by default.
    pub auto_crop: bool,

    /// Apply noise reduction and contrast/sharpness enhancement by default.
    pub enhance: bool,

    /// Padding added around the crop box, as a fraction of the box size.
    pub crop_padding_ratio: f32,

    /// Bilateral filter diameter in pixels.
    pub bilateral_diameter: u32,

    /// Bilateral filter range sigma.
    pub bilateral_sigma_color: f32,

    /// Bilateral filter spatial sigma.
    pub bilateral_sigma_space: f32,

    /// Contrast enhancement factor.
    pub contrast: f32,

    /// Sharpness enhancement factor.
    pub sharpness: f32,

    /// Background removal implementation.
    pub segmenter: SegmenterKind,

    /// Luma-key: darkness below this (0-255) is background.
    pub key_low: u8,

    /// Luma-key: darkness above this (0-255) is fully opaque ink.
    pub key_high: u8,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            auto_crop: true,
            enhance: true,
            crop_padding_ratio: 0.1,
            bilateral_diameter: 9,
            bilateral_sigma_color: 75.0,
            bilateral_sigma_space: 75.0,
            contrast: 1.2,
            sharpness: 1.3,
            segmenter: SegmenterKind::LumaKey,
            key_low: 24,
            key_high: 96,
        }
    }
}

/// Watermark rendering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkConfig {
    /// Font size in pixels when none is given.
    pub default_font_size: f32,

    /// Hex color when none is given.
    pub default_color: String,

    /// Opacity (0.0 - 1.0) when none is given.
    pub default_opacity: f32,

    /// Transparent margin around rendered text, in pixels.
    pub padding: u32,

    /// TrueType font file; system fonts are searched when unset.
    pub font_path: Option<PathBuf>,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            default_font_size: 48.0,
            default_color: "#000000".to_string(),
            default_opacity: 0.5,
            padding: 40,
            font_path: None,
        }
    }
}

/// Output file configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for generated documents; the system temp dir when unset.
    pub scratch_dir: Option<PathBuf>,
}

/// Segmentation model location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory containing model files.
    pub model_dir: PathBuf,

    /// Segmentation model file name.
    pub segmentation_model: String,

    /// Model input resolution (square).
    pub input_size: u32,

    /// Number of CPU threads for inference.
    pub num_threads: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            segmentation_model: "u2netp.onnx".to_string(),
            input_size: 320,
            num_threads: 4,
        }
    }
}

impl InksealConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| InksealError::Config(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| InksealError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| InksealError::Config(e.to_string()))?;
        std::fs::write(path, content)
            .map_err(|e| InksealError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Get full path to the segmentation model file.
    pub fn segmentation_model_path(&self) -> PathBuf {
        self.models.model_dir.join(&self.models.segmentation_model)
    }
}
