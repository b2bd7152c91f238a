//! Signature digitization pipeline.

use std::path::Path;

use image::{DynamicImage, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::crop::auto_crop;
use super::filters;
use super::segmenter::{ForegroundSegmenter, LumaKeySegmenter};
use crate::codec;
use crate::error::{InksealError, Operation, Result};
use crate::models::SignatureConfig;
use crate::scratch::write_atomic;

const OP: Operation = Operation::ProcessSignature;

/// Per-call switches; defaults come from [`SignatureConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureOptions {
    pub auto_crop: bool,
    pub enhance: bool,
}

impl Default for SignatureOptions {
    fn default() -> Self {
        Self {
            auto_crop: true,
            enhance: true,
        }
    }
}

impl From<&SignatureConfig> for SignatureOptions {
    fn from(config: &SignatureConfig) -> Self {
        Self {
            auto_crop: config.auto_crop,
            enhance: config.enhance,
        }
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn of(image: &RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }
}

/// Encoded renditions of the processed signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureFormats {
    /// Transparent PNG data URL.
    pub png: String,
    /// JPEG data URL flattened onto white.
    pub jpg: String,
}

/// Result of [`SignaturePipeline::process_image`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedSignature {
    pub original_size: Size,
    pub processed_size: Size,
    pub formats: SignatureFormats,
    pub preview: String,
    /// Final RGBA asset; `formats.png` decodes to exactly these pixels.
    #[serde(skip)]
    pub image: RgbaImage,
}

/// Turns a photographed or scanned signature into a transparent asset.
pub struct SignaturePipeline {
    segmenter: Box<dyn ForegroundSegmenter>,
    config: SignatureConfig,
}

impl SignaturePipeline {
    /// Pipeline with default settings and the given segmenter.
    pub fn new(segmenter: Box<dyn ForegroundSegmenter>) -> Self {
        Self::with_config(segmenter, SignatureConfig::default())
    }

    pub fn with_config(segmenter: Box<dyn ForegroundSegmenter>, config: SignatureConfig) -> Self {
        Self { segmenter, config }
    }

    /// Pipeline with the luminance keyer configured from `config`.
    pub fn luma_key(config: SignatureConfig) -> Self {
        let segmenter = LumaKeySegmenter::new(config.key_low, config.key_high);
        Self::with_config(Box::new(segmenter), config)
    }

    pub fn config(&self) -> &SignatureConfig {
        &self.config
    }

    /// Name of the active background remover.
    pub fn segmenter_name(&self) -> &str {
        self.segmenter.name()
    }

    /// Load and process an image file.
    pub fn process_path(&self, path: &Path, options: SignatureOptions) -> Result<ProcessedSignature> {
        if !path.exists() {
            return Err(InksealError::NotFound {
                operation: OP,
                path: path.to_path_buf(),
            });
        }
        let bytes = std::fs::read(path).map_err(|e| InksealError::io(OP, e))?;
        self.process_bytes(&bytes, options)
    }

    /// Process an encoded image (PNG, JPEG, ...).
    pub fn process_bytes(&self, bytes: &[u8], options: SignatureOptions) -> Result<ProcessedSignature> {
        let image = codec::decode_image_bytes(bytes, OP)?;
        self.process_image(image, options)
    }

    /// Run every stage on a decoded image.
    pub fn process_image(
        &self,
        image: DynamicImage,
        options: SignatureOptions,
    ) -> Result<ProcessedSignature> {
        let rgb = image.to_rgb8();
        let original_size = Size {
            width: rgb.width(),
            height: rgb.height(),
        };
        if original_size.width == 0 || original_size.height == 0 {
            return Err(InksealError::processing(OP, "normalize", "image has no pixels"));
        }
        info!(
            "Processing signature {}x{} (auto_crop={}, enhance={}, segmenter={})",
            original_size.width,
            original_size.height,
            options.auto_crop,
            options.enhance,
            self.segmenter.name()
        );

        let mut rgba = self
            .segmenter
            .segment(&rgb)
            .map_err(|e| InksealError::processing(OP, "background_removal", e))?;
        if rgba.dimensions() != rgb.dimensions() {
            return Err(InksealError::processing(
                OP,
                "background_removal",
                format!(
                    "segmenter returned {}x{} for a {}x{} image",
                    rgba.width(),
                    rgba.height(),
                    rgb.width(),
                    rgb.height()
                ),
            ));
        }
        drop(rgb);

        if options.enhance {
            debug!("Stage noise_reduction");
            rgba = filters::bilateral(
                &rgba,
                self.config.bilateral_diameter,
                self.config.bilateral_sigma_color,
                self.config.bilateral_sigma_space,
            );
        }

        debug!("Stage edge_smoothing");
        rgba = filters::gaussian3x3(&rgba);

        if options.auto_crop {
            debug!("Stage auto_crop");
            rgba = auto_crop(&rgba, self.config.crop_padding_ratio);
        }

        if options.enhance {
            debug!("Stage enhance");
            rgba = filters::contrast(&rgba, self.config.contrast);
            rgba = filters::sharpness(&rgba, self.config.sharpness);
        }

        let png = codec::png_data_url(&rgba, OP)?;
        let jpg = codec::jpeg_data_url(&filters::flatten_on_white(&rgba), OP)?;
        let processed_size = Size::of(&rgba);
        debug!(
            "Signature processed: {}x{} -> {}x{}",
            original_size.width, original_size.height, processed_size.width, processed_size.height
        );

        Ok(ProcessedSignature {
            original_size,
            processed_size,
            preview: png.clone(),
            formats: SignatureFormats { png, jpg },
            image: rgba,
        })
    }
}

/// Decode a base64 image (optionally a data URL) and write it to `path`.
///
/// The output format follows the extension; parent directories are created.
pub fn save_base64_image(data: &str, path: &Path) -> Result<()> {
    const SAVE: Operation = Operation::SaveBase64Image;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    let format = match extension.as_str() {
        "png" => ImageFormat::Png,
        "jpg" | "jpeg" => ImageFormat::Jpeg,
        _ => {
            return Err(InksealError::UnsupportedFormat {
                operation: SAVE,
                extension,
            })
        }
    };

    let image = codec::decode_image(data, SAVE)?;
    let image = match format {
        ImageFormat::Jpeg if image.color().has_alpha() => {
            DynamicImage::ImageRgb8(filters::flatten_on_white(&image.to_rgba8()))
        }
        _ => image,
    };

    write_atomic(path, SAVE, |file| {
        image
            .write_to(file, format)
            .map_err(|e| InksealError::processing(SAVE, "encode", e))
    })?;
    debug!("Saved image to {}", path.display());
    Ok(())
}
