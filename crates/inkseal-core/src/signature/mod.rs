//! Signature digitization: background removal, cleanup, crop, encode.

mod crop;
mod filters;
mod onnx;
mod pipeline;
mod segmenter;

pub use crop::{auto_crop, content_bounds, CropBox};
pub use onnx::OnnxSegmenter;
pub use pipeline::{
    save_base64_image, ProcessedSignature, SignatureFormats, SignatureOptions, SignaturePipeline,
    Size,
};
pub use segmenter::{ForegroundSegmenter, LumaKeySegmenter, SegmentationError};

pub(crate) use filters::div255;

use crate::error::{InksealError, Result};
use crate::models::{InksealConfig, SegmenterKind};

/// Build the configured background remover.
///
/// The ONNX segmenter loads `models.model_dir/models.segmentation_model`
/// and needs the `native` feature.
pub fn create_segmenter(config: &InksealConfig) -> Result<Box<dyn ForegroundSegmenter>> {
    match config.signature.segmenter {
        SegmenterKind::LumaKey => Ok(Box::new(LumaKeySegmenter::new(
            config.signature.key_low,
            config.signature.key_high,
        ))),
        SegmenterKind::Onnx => create_onnx_segmenter(config),
    }
}

#[cfg(feature = "native")]
fn create_onnx_segmenter(config: &InksealConfig) -> Result<Box<dyn ForegroundSegmenter>> {
    use inkseal_inference::OrtBackend;

    let path = config.segmentation_model_path();
    if !path.exists() {
        return Err(InksealError::Config(format!(
            "segmentation model not found: {} (run `inkseal models download`)",
            path.display()
        )));
    }
    tracing::info!("Loading segmentation model {}", path.display());
    let backend = OrtBackend::from_file(&path, config.models.num_threads)
        .map_err(|e| InksealError::Config(format!("{}: {}", path.display(), e)))?;
    Ok(Box::new(OnnxSegmenter::new(backend, config.models.input_size)))
}

#[cfg(not(feature = "native"))]
fn create_onnx_segmenter(_config: &InksealConfig) -> Result<Box<dyn ForegroundSegmenter>> {
    Err(InksealError::Config(
        "the onnx segmenter requires the `native` feature".to_string(),
    ))
}

/// Pipeline wired to the configured segmenter and signature settings.
pub fn create_pipeline(config: &InksealConfig) -> Result<SignaturePipeline> {
    let segmenter = create_segmenter(config)?;
    Ok(SignaturePipeline::with_config(segmenter, config.signature.clone()))
}
