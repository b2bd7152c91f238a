//! Core library for signature digitization, watermarks and overlay stamping.
//!
//! This crate provides:
//! - Signature digitization (background removal, cleanup, auto-crop, PNG/JPEG encoding)
//! - Text, image and tiled watermark rendering
//! - Overlay compositing onto PNG/JPEG images and selected PDF pages
//! - PDF page operations (merge, split, inspect, previews)

pub mod codec;
pub mod error;
pub mod models;
pub mod overlay;
pub mod pdf;
pub mod scratch;
pub mod signature;
pub mod watermark;

pub use error::{InksealError, Operation, PdfError, Result};
pub use models::{
    DocumentDescriptor, DocumentKind, InksealConfig, PageSelection, PlacementSpec, SegmenterKind,
};
pub use overlay::{BatchResult, DocumentTarget, OverlayAsset, OverlayCompositor};
pub use pdf::{PagePreview, PageOps};
pub use scratch::ScratchSpace;
pub use signature::{
    create_pipeline, create_segmenter, save_base64_image, ForegroundSegmenter, LumaKeySegmenter,
    OnnxSegmenter, ProcessedSignature, SignatureOptions, SignaturePipeline,
};
pub use watermark::{ImageOptions, TextOptions, WatermarkCreator, WatermarkImage};

/// Re-export inference types.
pub use inkseal_inference::{InferenceBackend, InputTensor, OutputTensor};

#[cfg(feature = "native")]
pub use inkseal_inference::OrtBackend;
