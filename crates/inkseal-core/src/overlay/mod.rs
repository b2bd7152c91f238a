//! Overlay compositing onto raster images and PDF pages.
//!
//! A [`PlacementSpec`] is always expressed in the target's top-left, y-down
//! space. Each [`DocumentKind`] has a [`DocumentTarget`] that knows how to
//! burn an [`OverlayAsset`] into that kind of document and write the result
//! to a fresh file in the [`ScratchSpace`].

mod pdf;
mod raster;

pub use pdf::PdfTarget;
pub use raster::{composite_over, fit_overlay, RasterTarget, MAX_OVERLAY_PIXELS};
pub(crate) use raster::visible_span;

use std::path::{Path, PathBuf};

use image::{DynamicImage, RgbaImage};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::codec;
use crate::error::{InksealError, Operation, Result};
use crate::models::{DocumentDescriptor, DocumentKind, PlacementSpec};
use crate::scratch::ScratchSpace;

/// RGBA image to be stamped.
///
/// Its alpha already carries the asset's opacity; compositing never applies
/// a second opacity factor.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayAsset(RgbaImage);

impl OverlayAsset {
    pub fn from_rgba(image: RgbaImage) -> Self {
        Self(image)
    }

    /// Any decoded image, upgraded to RGBA.
    pub fn from_image(image: DynamicImage) -> Self {
        Self(image.to_rgba8())
    }

    /// Decode a base64 payload or `data:` URL.
    pub fn from_data_url(data: &str, operation: Operation) -> Result<Self> {
        codec::decode_image(data, operation).map(Self::from_image)
    }

    /// Decode an image file.
    pub fn from_path(path: &Path, operation: Operation) -> Result<Self> {
        if !path.exists() {
            return Err(InksealError::NotFound {
                operation,
                path: path.to_path_buf(),
            });
        }
        let bytes = std::fs::read(path).map_err(|e| InksealError::io(operation, e))?;
        codec::decode_image_bytes(&bytes, operation).map(Self::from_image)
    }

    pub fn image(&self) -> &RgbaImage {
        &self.0
    }

    pub fn into_inner(self) -> RgbaImage {
        self.0
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }
}

/// Operations every target document kind supports.
pub trait DocumentTarget: Send + Sync {
    fn kind(&self) -> DocumentKind;

    /// Read-only snapshot of the document.
    fn inspect(&self, path: &Path) -> Result<DocumentDescriptor>;

    /// Stamp `overlay` into a copy of the document at `path`, returning the
    /// path of the new document. The input file is never modified.
    fn apply(
        &self,
        path: &Path,
        overlay: &OverlayAsset,
        placement: &PlacementSpec,
        scratch: &ScratchSpace,
    ) -> Result<PathBuf>;
}

/// The target implementation for a document kind.
pub fn target_for(kind: DocumentKind) -> &'static dyn DocumentTarget {
    match kind {
        DocumentKind::Raster => &RasterTarget,
        DocumentKind::Pdf => &PdfTarget,
    }
}

/// Outcome of one document in [`OverlayCompositor::batch_apply_overlay`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    /// The input path as given.
    pub document_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Stamps overlays into documents of any supported kind.
#[derive(Debug, Clone, Default)]
pub struct OverlayCompositor {
    scratch: ScratchSpace,
}

impl OverlayCompositor {
    pub fn new(scratch: ScratchSpace) -> Self {
        Self { scratch }
    }

    pub fn scratch(&self) -> &ScratchSpace {
        &self.scratch
    }

    /// Resolve the target for `path`: it must exist and have a supported extension.
    fn resolve(path: &Path, operation: Operation) -> Result<&'static dyn DocumentTarget> {
        if !path.exists() {
            return Err(InksealError::NotFound {
                operation,
                path: path.to_path_buf(),
            });
        }
        DocumentKind::from_path(path, operation).map(target_for)
    }

    /// Stamp a base64 / data URL overlay into `document`.
    pub fn apply_overlay(
        &self,
        document: &Path,
        overlay_data: &str,
        placement: &PlacementSpec,
    ) -> Result<PathBuf> {
        const OP: Operation = Operation::ApplyOverlay;
        let target = Self::resolve(document, OP)?;
        placement
            .validate()
            .map_err(|reason| InksealError::invalid(OP, reason))?;
        let overlay = OverlayAsset::from_data_url(overlay_data, OP)?;
        self.apply_asset_with(target, document, &overlay, placement)
    }

    /// Stamp an already decoded overlay into `document`.
    pub fn apply_asset(
        &self,
        document: &Path,
        overlay: &OverlayAsset,
        placement: &PlacementSpec,
    ) -> Result<PathBuf> {
        const OP: Operation = Operation::ApplyOverlay;
        let target = Self::resolve(document, OP)?;
        placement
            .validate()
            .map_err(|reason| InksealError::invalid(OP, reason))?;
        self.apply_asset_with(target, document, overlay, placement)
    }

    fn apply_asset_with(
        &self,
        target: &dyn DocumentTarget,
        document: &Path,
        overlay: &OverlayAsset,
        placement: &PlacementSpec,
    ) -> Result<PathBuf> {
        info!(
            "Applying {}x{} overlay to {} ({:?}) at ({}, {}) size {}x{}, pages {}",
            overlay.width(),
            overlay.height(),
            document.display(),
            target.kind(),
            placement.x,
            placement.y,
            placement.width,
            placement.height,
            placement.pages
        );
        target.apply(document, overlay, placement, &self.scratch)
    }

    /// Apply the same overlay to each document in order.
    ///
    /// Never fails as a whole: each document gets its own result, and a
    /// malformed overlay fails every entry with the same decode error.
    pub fn batch_apply_overlay<P: AsRef<Path>>(
        &self,
        documents: &[P],
        overlay_data: &str,
        placement: &PlacementSpec,
    ) -> Vec<BatchResult> {
        self.batch_apply_overlay_with(documents, overlay_data, placement, |_| {})
    }

    /// [`batch_apply_overlay`](Self::batch_apply_overlay), reporting each
    /// result as soon as its document is done.
    pub fn batch_apply_overlay_with<P, F>(
        &self,
        documents: &[P],
        overlay_data: &str,
        placement: &PlacementSpec,
        mut on_result: F,
    ) -> Vec<BatchResult>
    where
        P: AsRef<Path>,
        F: FnMut(&BatchResult),
    {
        let overlay = OverlayAsset::from_data_url(overlay_data, Operation::ApplyOverlay)
            .map_err(|e| e.to_string());

        documents
            .iter()
            .map(|doc| {
                let doc = doc.as_ref();
                let outcome = match &overlay {
                    Ok(asset) => self.apply_asset(doc, asset, placement).map_err(|e| e.to_string()),
                    Err(message) => Err(message.clone()),
                };
                let document_id = doc.display().to_string();
                let result = match outcome {
                    Ok(output) => BatchResult {
                        document_id,
                        success: true,
                        output_path: Some(output),
                        error: None,
                    },
                    Err(error) => {
                        warn!("Overlay failed for {}: {}", document_id, error);
                        BatchResult {
                            document_id,
                            success: false,
                            output_path: None,
                            error: Some(error),
                        }
                    }
                };
                on_result(&result);
                result
            })
            .collect()
    }

    /// Inspect a document of any supported kind.
    pub fn inspect(&self, document: &Path) -> Result<DocumentDescriptor> {
        Self::resolve(document, Operation::Inspect)?.inspect(document)
    }
}
