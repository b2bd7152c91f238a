//! Raster targets: alpha compositing onto PNG/JPEG images.

use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{GenericImageView, ImageFormat, ImageReader, Rgba, RgbaImage};
use tracing::debug;

use super::{DocumentTarget, OverlayAsset};
use crate::error::{InksealError, Operation, Result};
use crate::models::{DocumentDescriptor, DocumentKind, PlacementSpec};
use crate::scratch::ScratchSpace;

/// Largest overlay, in pixels, a raster placement may resize to.
pub const MAX_OVERLAY_PIXELS: f64 = 64_000_000.0;

/// Part of a `len`-long run starting at `offset` that lands inside
/// `0..bound`, as (first target index, first source index, count).
pub(crate) fn visible_span(offset: i64, len: u32, bound: u32) -> Option<(u32, u32, u32)> {
    let offset = i128::from(offset);
    let start = offset.max(0);
    let end = (offset + i128::from(len)).min(i128::from(bound));
    (start < end).then(|| (start as u32, (start - offset) as u32, (end - start) as u32))
}

/// Composite `overlay` over `base` with its top-left corner at `(x, y)`.
///
/// Overlay alpha 0 leaves the base pixel untouched and alpha 255 replaces
/// it; anything in between is the Porter-Duff "over" operator. Overlay
/// pixels that fall outside the base are clipped.
pub fn composite_over(base: &mut RgbaImage, overlay: &RgbaImage, x: i64, y: i64) {
    let Some((tx0, ox0, cols)) = visible_span(x, overlay.width(), base.width()) else {
        return;
    };
    let Some((ty0, oy0, rows)) = visible_span(y, overlay.height(), base.height()) else {
        return;
    };

    for row in 0..rows {
        for col in 0..cols {
            let src = overlay.get_pixel(ox0 + col, oy0 + row);
            let sa = src[3];
            if sa == 0 {
                continue;
            }
            let dst = base.get_pixel_mut(tx0 + col, ty0 + row);
            if sa == 255 {
                *dst = *src;
                continue;
            }

            let sa = f32::from(sa) / 255.0;
            let da = f32::from(dst[3]) / 255.0;
            let out_a = sa + da * (1.0 - sa);
            let mut px = [0u8; 4];
            for c in 0..3 {
                let v = (f32::from(src[c]) * sa + f32::from(dst[c]) * da * (1.0 - sa)) / out_a;
                px[c] = v.round().clamp(0.0, 255.0) as u8;
            }
            px[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
            *dst = Rgba(px);
        }
    }
}

/// Whether the placement box touches a `width x height` image at all.
fn intersects(placement: &PlacementSpec, width: u32, height: u32) -> bool {
    placement.x < f64::from(width)
        && placement.y < f64::from(height)
        && placement.x + placement.width > 0.0
        && placement.y + placement.height > 0.0
}

/// Overlay resized to the placement's (rounded) box, never below 1x1.
pub fn fit_overlay(overlay: &OverlayAsset, placement: &PlacementSpec) -> RgbaImage {
    let width = placement.width.round().max(1.0) as u32;
    let height = placement.height.round().max(1.0) as u32;
    let img = overlay.image();
    if img.dimensions() == (width, height) {
        return img.clone();
    }
    imageops::resize(img, width, height, FilterType::Lanczos3)
}

/// PNG, JPEG.
pub struct RasterTarget;

impl RasterTarget {
    fn open(path: &Path, operation: Operation) -> Result<(image::DynamicImage, Option<ImageFormat>)> {
        let reader = ImageReader::open(path)
            .map_err(|e| InksealError::io(operation, e))?
            .with_guessed_format()
            .map_err(|e| InksealError::io(operation, e))?;
        let format = reader.format();
        let image = reader
            .decode()
            .map_err(|e| InksealError::decode(operation, e))?;
        Ok((image, format))
    }
}

impl DocumentTarget for RasterTarget {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Raster
    }

    fn inspect(&self, path: &Path) -> Result<DocumentDescriptor> {
        const OP: Operation = Operation::Inspect;
        let (image, format) = Self::open(path, OP)?;
        let byte_size = std::fs::metadata(path)
            .map_err(|e| InksealError::io(OP, e))?
            .len();
        let (width, height) = image.dimensions();

        Ok(DocumentDescriptor {
            kind: DocumentKind::Raster,
            page_count: 1,
            width: f64::from(width),
            height: f64::from(height),
            byte_size,
            format: format.map(|f| format!("{:?}", f).to_uppercase()),
        })
    }

    fn apply(
        &self,
        path: &Path,
        overlay: &OverlayAsset,
        placement: &PlacementSpec,
        scratch: &ScratchSpace,
    ) -> Result<PathBuf> {
        const OP: Operation = Operation::ApplyOverlay;
        let (image, _) = Self::open(path, OP)?;
        let mut base = image.to_rgba8();

        if !intersects(placement, base.width(), base.height()) {
            debug!(
                "Placement at ({}, {}) misses the {}x{} image, nothing to stamp",
                placement.x,
                placement.y,
                base.width(),
                base.height()
            );
        } else {
            if placement.width.round() * placement.height.round() > MAX_OVERLAY_PIXELS {
                return Err(InksealError::invalid(
                    OP,
                    format!(
                        "overlay size {}x{} exceeds {} pixels",
                        placement.width, placement.height, MAX_OVERLAY_PIXELS
                    ),
                ));
            }
            let fitted = fit_overlay(overlay, placement);
            let x = placement.x.round() as i64;
            let y = placement.y.round() as i64;
            debug!(
                "Compositing {}x{} overlay at ({}, {}) onto {}x{} image",
                fitted.width(),
                fitted.height(),
                x,
                y,
                base.width(),
                base.height()
            );
            composite_over(&mut base, &fitted, x, y);
        }

        scratch.persist_with("output_", "png", OP, |file| {
            base.write_to(file, ImageFormat::Png)
                .map_err(|e| InksealError::processing(OP, "encode", e))
        })
    }
}
