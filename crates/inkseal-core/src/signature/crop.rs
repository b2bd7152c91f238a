//! Tight crop around the signature strokes.

use image::{imageops, RgbaImage};
use tracing::trace;

use super::filters::luma601;

/// Axis-aligned box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Bounding box of every pixel whose luma is non-zero (alpha ignored).
pub fn content_bounds(image: &RgbaImage) -> Option<CropBox> {
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0;
    let mut max_y = 0;
    let mut found = false;

    for (x, y, p) in image.enumerate_pixels() {
        if luma601(p[0], p[1], p[2]) == 0 {
            continue;
        }
        found = true;
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }

    found.then(|| CropBox {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    })
}

/// Content bounds grown by `floor(padding_ratio * size)` per side and
/// clamped to the image.
pub fn padded_bounds(image: &RgbaImage, padding_ratio: f32) -> Option<CropBox> {
    let bounds = content_bounds(image)?;
    let ratio = f64::from(padding_ratio.max(0.0));
    let pad_x = (f64::from(bounds.width) * ratio) as u32;
    let pad_y = (f64::from(bounds.height) * ratio) as u32;

    let x = bounds.x.saturating_sub(pad_x);
    let y = bounds.y.saturating_sub(pad_y);
    Some(CropBox {
        x,
        y,
        width: (image.width() - x).min(bounds.width + 2 * pad_x),
        height: (image.height() - y).min(bounds.height + 2 * pad_y),
    })
}

/// Crop to the padded content bounds; images without content are returned as is.
pub fn auto_crop(image: &RgbaImage, padding_ratio: f32) -> RgbaImage {
    match padded_bounds(image, padding_ratio) {
        Some(b) => {
            trace!("Auto-crop to {}x{} at ({}, {})", b.width, b.height, b.x, b.y);
            imageops::crop_imm(image, b.x, b.y, b.width, b.height).to_image()
        }
        None => image.clone(),
    }
}
