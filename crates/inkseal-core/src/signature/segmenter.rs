//! Background removal.

use image::{Rgba, RgbImage, RgbaImage};
use thiserror::Error;
use tracing::trace;

use inkseal_inference::InferenceError;

use super::filters::luma601;

/// Errors raised while separating foreground from background.
#[derive(Error, Debug)]
pub enum SegmentationError {
    /// The model file or runtime could not be loaded.
    #[error("segmentation model unavailable: {0}")]
    ModelUnavailable(String),

    /// Inference failed.
    #[error("inference failed: {0}")]
    Inference(#[from] InferenceError),

    /// The mask could not be turned into an image of the input size.
    #[error("invalid segmentation output: {0}")]
    InvalidOutput(String),
}

/// Turns an RGB photo of a signature into an RGBA cutout of the same size.
///
/// Background pixels come back as `(0, 0, 0, 0)`.
pub trait ForegroundSegmenter: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Segment `image`; the result must have the input's dimensions.
    fn segment(&self, image: &RgbImage) -> Result<RgbaImage, SegmentationError>;
}

/// Keys out paper by luminance.
///
/// The paper brightness is the median luma of the image border. A pixel's
/// darkness relative to it maps linearly onto alpha between `low` (fully
/// transparent) and `high` (fully opaque).
#[derive(Debug, Clone)]
pub struct LumaKeySegmenter {
    low: u8,
    high: u8,
}

impl LumaKeySegmenter {
    pub fn new(low: u8, high: u8) -> Self {
        let high = high.max(low.saturating_add(1));
        Self { low, high }
    }

    fn luma(p: &image::Rgb<u8>) -> u8 {
        luma601(p[0], p[1], p[2])
    }

    fn border_median(image: &RgbImage) -> u8 {
        let (w, h) = image.dimensions();
        let mut samples: Vec<u8> = Vec::with_capacity(2 * (w + h) as usize);
        for x in 0..w {
            samples.push(Self::luma(image.get_pixel(x, 0)));
            samples.push(Self::luma(image.get_pixel(x, h - 1)));
        }
        for y in 0..h {
            samples.push(Self::luma(image.get_pixel(0, y)));
            samples.push(Self::luma(image.get_pixel(w - 1, y)));
        }
        samples.sort_unstable();
        samples[samples.len() / 2]
    }
}

impl Default for LumaKeySegmenter {
    fn default() -> Self {
        Self::new(24, 96)
    }
}

impl ForegroundSegmenter for LumaKeySegmenter {
    fn name(&self) -> &str {
        "luma-key"
    }

    fn segment(&self, image: &RgbImage) -> Result<RgbaImage, SegmentationError> {
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            return Ok(RgbaImage::new(w, h));
        }

        let paper = Self::border_median(image);
        trace!("Luma key: paper luma {}", paper);

        let low = f32::from(self.low);
        let span = f32::from(self.high) - low;

        let mut out = RgbaImage::new(w, h);
        for (x, y, p) in image.enumerate_pixels() {
            let darkness = f32::from(paper.saturating_sub(Self::luma(p)));
            let alpha = (((darkness - low) / span) * 255.0).round().clamp(0.0, 255.0) as u8;
            if alpha > 0 {
                out.put_pixel(x, y, Rgba([p[0], p[1], p[2], alpha]));
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_paper_becomes_transparent_black() {
        let mut img = RgbImage::from_pixel(20, 10, Rgb([240, 238, 230]));
        for x in 5..15 {
            img.put_pixel(x, 5, Rgb([20, 20, 60]));
        }

        let out = LumaKeySegmenter::default().segment(&img).unwrap();
        assert_eq!(out.dimensions(), (20, 10));
        assert_eq!(out.get_pixel(0, 0), &Rgba([0, 0, 0, 0]));
        assert_eq!(out.get_pixel(10, 5), &Rgba([20, 20, 60, 255]));
    }

    #[test]
    fn test_faint_marks_are_partial() {
        let mut img = RgbImage::from_pixel(10, 10, Rgb([200, 200, 200]));
        img.put_pixel(5, 5, Rgb([140, 140, 140]));
        let out = LumaKeySegmenter::new(24, 96).segment(&img).unwrap();
        let a = out.get_pixel(5, 5)[3];
        assert!(a > 0 && a < 255, "alpha {}", a);
    }
}
