//! U^2-Net salient object segmentation.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgba, RgbImage, RgbaImage};
use tracing::debug;

use inkseal_inference::{InferenceBackend, InputTensor};

use super::filters::div255;
use super::segmenter::{ForegroundSegmenter, SegmentationError};

const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Segmenter backed by a U^2-Net style model (`u2net`, `u2netp`).
///
/// The model sees a square `input_size` rendition of the photo and returns a
/// saliency map; the map is min-max normalized, scaled back to the photo's
/// size and used as the alpha of the cutout.
pub struct OnnxSegmenter<B: InferenceBackend> {
    backend: B,
    input_size: u32,
}

impl<B: InferenceBackend> OnnxSegmenter<B> {
    pub fn new(backend: B, input_size: u32) -> Self {
        Self {
            backend,
            input_size: input_size.max(1),
        }
    }

    fn preprocess(&self, image: &RgbImage) -> Result<InputTensor, SegmentationError> {
        let size = self.input_size;
        let resized = imageops::resize(image, size, size, FilterType::Lanczos3);

        let max = resized.as_raw().iter().copied().max().unwrap_or(0);
        let scale = f32::from(max).max(1e-6);

        let plane = (size * size) as usize;
        let mut data = vec![0f32; 3 * plane];
        for (x, y, p) in resized.enumerate_pixels() {
            let idx = (y * size + x) as usize;
            for c in 0..3 {
                data[c * plane + idx] = (f32::from(p[c]) / scale - MEAN[c]) / STD[c];
            }
        }

        Ok(InputTensor::from_f32(
            data,
            &[1, 3, size as usize, size as usize],
        )?)
    }

    fn mask_from_output(
        &self,
        values: &[f32],
        width: u32,
        height: u32,
    ) -> Result<GrayImage, SegmentationError> {
        let size = self.input_size;
        let plane = (size * size) as usize;
        if values.len() < plane {
            return Err(SegmentationError::InvalidOutput(format!(
                "expected at least {} values, got {}",
                plane,
                values.len()
            )));
        }
        let values = &values[..plane];

        let min = values.iter().copied().fold(f32::INFINITY, f32::min);
        let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let range = if max - min > f32::EPSILON { max - min } else { 1.0 };

        let raw: Vec<u8> = values
            .iter()
            .map(|&v| (((v - min) / range) * 255.0).clamp(0.0, 255.0) as u8)
            .collect();
        let mask = GrayImage::from_raw(size, size, raw)
            .ok_or_else(|| SegmentationError::InvalidOutput("mask buffer size".to_string()))?;

        Ok(imageops::resize(&mask, width, height, FilterType::Lanczos3))
    }
}

/// Mask the photo against transparent black.
fn cutout(image: &RgbImage, mask: &GrayImage) -> RgbaImage {
    let mut out = RgbaImage::new(image.width(), image.height());
    for ((o, p), &Luma([m])) in out.pixels_mut().zip(image.pixels()).zip(mask.pixels()) {
        let m32 = u32::from(m);
        *o = Rgba([
            div255(u32::from(p[0]) * m32),
            div255(u32::from(p[1]) * m32),
            div255(u32::from(p[2]) * m32),
            m,
        ]);
    }
    out
}

impl<B: InferenceBackend> ForegroundSegmenter for OnnxSegmenter<B> {
    fn name(&self) -> &str {
        "u2net"
    }

    fn segment(&self, image: &RgbImage) -> Result<RgbaImage, SegmentationError> {
        let (width, height) = image.dimensions();
        let input = self.preprocess(image)?;

        let outputs = self.backend.run(&[(self.backend.primary_input(), input)])?;
        let (name, first) = outputs
            .into_iter()
            .next()
            .ok_or_else(|| SegmentationError::InvalidOutput("model returned no outputs".to_string()))?;
        debug!("Segmentation output '{}' with shape {:?}", name, first.shape());

        let values: Vec<f32> = first.into_f32().iter().copied().collect();
        let mask = self.mask_from_output(&values, width, height)?;
        Ok(cutout(image, &mask))
    }
}
