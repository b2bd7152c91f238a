//! Geometric and alpha transforms applied to watermark rasters.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};

use crate::error::{InksealError, Operation, Result};
use crate::overlay::visible_span;
use crate::signature::div255;

/// Rotate counter-clockwise by `degrees`, growing the canvas to hold the
/// whole result. Uncovered pixels are transparent; sampling is nearest
/// neighbour.
pub fn rotate_expand(image: &RgbaImage, degrees: f32) -> RgbaImage {
    if degrees % 360.0 == 0.0 {
        return image.clone();
    }

    let (w, h) = (f64::from(image.width()), f64::from(image.height()));
    let theta = -f64::from(degrees).to_radians();
    let (a, b) = (theta.cos(), theta.sin());
    let (d, e) = (-b, a);

    // Output -> input mapping around the image center.
    let (cx, cy) = (w / 2.0, h / 2.0);
    let c = -a * cx - b * cy + cx;
    let f = -d * cx - e * cy + cy;

    let corners = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)].map(|(x, y)| (a * x + b * y + c, d * x + e * y + f));
    let snap = |v: f64| (v * 1e9).round() / 1e9;
    let extent = |values: [f64; 4]| {
        let max = values.iter().copied().fold(f64::MIN, f64::max);
        let min = values.iter().copied().fold(f64::MAX, f64::min);
        snap(max).ceil() - snap(min).floor()
    };
    let nw = extent(corners.map(|p| p.0));
    let nh = extent(corners.map(|p| p.1));

    let (ox, oy) = (-(nw - w) / 2.0, -(nh - h) / 2.0);
    let c = a * ox + b * oy + c;
    let f = d * ox + e * oy + f;

    let mut out = RgbaImage::new(nw.max(1.0) as u32, nh.max(1.0) as u32);
    for (x, y, px) in out.enumerate_pixels_mut() {
        let (xf, yf) = (f64::from(x) + 0.5, f64::from(y) + 0.5);
        let sx = (a * xf + b * yf + c).floor();
        let sy = (d * xf + e * yf + f).floor();
        if sx >= 0.0 && sy >= 0.0 && sx < w && sy < h {
            *px = *image.get_pixel(sx as u32, sy as u32);
        }
    }
    out
}

/// Scale the alpha channel by `opacity`, truncating.
pub fn adjust_opacity(image: &RgbaImage, opacity: f32) -> RgbaImage {
    let mut out = image.clone();
    for px in out.pixels_mut() {
        px[3] = (f32::from(px[3]) * opacity).clamp(0.0, 255.0) as u8;
    }
    out
}

/// Shrink to fit within the given bounds, width constraint first, keeping
/// the aspect ratio. Images already within bounds are returned unchanged.
pub fn fit_within(image: &RgbaImage, max_width: Option<u32>, max_height: Option<u32>) -> RgbaImage {
    let (mut width, mut height) = image.dimensions();
    if let Some(max) = max_width.filter(|m| width > *m) {
        height = (f64::from(height) * f64::from(max) / f64::from(width)) as u32;
        width = max;
    }
    if let Some(max) = max_height.filter(|m| height > *m) {
        width = (f64::from(width) * f64::from(max) / f64::from(height)) as u32;
        height = max;
    }
    let (width, height) = (width.max(1), height.max(1));
    if (width, height) == image.dimensions() {
        return image.clone();
    }
    imageops::resize(image, width, height, FilterType::Lanczos3)
}

/// Paste `src` onto `dst` at `(x, y)` using `src`'s own alpha as the mask.
///
/// Every channel, alpha included, is blended as
/// `dst * (255 - a) / 255 + src * a / 255`.
pub fn paste_masked(dst: &mut RgbaImage, src: &RgbaImage, x: i64, y: i64) {
    let Some((tx0, sx0, cols)) = visible_span(x, src.width(), dst.width()) else {
        return;
    };
    let Some((ty0, sy0, rows)) = visible_span(y, src.height(), dst.height()) else {
        return;
    };

    for row in 0..rows {
        for col in 0..cols {
            let s = src.get_pixel(sx0 + col, sy0 + row);
            let mask = u32::from(s[3]);
            if mask == 0 {
                continue;
            }
            let d = dst.get_pixel_mut(tx0 + col, ty0 + row);
            let mut out = [0u8; 4];
            for (c, slot) in out.iter_mut().enumerate() {
                *slot = div255(u32::from(d[c]) * (255 - mask) + u32::from(s[c]) * mask);
            }
            *d = Rgba(out);
        }
    }
}

/// Load and resize an image file.
///
/// With `maintain_aspect`, a missing dimension is derived from the given
/// one; otherwise it keeps the source size.
pub fn resize_image(
    path: &Path,
    width: Option<u32>,
    height: Option<u32>,
    maintain_aspect: bool,
) -> Result<DynamicImage> {
    const OP: Operation = Operation::ResizeImage;
    if !path.exists() {
        return Err(InksealError::NotFound {
            operation: OP,
            path: path.to_path_buf(),
        });
    }
    let image = image::open(path).map_err(|e| InksealError::decode(OP, e))?;
    let (src_w, src_h) = image.dimensions();

    let (w, h) = match (width, height) {
        (None, None) => return Ok(image),
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) if maintain_aspect => (w, (f64::from(src_h) * f64::from(w) / f64::from(src_w)) as u32),
        (None, Some(h)) if maintain_aspect => ((f64::from(src_w) * f64::from(h) / f64::from(src_h)) as u32, h),
        (w, h) => (w.unwrap_or(src_w), h.unwrap_or(src_h)),
    };
    if w == 0 || h == 0 {
        return Err(InksealError::invalid(
            OP,
            format!("target size {}x{} is empty", w, h),
        ));
    }
    Ok(image.resize_exact(w, h, FilterType::Lanczos3))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn marked(w: u32, h: u32) -> RgbaImage {
        let mut img = RgbaImage::from_pixel(w, h, Rgba([0, 0, 255, 255]));
        img.put_pixel(w - 1, 0, RED);
        img
    }

    #[test]
    fn test_rotate_90_is_counter_clockwise() {
        let rotated = rotate_expand(&marked(4, 2), 90.0);
        assert_eq!(rotated.dimensions(), (2, 4));
        // top-right corner moves to top-left
        assert_eq!(rotated.get_pixel(0, 0), &RED);
    }

    #[test]
    fn test_rotate_180() {
        let rotated = rotate_expand(&marked(4, 2), 180.0);
        assert_eq!(rotated.dimensions(), (4, 2));
        assert_eq!(rotated.get_pixel(0, 1), &RED);
    }

    #[test]
    fn test_rotate_45_expands_with_transparent_corners() {
        let rotated = rotate_expand(&RgbaImage::from_pixel(10, 10, RED), 45.0);
        assert!(rotated.width() > 10 && rotated.height() > 10);
        assert_eq!(rotated.get_pixel(0, 0)[3], 0);
        let (cx, cy) = (rotated.width() / 2, rotated.height() / 2);
        assert_eq!(rotated.get_pixel(cx, cy), &RED);
    }

    #[test]
    fn test_rotate_zero_is_identity() {
        let img = marked(3, 5);
        assert_eq!(rotate_expand(&img, 0.0), img);
        assert_eq!(rotate_expand(&img, 360.0), img);
    }

    #[test]
    fn test_adjust_opacity_truncates() {
        let img = RgbaImage::from_pixel(1, 1, Rgba([10, 20, 30, 255]));
        let out = adjust_opacity(&img, 0.5);
        assert_eq!(out.get_pixel(0, 0), &Rgba([10, 20, 30, 127]));
    }

    #[test]
    fn test_fit_within_width_first() {
        let img = RgbaImage::new(400, 200);
        assert_eq!(fit_within(&img, Some(100), None).dimensions(), (100, 50));
        assert_eq!(fit_within(&img, Some(200), Some(50)).dimensions(), (100, 50));
        assert_eq!(fit_within(&img, Some(1000), Some(1000)).dimensions(), (400, 200));
    }

    #[test]
    fn test_paste_masked_blends_every_channel() {
        let mut canvas = RgbaImage::new(2, 1);
        let tile = RgbaImage::from_pixel(1, 1, Rgba([200, 100, 0, 128]));
        paste_masked(&mut canvas, &tile, 1, 0);

        assert_eq!(canvas.get_pixel(0, 0), &Rgba([0, 0, 0, 0]));
        // 200*128/255, 100*128/255, 0, 128*128/255
        assert_eq!(canvas.get_pixel(1, 0), &Rgba([100, 50, 0, 64]));
    }

    #[test]
    fn test_paste_masked_far_offsets_are_noop() {
        let tile = RgbaImage::from_pixel(3, 3, RED);
        for (x, y) in [(i64::MAX, 0), (0, i64::MAX), (i64::MIN, i64::MIN), (-3, 0)] {
            let mut canvas = marked(4, 2);
            paste_masked(&mut canvas, &tile, x, y);
            assert_eq!(canvas, marked(4, 2));
        }
    }

    #[test]
    fn test_resize_image_keeps_aspect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.png");
        RgbaImage::new(300, 150).save(&path).unwrap();

        assert_eq!(resize_image(&path, Some(100), None, true).unwrap().dimensions(), (100, 50));
        assert_eq!(resize_image(&path, None, Some(30), true).unwrap().dimensions(), (60, 30));
        assert_eq!(resize_image(&path, Some(100), None, false).unwrap().dimensions(), (100, 150));
        assert_eq!(resize_image(&path, Some(10), Some(10), true).unwrap().dimensions(), (10, 10));
    }

    #[test]
    fn test_resize_image_missing() {
        let err = resize_image(Path::new("/nope/x.png"), Some(1), None, true).unwrap_err();
        assert!(matches!(err, InksealError::NotFound { .. }));
    }
}
