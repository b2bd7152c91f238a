//! Pixel filters used by the signature pipeline.
//!
//! All filters take and return RGBA buffers of the same size. Fixed-point
//! rounding follows the conventions of the common imaging libraries so that
//! results are stable across platforms.

use image::{Rgb, RgbImage, Rgba, RgbaImage};

/// Mirror an out-of-range index back into `[0, len)` without repeating the
/// edge pixel (`gfedcb|abcdefgh|gfedcba`).
pub(crate) fn reflect101(index: i64, len: u32) -> u32 {
    let len = i64::from(len);
    if len == 1 {
        return 0;
    }
    let mut i = index;
    loop {
        if i < 0 {
            i = -i;
        } else if i >= len {
            i = 2 * len - 2 - i;
        } else {
            return i as u32;
        }
    }
}

/// Rounded `v / 255` for `v` in `[0, 255 * 255]`.
pub(crate) fn div255(v: u32) -> u8 {
    let t = v + 128;
    (((t >> 8) + t) >> 8) as u8
}

/// ITU-R 601 luma in 14-bit fixed point, alpha ignored.
pub(crate) fn luma601(r: u8, g: u8, b: u8) -> u8 {
    let v = u32::from(r) * 4899 + u32::from(g) * 9617 + u32::from(b) * 1868;
    ((v + 8192) >> 14) as u8
}

/// ITU-R 601 luma in 16-bit fixed point, used for the contrast mean.
fn luma_l24(p: &Rgba<u8>) -> u32 {
    (u32::from(p[0]) * 19595 + u32::from(p[1]) * 38470 + u32::from(p[2]) * 7471 + 0x8000) >> 16
}

/// Edge-preserving smoothing.
///
/// Each output pixel is the average of the pixels within `diameter / 2` of
/// it (circular window), weighted by spatial distance and by the summed
/// absolute RGB difference to the center. The same weights apply to alpha.
pub fn bilateral(image: &RgbaImage, diameter: u32, sigma_color: f32, sigma_space: f32) -> RgbaImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let sigma_color = if sigma_color <= 0.0 { 1.0 } else { sigma_color };
    let sigma_space = if sigma_space <= 0.0 { 1.0 } else { sigma_space };
    let radius = (diameter / 2).max(1) as i64;

    let color_coeff = -0.5 / (sigma_color * sigma_color);
    let space_coeff = -0.5 / (sigma_space * sigma_space);

    let mut taps: Vec<(i64, i64, f32)> = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let r = ((dx * dx + dy * dy) as f32).sqrt();
            if r > radius as f32 {
                continue;
            }
            taps.push((dx, dy, (r * r * space_coeff).exp()));
        }
    }

    // Summed |dR|+|dG|+|dB| ranges over 0..=765.
    let color_weights: Vec<f32> = (0..=765)
        .map(|d| ((d * d) as f32 * color_coeff).exp())
        .collect();

    let mut out = RgbaImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let center = image.get_pixel(x, y);
            let mut sum = [0f32; 4];
            let mut wsum = 0f32;

            for &(dx, dy, ws) in &taps {
                let sx = reflect101(i64::from(x) + dx, width);
                let sy = reflect101(i64::from(y) + dy, height);
                let p = image.get_pixel(sx, sy);
                let diff = (0..3)
                    .map(|c| (i32::from(p[c]) - i32::from(center[c])).unsigned_abs())
                    .sum::<u32>() as usize;
                let w = ws * color_weights[diff];
                for c in 0..4 {
                    sum[c] += f32::from(p[c]) * w;
                }
                wsum += w;
            }

            let mut px = [0u8; 4];
            for c in 0..4 {
                px[c] = (sum[c] / wsum).round().clamp(0.0, 255.0) as u8;
            }
            out.put_pixel(x, y, Rgba(px));
        }
    }
    out
}

/// 3x3 Gaussian blur over all four channels.
///
/// For a 3-tap kernel the derived sigma (0.8) maps onto the binomial kernel
/// `[1 2 1] / 4`, evaluated exactly in integers with reflect-101 borders.
pub fn gaussian3x3(image: &RgbaImage) -> RgbaImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }
    const K: [u32; 3] = [1, 2, 1];

    let mut out = RgbaImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let mut acc = [0u32; 4];
            for (ky, wy) in K.iter().enumerate() {
                let sy = reflect101(i64::from(y) + ky as i64 - 1, height);
                for (kx, wx) in K.iter().enumerate() {
                    let sx = reflect101(i64::from(x) + kx as i64 - 1, width);
                    let p = image.get_pixel(sx, sy);
                    for c in 0..4 {
                        acc[c] += u32::from(p[c]) * wy * wx;
                    }
                }
            }
            let px = acc.map(|v| ((v + 8) >> 4) as u8);
            out.put_pixel(x, y, Rgba(px));
        }
    }
    out
}

/// Linear blend `degenerate + factor * (image - degenerate)` on RGB, alpha kept.
fn blend_rgb(degenerate: &RgbaImage, image: &RgbaImage, factor: f32) -> RgbaImage {
    let mut out = image.clone();
    for (o, (d, s)) in out
        .pixels_mut()
        .zip(degenerate.pixels().zip(image.pixels()))
    {
        for c in 0..3 {
            let v = f32::from(d[c]) + factor * (f32::from(s[c]) - f32::from(d[c]));
            o[c] = (v as i32).clamp(0, 255) as u8;
        }
    }
    out
}

/// Scale contrast against the rounded mean luma of the image.
pub fn contrast(image: &RgbaImage, factor: f32) -> RgbaImage {
    let count = u64::from(image.width()) * u64::from(image.height());
    if count == 0 {
        return image.clone();
    }
    let total: u64 = image.pixels().map(|p| u64::from(luma_l24(p))).sum();
    let mean = (total as f64 / count as f64 + 0.5) as u8;

    let degenerate = RgbaImage::from_pixel(image.width(), image.height(), Rgba([mean, mean, mean, 255]));
    blend_rgb(&degenerate, image, factor)
}

/// Sharpen by extrapolating away from a 3x3 smoothed copy.
///
/// The smoothing kernel is `[1 1 1; 1 5 1; 1 1 1] / 13`; edge pixels keep
/// their original values in the smoothed copy.
pub fn sharpness(image: &RgbaImage, factor: f32) -> RgbaImage {
    let (width, height) = image.dimensions();
    let mut smoothed = image.clone();
    if width >= 3 && height >= 3 {
        for y in 1..height - 1 {
            for x in 1..width - 1 {
                let mut acc = [0u32; 3];
                for dy in 0..3 {
                    for dx in 0..3 {
                        let weight = if dx == 1 && dy == 1 { 5 } else { 1 };
                        let p = image.get_pixel(x + dx - 1, y + dy - 1);
                        for c in 0..3 {
                            acc[c] += u32::from(p[c]) * weight;
                        }
                    }
                }
                let target = smoothed.get_pixel_mut(x, y);
                for c in 0..3 {
                    target[c] = ((acc[c] as f32 / 13.0) + 0.5).min(255.0) as u8;
                }
            }
        }
    }
    blend_rgb(&smoothed, image, factor)
}

/// Flatten onto opaque white using the alpha channel as the paste mask.
pub fn flatten_on_white(image: &RgbaImage) -> RgbImage {
    let mut out = RgbImage::from_pixel(image.width(), image.height(), Rgb([255, 255, 255]));
    for (o, p) in out.pixels_mut().zip(image.pixels()) {
        let a = u32::from(p[3]);
        for c in 0..3 {
            o[c] = div255(u32::from(p[c]) * a + 255 * (255 - a));
        }
    }
    out
}
