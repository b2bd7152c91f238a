//! TrueType text rasterization with rusttype.

use std::path::{Path, PathBuf};

use image::{Rgb, Rgba, RgbaImage};
use rusttype::{point, Font, Scale};
use tracing::debug;

use crate::error::{InksealError, Operation, Result};

/// Well-known font files tried when no font is configured.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/System/Library/Fonts/Helvetica.ttc",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// First existing entry of the system font list.
pub fn find_system_font() -> Option<PathBuf> {
    SYSTEM_FONTS
        .iter()
        .map(PathBuf::from)
        .find(|path| path.is_file())
}

/// Load `configured`, or the first usable system font.
pub fn load_font(configured: Option<&Path>, operation: Operation) -> Result<Font<'static>> {
    if let Some(path) = configured {
        return read_font(path, operation);
    }
    for candidate in SYSTEM_FONTS.iter().map(Path::new).filter(|p| p.is_file()) {
        match read_font(candidate, operation) {
            Ok(font) => return Ok(font),
            Err(e) => debug!("Skipping font {}: {}", candidate.display(), e),
        }
    }
    Err(InksealError::processing(
        operation,
        "font",
        "no usable TrueType font found; set watermark.font_path",
    ))
}

fn read_font(path: &Path, operation: Operation) -> Result<Font<'static>> {
    let data = std::fs::read(path)
        .map_err(|e| InksealError::processing(operation, "font", format!("{}: {}", path.display(), e)))?;
    let font = Font::try_from_vec(data).ok_or_else(|| {
        InksealError::processing(operation, "font", format!("{}: not a TrueType font", path.display()))
    })?;
    debug!("Loaded font {}", path.display());
    Ok(font)
}

/// Render one line of `text` onto a transparent canvas.
///
/// The canvas is the tight pixel bounds of the glyphs plus `padding` on
/// every side. Glyph coverage scales `alpha`; overlapping glyphs keep the
/// larger coverage. Text without visible glyphs gives an empty
/// `2 * padding` square.
pub fn render_text(font: &Font<'_>, text: &str, size: f32, color: Rgb<u8>, alpha: u8, padding: u32) -> RgbaImage {
    let scale = Scale::uniform(size);
    let ascent = font.v_metrics(scale).ascent;
    let glyphs: Vec<_> = font.layout(text, scale, point(0.0, ascent)).collect();

    let bounds = glyphs
        .iter()
        .filter_map(|g| g.pixel_bounding_box())
        .fold(None, |acc: Option<(i32, i32, i32, i32)>, bb| {
            Some(match acc {
                None => (bb.min.x, bb.min.y, bb.max.x, bb.max.y),
                Some((x0, y0, x1, y1)) => (x0.min(bb.min.x), y0.min(bb.min.y), x1.max(bb.max.x), y1.max(bb.max.y)),
            })
        });

    let pad = padding as i32;
    let Some((min_x, min_y, max_x, max_y)) = bounds else {
        let side = (padding * 2).max(1);
        return RgbaImage::new(side, side);
    };

    let width = (max_x - min_x + 2 * pad).max(1) as u32;
    let height = (max_y - min_y + 2 * pad).max(1) as u32;
    let mut canvas = RgbaImage::new(width, height);
    let (dx, dy) = (pad - min_x, pad - min_y);

    for glyph in &glyphs {
        let Some(bb) = glyph.pixel_bounding_box() else {
            continue;
        };
        glyph.draw(|gx, gy, coverage| {
            let x = bb.min.x + gx as i32 + dx;
            let y = bb.min.y + gy as i32 + dy;
            if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
                return;
            }
            let a = (f32::from(alpha) * coverage).round().clamp(0.0, 255.0) as u8;
            let px = canvas.get_pixel_mut(x as u32, y as u32);
            if a > px[3] {
                *px = Rgba([color[0], color[1], color[2], a]);
            }
        });
    }
    canvas
}
