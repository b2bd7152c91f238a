//! Text and image watermark assets.
//!
//! Every watermark is an RGBA image whose alpha already carries the
//! requested opacity, ready to be stamped with the overlay compositor.

mod color;
mod text;
mod transform;

pub use color::parse_hex_color;
pub use text::{find_system_font, load_font, render_text};
pub use transform::{adjust_opacity, fit_within, paste_masked, resize_image, rotate_expand};

use std::path::Path;

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::codec;
use crate::error::{InksealError, Operation, Result};
use crate::models::WatermarkConfig;
use crate::overlay::OverlayAsset;

/// Parameters a watermark was created with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WatermarkSettings {
    #[serde(rename_all = "camelCase")]
    Text {
        text: String,
        font_size: f32,
        color: String,
        opacity: f32,
        rotation: f32,
    },
    #[serde(rename_all = "camelCase")]
    Image { opacity: f32, rotation: f32 },
    #[serde(rename_all = "camelCase")]
    Tiled {
        text: String,
        tile_spacing: u32,
        opacity: f32,
        rotation: f32,
    },
}

/// A rendered watermark.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatermarkImage {
    /// PNG data URL.
    pub image: String,
    pub width: u32,
    pub height: u32,
    pub settings: WatermarkSettings,
    #[serde(skip)]
    pub raster: RgbaImage,
}

impl WatermarkImage {
    fn new(raster: RgbaImage, settings: WatermarkSettings, operation: Operation) -> Result<Self> {
        Ok(Self {
            image: codec::png_data_url(&raster, operation)?,
            width: raster.width(),
            height: raster.height(),
            settings,
            raster,
        })
    }

    /// The raster as an overlay for the compositor.
    pub fn to_overlay(&self) -> OverlayAsset {
        OverlayAsset::from_rgba(self.raster.clone())
    }
}

/// Text options for [`WatermarkCreator::create_text_watermark`]; unset
/// fields fall back to the creator's [`WatermarkConfig`].
#[derive(Debug, Clone, Default)]
pub struct TextOptions {
    pub font_size: Option<f32>,
    pub color: Option<String>,
    pub opacity: Option<f32>,
    pub rotation: f32,
}

/// Image options for [`WatermarkCreator::create_image_watermark`].
#[derive(Debug, Clone, Default)]
pub struct ImageOptions {
    pub opacity: Option<f32>,
    pub rotation: f32,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
}

/// Opacity used by tiled watermarks.
pub const TILE_OPACITY: f32 = 0.1;
/// Rotation used by tiled watermarks, in degrees.
pub const TILE_ROTATION: f32 = 45.0;

pub struct WatermarkCreator {
    config: WatermarkConfig,
}

impl WatermarkCreator {
    pub fn new(config: WatermarkConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WatermarkConfig {
        &self.config
    }

    /// Render `text` and rotate it counter-clockwise by `options.rotation`.
    pub fn create_text_watermark(&self, text: &str, options: &TextOptions) -> Result<WatermarkImage> {
        const OP: Operation = Operation::CreateTextWatermark;
        let settings = self.text_settings(text, options);
        let raster = self.render(text, &settings, OP)?;
        info!("Created text watermark {}x{}", raster.width(), raster.height());
        WatermarkImage::new(raster, settings, OP)
    }

    /// Build a watermark from a data URL or an image file.
    pub fn create_image_watermark(&self, source: &str, options: &ImageOptions) -> Result<WatermarkImage> {
        const OP: Operation = Operation::CreateImageWatermark;
        let opacity = options.opacity.unwrap_or(self.config.default_opacity);
        check_opacity(opacity, OP)?;
        if options.max_width == Some(0) || options.max_height == Some(0) {
            return Err(InksealError::invalid(OP, "size constraints must be positive"));
        }

        let asset = if source.starts_with("data:") {
            OverlayAsset::from_data_url(source, OP)?
        } else {
            OverlayAsset::from_path(Path::new(source), OP)?
        };
        let fitted = fit_within(asset.image(), options.max_width, options.max_height);
        let faded = adjust_opacity(&fitted, opacity);
        let raster = rotate_expand(&faded, options.rotation);
        debug!(
            "Image watermark {}x{} -> {}x{}",
            asset.width(),
            asset.height(),
            raster.width(),
            raster.height()
        );

        WatermarkImage::new(
            raster,
            WatermarkSettings::Image {
                opacity,
                rotation: options.rotation,
            },
            OP,
        )
    }

    /// Repeat a faint 45 degree text watermark on a `tile_spacing` grid over
    /// a transparent `canvas` (width, height).
    pub fn create_tiled_watermark(&self, text: &str, tile_spacing: u32, canvas: (u32, u32)) -> Result<WatermarkImage> {
        const OP: Operation = Operation::CreateTiledWatermark;
        if tile_spacing == 0 {
            return Err(InksealError::invalid(OP, "tile spacing must be positive"));
        }
        if canvas.0 == 0 || canvas.1 == 0 {
            return Err(InksealError::invalid(OP, "canvas must not be empty"));
        }

        let tile_options = TextOptions {
            opacity: Some(TILE_OPACITY),
            rotation: TILE_ROTATION,
            ..TextOptions::default()
        };
        let tile = self.render(text, &self.text_settings(text, &tile_options), OP)?;

        let mut raster = RgbaImage::new(canvas.0, canvas.1);
        for y in (0..canvas.1).step_by(tile_spacing as usize) {
            for x in (0..canvas.0).step_by(tile_spacing as usize) {
                paste_masked(&mut raster, &tile, i64::from(x), i64::from(y));
            }
        }
        info!(
            "Created tiled watermark {}x{} from {}x{} tile",
            canvas.0,
            canvas.1,
            tile.width(),
            tile.height()
        );

        WatermarkImage::new(
            raster,
            WatermarkSettings::Tiled {
                text: text.to_string(),
                tile_spacing,
                opacity: TILE_OPACITY,
                rotation: TILE_ROTATION,
            },
            OP,
        )
    }

    fn text_settings(&self, text: &str, options: &TextOptions) -> WatermarkSettings {
        WatermarkSettings::Text {
            text: text.to_string(),
            font_size: options.font_size.unwrap_or(self.config.default_font_size),
            color: options
                .color
                .clone()
                .unwrap_or_else(|| self.config.default_color.clone()),
            opacity: options.opacity.unwrap_or(self.config.default_opacity),
            rotation: options.rotation,
        }
    }

    fn render(&self, text: &str, settings: &WatermarkSettings, operation: Operation) -> Result<RgbaImage> {
        let WatermarkSettings::Text {
            font_size,
            color,
            opacity,
            rotation,
            ..
        } = settings
        else {
            return Err(InksealError::invalid(operation, "text settings expected"));
        };
        check_opacity(*opacity, operation)?;
        if !(font_size.is_finite() && *font_size > 0.0) {
            return Err(InksealError::invalid(operation, format!("font size {} must be positive", font_size)));
        }

        let rgb = parse_hex_color(color, operation)?;
        let font = load_font(self.config.font_path.as_deref(), operation)?;
        let alpha = (255.0 * opacity).round() as u8;
        let rendered = render_text(&font, text, *font_size, rgb, alpha, self.config.padding);
        Ok(rotate_expand(&rendered, *rotation))
    }
}

impl Default for WatermarkCreator {
    fn default() -> Self {
        Self::new(WatermarkConfig::default())
    }
}

fn check_opacity(opacity: f32, operation: Operation) -> Result<()> {
    if (0.0..=1.0).contains(&opacity) {
        Ok(())
    } else {
        Err(InksealError::invalid(
            operation,
            format!("opacity {} outside 0.0..=1.0", opacity),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use pretty_assertions::assert_eq;

    fn creator_with_font() -> Option<WatermarkCreator> {
        let font_path = find_system_font()?;
        Some(WatermarkCreator::new(WatermarkConfig {
            font_path: Some(font_path),
            ..WatermarkConfig::default()
        }))
    }

    fn logo_data_url() -> String {
        let logo = RgbaImage::from_pixel(400, 200, Rgba([0, 128, 255, 255]));
        codec::png_data_url(&logo, Operation::CreateImageWatermark).unwrap()
    }

    #[test]
    fn test_image_watermark_constraints_and_opacity() {
        let options = ImageOptions {
            opacity: Some(0.5),
            max_width: Some(100),
            ..ImageOptions::default()
        };
        let wm = WatermarkCreator::default()
            .create_image_watermark(&logo_data_url(), &options)
            .unwrap();

        assert_eq!((wm.width, wm.height), (100, 50));
        assert_eq!(wm.raster.get_pixel(50, 25)[3], 127);
        assert!(wm.image.starts_with("data:image/png;base64,"));

        let decoded = codec::decode_image(&wm.image, Operation::CreateImageWatermark).unwrap();
        assert_eq!(decoded.to_rgba8(), wm.raster);

        let json = serde_json::to_value(&wm).unwrap();
        assert_eq!(json["settings"]["type"], "image");
        assert!(json.get("raster").is_none());
    }

    #[test]
    fn test_image_watermark_from_path_rotated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.png");
        RgbaImage::from_pixel(40, 20, Rgba([0, 0, 0, 255]))
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();

        let options = ImageOptions {
            rotation: 90.0,
            ..ImageOptions::default()
        };
        let wm = WatermarkCreator::default()
            .create_image_watermark(path.to_str().unwrap(), &options)
            .unwrap();
        assert_eq!((wm.width, wm.height), (20, 40));
    }

    #[test]
    fn test_image_watermark_missing_file() {
        let err = WatermarkCreator::default()
            .create_image_watermark("/no/such/logo.png", &ImageOptions::default())
            .unwrap_err();
        assert!(matches!(err, InksealError::NotFound { .. }));
    }

    #[test]
    fn test_bad_opacity_rejected() {
        let options = ImageOptions {
            opacity: Some(1.5),
            ..ImageOptions::default()
        };
        let err = WatermarkCreator::default()
            .create_image_watermark(&logo_data_url(), &options)
            .unwrap_err();
        assert!(matches!(err, InksealError::Invalid { .. }));
    }

    #[test]
    fn test_invalid_color_is_decode_error() {
        // color is parsed before any font is needed
        let options = TextOptions {
            color: Some("#XYZXYZ".to_string()),
            ..TextOptions::default()
        };
        let err = WatermarkCreator::default()
            .create_text_watermark("DRAFT", &options)
            .unwrap_err();
        assert!(matches!(err, InksealError::Decode { operation: Operation::CreateTextWatermark, .. }));
    }

    #[test]
    fn test_text_watermark_alpha_and_settings() {
        let Some(creator) = creator_with_font() else {
            return;
        };
        let options = TextOptions {
            color: Some("#FF0000".to_string()),
            opacity: Some(0.5),
            ..TextOptions::default()
        };
        let wm = creator.create_text_watermark("CONFIDENTIAL", &options).unwrap();

        assert!(wm.width > wm.height);
        assert!(wm.raster.pixels().all(|p| p[3] <= 128));
        assert!(wm.raster.pixels().any(|p| p[3] == 128 && p[0] == 255));
        assert_eq!(
            wm.settings,
            WatermarkSettings::Text {
                text: "CONFIDENTIAL".to_string(),
                font_size: 48.0,
                color: "#FF0000".to_string(),
                opacity: 0.5,
                rotation: 0.0,
            }
        );
    }

    #[test]
    fn test_rotated_text_watermark_expands() {
        let Some(creator) = creator_with_font() else {
            return;
        };
        let flat = creator.create_text_watermark("VOID", &TextOptions::default()).unwrap();
        let rotated = creator
            .create_text_watermark(
                "VOID",
                &TextOptions {
                    rotation: 90.0,
                    ..TextOptions::default()
                },
            )
            .unwrap();
        assert_eq!((rotated.width, rotated.height), (flat.height, flat.width));
    }

    #[test]
    fn test_tiled_watermark() {
        let Some(creator) = creator_with_font() else {
            return;
        };
        let wm = creator.create_tiled_watermark("COPY", 200, (600, 400)).unwrap();
        assert_eq!((wm.width, wm.height), (600, 400));
        assert!(wm.raster.pixels().any(|p| p[3] > 0));
        // faint: 0.1 opacity pasted through its own alpha
        assert!(wm.raster.pixels().all(|p| p[3] <= 26));
    }

    #[test]
    fn test_tiled_zero_spacing() {
        let err = WatermarkCreator::default()
            .create_tiled_watermark("COPY", 0, (100, 100))
            .unwrap_err();
        assert!(matches!(err, InksealError::Invalid { .. }));
    }
}
