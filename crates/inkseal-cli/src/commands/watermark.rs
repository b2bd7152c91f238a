//! Watermark command - render text, image and tiled watermarks.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use console::style;

use inkseal_core::signature::save_base64_image;
use inkseal_core::watermark::{ImageOptions, TextOptions, WatermarkCreator, WatermarkImage};

use super::load_config;

/// Arguments for the watermark command.
#[derive(Args)]
pub struct WatermarkArgs {
    #[command(subcommand)]
    command: WatermarkCommand,

    /// Output PNG
    #[arg(short, long, global = true, default_value = "watermark.png")]
    output: PathBuf,

    /// Print the watermark (settings and data URL) as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum WatermarkCommand {
    /// Render text
    Text {
        /// Watermark text
        text: String,

        /// Font size in pixels
        #[arg(short = 's', long)]
        font_size: Option<f32>,

        /// Hex color, e.g. "#FF0000"
        #[arg(long)]
        color: Option<String>,

        /// Opacity (0.0 - 1.0)
        #[arg(long)]
        opacity: Option<f32>,

        /// Counter-clockwise rotation in degrees
        #[arg(short, long, default_value = "0")]
        rotation: f32,
    },

    /// Use an image such as a logo
    Image {
        /// Image file or data URL
        source: String,

        /// Opacity (0.0 - 1.0)
        #[arg(long)]
        opacity: Option<f32>,

        /// Counter-clockwise rotation in degrees
        #[arg(short, long, default_value = "0")]
        rotation: f32,

        /// Maximum width in pixels
        #[arg(long)]
        max_width: Option<u32>,

        /// Maximum height in pixels
        #[arg(long)]
        max_height: Option<u32>,
    },

    /// Repeat faint diagonal text over a large canvas
    Tiled {
        /// Watermark text
        text: String,

        /// Distance between tiles in pixels
        #[arg(long, default_value = "200")]
        spacing: u32,

        /// Canvas width in pixels
        #[arg(long, default_value = "2000")]
        width: u32,

        /// Canvas height in pixels
        #[arg(long, default_value = "2000")]
        height: u32,
    },
}

pub async fn run(args: WatermarkArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let creator = WatermarkCreator::new(config.watermark);

    let watermark: WatermarkImage = match args.command {
        WatermarkCommand::Text {
            text,
            font_size,
            color,
            opacity,
            rotation,
        } => creator.create_text_watermark(
            &text,
            &TextOptions {
                font_size,
                color,
                opacity,
                rotation,
            },
        )?,
        WatermarkCommand::Image {
            source,
            opacity,
            rotation,
            max_width,
            max_height,
        } => creator.create_image_watermark(
            &source,
            &ImageOptions {
                opacity,
                rotation,
                max_width,
                max_height,
            },
        )?,
        WatermarkCommand::Tiled {
            text,
            spacing,
            width,
            height,
        } => creator.create_tiled_watermark(&text, spacing, (width, height))?,
    };

    save_base64_image(&watermark.image, &args.output)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&watermark)?);
    } else {
        println!(
            "{} Watermark {}x{} written to {}",
            style("✓").green(),
            watermark.width,
            watermark.height,
            args.output.display()
        );
    }
    Ok(())
}
