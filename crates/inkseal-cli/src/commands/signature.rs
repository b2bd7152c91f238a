//! Signature command - digitize a photographed or scanned signature.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use tracing::{debug, info};

use inkseal_core::signature::{create_pipeline, save_base64_image, SignatureOptions};

use super::load_config;

/// Arguments for the signature command.
#[derive(Args)]
pub struct SignatureArgs {
    /// Signature photo or scan (PNG, JPEG)
    #[arg(required = true)]
    input: PathBuf,

    /// Transparent PNG output (default: <input>_signature.png)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write a JPEG flattened onto white
    #[arg(long)]
    jpg: Option<PathBuf>,

    /// Keep the full frame instead of cropping to the signature
    #[arg(long)]
    no_crop: bool,

    /// Skip noise reduction and contrast/sharpness enhancement
    #[arg(long)]
    no_enhance: bool,

    /// Print the result (sizes and data URLs) as JSON
    #[arg(long)]
    json: bool,
}

pub async fn run(args: SignatureArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;
    let pipeline = create_pipeline(&config)?;

    let mut options = SignatureOptions::from(&config.signature);
    if args.no_crop {
        options.auto_crop = false;
    }
    if args.no_enhance {
        options.enhance = false;
    }

    info!(
        "Digitizing {} with {} (crop: {}, enhance: {})",
        args.input.display(),
        pipeline.segmenter_name(),
        options.auto_crop,
        options.enhance
    );
    let result = pipeline.process_path(&args.input, options)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    let png_path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(&args.input));
    save_base64_image(&result.formats.png, &png_path)?;
    if let Some(jpg_path) = &args.jpg {
        save_base64_image(&result.formats.jpg, jpg_path)?;
    }

    if !args.json {
        println!(
            "{} Signature {}x{} -> {}x{} written to {}",
            style("✓").green(),
            result.original_size.width,
            result.original_size.height,
            result.processed_size.width,
            result.processed_size.height,
            png_path.display()
        );
        if let Some(jpg_path) = &args.jpg {
            println!("{} JPEG written to {}", style("✓").green(), jpg_path.display());
        }
    }

    debug!("Signature processed in {:?}", start.elapsed());
    Ok(())
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("signature");
    input.with_file_name(format!("{}_signature.png", stem))
}
