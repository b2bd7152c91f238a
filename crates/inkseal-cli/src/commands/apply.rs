//! Apply command - stamp an overlay onto one image or PDF.

use std::path::PathBuf;

use clap::Args;
use console::style;
use tracing::info;

use inkseal_core::models::{PageSelection, PlacementSpec};
use inkseal_core::overlay::OverlayCompositor;
use inkseal_core::scratch::ScratchSpace;

use super::{deliver, load_config, read_overlay};

/// Where the overlay goes; shared with the batch command.
#[derive(Args, Clone)]
pub struct PlacementArgs {
    /// Overlay image file (PNG, JPEG) or data URL
    #[arg(long, required = true)]
    pub overlay: String,

    /// Left edge (pixels for images, points for PDF pages)
    #[arg(short, long, default_value = "0", allow_negative_numbers = true)]
    pub x: f64,

    /// Top edge, measured from the top of the page
    #[arg(short, long, default_value = "0", allow_negative_numbers = true)]
    pub y: f64,

    /// Drawn width
    #[arg(short = 'W', long)]
    pub width: f64,

    /// Drawn height
    #[arg(short = 'H', long)]
    pub height: f64,

    /// Pages to stamp: "all" or a list such as "1,3"
    #[arg(short, long, default_value = "all")]
    pub pages: PageSelection,
}

impl PlacementArgs {
    pub fn placement(&self) -> PlacementSpec {
        PlacementSpec::new(self.x, self.y, self.width, self.height).with_pages(self.pages.clone())
    }
}

/// Arguments for the apply command.
#[derive(Args)]
pub struct ApplyArgs {
    /// Target document (PDF, PNG, JPEG)
    #[arg(required = true)]
    document: PathBuf,

    #[command(flatten)]
    placement: PlacementArgs,

    /// Output file (default: a new file in the scratch directory)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

pub async fn run(args: ApplyArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let compositor = OverlayCompositor::new(ScratchSpace::from_config(&config.output));

    let overlay = read_overlay(&args.placement.overlay)?;
    let placement = args.placement.placement();
    info!("Stamping {} onto {}", args.placement.overlay, args.document.display());

    let generated = compositor.apply_overlay(&args.document, &overlay, &placement)?;
    let output = match &args.output {
        Some(path) => deliver(&generated, path)?,
        None => generated,
    };

    println!("{} Output written to {}", style("✓").green(), output.display());
    Ok(())
}
