//! Page commands - merge, split, inspect and preview documents.

use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use clap::Args;
use console::style;

use inkseal_core::codec;
use inkseal_core::error::Operation;
use inkseal_core::overlay::OverlayCompositor;
use inkseal_core::pdf::PageOps;
use inkseal_core::scratch::ScratchSpace;

use super::{deliver, format_size, load_config};

/// Arguments for the merge command.
#[derive(Args)]
pub struct MergeArgs {
    /// PDFs to concatenate, in order
    #[arg(required = true, num_args = 1..)]
    inputs: Vec<PathBuf>,

    /// Output PDF
    #[arg(short, long, required = true)]
    output: PathBuf,
}

/// Arguments for the split command.
#[derive(Args)]
pub struct SplitArgs {
    /// PDF to split
    #[arg(required = true)]
    input: PathBuf,

    /// Inclusive 1-based page range such as "1-3" or "4"; repeatable
    #[arg(short, long = "range", required = true)]
    ranges: Vec<PageRange>,

    /// Output directory
    #[arg(short = 'd', long, default_value = ".")]
    output_dir: PathBuf,
}

/// Arguments for the info command.
#[derive(Args)]
pub struct InfoArgs {
    /// Document (PDF, PNG, JPEG)
    #[arg(required = true)]
    input: PathBuf,

    /// Print as JSON
    #[arg(long)]
    json: bool,
}

/// Arguments for the preview command.
#[derive(Args)]
pub struct PreviewArgs {
    /// PDF to preview
    #[arg(required = true)]
    input: PathBuf,

    /// Directory receiving `page_<n>.png`
    #[arg(short = 'd', long, default_value = ".")]
    output_dir: PathBuf,
}

/// `start-end` or a single page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange(pub u32, pub u32);

impl FromStr for PageRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |v: &str| {
            v.trim()
                .parse::<u32>()
                .map_err(|_| format!("invalid page range: '{}'", s))
        };
        match s.split_once('-') {
            Some((start, end)) => Ok(PageRange(parse(start)?, parse(end)?)),
            None => {
                let page = parse(s)?;
                Ok(PageRange(page, page))
            }
        }
    }
}

fn page_ops(config_path: Option<&str>) -> anyhow::Result<PageOps> {
    let config = load_config(config_path)?;
    Ok(PageOps::new(ScratchSpace::from_config(&config.output)))
}

pub async fn run_merge(args: MergeArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let generated = page_ops(config_path)?.merge_documents(&args.inputs)?;
    let output = deliver(&generated, &args.output)?;
    println!(
        "{} Merged {} documents into {}",
        style("✓").green(),
        args.inputs.len(),
        output.display()
    );
    Ok(())
}

pub async fn run_split(args: SplitArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let ranges: Vec<(u32, u32)> = args.ranges.iter().map(|r| (r.0, r.1)).collect();
    let parts = page_ops(config_path)?.split_document(&args.input, &ranges)?;

    let stem = args
        .input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    for (part, range) in parts.iter().zip(&args.ranges) {
        let target = args
            .output_dir
            .join(format!("{}_pages_{}-{}.pdf", stem, range.0, range.1));
        let written = deliver(part, &target)?;
        println!("{} {}", style("✓").green(), written.display());
    }
    Ok(())
}

pub async fn run_info(args: InfoArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let info = OverlayCompositor::new(ScratchSpace::from_config(&config.output)).inspect(&args.input)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("{}", style(args.input.display()).bold());
    println!("  Kind:   {:?}", info.kind);
    if let Some(format) = &info.format {
        println!("  Format: {}", format);
    }
    println!("  Pages:  {}", info.page_count);
    println!("  Size:   {} x {}", info.width, info.height);
    println!("  Bytes:  {}", format_size(info.byte_size));
    Ok(())
}

pub async fn run_preview(args: PreviewArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let previews = page_ops(config_path)?.preview_pages(&args.input)?;
    if previews.is_empty() {
        println!(
            "{} No embedded raster content found in {}",
            style("ℹ").blue(),
            args.input.display()
        );
        return Ok(());
    }

    fs::create_dir_all(&args.output_dir)?;
    for preview in &previews {
        let bytes = codec::decode_base64(&preview.data_url, Operation::PreviewPages)?;
        let path = args.output_dir.join(format!("page_{}.png", preview.page));
        fs::write(&path, bytes).with_context(|| format!("cannot write {}", path.display()))?;
        println!("{} {}", style("✓").green(), path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_range_parsing() {
        assert_eq!("1-3".parse::<PageRange>().unwrap(), PageRange(1, 3));
        assert_eq!(" 4 ".parse::<PageRange>().unwrap(), PageRange(4, 4));
        assert!("a-b".parse::<PageRange>().is_err());
        assert!("".parse::<PageRange>().is_err());
    }
}
