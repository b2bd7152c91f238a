//! Batch command - stamp the same overlay onto many documents.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use inkseal_core::overlay::{BatchResult, OverlayCompositor};
use inkseal_core::scratch::ScratchSpace;

use super::apply::PlacementArgs;
use super::{deliver, load_config, read_overlay};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern matching the documents, e.g. "contracts/*.pdf"
    #[arg(required = true)]
    input: String,

    #[command(flatten)]
    placement: PlacementArgs,

    /// Directory receiving `<name>_stamped.<ext>` outputs
    #[arg(short = 'd', long)]
    output_dir: Option<PathBuf>,

    /// Write a CSV summary to this path
    #[arg(long)]
    summary: Option<PathBuf>,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
            matches!(ext.to_lowercase().as_str(), "pdf" | "png" | "jpg" | "jpeg")
        })
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to stamp",
        style("ℹ").blue(),
        files.len()
    );

    let scratch = match &args.output_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            ScratchSpace::in_dir(dir)
        }
        None => ScratchSpace::from_config(&config.output),
    };
    let compositor = OverlayCompositor::new(scratch);
    let overlay = read_overlay(&args.placement.overlay)?;
    let placement = args.placement.placement();

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );

    let mut results = compositor.batch_apply_overlay_with(&files, &overlay, &placement, |result| {
        debug!("{}: {}", result.document_id, if result.success { "ok" } else { "failed" });
        pb.inc(1);
    });
    pb.finish_with_message("Complete");

    if let Some(dir) = &args.output_dir {
        for (result, source) in results.iter_mut().zip(&files) {
            if let Some(generated) = result.output_path.take() {
                let target = dir.join(stamped_name(source, &generated));
                result.output_path = Some(deliver(&generated, &target)?);
            }
        }
    }

    if let Some(summary_path) = &args.summary {
        write_summary(summary_path, &results)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let failed: Vec<&BatchResult> = results.iter().filter(|r| !r.success).collect();
    println!();
    println!(
        "{} Stamped {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed",
        style(results.len() - failed.len()).green(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for result in &failed {
            println!(
                "  - {}: {}",
                result.document_id,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

/// `<source stem>_stamped.<generated extension>`
fn stamped_name(source: &Path, generated: &Path) -> String {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    let ext = generated
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("pdf");
    format!("{}_stamped.{}", stem, ext)
}

fn write_summary(path: &Path, results: &[BatchResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["document", "status", "output", "error"])?;

    for result in results {
        let output = result
            .output_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        wtr.write_record([
            result.document_id.as_str(),
            if result.success { "success" } else { "failed" },
            output.as_str(),
            result.error.as_deref().unwrap_or(""),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamped_name_uses_generated_extension() {
        let name = stamped_name(Path::new("/in/scan.jpg"), Path::new("/tmp/output_abc.png"));
        assert_eq!(name, "scan_stamped.png");
    }
}
