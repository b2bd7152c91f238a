//! Models command - download and manage U^2-Net segmentation models.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand, ValueEnum};
use console::style;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};

use super::{format_size, load_config};

/// Arguments for the models command.
#[derive(Args)]
pub struct ModelsArgs {
    #[command(subcommand)]
    command: ModelsCommand,
}

#[derive(Subcommand)]
enum ModelsCommand {
    /// List available models
    List,

    /// Download a model
    Download(DownloadArgs),

    /// Check which models are present
    Status,

    /// Remove downloaded models
    Clean(CleanArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelVariant {
    /// Full U^2-Net (~176MB), best masks
    U2net,
    /// Small U^2-Net (~4.6MB), fast
    U2netp,
}

impl std::fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.info().name)
    }
}

struct ModelInfo {
    name: &'static str,
    filename: &'static str,
    size_bytes: u64,
    description: &'static str,
    url: &'static str,
}

const VARIANTS: [ModelVariant; 2] = [ModelVariant::U2netp, ModelVariant::U2net];

impl ModelVariant {
    fn info(self) -> ModelInfo {
        match self {
            ModelVariant::U2net => ModelInfo {
                name: "u2net",
                filename: "u2net.onnx",
                size_bytes: 176_000_000,
                description: "U^2-Net salient object segmentation",
                url: "https://github.com/danielgatis/rembg/releases/download/v0.0.0/u2net.onnx",
            },
            ModelVariant::U2netp => ModelInfo {
                name: "u2netp",
                filename: "u2netp.onnx",
                size_bytes: 4_600_000,
                description: "U^2-Net small, salient object segmentation",
                url: "https://github.com/danielgatis/rembg/releases/download/v0.0.0/u2netp.onnx",
            },
        }
    }
}

#[derive(Args)]
struct DownloadArgs {
    /// Model to download
    #[arg(short, long, value_enum, default_value = "u2netp")]
    variant: ModelVariant,

    /// Output directory (default: models.model_dir from the config)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Force re-download even if the file exists
    #[arg(long)]
    force: bool,
}

#[derive(Args)]
struct CleanArgs {
    /// Remove one model only
    #[arg(short, long, value_enum)]
    variant: Option<ModelVariant>,
}

pub async fn run(args: ModelsArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let model_dir = load_config(config_path)?.models.model_dir;
    match args.command {
        ModelsCommand::List => list_models(),
        ModelsCommand::Download(download_args) => {
            let dir = download_args.output.clone().unwrap_or(model_dir);
            download_model(download_args, &dir).await
        }
        ModelsCommand::Status => check_status(&model_dir),
        ModelsCommand::Clean(clean_args) => clean_models(clean_args, &model_dir),
    }
}

fn list_models() -> anyhow::Result<()> {
    println!("{}", style("Available Segmentation Models").bold());
    println!();
    for variant in VARIANTS {
        let info = variant.info();
        println!(
            "{} {:<14} {:>10}  {}",
            style("▸").cyan(),
            info.filename,
            format_size(info.size_bytes),
            style(info.description).dim()
        );
    }
    println!();
    println!("Commands:");
    println!("  inkseal models download -v u2netp      Download the small model");
    println!("  inkseal config set signature.segmenter onnx");
    Ok(())
}

async fn download_model(args: DownloadArgs, output_dir: &Path) -> anyhow::Result<()> {
    let info = args.variant.info();
    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(info.filename);

    if path.exists() && !args.force {
        let size = fs::metadata(&path)?.len();
        if size > info.size_bytes / 2 {
            println!(
                "  {} {} (already exists, {})",
                style("✓").green(),
                info.filename,
                format_size(size)
            );
            return Ok(());
        }
    }

    println!(
        "{} Downloading {} to {}",
        style("ℹ").blue(),
        style(info.name).cyan().bold(),
        output_dir.display()
    );

    let client = reqwest::Client::builder()
        .user_agent(concat!("inkseal-cli/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(600))
        .build()?;

    let pb = ProgressBar::new(info.size_bytes);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {spinner:.green} {msg:<20} [{bar:25.cyan/blue}] {bytes}/{total_bytes}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb.set_message(info.filename.to_string());

    match download_file(&client, info.url, &path, &pb).await {
        Ok(()) => pb.finish_with_message(format!("{} {}", style("✓").green(), info.filename)),
        Err(e) => {
            pb.finish_with_message(format!("{} {} - {}", style("✗").red(), info.filename, e));
            anyhow::bail!("Download of {} failed: {}", info.filename, e);
        }
    }

    println!();
    println!(
        "{} To use it: inkseal config set signature.segmenter onnx && inkseal config set models.segmentation_model {}",
        style("ℹ").blue(),
        info.filename
    );
    Ok(())
}

async fn download_file(
    client: &reqwest::Client,
    url: &str,
    path: &Path,
    pb: &ProgressBar,
) -> anyhow::Result<()> {
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        anyhow::bail!("HTTP {}", response.status());
    }
    if let Some(content_length) = response.content_length() {
        pb.set_length(content_length);
    }

    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)?;
    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)?;
        downloaded += chunk.len() as u64;
        pb.set_position(downloaded);
    }

    file.flush()?;
    drop(file);
    fs::rename(&temp_path, path)?;
    Ok(())
}

fn check_status(model_dir: &Path) -> anyhow::Result<()> {
    println!("{}", style("Model Status").bold());
    println!("Directory: {}", model_dir.display());
    println!();

    for variant in VARIANTS {
        let info = variant.info();
        let path = model_dir.join(info.filename);
        let (status, size_str) = if path.exists() {
            let size = fs::metadata(&path)?.len();
            if size > info.size_bytes / 2 {
                (style("✓").green(), format_size(size))
            } else {
                (style("⚠").yellow(), format!("{} (incomplete?)", format_size(size)))
            }
        } else {
            (style("✗").red(), "missing".to_string())
        };
        println!("    {} {:<14} {:>18}", status, info.filename, size_str);
    }
    Ok(())
}

fn clean_models(args: CleanArgs, model_dir: &Path) -> anyhow::Result<()> {
    let variants: Vec<ModelVariant> = match args.variant {
        Some(v) => vec![v],
        None => VARIANTS.to_vec(),
    };

    let mut removed = 0;
    let mut freed: u64 = 0;
    for variant in variants {
        let info = variant.info();
        for path in [
            model_dir.join(info.filename),
            model_dir.join(info.filename).with_extension("tmp"),
        ] {
            if path.exists() {
                freed += fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                fs::remove_file(&path)?;
                removed += 1;
                println!("  {} Removed {}", style("✓").green(), path.display());
            }
        }
    }

    if removed > 0 {
        println!(
            "{} Removed {} files, freed {}",
            style("✓").green(),
            removed,
            format_size(freed)
        );
    } else {
        println!("{} No model files to remove.", style("ℹ").blue());
    }
    Ok(())
}
