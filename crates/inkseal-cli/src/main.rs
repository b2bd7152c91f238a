//! CLI application for digitizing signatures and stamping images and PDFs.

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{apply, batch, config, models, pages, signature, watermark};

/// inkseal - Digitize signatures, build watermarks and stamp them onto documents
#[derive(Parser)]
#[command(name = "inkseal")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Turn a signature photo into a transparent PNG
    Signature(signature::SignatureArgs),

    /// Render a text, image or tiled watermark
    Watermark(watermark::WatermarkArgs),

    /// Stamp an overlay onto one image or PDF
    Apply(apply::ApplyArgs),

    /// Stamp an overlay onto many documents
    Batch(batch::BatchArgs),

    /// Concatenate PDFs
    Merge(pages::MergeArgs),

    /// Extract page ranges into separate PDFs
    Split(pages::SplitArgs),

    /// Describe a document
    Info(pages::InfoArgs),

    /// Export the embedded image of each PDF page as PNG
    Preview(pages::PreviewArgs),

    /// Manage segmentation models
    Models(models::ModelsArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Signature(args) => signature::run(args, config_path).await,
        Commands::Watermark(args) => watermark::run(args, config_path).await,
        Commands::Apply(args) => apply::run(args, config_path).await,
        Commands::Batch(args) => batch::run(args, config_path).await,
        Commands::Merge(args) => pages::run_merge(args, config_path).await,
        Commands::Split(args) => pages::run_split(args, config_path).await,
        Commands::Info(args) => pages::run_info(args, config_path).await,
        Commands::Preview(args) => pages::run_preview(args, config_path).await,
        Commands::Models(args) => models::run(args, config_path).await,
        Commands::Config(args) => config::run(args, config_path).await,
    }
}
