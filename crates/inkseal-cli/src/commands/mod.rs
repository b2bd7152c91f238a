//! CLI command implementations.

pub mod apply;
pub mod batch;
pub mod config;
pub mod models;
pub mod pages;
pub mod signature;
pub mod watermark;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use inkseal_core::models::InksealConfig;

/// Load `--config`, else the default config file, else built-in defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<InksealConfig> {
    if let Some(path) = config_path {
        return Ok(InksealConfig::from_file(Path::new(path))?);
    }
    let default = config::default_config_path();
    if default.exists() {
        debug!("Using config {}", default.display());
        Ok(InksealConfig::from_file(&default)?)
    } else {
        Ok(InksealConfig::default())
    }
}

/// Move a generated file to `destination`, creating parent directories.
///
/// Falls back to copy-and-delete when a rename crosses filesystems.
pub fn deliver(generated: &Path, destination: &Path) -> anyhow::Result<PathBuf> {
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    if fs::rename(generated, destination).is_err() {
        copy_into_place(generated, destination)?;
        fs::remove_file(generated)
            .with_context(|| format!("cannot remove {}", generated.display()))?;
    }
    Ok(destination.to_path_buf())
}

/// Copy `source` next to `destination` and rename it over the target, so a
/// failed copy never leaves a truncated `destination` behind.
fn copy_into_place(source: &Path, destination: &Path) -> anyhow::Result<()> {
    let name = destination
        .file_name()
        .with_context(|| format!("{} is not a file path", destination.display()))?;
    let partial = destination.with_file_name(format!(".{}.part", name.to_string_lossy()));

    let copied = fs::copy(source, &partial)
        .with_context(|| format!("cannot write {}", destination.display()))
        .and_then(|_| {
            fs::rename(&partial, destination)
                .with_context(|| format!("cannot write {}", destination.display()))
        });
    if copied.is_err() {
        let _ = fs::remove_file(&partial);
    }
    copied
}

/// Overlay argument: a `data:` URL or an image file.
pub fn read_overlay(value: &str) -> anyhow::Result<String> {
    if value.starts_with("data:") {
        return Ok(value.to_string());
    }
    let path = Path::new(value);
    let bytes = fs::read(path).with_context(|| format!("cannot read overlay {}", path.display()))?;
    let mime = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "image/png",
    };
    Ok(inkseal_core::codec::to_data_url(mime, &bytes))
}

pub fn format_size(bytes: u64) -> String {
    if bytes >= 1_000_000_000 {
        format!("{:.1}GB", bytes as f64 / 1_000_000_000.0)
    } else if bytes >= 1_000_000 {
        format!("{:.1}MB", bytes as f64 / 1_000_000.0)
    } else if bytes >= 1_000 {
        format!("{:.1}KB", bytes as f64 / 1_000.0)
    } else {
        format!("{}B", bytes)
    }
}
