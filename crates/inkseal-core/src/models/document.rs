//! Document kinds and read-only inspection snapshots.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{InksealError, Operation, Result};

/// Supported target document kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Single-page bitmap (PNG, JPEG).
    Raster,
    /// Multi-page PDF.
    Pdf,
}

impl DocumentKind {
    /// Resolve the kind from a path's extension (case-insensitive).
    pub fn from_path(path: &Path, operation: Operation) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match extension.as_str() {
            "pdf" => Ok(DocumentKind::Pdf),
            "png" | "jpg" | "jpeg" => Ok(DocumentKind::Raster),
            _ => Err(InksealError::UnsupportedFormat {
                operation,
                extension,
            }),
        }
    }

    /// File extension used for generated output of this kind.
    pub fn output_extension(&self) -> &'static str {
        match self {
            DocumentKind::Raster => "png",
            DocumentKind::Pdf => "pdf",
        }
    }
}

/// Inspection snapshot of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDescriptor {
    /// Document kind.
    pub kind: DocumentKind,
    /// Number of pages (1 for rasters).
    pub page_count: u32,
    /// Width of the first (or only) page, pixels or points.
    pub width: f64,
    /// Height of the first (or only) page, pixels or points.
    pub height: f64,
    /// File size in bytes.
    pub byte_size: u64,
    /// Decoded raster format name (rasters only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}
