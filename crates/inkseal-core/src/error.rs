//! Error types for the inkseal-core library.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Public operations, named in every error they produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ProcessSignature,
    SaveBase64Image,
    CreateTextWatermark,
    CreateImageWatermark,
    CreateTiledWatermark,
    ApplyOverlay,
    MergeDocuments,
    SplitDocument,
    Inspect,
    PreviewPages,
    ResizeImage,
}

impl Operation {
    /// Stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::ProcessSignature => "process_signature",
            Operation::SaveBase64Image => "save_base64_image",
            Operation::CreateTextWatermark => "create_text_watermark",
            Operation::CreateImageWatermark => "create_image_watermark",
            Operation::CreateTiledWatermark => "create_tiled_watermark",
            Operation::ApplyOverlay => "apply_overlay",
            Operation::MergeDocuments => "merge_documents",
            Operation::SplitDocument => "split_document",
            Operation::Inspect => "inspect",
            Operation::PreviewPages => "preview_pages",
            Operation::ResizeImage => "resize_image",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for the inkseal library.
#[derive(Error, Debug)]
pub enum InksealError {
    /// Malformed image, base64, PDF or color input.
    #[error("{operation}: failed to decode input: {cause}")]
    Decode { operation: Operation, cause: String },

    /// File extension outside the supported document set.
    #[error("{operation}: unsupported file format: {extension}")]
    UnsupportedFormat {
        operation: Operation,
        extension: String,
    },

    /// A named processing stage failed.
    #[error("{operation}: stage '{stage}' failed: {cause}")]
    Processing {
        operation: Operation,
        stage: &'static str,
        cause: String,
    },

    /// Input document does not exist.
    #[error("{operation}: document not found: {}", path.display())]
    NotFound { operation: Operation, path: PathBuf },

    /// Caller-supplied arguments cannot be honored.
    #[error("{operation}: invalid argument: {reason}")]
    Invalid { operation: Operation, reason: String },

    /// Structural PDF problem.
    #[error("{operation}: PDF error: {source}")]
    Pdf {
        operation: Operation,
        #[source]
        source: PdfError,
    },

    /// Filesystem failure.
    #[error("{operation}: I/O error: {source}")]
    Io {
        operation: Operation,
        #[source]
        source: std::io::Error,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl InksealError {
    pub(crate) fn decode(operation: Operation, cause: impl fmt::Display) -> Self {
        InksealError::Decode {
            operation,
            cause: cause.to_string(),
        }
    }

    pub(crate) fn processing(
        operation: Operation,
        stage: &'static str,
        cause: impl fmt::Display,
    ) -> Self {
        InksealError::Processing {
            operation,
            stage,
            cause: cause.to_string(),
        }
    }

    pub(crate) fn invalid(operation: Operation, reason: impl Into<String>) -> Self {
        InksealError::Invalid {
            operation,
            reason: reason.into(),
        }
    }

    pub(crate) fn io(operation: Operation, source: std::io::Error) -> Self {
        InksealError::Io { operation, source }
    }

    pub(crate) fn pdf(operation: Operation, source: PdfError) -> Self {
        InksealError::Pdf { operation, source }
    }

    /// The operation that failed, if the error is tied to one.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            InksealError::Decode { operation, .. }
            | InksealError::UnsupportedFormat { operation, .. }
            | InksealError::Processing { operation, .. }
            | InksealError::NotFound { operation, .. }
            | InksealError::Invalid { operation, .. }
            | InksealError::Pdf { operation, .. }
            | InksealError::Io { operation, .. } => Some(*operation),
            InksealError::Config(_) => None,
        }
    }
}

/// Errors related to PDF structure.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// The PDF is encrypted with a non-empty password.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Page dictionary, page tree or catalog is malformed.
    #[error("malformed page tree: {0}")]
    PageTree(String),

    /// Page has no usable media box anywhere in its inheritance chain.
    #[error("page {0} has no media box")]
    MissingMediaBox(u32),

    /// Serializing the output document failed.
    #[error("failed to write PDF: {0}")]
    Write(String),
}

/// Result type for the inkseal library.
pub type Result<T> = std::result::Result<T, InksealError>;
