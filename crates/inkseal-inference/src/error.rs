use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or running a segmentation model.
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("model file not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    /// The runtime rejected the model or its session options.
    #[error("cannot open model: {0}")]
    Session(String),

    #[error("tensor shape {shape:?} needs {expected} values, got {actual}")]
    ShapeMismatch {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    #[error("model run failed: {0}")]
    Run(String),

    /// Output element type other than f32 or u8.
    #[error("output '{0}' has an unsupported element type")]
    UnsupportedOutput(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
