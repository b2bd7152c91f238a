//! Saliency-model inference for background removal.
//!
//! The signature pipeline talks to U^2-Net (`u2net`, `u2netp`) only through
//! [`InferenceBackend`]; [`OrtBackend`] implements it on ONNX Runtime when
//! the `native` feature is on.

mod backend;
mod error;
mod tensor;

pub use backend::{InferenceBackend, DEFAULT_INPUT_NAME};
pub use error::InferenceError;
pub use tensor::{InputTensor, OutputTensor};

#[cfg(feature = "native")]
pub use backend::ort::OrtBackend;

pub type Result<T> = std::result::Result<T, InferenceError>;
