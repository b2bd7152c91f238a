//! Inference backend implementations.

#[cfg(feature = "native")]
pub mod ort;

use crate::{InputTensor, OutputTensor, Result};

/// Input name used when a backend does not report one (U^2-Net exports).
pub const DEFAULT_INPUT_NAME: &str = "input.1";

/// Runs a saliency model: one image tensor in, named maps out.
pub trait InferenceBackend: Send + Sync {
    fn run(&self, inputs: &[(&str, InputTensor)]) -> Result<Vec<(String, OutputTensor)>>;

    fn input_names(&self) -> &[String];

    fn output_names(&self) -> &[String];

    /// Name to bind the image tensor to.
    fn primary_input(&self) -> &str {
        self.input_names()
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_INPUT_NAME)
    }
}
