//! ONNX Runtime backend (XNNPACK execution provider).

use std::path::Path;
use std::sync::Mutex;

use ndarray::{ArrayD, IxDyn};
use ort::ep::XNNPACK;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::{Session, SessionInputValue};
use ort::value::{DynValue, Tensor};
use tracing::{debug, info};

use crate::error::InferenceError;
use crate::tensor::{InputTensor, OutputTensor};
use crate::{InferenceBackend, Result};

fn session_error(e: impl std::fmt::Display) -> InferenceError {
    InferenceError::Session(e.to_string())
}

/// U^2-Net session. Calls are serialized through the mutex.
pub struct OrtBackend {
    session: Mutex<Session>,
    input_names: Vec<String>,
    output_names: Vec<String>,
}

impl OrtBackend {
    /// Open a `.onnx` file with `threads` intra-op threads.
    pub fn from_file<P: AsRef<Path>>(path: P, threads: usize) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(InferenceError::ModelNotFound(path.to_path_buf()));
        }
        info!("Opening segmentation model {}", path.display());
        Self::from_bytes(&std::fs::read(path)?, threads)
    }

    pub fn from_bytes(bytes: &[u8], threads: usize) -> Result<Self> {
        let session = Session::builder()
            .map_err(session_error)?
            .with_execution_providers([XNNPACK::default().build()])
            .map_err(session_error)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(session_error)?
            .with_intra_threads(threads.max(1))
            .map_err(session_error)?
            .commit_from_memory(bytes)
            .map_err(session_error)?;

        let input_names: Vec<String> = session.inputs().iter().map(|i| i.name().to_string()).collect();
        let output_names: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();
        debug!(
            "Model ready ({} bytes): inputs {:?}, outputs {:?}",
            bytes.len(),
            input_names,
            output_names
        );

        Ok(Self {
            session: Mutex::new(session),
            input_names,
            output_names,
        })
    }
}

fn to_ort(tensor: &InputTensor) -> Result<SessionInputValue<'static>> {
    let shape: Vec<i64> = tensor.shape().iter().map(|&s| s as i64).collect();
    let data: Vec<f32> = tensor.as_array().iter().copied().collect();
    Tensor::from_array((shape, data))
        .map(Into::into)
        .map_err(|e| InferenceError::Run(e.to_string()))
}

fn from_ort(name: &str, value: &DynValue) -> Result<OutputTensor> {
    fn array<T: Clone>(shape: Vec<usize>, data: &[T]) -> Result<ArrayD<T>> {
        ArrayD::from_shape_vec(IxDyn(&shape), data.to_vec())
            .map_err(|e| InferenceError::Run(e.to_string()))
    }

    if let Ok((shape, data)) = value.try_extract_tensor::<f32>() {
        let dims = shape.iter().map(|&s| s as usize).collect();
        return array(dims, data).map(OutputTensor::Float32);
    }
    if let Ok((shape, data)) = value.try_extract_tensor::<u8>() {
        let dims = shape.iter().map(|&s| s as usize).collect();
        return array(dims, data).map(OutputTensor::Uint8);
    }
    Err(InferenceError::UnsupportedOutput(name.to_string()))
}

impl InferenceBackend for OrtBackend {
    fn run(&self, inputs: &[(&str, InputTensor)]) -> Result<Vec<(String, OutputTensor)>> {
        let feeds = inputs
            .iter()
            .map(|(name, tensor)| Ok((*name, to_ort(tensor)?)))
            .collect::<Result<Vec<_>>>()?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| InferenceError::Run(format!("session poisoned: {}", e)))?;
        let outputs = session
            .run(feeds)
            .map_err(|e| InferenceError::Run(e.to_string()))?;

        outputs
            .iter()
            .map(|(name, value)| Ok((name.to_string(), from_ort(name, &value)?)))
            .collect()
    }

    fn input_names(&self) -> &[String] {
        &self.input_names
    }

    fn output_names(&self) -> &[String] {
        &self.output_names
    }
}
