//! Tensors exchanged with segmentation backends.

use ndarray::{ArrayD, IxDyn};

use crate::error::InferenceError;

/// Planar f32 image batch fed to a model, `[n, c, h, w]`.
#[derive(Debug, Clone)]
pub struct InputTensor(ArrayD<f32>);

impl InputTensor {
    /// Wrap `data` laid out as `shape`; the length must match exactly.
    pub fn from_f32(data: Vec<f32>, shape: &[usize]) -> Result<Self, InferenceError> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(InferenceError::ShapeMismatch {
                shape: shape.to_vec(),
                expected,
                actual: data.len(),
            });
        }
        ArrayD::from_shape_vec(IxDyn(shape), data)
            .map(Self)
            .map_err(|e| InferenceError::Run(e.to_string()))
    }

    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    pub fn as_array(&self) -> &ArrayD<f32> {
        &self.0
    }
}

/// Saliency map returned by a model. Quantized models emit `u8`.
#[derive(Debug, Clone)]
pub enum OutputTensor {
    Float32(ArrayD<f32>),
    Uint8(ArrayD<u8>),
}

impl OutputTensor {
    pub fn shape(&self) -> &[usize] {
        match self {
            OutputTensor::Float32(arr) => arr.shape(),
            OutputTensor::Uint8(arr) => arr.shape(),
        }
    }

    /// Values as `f32`; `u8` maps are scaled to `[0, 1]`.
    pub fn into_f32(self) -> ArrayD<f32> {
        match self {
            OutputTensor::Float32(arr) => arr,
            OutputTensor::Uint8(arr) => arr.mapv(|v| f32::from(v) / 255.0),
        }
    }
}
