//! Single dense layer runtime over a flat little-endian weight file.
//!
//! Layout: magic `SPDN`, then `side`, `channels`, `outputs` as `u32`,
//! then `outputs * side * side * channels` weights (row per output) and
//! `outputs` biases, all `f32`.

use std::fs;
use std::io;
use std::path::Path;

use ndarray::{Array1, Array2, ArrayView1};
use tracing::info;

use crate::errors::{InferenceError, LoadError};
use crate::runtime::{LoadedModel, ModelRuntime};
use crate::tensor::{InputTensor, TensorSpec};

pub const DENSE_MAGIC: &[u8; 4] = b"SPDN";
const HEADER_LEN: usize = 16;

/// Loads [`DenseModel`]s, applying the configured normalization.
#[derive(Debug, Clone)]
pub struct DenseRuntime {
    mean: f32,
    std: f32,
}

impl DenseRuntime {
    pub fn new(mean: f32, std: f32) -> Self {
        Self { mean, std }
    }

    pub fn parse(&self, bytes: &[u8]) -> Result<DenseModel, LoadError> {
        if bytes.len() < HEADER_LEN || &bytes[..4] != DENSE_MAGIC {
            return Err(LoadError::Corrupt("missing SPDN header".into()));
        }
        let side = read_u32(bytes, 4);
        let channels = read_u32(bytes, 8) as usize;
        let outputs = read_u32(bytes, 12) as usize;

        if side == 0 || channels == 0 || outputs == 0 {
            return Err(LoadError::RuntimeInitFailure(format!(
                "zero dimension (side={side}, channels={channels}, outputs={outputs})"
            )));
        }
        if !matches!(channels, 1 | 3) {
            return Err(LoadError::RuntimeInitFailure(format!(
                "unsupported channel count {channels}"
            )));
        }

        let inputs = (side as usize)
            .checked_mul(side as usize)
            .and_then(|n| n.checked_mul(channels))
            .ok_or_else(|| LoadError::Corrupt("input dimension overflow".into()))?;
        let expected = outputs
            .checked_mul(inputs)
            .and_then(|n| n.checked_add(outputs))
            .and_then(|n| n.checked_mul(4))
            .and_then(|n| n.checked_add(HEADER_LEN))
            .ok_or_else(|| LoadError::Corrupt("parameter count overflow".into()))?;
        if bytes.len() != expected {
            return Err(LoadError::Corrupt(format!(
                "expected {expected} bytes, found {}",
                bytes.len()
            )));
        }

        let floats: Vec<f32> = bytes[HEADER_LEN..]
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        let (weights, biases) = floats.split_at(outputs * inputs);

        let weights = Array2::from_shape_vec((outputs, inputs), weights.to_vec())
            .map_err(|err| LoadError::Corrupt(err.to_string()))?;
        let biases = Array1::from_vec(biases.to_vec());

        Ok(DenseModel {
            spec: TensorSpec {
                side,
                channels,
                mean: self.mean,
                std: self.std,
            },
            weights,
            biases,
        })
    }
}

impl Default for DenseRuntime {
    fn default() -> Self {
        let spec = TensorSpec::default();
        Self::new(spec.mean, spec.std)
    }
}

impl ModelRuntime for DenseRuntime {
    fn name(&self) -> &str {
        "dense"
    }

    fn load(&self, path: &Path) -> Result<Box<dyn LoadedModel>, LoadError> {
        let bytes = fs::read(path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => LoadError::Unavailable(format!("{} not found", path.display())),
            _ => LoadError::Corrupt(format!("read {}: {err}", path.display())),
        })?;
        let model = self.parse(&bytes)?;
        info!(
            path = %path.display(),
            side = model.spec.side,
            channels = model.spec.channels,
            outputs = model.output_len(),
            "Dense model loaded"
        );
        Ok(Box::new(model))
    }
}

#[derive(Debug, Clone)]
pub struct DenseModel {
    spec: TensorSpec,
    weights: Array2<f32>,
    biases: Array1<f32>,
}

impl LoadedModel for DenseModel {
    fn input_spec(&self) -> TensorSpec {
        self.spec
    }

    fn output_len(&self) -> usize {
        self.biases.len()
    }

    fn forward(&self, input: &InputTensor) -> Result<Vec<f32>, InferenceError> {
        let expected = self.spec.shape();
        if input.shape() != expected {
            return Err(InferenceError::ShapeMismatch {
                expected,
                actual: input.shape(),
            });
        }

        let scores = match input.data().as_slice() {
            Some(flat) => self.weights.dot(&ArrayView1::from(flat)),
            None => {
                let flat: Array1<f32> = input.data().iter().copied().collect();
                self.weights.dot(&flat)
            }
        };
        Ok((scores + &self.biases).to_vec())
    }
}

/// Serialize a dense model in the on-disk layout.
pub fn encode_dense_model(side: u32, channels: u32, weights: &[f32], biases: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + 4 * (weights.len() + biases.len()));
    out.extend_from_slice(DENSE_MAGIC);
    out.extend_from_slice(&side.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&(biases.len() as u32).to_le_bytes());
    for value in weights.iter().chain(biases) {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}
