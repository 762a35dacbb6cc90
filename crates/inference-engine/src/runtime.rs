//! Model runtime seam.
//!
//! Runtimes are synchronous; the engine drives them from blocking threads.

use std::path::Path;

use crate::errors::{InferenceError, LoadError};
use crate::tensor::{InputTensor, TensorSpec};

pub trait ModelRuntime: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &str;

    fn load(&self, path: &Path) -> Result<Box<dyn LoadedModel>, LoadError>;
}

/// A successfully constructed model, ready for forward passes.
pub trait LoadedModel: Send + Sync {
    fn input_spec(&self) -> TensorSpec;

    fn output_len(&self) -> usize;

    fn forward(&self, input: &InputTensor) -> Result<Vec<f32>, InferenceError>;
}
