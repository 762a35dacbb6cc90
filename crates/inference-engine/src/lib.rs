//! Inference Engine - the timer-driven core of the ScreenPilot loop
//!
//! Each tick takes the latest frame from the slot, converts it to the
//! model's input tensor, runs one forward pass on a blocking thread,
//! decodes the scores into an action and awaits its dispatch.
//!
//! Guarantees:
//! - at most one tick in flight; overdue ticks are skipped, not queued
//! - per-tick failures are logged and counted, never fatal
//! - load and startup failures suspend the loop and go to the status bus

pub mod dense;
pub mod engine;
pub mod errors;
pub mod metrics;
pub mod provider;
pub mod runtime;
pub mod state;
pub mod status;
pub mod tensor;

pub use dense::{encode_dense_model, DenseModel, DenseRuntime, DENSE_MAGIC};
pub use engine::{
    EngineOptions, InferenceEngine, ModelInfo, SkipReason, TickFailure, TickOutcome,
    DEFAULT_PERIOD,
};
pub use errors::{EngineError, InferenceError, LoadError, TransformError};
pub use metrics::{EngineMetrics, EngineMetricsSnapshot};
pub use provider::{sha256_file, ArtifactStatus, FileModelProvider, ModelProvider};
pub use runtime::{LoadedModel, ModelRuntime};
pub use state::{LoopState, SuspendReason};
pub use status::{StatusEvent, StatusKind};
pub use tensor::{to_tensor, InputTensor, TensorSpec};
