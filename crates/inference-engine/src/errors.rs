use thiserror::Error;

/// Failures constructing a model handle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The model provider reports the artifact is not ready
    #[error("model unavailable: {0}")]
    Unavailable(String),

    /// The artifact exists but cannot be parsed
    #[error("model corrupt: {0}")]
    Corrupt(String),

    /// The artifact parsed but the runtime refused it
    #[error("runtime init failure: {0}")]
    RuntimeInitFailure(String),
}

/// Frame-to-tensor conversion failures. Skip the tick.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("frame is empty")]
    EmptyFrame,
    #[error("unsupported channel count {0}")]
    UnsupportedChannels(usize),
    #[error("invalid tensor spec: {0}")]
    InvalidSpec(String),
}

/// Forward-pass failures. Skip the tick, except `Invalidated` which also
/// drops the handle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InferenceError {
    #[error("input shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize, usize),
        actual: (usize, usize, usize),
    },
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("model handle invalidated: {0}")]
    Invalidated(String),
}

/// Errors returned by engine control operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("no model loaded")]
    NotLoaded,
    #[error("tick period must be greater than zero")]
    InvalidPeriod,
    #[error("engine has been shut down")]
    ShutDown,
}
