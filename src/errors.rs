//! Error handling module
//!
//! Errors surfaced by the agent wiring layer. Per-tick failures never get
//! this far; they are absorbed by the engine.

use frame_source::CaptureError;
use inference_engine::EngineError;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("capture surface unavailable: {0}")]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("agent already running")]
    AlreadyRunning,
}

impl AgentError {
    /// Startup failures leave the agent restartable.
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            AgentError::Capture(_) | AgentError::Engine(EngineError::Load(_))
        )
    }
}
