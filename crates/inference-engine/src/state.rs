use std::fmt;

use serde::Serialize;

/// Why the loop is not ticking productively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum SuspendReason {
    /// Model loaded, waiting for `start`
    AwaitingStart,
    /// Provider reported the artifact not ready
    ModelUnavailable(String),
    /// Artifact could not be turned into a handle
    LoadFailed(String),
    /// Runtime reported the handle unusable mid-run
    HandleInvalidated(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "suspended", rename_all = "snake_case")]
pub enum LoopState {
    Idle,
    Running,
    Suspended(SuspendReason),
    Stopped,
}

impl LoopState {
    pub fn is_running(&self) -> bool {
        matches!(self, LoopState::Running)
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self, LoopState::Suspended(_))
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopState::Idle => f.write_str("idle"),
            LoopState::Running => f.write_str("running"),
            LoopState::Stopped => f.write_str("stopped"),
            LoopState::Suspended(SuspendReason::AwaitingStart) => {
                f.write_str("suspended (awaiting start)")
            }
            LoopState::Suspended(SuspendReason::ModelUnavailable(msg)) => {
                write!(f, "suspended (model unavailable: {msg})")
            }
            LoopState::Suspended(SuspendReason::LoadFailed(msg)) => {
                write!(f, "suspended (load failed: {msg})")
            }
            LoopState::Suspended(SuspendReason::HandleInvalidated(msg)) => {
                write!(f, "suspended (handle invalidated: {msg})")
            }
        }
    }
}
