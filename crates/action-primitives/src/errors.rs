//! Error types for action dispatch

use thiserror::Error;

/// Reasons a dispatch attempt failed. Carried inside the execution
/// outcome; never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// Input surface is not connected or has no active window
    #[error("Input surface unavailable: {0}")]
    SurfaceUnavailable(String),

    /// The surface refused the gesture
    #[error("Gesture rejected: {0}")]
    GestureRejected(String),

    /// No focused, editable node to receive text
    #[error("No focused editable node: {0}")]
    NoFocusedNode(String),

    /// The surface refused the set-text request
    #[error("Set text rejected: {0}")]
    SetTextRejected(String),
}

impl ActionError {
    /// Short stable label for logs and counters.
    pub fn label(&self) -> &'static str {
        match self {
            ActionError::SurfaceUnavailable(_) => "surface_unavailable",
            ActionError::GestureRejected(_) => "gesture_rejected",
            ActionError::NoFocusedNode(_) => "no_focused_node",
            ActionError::SetTextRejected(_) => "set_text_rejected",
        }
    }
}
