//! Core data types for decoded actions

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use screenpilot_core_types::ActionId;
use serde::{Deserialize, Serialize};

use crate::errors::ActionError;

/// The single instruction produced per completed inference tick.
///
/// Coordinates are normalized to `[0, 1]` of the screen extent. The
/// confidence is the raw selected score and is not guaranteed to be a
/// probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Click {
        confidence: f32,
        x: f32,
        y: f32,
    },
    Swipe {
        confidence: f32,
        start_x: f32,
        start_y: f32,
        end_x: f32,
        end_y: f32,
        duration: Duration,
    },
    TextInput {
        confidence: f32,
        text: String,
    },
    Wait {
        confidence: f32,
    },
}

impl Action {
    pub fn confidence(&self) -> f32 {
        match self {
            Action::Click { confidence, .. }
            | Action::Swipe { confidence, .. }
            | Action::TextInput { confidence, .. }
            | Action::Wait { confidence } => *confidence,
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Click { .. } => ActionKind::Click,
            Action::Swipe { .. } => ActionKind::Swipe,
            Action::TextInput { .. } => ActionKind::TextInput,
            Action::Wait { .. } => ActionKind::Wait,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Click,
    Swipe,
    TextInput,
    Wait,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Click => "click",
            ActionKind::Swipe => "swipe",
            ActionKind::TextInput => "text_input",
            ActionKind::Wait => "wait",
        };
        f.write_str(name)
    }
}

/// What happened when an action was handed to the input surface.
///
/// `ok` only reflects the dispatch call's own return signal; whether the
/// screen changed as intended is not observed.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub action_id: ActionId,
    pub kind: ActionKind,
    pub ok: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub latency_ms: u64,
    pub error: Option<ActionError>,
}

impl ExecutionOutcome {
    pub fn success(
        action_id: ActionId,
        kind: ActionKind,
        started_at: DateTime<Utc>,
        latency_ms: u64,
    ) -> Self {
        Self {
            action_id,
            kind,
            ok: true,
            started_at,
            finished_at: Utc::now(),
            latency_ms,
            error: None,
        }
    }

    pub fn failure(
        action_id: ActionId,
        kind: ActionKind,
        started_at: DateTime<Utc>,
        latency_ms: u64,
        error: ActionError,
    ) -> Self {
        Self {
            action_id,
            kind,
            ok: false,
            started_at,
            finished_at: Utc::now(),
            latency_ms,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let action = Action::TextInput {
            confidence: 0.25,
            text: "hi".into(),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "text_input");
        assert_eq!(json["text"], "hi");
        let back: Action = serde_json::from_value(json).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn confidence_and_kind_cover_every_variant() {
        let wait = Action::Wait { confidence: 0.1 };
        assert_eq!(wait.kind(), ActionKind::Wait);
        assert_eq!(wait.confidence(), 0.1);
        assert_eq!(ActionKind::TextInput.to_string(), "text_input");
    }
}
