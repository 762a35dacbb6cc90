//! Lifecycle notifications for supervisors and UIs.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Started,
    Stopped,
    Error,
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StatusKind::Started => "started",
            StatusKind::Stopped => "stopped",
            StatusKind::Error => "error",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusEvent {
    pub kind: StatusKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl StatusEvent {
    pub fn new(kind: StatusKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            at: Utc::now(),
        }
    }

    pub fn started(message: impl Into<String>) -> Self {
        Self::new(StatusKind::Started, message)
    }

    pub fn stopped(message: impl Into<String>) -> Self {
        Self::new(StatusKind::Stopped, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(StatusKind::Error, message)
    }
}
