//! Action execution against an input surface
//!
//! Three dispatching primitives plus the no-op:
//! 1. click - single-point stroke at the action's coordinates
//! 2. swipe - two-point stroke over the action's duration
//! 3. text_input - set text on the focused editable node
//!
//! `Wait` dispatches nothing and always succeeds.

mod click;
mod swipe;
mod text_input;

pub use click::*;
pub use swipe::*;
pub use text_input::*;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use screenpilot_core_types::{ActionId, ScreenSize};
use tracing::{debug, info, warn};

use crate::{
    errors::ActionError,
    gesture::DEFAULT_CLICK_DURATION,
    surface::InputSurface,
    types::{Action, ExecutionOutcome},
};

/// Translates a decoded action into platform input.
///
/// Execution never fails outward: every problem is reported through the
/// returned outcome.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, action: &Action) -> ExecutionOutcome;
}

/// Executor dispatching to an [`InputSurface`] with a fixed screen extent.
pub struct DefaultActionExecutor {
    surface: Arc<dyn InputSurface>,
    screen: ScreenSize,
    click_duration: Duration,
}

impl DefaultActionExecutor {
    pub fn new(surface: Arc<dyn InputSurface>, screen: ScreenSize) -> Self {
        Self {
            surface,
            screen,
            click_duration: DEFAULT_CLICK_DURATION,
        }
    }

    pub fn with_click_duration(mut self, duration: Duration) -> Self {
        self.click_duration = duration;
        self
    }

    pub fn surface(&self) -> &Arc<dyn InputSurface> {
        &self.surface
    }

    pub fn screen(&self) -> ScreenSize {
        self.screen
    }

    pub fn click_duration(&self) -> Duration {
        self.click_duration
    }

    async fn dispatch(&self, action: &Action) -> Result<(), ActionError> {
        match action {
            Action::Click { x, y, .. } => execute_click(self, *x, *y).await,
            Action::Swipe {
                start_x,
                start_y,
                end_x,
                end_y,
                duration,
                ..
            } => execute_swipe(self, (*start_x, *start_y), (*end_x, *end_y), *duration).await,
            Action::TextInput { text, .. } => execute_text_input(self, text).await,
            Action::Wait { .. } => {
                debug!("Wait action, nothing to dispatch");
                Ok(())
            }
        }
    }
}

#[async_trait]
impl ActionExecutor for DefaultActionExecutor {
    async fn execute(&self, action: &Action) -> ExecutionOutcome {
        let action_id = ActionId::new();
        let kind = action.kind();
        let started_at = Utc::now();
        let start_instant = Instant::now();

        info!(
            action_id = %action_id,
            kind = %kind,
            confidence = action.confidence(),
            "Executing action"
        );

        let result = self.dispatch(action).await;
        let latency_ms = start_instant.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                debug!(action_id = %action_id, latency_ms, "Action dispatched");
                ExecutionOutcome::success(action_id, kind, started_at, latency_ms)
            }
            Err(err) => {
                warn!(
                    action_id = %action_id,
                    kind = %kind,
                    reason = err.label(),
                    "Action failed: {}",
                    err
                );
                ExecutionOutcome::failure(action_id, kind, started_at, latency_ms, err)
            }
        }
    }
}
