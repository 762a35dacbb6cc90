//! Swipe primitive - straight stroke between two normalized points

use std::time::Duration;

use screenpilot_core_types::NormalizedPoint;
use tracing::debug;

use crate::{errors::ActionError, gesture::swipe_stroke, primitives::DefaultActionExecutor};

pub async fn execute_swipe(
    executor: &DefaultActionExecutor,
    from: (f32, f32),
    to: (f32, f32),
    duration: Duration,
) -> Result<(), ActionError> {
    let stroke = swipe_stroke(
        executor.screen(),
        NormalizedPoint::new(from.0, from.1),
        NormalizedPoint::new(to.0, to.1),
        duration,
    );
    debug!(
        from = ?stroke.points[0],
        to = ?stroke.points[1],
        duration_ms = stroke.duration.as_millis() as u64,
        "Dispatching swipe"
    );

    if executor.surface().dispatch_stroke(&stroke).await {
        Ok(())
    } else {
        Err(ActionError::GestureRejected("swipe not accepted".to_string()))
    }
}
