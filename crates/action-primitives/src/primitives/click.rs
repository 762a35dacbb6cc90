//! Click primitive - tap at a normalized screen point

use screenpilot_core_types::NormalizedPoint;
use tracing::debug;

use crate::{errors::ActionError, gesture::click_stroke, primitives::DefaultActionExecutor};

/// Execute click primitive
///
/// Steps:
/// 1. Map the normalized point onto screen pixels
/// 2. Build a single-point stroke starting immediately
/// 3. Dispatch and check the surface accepted it
pub async fn execute_click(
    executor: &DefaultActionExecutor,
    x: f32,
    y: f32,
) -> Result<(), ActionError> {
    let stroke = click_stroke(
        executor.screen(),
        NormalizedPoint::new(x, y),
        executor.click_duration(),
    );
    debug!(point = ?stroke.points[0], "Dispatching tap");

    if executor.surface().dispatch_stroke(&stroke).await {
        Ok(())
    } else {
        Err(ActionError::GestureRejected(format!(
            "tap at ({x:.3}, {y:.3}) not accepted"
        )))
    }
}
