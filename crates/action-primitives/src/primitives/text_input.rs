//! Text input primitive - replace text on the focused editable node

use tracing::debug;

use crate::{errors::ActionError, primitives::DefaultActionExecutor};

/// Execute text input primitive
///
/// Steps:
/// 1. Check the surface has an active window
/// 2. Search its tree for the first focused editable node
/// 3. Set the node's text and check the surface accepted it
pub async fn execute_text_input(
    executor: &DefaultActionExecutor,
    text: &str,
) -> Result<(), ActionError> {
    let surface = executor.surface();

    if surface.query_active_tree_root().await.is_none() {
        return Err(ActionError::SurfaceUnavailable(
            "no active window".to_string(),
        ));
    }

    let Some(node) = surface.query_focused_editable_node().await else {
        return Err(ActionError::NoFocusedNode(
            "no focused editable node in active window".to_string(),
        ));
    };
    debug!(node = node.0, chars = text.chars().count(), "Setting node text");

    if surface.set_node_text(node, text).await {
        Ok(())
    } else {
        Err(ActionError::SetTextRejected(format!(
            "node {} refused text",
            node.0
        )))
    }
}
