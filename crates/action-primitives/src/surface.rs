//! The input surface seam: gesture injection, node tree queries and text edits.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::tree::{find_focused_editable, DEFAULT_VISIT_BUDGET};

/// Opaque reference to a node in the surface's current tree.
///
/// Only valid for the tree snapshot it was obtained from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle(pub u64);

/// Properties of a node at query time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub class_name: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub focused: bool,
    #[serde(default)]
    pub editable: bool,
}

/// A gesture path in screen pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub points: Vec<(f32, f32)>,
    pub start_delay: Duration,
    pub duration: Duration,
}

impl Stroke {
    pub fn is_tap(&self) -> bool {
        self.points.len() == 1
    }
}

/// Platform input capability.
///
/// Implementations answer for the current screen only; handles from an
/// older tree may resolve to `None`.
#[async_trait]
pub trait InputSurface: Send + Sync {
    /// Inject a stroke. Returns whether the surface accepted it.
    async fn dispatch_stroke(&self, stroke: &Stroke) -> bool;

    /// Root of the active window's tree, `None` when there is no window.
    async fn query_active_tree_root(&self) -> Option<NodeHandle>;

    async fn children(&self, node: NodeHandle) -> Vec<NodeHandle>;

    async fn node_info(&self, node: NodeHandle) -> Option<NodeInfo>;

    /// Replace the node's text. Returns whether the surface accepted it.
    async fn set_node_text(&self, node: NodeHandle, text: &str) -> bool;

    /// First focused editable node in depth-first order.
    async fn query_focused_editable_node(&self) -> Option<NodeHandle> {
        find_focused_editable(self, DEFAULT_VISIT_BUDGET).await
    }
}
