//! In-memory input surface that records every dispatch.
//!
//! Used by the CLI `tree` command against JSON snapshots and by tests that
//! need to observe strokes and text edits.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::surface::{InputSurface, NodeHandle, NodeInfo, Stroke};

/// Nested node description, the JSON form of a tree snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub class_name: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub focused: bool,
    #[serde(default)]
    pub editable: bool,
    #[serde(default)]
    pub children: Vec<NodeSpec>,
}

#[derive(Debug)]
struct RecordedNode {
    info: NodeInfo,
    children: Vec<NodeHandle>,
}

pub struct RecordingInputSurface {
    nodes: Mutex<Vec<RecordedNode>>,
    strokes: Mutex<Vec<Stroke>>,
    text_edits: Mutex<Vec<(NodeHandle, String)>>,
    available: AtomicBool,
    accept_gestures: AtomicBool,
}

impl RecordingInputSurface {
    /// Surface with no active window.
    pub fn new() -> Self {
        Self {
            nodes: Mutex::new(Vec::new()),
            strokes: Mutex::new(Vec::new()),
            text_edits: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
            accept_gestures: AtomicBool::new(true),
        }
    }

    /// Surface whose active window holds `root`. Handles are assigned in
    /// depth-first pre-order starting at 0.
    pub fn with_tree(root: NodeSpec) -> Self {
        let surface = Self::new();
        *surface.nodes.lock() = flatten(root);
        surface
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let root: NodeSpec = serde_json::from_str(json)?;
        Ok(Self::with_tree(root))
    }

    /// Simulate the surface disconnecting or reconnecting.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_accept_gestures(&self, accept: bool) {
        self.accept_gestures.store(accept, Ordering::SeqCst);
    }

    pub fn strokes(&self) -> Vec<Stroke> {
        self.strokes.lock().clone()
    }

    pub fn text_edits(&self) -> Vec<(NodeHandle, String)> {
        self.text_edits.lock().clone()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.lock().len()
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

impl Default for RecordingInputSurface {
    fn default() -> Self {
        Self::new()
    }
}

fn flatten(root: NodeSpec) -> Vec<RecordedNode> {
    let mut nodes: Vec<RecordedNode> = Vec::new();
    // (spec, parent index)
    let mut stack: Vec<(NodeSpec, Option<usize>)> = vec![(root, None)];

    while let Some((mut spec, parent)) = stack.pop() {
        let index = nodes.len();
        let children = std::mem::take(&mut spec.children);
        nodes.push(RecordedNode {
            info: NodeInfo {
                class_name: spec.class_name,
                text: spec.text,
                focused: spec.focused,
                editable: spec.editable,
            },
            children: Vec::with_capacity(children.len()),
        });
        if let Some(parent) = parent {
            nodes[parent].children.push(NodeHandle(index as u64));
        }
        stack.extend(children.into_iter().rev().map(|child| (child, Some(index))));
    }

    nodes
}

#[async_trait]
impl InputSurface for RecordingInputSurface {
    async fn dispatch_stroke(&self, stroke: &Stroke) -> bool {
        if !self.is_available() || !self.accept_gestures.load(Ordering::SeqCst) {
            return false;
        }
        debug!(points = stroke.points.len(), "Recorded stroke");
        self.strokes.lock().push(stroke.clone());
        true
    }

    async fn query_active_tree_root(&self) -> Option<NodeHandle> {
        if !self.is_available() || self.nodes.lock().is_empty() {
            return None;
        }
        Some(NodeHandle(0))
    }

    async fn children(&self, node: NodeHandle) -> Vec<NodeHandle> {
        self.nodes
            .lock()
            .get(node.0 as usize)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    async fn node_info(&self, node: NodeHandle) -> Option<NodeInfo> {
        self.nodes.lock().get(node.0 as usize).map(|n| n.info.clone())
    }

    async fn set_node_text(&self, node: NodeHandle, text: &str) -> bool {
        if !self.is_available() {
            return false;
        }
        let mut nodes = self.nodes.lock();
        match nodes.get_mut(node.0 as usize) {
            Some(entry) if entry.info.editable => {
                entry.info.text = Some(text.to_string());
                self.text_edits.lock().push((node, text.to_string()));
                true
            }
            _ => false,
        }
    }
}
