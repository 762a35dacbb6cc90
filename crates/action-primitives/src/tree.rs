//! Iterative traversal of the surface node tree.

use std::fmt::Write as _;

use tracing::warn;

use crate::surface::{InputSurface, NodeHandle};

/// Upper bound on nodes visited by one search.
pub const DEFAULT_VISIT_BUDGET: usize = 10_000;

/// Depth-first, pre-order search for the first node that is both focused
/// and editable.
///
/// Uses an explicit stack so arbitrarily deep trees cannot exhaust the
/// call stack. Nodes whose info can no longer be read are skipped along
/// with their subtree.
pub async fn find_focused_editable<S>(surface: &S, budget: usize) -> Option<NodeHandle>
where
    S: InputSurface + ?Sized,
{
    let root = surface.query_active_tree_root().await?;
    let mut stack = vec![root];
    let mut visited = 0usize;

    while let Some(node) = stack.pop() {
        if visited >= budget {
            warn!(budget, "Focused node search exceeded visit budget");
            return None;
        }
        visited += 1;

        let Some(info) = surface.node_info(node).await else {
            continue;
        };
        if info.focused && info.editable {
            return Some(node);
        }

        let children = surface.children(node).await;
        // reversed so the first child is popped first
        stack.extend(children.into_iter().rev());
    }

    None
}

/// Render the active tree as an indented outline, one node per line.
pub async fn describe_tree<S>(surface: &S, budget: usize) -> Option<String>
where
    S: InputSurface + ?Sized,
{
    let root = surface.query_active_tree_root().await?;
    let mut out = String::new();
    let mut stack = vec![(root, 0usize)];
    let mut visited = 0usize;

    while let Some((node, depth)) = stack.pop() {
        if visited >= budget {
            let _ = writeln!(out, "... truncated after {budget} nodes");
            break;
        }
        visited += 1;

        let Some(info) = surface.node_info(node).await else {
            continue;
        };
        let _ = write!(out, "{}{}", "  ".repeat(depth), info.class_name);
        if let Some(text) = info.text.as_deref().filter(|t| !t.is_empty()) {
            let _ = write!(out, " \"{text}\"");
        }
        if info.focused {
            out.push_str(" [focused]");
        }
        if info.editable {
            out.push_str(" [editable]");
        }
        out.push('\n');

        let children = surface.children(node).await;
        stack.extend(children.into_iter().rev().map(|child| (child, depth + 1)));
    }

    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{NodeSpec, RecordingInputSurface};

    fn leaf(class: &str, focused: bool, editable: bool) -> NodeSpec {
        NodeSpec {
            class_name: class.into(),
            focused,
            editable,
            ..NodeSpec::default()
        }
    }

    #[tokio::test]
    async fn finds_first_match_in_preorder() {
        let mut left = leaf("Layout", false, false);
        left.children = vec![leaf("EditText", true, true)];
        let mut root = leaf("Root", false, false);
        root.children = vec![left, leaf("EditText", true, true)];
        let surface = RecordingInputSurface::with_tree(root);

        let found = find_focused_editable(&surface, DEFAULT_VISIT_BUDGET)
            .await
            .unwrap();
        // handles are assigned in pre-order: Root=0, Layout=1, first EditText=2
        assert_eq!(found, NodeHandle(2));
    }

    #[tokio::test]
    async fn focused_but_not_editable_is_skipped() {
        let mut root = leaf("Root", false, false);
        root.children = vec![leaf("Button", true, false), leaf("EditText", false, true)];
        let surface = RecordingInputSurface::with_tree(root);
        assert!(find_focused_editable(&surface, DEFAULT_VISIT_BUDGET)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn deep_tree_does_not_overflow() {
        let mut node = leaf("EditText", true, true);
        for _ in 0..5_000 {
            let mut parent = leaf("Layout", false, false);
            parent.children = vec![node];
            node = parent;
        }
        let surface = RecordingInputSurface::with_tree(node);
        assert_eq!(
            find_focused_editable(&surface, DEFAULT_VISIT_BUDGET).await,
            Some(NodeHandle(5_000))
        );
    }

    #[tokio::test]
    async fn budget_bounds_the_search() {
        let mut root = leaf("Root", false, false);
        root.children = (0..20).map(|_| leaf("View", false, false)).collect();
        root.children.push(leaf("EditText", true, true));
        let surface = RecordingInputSurface::with_tree(root);
        assert!(find_focused_editable(&surface, 5).await.is_none());
        assert!(find_focused_editable(&surface, 100).await.is_some());
    }

    #[tokio::test]
    async fn describe_renders_outline() {
        let mut root = leaf("Root", false, false);
        let mut field = leaf("EditText", true, true);
        field.text = Some("abc".into());
        root.children = vec![field];
        let surface = RecordingInputSurface::with_tree(root);

        let outline = describe_tree(&surface, DEFAULT_VISIT_BUDGET).await.unwrap();
        assert_eq!(outline, "Root\n  EditText \"abc\" [focused] [editable]\n");
    }

    #[tokio::test]
    async fn no_window_means_no_tree() {
        let surface = RecordingInputSurface::new();
        assert!(describe_tree(&surface, 10).await.is_none());
        assert!(find_focused_editable(&surface, 10).await.is_none());
    }
}
