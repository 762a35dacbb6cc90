//! Action Primitives - decoded actions and their execution on an input surface
//!
//! This crate provides the decide/act half of the control loop:
//! - The `Action` sum type produced once per inference tick
//! - The pure `decode` mapping from model scores to an action
//! - The `InputSurface` seam for gestures, node queries and text edits
//! - Iterative focused-node search over the surface's node tree
//! - `DefaultActionExecutor`, which never lets a dispatch failure escape

pub mod decoder;
pub mod errors;
pub mod gesture;
mod primitives;
pub mod recording;
pub mod surface;
pub mod tree;
pub mod types;

pub use decoder::{decode, ActionDecoder, DecoderConfig};
pub use errors::*;
pub use gesture::{click_stroke, swipe_stroke, DEFAULT_CLICK_DURATION};
pub use primitives::*;
pub use recording::{NodeSpec, RecordingInputSurface};
pub use surface::{InputSurface, NodeHandle, NodeInfo, Stroke};
pub use tree::{describe_tree, find_focused_editable, DEFAULT_VISIT_BUDGET};
pub use types::*;
