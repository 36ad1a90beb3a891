//! Planetary bodies and their adaptive patch quadtrees.
//!
//! Each [`Body`] owns six root [`PatchNode`]s, one per cube face. The
//! [`LodController`] walks them once per frame, splitting and merging nodes
//! against camera distance while background workers fill in meshes. Node
//! state only ever changes on the thread driving the controller; the
//! split/merge state machine guarantees the surface never shows a hole
//! while refinement is in flight.

mod body;
mod controller;
mod engine;
mod frustum;
mod node;

pub use body::{Body, BodyParams, PatchDraw};
pub use controller::{FrameStats, LodController};
pub use engine::{DrawList, DrawPatch, TerrainEngine};
pub use frustum::Frustum;
pub use node::{BuildContext, DisplayedPatch, MeshSlot, NodeState, PatchNode};
