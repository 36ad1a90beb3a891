//! Background patch build pool.
//!
//! A fixed set of long-lived worker threads turns [`BuildParams`] into
//! [`PatchMesh`](tellus_mesh::PatchMesh) buffers off the control thread.
//! Workers share no mutable state: each keeps its own copy of every body's
//! surface recipe, pushed once via an init message, and every job's inputs
//! and outputs are value types moved across channels. The control thread
//! drains completions once per frame with [`JobPool::pump_completed`];
//! nothing in this crate blocks the frame loop.

mod job;
mod pool;

pub use job::{BodyId, BodyRecipe, BuildJob, BuildParams, BuildResult, JobError, JobId, WorkerMsg};
pub use pool::JobPool;
