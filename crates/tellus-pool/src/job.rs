//! Job and message types crossing the worker boundary.

use thiserror::Error;

use tellus_cubesphere::PatchRect;
use tellus_mesh::PatchMesh;
use tellus_terrain::{BiomeParameters, HeightFieldConfig};

/// Identifies a body across the engine and the worker pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub u32);

impl std::fmt::Display for BodyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "body#{}", self.0)
    }
}

/// Correlates a build request with its result.
///
/// Monotonically increasing per pool; a node that re-requests its mesh gets
/// a fresh id, which is how stale results are told apart from current ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job#{}", self.0)
    }
}

/// Everything a worker needs to build one patch, besides the body recipe it
/// already holds.
#[derive(Clone, Copy, Debug)]
pub struct BuildParams {
    pub body_id: BodyId,
    /// The patch to build; supplies the face and UV rectangle, and routes
    /// the completion back to the requesting node.
    pub rect: PatchRect,
    /// Vertices per patch edge.
    pub grid_n: u32,
    /// Central-difference step for normal estimation.
    pub normal_eps: f64,
    /// How far skirt vertices sink below the surface.
    pub skirt_depth: f64,
}

/// A queued build job.
#[derive(Clone, Copy, Debug)]
pub struct BuildJob {
    pub job_id: JobId,
    pub params: BuildParams,
}

/// A completed build.
#[derive(Debug)]
pub struct BuildResult {
    pub job_id: JobId,
    pub body_id: BodyId,
    pub rect: PatchRect,
    pub mesh: PatchMesh,
}

/// A failed build, reported per job so one bad job never kills the pool.
///
/// Carries enough routing information for the controller to clear the
/// requesting node's pending state.
#[derive(Debug, Error)]
#[error("{job_id} for {body_id} patch {rect} failed: {message}")]
pub struct JobError {
    pub job_id: JobId,
    pub body_id: BodyId,
    pub rect: PatchRect,
    pub message: String,
}

/// The surface recipe a worker needs to service one body.
///
/// Pushed to every worker once at body creation so jobs stay small.
#[derive(Clone, Copy, Debug)]
pub struct BodyRecipe {
    pub height_field: HeightFieldConfig,
    pub biome: BiomeParameters,
}

/// Messages sent from the pool to a worker over its private channel.
#[derive(Debug)]
pub enum WorkerMsg {
    /// Register (or re-register, idempotently) a body's recipe.
    InitBody { body_id: BodyId, recipe: BodyRecipe },
    /// Build one patch.
    Build(BuildJob),
}
