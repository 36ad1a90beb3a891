//! Patch geometry construction.
//!
//! [`build_patch`] turns a UV rectangle of one cube face into a renderable
//! [`PatchMesh`]: an N×N vertex grid over the displaced sphere surface plus a
//! skirt ring that closes sub-pixel gaps against neighbors at other LOD
//! levels. Index buffers are not stored per patch; each mesh carries an
//! [`IndexSelector`] that resolves against the shared [`IndexCache`].
//! [`FarMesh`] bakes a whole body into one low-poly icosphere for distant
//! rendering.

mod buffers;
mod builder;
mod far_mesh;
mod index_cache;

pub use buffers::{IndexData, IndexSelector, PatchMesh, TerrainVertex};
pub use builder::{build_patch, skirt_depth_for_edge};
pub use far_mesh::FarMesh;
pub use index_cache::{IndexCache, PatchIndices};
