//! Top-level terrain engine: owns the pool, the bodies, and the caches.

use std::sync::Arc;

use glam::{DMat4, DVec3};
use log::info;

use tellus_cubesphere::PatchRect;
use tellus_mesh::{IndexCache, PatchIndices, PatchMesh};
use tellus_pool::{BodyId, JobPool};

use crate::body::{Body, BodyParams};
use crate::controller::{FrameStats, LodController};
use crate::frustum::Frustum;

/// One patch ready for submission, with its shared index buffers resolved.
///
/// The mesh's skirt primitive must be drawn without shadow casting; the
/// engine guarantees buffer validity, the renderer owns draw submission.
#[derive(Clone, Debug)]
pub struct DrawPatch {
    pub rect: PatchRect,
    pub mesh: Arc<PatchMesh>,
    pub indices: Arc<PatchIndices>,
}

/// Everything one body displays this frame.
#[derive(Clone, Debug)]
pub struct DrawList {
    pub body_id: BodyId,
    pub position: DVec3,
    /// True if the body renders as its baked far mesh (fetch it via
    /// [`TerrainEngine::body`]); `patches` is empty in that case.
    pub far: bool,
    pub patches: Vec<DrawPatch>,
}

/// The adaptive terrain engine.
///
/// Drive it with one [`Self::update`] per frame from the render/control
/// thread, then fetch [`Self::draw_lists`].
pub struct TerrainEngine {
    pool: JobPool,
    index_cache: IndexCache,
    controller: LodController,
    bodies: Vec<Body>,
    next_body_id: u32,
}

impl TerrainEngine {
    /// Engine with the default worker pool (hardware threads minus one).
    #[must_use]
    pub fn new() -> Self {
        Self::with_worker_count(None)
    }

    /// Engine with an explicit worker count; zero runs fully synchronous.
    #[must_use]
    pub fn with_worker_count(workers: Option<usize>) -> Self {
        let pool = match workers {
            Some(count) => JobPool::new(count),
            None => JobPool::with_defaults(),
        };
        Self {
            pool,
            index_cache: IndexCache::new(),
            controller: LodController::default(),
            bodies: Vec::new(),
            next_body_id: 0,
        }
    }

    /// Create a body and register it with the worker pool.
    pub fn add_body(&mut self, params: BodyParams) -> BodyId {
        let id = BodyId(self.next_body_id);
        self.next_body_id += 1;
        info!("creating {id} \"{}\"", params.name);
        self.bodies.push(Body::new(id, params, &mut self.pool));
        id
    }

    /// Destroy every body and its quadtree, e.g. on a system rebuild after
    /// a warp. In-flight jobs are left to finish; their results will fail
    /// to route and be discarded.
    pub fn clear_bodies(&mut self) {
        info!("clearing {} bodies", self.bodies.len());
        self.bodies.clear();
    }

    #[must_use]
    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.bodies.iter().find(|b| b.id == id)
    }

    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.bodies.iter_mut().find(|b| b.id == id)
    }

    #[must_use]
    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    /// Shared index buffer cache, for renderers resolving selectors
    /// themselves.
    pub fn index_cache(&mut self) -> &mut IndexCache {
        &mut self.index_cache
    }

    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }

    /// How many bodies (nearest first) run full quadtree traversal.
    pub fn set_detailed_bodies(&mut self, count: usize) {
        self.controller.detailed_bodies = count;
    }

    /// Run one frame of completion draining and LOD traversal.
    pub fn update(&mut self, camera_world: DVec3, view_proj: &DMat4) -> FrameStats {
        let frustum = Frustum::from_view_projection(view_proj);
        self.controller
            .update(&mut self.bodies, &mut self.pool, camera_world, &frustum)
    }

    /// Collect what every body displays this frame.
    pub fn draw_lists(&mut self, camera_world: DVec3) -> Vec<DrawList> {
        let cache = &mut self.index_cache;
        self.bodies
            .iter()
            .map(|body| {
                let far = body.uses_far_mesh(camera_world);
                let patches = if far {
                    Vec::new()
                } else {
                    body.collect_draws()
                        .into_iter()
                        .map(|draw| DrawPatch {
                            rect: draw.rect,
                            indices: cache.get(draw.mesh.selector.grid_n),
                            mesh: draw.mesh,
                        })
                        .collect()
                };
                DrawList {
                    body_id: body.id,
                    position: body.position,
                    far,
                    patches,
                }
            })
            .collect()
    }
}

impl Default for TerrainEngine {
    fn default() -> Self {
        Self::new()
    }
}
