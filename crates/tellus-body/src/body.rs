//! A planetary body: six patch quadtrees, a far mesh, and tuning.

use std::sync::Arc;

use glam::DVec3;

use tellus_cubesphere::{CubeFace, PatchRect};
use tellus_mesh::{FarMesh, PatchMesh};
use tellus_pool::{BodyId, BodyRecipe, JobPool};
use tellus_terrain::{BiomeParameters, BodyKind, HeightField, HeightFieldConfig};

use crate::node::{BuildContext, PatchNode};

/// Gas giants have no fine surface detail worth descending to.
const GAS_GIANT_MAX_LEVEL: u8 = 3;

/// Everything needed to construct a body. Plain values, no behavior.
#[derive(Clone, Debug)]
pub struct BodyParams {
    pub name: String,
    pub kind: BodyKind,
    pub position: DVec3,
    pub height_field: HeightFieldConfig,
    pub biome: BiomeParameters,
    /// Vertices per patch edge.
    pub grid_n: u32,
    /// Central-difference step for normal estimation.
    pub normal_eps: f64,
    /// Deepest subdivision level traversal may request.
    pub max_level: u8,
    /// Split when camera distance drops below `edge_length * split_factor`.
    pub split_factor: f64,
    /// Merge when camera distance exceeds `edge_length * merge_factor`.
    /// Must exceed `split_factor` to give the hysteresis band.
    pub merge_factor: f64,
    /// Maximum splits started per body per frame.
    pub split_budget: u32,
    /// Maximum merges started per body per frame.
    pub merge_budget: u32,
    /// Beyond this camera distance nodes are force-merged toward the root.
    pub active_distance: f64,
    /// Beyond this camera distance only the far mesh renders.
    pub far_distance: f64,
    /// Icosphere subdivisions for the baked far mesh.
    pub far_mesh_subdivisions: u32,
}

impl Default for BodyParams {
    fn default() -> Self {
        let height_field = HeightFieldConfig::default();
        Self {
            name: "unnamed".into(),
            kind: BodyKind::Rocky,
            position: DVec3::ZERO,
            biome: BiomeParameters {
                sea_level: height_field.sea_level,
                ..Default::default()
            },
            grid_n: 17,
            normal_eps: 0.5,
            max_level: 12,
            split_factor: 9.2,
            merge_factor: 14.2,
            split_budget: 6,
            merge_budget: 6,
            active_distance: height_field.base_radius * 60.0,
            far_distance: height_field.base_radius * 250.0,
            far_mesh_subdivisions: 3,
            height_field,
        }
    }
}

/// A mesh to draw this frame: the surface primitive plus its skirt, which
/// the renderer must mark as never casting shadows.
#[derive(Clone, Debug)]
pub struct PatchDraw {
    pub rect: PatchRect,
    pub mesh: Arc<PatchMesh>,
}

/// One planetary body and its adaptive surface.
pub struct Body {
    pub id: BodyId,
    pub params: BodyParams,
    /// Body center in world space; updated externally for orbits.
    pub position: DVec3,
    roots: [PatchNode; 6],
    far_mesh: FarMesh,
    min_height: f64,
    max_height: f64,
}

impl Body {
    /// Create a body, register its recipe with the pool, and bake its far
    /// mesh. The quadtree starts as six empty root leaves; the first
    /// traversal requests their meshes.
    #[must_use]
    pub fn new(id: BodyId, params: BodyParams, pool: &mut JobPool) -> Self {
        pool.init_body(
            id,
            BodyRecipe {
                height_field: params.height_field,
                biome: params.biome,
            },
        );
        let field = HeightField::new(params.height_field);
        let far_mesh = FarMesh::bake(&field, &params.biome, params.far_mesh_subdivisions);
        let min_height = (field.floor_radius() - params.height_field.base_radius).min(0.0);
        let max_height = field.max_displacement();

        let position = params.position;
        let mut ctx = BuildContext {
            pool,
            body_id: id,
            grid_n: params.grid_n,
            normal_eps: params.normal_eps,
            radius: params.height_field.base_radius,
            min_height,
            max_height,
        };
        let roots = CubeFace::ALL.map(|face| PatchNode::new(PatchRect::root(face), &mut ctx));

        Self {
            id,
            params,
            position,
            roots,
            far_mesh,
            min_height,
            max_height,
        }
    }

    /// Job-issuing context for this body's nodes.
    pub fn build_context<'p>(&self, pool: &'p mut JobPool) -> BuildContext<'p> {
        BuildContext {
            pool,
            body_id: self.id,
            grid_n: self.params.grid_n,
            normal_eps: self.params.normal_eps,
            radius: self.params.height_field.base_radius,
            min_height: self.min_height,
            max_height: self.max_height,
        }
    }

    /// Deepest level traversal may split to, respecting the body kind.
    #[must_use]
    pub fn effective_max_level(&self) -> u8 {
        match self.params.kind {
            BodyKind::GasGiant => self.params.max_level.min(GAS_GIANT_MAX_LEVEL),
            BodyKind::Rocky | BodyKind::Moon => self.params.max_level,
        }
    }

    /// A world-space point translated into body-local space.
    #[must_use]
    pub fn to_local(&self, world: DVec3) -> DVec3 {
        world - self.position
    }

    /// Distance from a world-space point to the body surface (roughly).
    #[must_use]
    pub fn surface_distance(&self, world: DVec3) -> f64 {
        (self.to_local(world).length() - self.params.height_field.base_radius).max(0.0)
    }

    /// True if the body is far enough to render as its baked far mesh.
    #[must_use]
    pub fn uses_far_mesh(&self, camera_world: DVec3) -> bool {
        self.surface_distance(camera_world) > self.params.far_distance
    }

    #[must_use]
    pub fn roots(&self) -> &[PatchNode; 6] {
        &self.roots
    }

    pub fn roots_mut(&mut self) -> &mut [PatchNode; 6] {
        &mut self.roots
    }

    /// Find the live node for `rect`, if it exists.
    pub fn route(&mut self, rect: &PatchRect) -> Option<&mut PatchNode> {
        self.roots[rect.face.index()].route(rect)
    }

    #[must_use]
    pub fn far_mesh(&self) -> &FarMesh {
        &self.far_mesh
    }

    /// Patch meshes currently displayed across all six faces.
    #[must_use]
    pub fn collect_draws(&self) -> Vec<PatchDraw> {
        let mut displayed = Vec::new();
        for root in &self.roots {
            root.collect_draws(&mut displayed);
        }
        displayed
            .into_iter()
            .map(|d| PatchDraw {
                rect: d.rect,
                mesh: Arc::clone(d.mesh),
            })
            .collect()
    }

    /// Total node count across the six quadtrees.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.roots.iter().map(PatchNode::node_count).sum()
    }
}
