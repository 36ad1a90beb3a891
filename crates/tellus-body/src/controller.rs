//! Per-frame LOD traversal.
//!
//! One call to [`LodController::update`] per frame: drain the job pool,
//! route completions into the quadtrees, then walk each active body
//! depth-first with an explicit stack, splitting and merging against camera
//! distance under fixed per-frame budgets. This is the only place node
//! state changes, which is what keeps the state machine race-free despite
//! background generation.

use std::sync::Arc;

use glam::DVec3;
use log::debug;

use tellus_pool::{BuildResult, JobError, JobPool};

use crate::body::Body;
use crate::frustum::Frustum;
use crate::node::PatchNode;

/// Counters for one frame of traversal.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameStats {
    pub splits: u32,
    pub merges: u32,
    pub culled: u32,
    pub nodes_visited: u32,
    pub jobs_completed: u32,
    pub results_discarded: u32,
}

/// Drives split/merge decisions for a set of bodies.
pub struct LodController {
    /// Only the nearest this-many bodies run full quadtree traversal; the
    /// rest are held at root-level patches or their far mesh.
    pub detailed_bodies: usize,
}

impl Default for LodController {
    fn default() -> Self {
        Self { detailed_bodies: 3 }
    }
}

impl LodController {
    /// Run one frame: apply completed builds, then traverse every body.
    pub fn update(
        &self,
        bodies: &mut [Body],
        pool: &mut JobPool,
        camera_world: DVec3,
        frustum: &Frustum,
    ) -> FrameStats {
        let mut stats = FrameStats::default();
        self.apply_completions(bodies, pool, &mut stats);

        // Rank bodies by camera distance; only the nearest few get detail.
        let mut order: Vec<usize> = (0..bodies.len()).collect();
        order.sort_by(|&a, &b| {
            bodies[a]
                .surface_distance(camera_world)
                .total_cmp(&bodies[b].surface_distance(camera_world))
        });

        for (rank, &index) in order.iter().enumerate() {
            let body = &mut bodies[index];
            if body.uses_far_mesh(camera_world) {
                // The far mesh covers rendering; shed any leftover detail.
                collapse_toward_roots(body, pool, &mut stats);
            } else if rank >= self.detailed_bodies {
                hold_at_roots(body, pool, &mut stats);
            } else {
                traverse(body, pool, camera_world, frustum, &mut stats);
            }
        }

        if stats.splits > 0 || stats.merges > 0 {
            debug!(
                "lod frame: {} splits, {} merges, {} visited, {} culled",
                stats.splits, stats.merges, stats.nodes_visited, stats.culled
            );
        }
        stats
    }

    /// Drain the pool and deliver each completion to the node that asked
    /// for it.
    fn apply_completions(&self, bodies: &mut [Body], pool: &mut JobPool, stats: &mut FrameStats) {
        for completion in pool.pump_completed() {
            route_completion(bodies, completion, stats);
        }
    }
}

/// Deliver one build outcome to the node that requested it.
///
/// A malformed buffer is delivered as a failure so the node's pending slot
/// clears and traversal re-requests; results that no longer route (node
/// destroyed or regenerated) are dropped. Returns `true` if a node accepted
/// the outcome.
fn route_completion(
    bodies: &mut [Body],
    completion: Result<BuildResult, JobError>,
    stats: &mut FrameStats,
) -> bool {
    stats.jobs_completed += 1;
    let mut mesh_ok = true;
    let (body_id, rect, job_id, mesh) = match completion {
        Ok(result) => {
            if result.mesh.is_well_formed() {
                (
                    result.body_id,
                    result.rect,
                    result.job_id,
                    Some(Arc::new(result.mesh)),
                )
            } else {
                mesh_ok = false;
                (result.body_id, result.rect, result.job_id, None)
            }
        }
        // Already logged by the pool; clear the pending flag so the node
        // retries on its next visit.
        Err(err) => (err.body_id, err.rect, err.job_id, None),
    };
    let accepted = bodies
        .iter_mut()
        .find(|b| b.id == body_id)
        .and_then(|b| b.route(&rect))
        .is_some_and(|node| node.apply_completion(job_id, mesh));
    if !accepted || !mesh_ok {
        stats.results_discarded += 1;
    }
    accepted
}

/// Full depth-first traversal of one body's six quadtrees.
fn traverse(
    body: &mut Body,
    pool: &mut JobPool,
    camera_world: DVec3,
    frustum: &Frustum,
    stats: &mut FrameStats,
) {
    let cam_local = body.to_local(camera_world);
    let body_position = body.position;
    let max_level = body.effective_max_level();
    let split_factor = body.params.split_factor;
    let merge_factor = body.params.merge_factor;
    let active_distance = body.params.active_distance;
    let mut split_budget = body.params.split_budget;
    let mut merge_budget = body.params.merge_budget;

    let mut ctx = body.build_context(pool);
    let mut stack: Vec<&mut PatchNode> = body.roots_mut().iter_mut().collect();
    while let Some(node) = stack.pop() {
        stats.nodes_visited += 1;
        node.try_finalize();

        let distance = (cam_local - node.bounds.center).length();
        let visible = distance - node.bounds.radius < active_distance
            && frustum.intersects_sphere(node.bounds.center + body_position, node.bounds.radius);
        if !visible {
            stats.culled += 1;
            // Shed detail, but never touch a displayed mesh directly: merge
            // transitions keep coverage until replacements arrive.
            if node.has_children() && merge_budget > 0 && node.merge(&mut ctx) {
                merge_budget -= 1;
                stats.merges += 1;
            }
            continue;
        }

        let edge = node.rect.edge_length(ctx.radius);
        let want_split = node.rect.level < max_level && distance < edge * split_factor;
        let want_merge = distance > edge * merge_factor;

        if node.has_children() {
            if want_merge {
                if merge_budget > 0 && node.merge(&mut ctx) {
                    merge_budget -= 1;
                    stats.merges += 1;
                }
                // A merging node's children only wait to be dropped; no
                // point refining them.
                continue;
            }
            if node.is_merging() {
                // Direction change: the camera came back before the merge
                // resolved.
                node.cancel_merge();
            }
            if let Some(children) = node.children_mut() {
                stack.extend(children.iter_mut());
            }
        } else if want_split && split_budget > 0 {
            if node.split(&mut ctx) {
                split_budget -= 1;
                stats.splits += 1;
            } else {
                // An empty leaf cannot split yet; get its mesh going first.
                node.ensure_mesh(&mut ctx);
            }
        } else {
            node.ensure_mesh(&mut ctx);
        }
    }
}

/// Keep only root patches alive: merge anything deeper, mesh the roots.
fn hold_at_roots(body: &mut Body, pool: &mut JobPool, stats: &mut FrameStats) {
    let mut merge_budget = body.params.merge_budget;
    let mut ctx = body.build_context(pool);
    for root in body.roots_mut() {
        root.try_finalize();
        if root.has_children() {
            if merge_budget > 0 && root.merge(&mut ctx) {
                merge_budget -= 1;
                stats.merges += 1;
            }
        } else {
            root.ensure_mesh(&mut ctx);
        }
    }
}

/// Far-mesh bodies: shed the quadtree entirely, request nothing.
fn collapse_toward_roots(body: &mut Body, pool: &mut JobPool, stats: &mut FrameStats) {
    let mut merge_budget = body.params.merge_budget;
    let mut ctx = body.build_context(pool);
    for root in body.roots_mut() {
        root.try_finalize();
        if root.has_children() && merge_budget > 0 && root.merge(&mut ctx) {
            merge_budget -= 1;
            stats.merges += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DMat4;
    use tellus_cubesphere::PatchRect;
    use tellus_pool::BodyId;
    use tellus_terrain::{BiomeParameters, HeightFieldConfig};

    use crate::body::BodyParams;

    const RADIUS: f64 = 1400.0;

    fn test_params(max_level: u8) -> BodyParams {
        BodyParams {
            name: "testworld".into(),
            height_field: HeightFieldConfig {
                seed: 42,
                base_radius: RADIUS,
                sea_level: RADIUS,
                amplitude: 20.0,
                ..Default::default()
            },
            biome: BiomeParameters {
                sea_level: RADIUS,
                ..Default::default()
            },
            grid_n: 5,
            max_level,
            far_mesh_subdivisions: 1,
            ..Default::default()
        }
    }

    fn camera_and_frustum(position: DVec3, target: DVec3) -> (DVec3, Frustum) {
        let proj = DMat4::perspective_rh(70_f64.to_radians(), 16.0 / 9.0, 0.1, 1.0e9);
        let view = DMat4::look_at_rh(position, target, DVec3::Y);
        (position, Frustum::from_view_projection(&(proj * view)))
    }

    /// Displayed UV area summed over all six faces; 6.0 is full coverage.
    fn coverage(body: &Body) -> f64 {
        body.collect_draws()
            .iter()
            .map(|d| {
                let (u0, v0, u1, v1) = d.rect.uv_bounds();
                (u1 - u0) * (v1 - v0)
            })
            .sum()
    }

    fn run_frames(
        controller: &LodController,
        bodies: &mut [Body],
        pool: &mut JobPool,
        camera: DVec3,
        frustum: &Frustum,
        frames: usize,
    ) -> FrameStats {
        let mut last = FrameStats::default();
        for _ in 0..frames {
            last = controller.update(bodies, pool, camera, frustum);
        }
        last
    }

    #[test]
    fn test_distant_camera_settles_at_root_coverage() {
        let mut pool = JobPool::new(0);
        let mut bodies = vec![Body::new(BodyId(1), test_params(3), &mut pool)];
        let controller = LodController::default();
        let (camera, frustum) =
            camera_and_frustum(DVec3::new(RADIUS * 20.0, 0.0, 0.0), DVec3::ZERO);

        run_frames(&controller, &mut bodies, &mut pool, camera, &frustum, 4);
        assert!(
            (coverage(&bodies[0]) - 6.0).abs() < 1e-9,
            "six root patches should cover the body, got {}",
            coverage(&bodies[0])
        );
        assert_eq!(bodies[0].node_count(), 6);
    }

    #[test]
    fn test_close_camera_splits_and_never_opens_holes() {
        let mut pool = JobPool::new(0);
        let mut bodies = vec![Body::new(BodyId(1), test_params(3), &mut pool)];
        let controller = LodController::default();

        // Settle at roots first.
        let (far_cam, far_frustum) =
            camera_and_frustum(DVec3::new(RADIUS * 20.0, 0.0, 0.0), DVec3::ZERO);
        run_frames(&controller, &mut bodies, &mut pool, far_cam, &far_frustum, 4);

        // Drop to just above the surface on +X.
        let (camera, frustum) =
            camera_and_frustum(DVec3::new(RADIUS + 30.0, 0.0, 0.0), DVec3::ZERO);
        let mut total_splits = 0;
        for _ in 0..100 {
            let stats = controller.update(&mut bodies, &mut pool, camera, &frustum);
            total_splits += stats.splits;
            assert!(
                stats.splits <= bodies[0].params.split_budget,
                "per-frame split budget exceeded"
            );
            let c = coverage(&bodies[0]);
            assert!(
                (c - 6.0).abs() < 1e-9,
                "coverage dropped to {c} mid-refinement"
            );
        }
        assert!(total_splits > 0, "the camera is close enough to force splits");
        assert!(
            bodies[0].node_count() > 6,
            "refinement should have deepened the tree"
        );
    }

    #[test]
    fn test_teleporting_away_merges_back_without_holes() {
        let mut pool = JobPool::new(0);
        let mut bodies = vec![Body::new(BodyId(1), test_params(3), &mut pool)];
        let controller = LodController::default();

        let (near_cam, near_frustum) =
            camera_and_frustum(DVec3::new(RADIUS + 30.0, 0.0, 0.0), DVec3::ZERO);
        run_frames(&controller, &mut bodies, &mut pool, near_cam, &near_frustum, 100);
        let deep_count = bodies[0].node_count();
        assert!(deep_count > 6);

        // Far enough that even the root patches are past the merge
        // distance (root edge * merge factor is about 22 radii).
        let (far_cam, far_frustum) =
            camera_and_frustum(DVec3::new(RADIUS * 30.0, 0.0, 0.0), DVec3::ZERO);
        let mut total_merges = 0;
        for _ in 0..200 {
            let stats = controller.update(&mut bodies, &mut pool, far_cam, &far_frustum);
            total_merges += stats.merges;
            assert!(
                stats.merges <= bodies[0].params.merge_budget,
                "per-frame merge budget exceeded"
            );
            let c = coverage(&bodies[0]);
            assert!((c - 6.0).abs() < 1e-9, "coverage dropped to {c} mid-merge");
        }
        assert!(total_merges > 0);
        assert_eq!(
            bodies[0].node_count(),
            6,
            "the tree should collapse back to the six roots"
        );
    }

    #[test]
    fn test_only_nearest_bodies_get_detail() {
        let mut pool = JobPool::new(0);
        let near = Body::new(BodyId(1), test_params(3), &mut pool);
        let mut far_params = test_params(3);
        far_params.position = DVec3::new(RADIUS * 40.0, 0.0, 0.0);
        let far = Body::new(BodyId(2), far_params, &mut pool);
        let mut bodies = vec![near, far];

        let controller = LodController { detailed_bodies: 1 };
        let (camera, frustum) =
            camera_and_frustum(DVec3::new(RADIUS + 30.0, 0.0, 0.0), DVec3::X * RADIUS * 40.0);
        run_frames(&controller, &mut bodies, &mut pool, camera, &frustum, 50);

        assert!(bodies[0].node_count() > 6, "near body should refine");
        assert_eq!(bodies[1].node_count(), 6, "far body stays at root patches");
    }

    #[test]
    fn test_far_mesh_bodies_issue_no_jobs() {
        let mut pool = JobPool::new(0);
        let mut params = test_params(3);
        params.far_distance = RADIUS; // anything beyond 2x radius is "far"
        let mut bodies = vec![Body::new(BodyId(1), params, &mut pool)];
        let controller = LodController::default();
        let (camera, frustum) =
            camera_and_frustum(DVec3::new(RADIUS * 10.0, 0.0, 0.0), DVec3::ZERO);

        let stats = run_frames(&controller, &mut bodies, &mut pool, camera, &frustum, 3);
        assert_eq!(stats.jobs_completed, 0, "far bodies request nothing");
        assert!(bodies[0].collect_draws().is_empty());
        assert!(bodies[0].uses_far_mesh(camera));
        assert!(bodies[0].far_mesh().triangle_count() > 0);
    }

    #[test]
    fn test_malformed_result_clears_pending_for_retry() {
        use crate::node::{MeshSlot, NodeState};

        let mut pool = JobPool::new(0);
        let mut bodies = vec![Body::new(BodyId(1), test_params(1), &mut pool)];
        let controller = LodController::default();
        let (camera, frustum) =
            camera_and_frustum(DVec3::new(RADIUS * 20.0, 0.0, 0.0), DVec3::ZERO);

        // The first frame requests the six root meshes; intercept one
        // completion and truncate its vertex buffer before delivery.
        controller.update(&mut bodies, &mut pool, camera, &frustum);
        let mut completions = pool.pump_completed();
        assert_eq!(completions.len(), 6);
        let mut result = completions.remove(0).expect("sync build succeeds");
        result.mesh.vertices.truncate(3);
        let rect = result.rect;

        let mut stats = FrameStats::default();
        let accepted = route_completion(&mut bodies, Ok(result), &mut stats);
        assert!(accepted, "the resolved job must reach its node");
        assert_eq!(stats.results_discarded, 1, "the bad mesh itself is dropped");
        {
            let node = bodies[0].route(&rect).expect("root still exists");
            assert!(
                matches!(
                    node.state,
                    NodeState::Leaf {
                        mesh: MeshSlot::Empty
                    }
                ),
                "a malformed result must leave the node retryable"
            );
        }
        for completion in completions {
            route_completion(&mut bodies, completion, &mut stats);
        }

        // The next traversal re-requests the mesh instead of waiting on a
        // job that already resolved.
        controller.update(&mut bodies, &mut pool, camera, &frustum);
        {
            let node = bodies[0].route(&rect).expect("root still exists");
            assert!(
                matches!(
                    node.state,
                    NodeState::Leaf {
                        mesh: MeshSlot::Pending(_)
                    }
                ),
                "traversal should issue a fresh build"
            );
        }
        controller.update(&mut bodies, &mut pool, camera, &frustum);
        assert!(
            bodies[0].route(&rect).unwrap().ready_mesh().is_some(),
            "the retry must produce a usable mesh"
        );
    }

    #[test]
    fn test_completion_for_destroyed_node_is_discarded() {
        let mut pool = JobPool::new(2);
        let mut bodies = vec![Body::new(BodyId(1), test_params(3), &mut pool)];
        let controller = LodController::default();
        let (camera, frustum) =
            camera_and_frustum(DVec3::new(RADIUS + 30.0, 0.0, 0.0), DVec3::ZERO);

        // Refine with live workers, then rebuild the body while jobs are in
        // flight; their results must be dropped quietly.
        for _ in 0..10 {
            controller.update(&mut bodies, &mut pool, camera, &frustum);
        }
        bodies[0] = Body::new(BodyId(1), test_params(3), &mut pool);

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(30);
        while (pool.in_flight() > 0 || pool.queued_len() > 0)
            && std::time::Instant::now() < deadline
        {
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        let stats = controller.update(&mut bodies, &mut pool, camera, &frustum);
        assert_eq!(
            stats.results_discarded, stats.jobs_completed,
            "every orphaned completion must be discarded"
        );

        // The rebuilt tree still works once the workers catch up.
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(30);
        while coverage(&bodies[0]) < 6.0 - 1e-9 && std::time::Instant::now() < deadline {
            controller.update(&mut bodies, &mut pool, camera, &frustum);
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        assert!((coverage(&bodies[0]) - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_culled_subtrees_merge_but_keep_their_meshes() {
        let mut pool = JobPool::new(0);
        let mut bodies = vec![Body::new(BodyId(1), test_params(2), &mut pool)];
        let controller = LodController::default();

        let (camera, frustum) =
            camera_and_frustum(DVec3::new(RADIUS + 30.0, 0.0, 0.0), DVec3::ZERO);
        run_frames(&controller, &mut bodies, &mut pool, camera, &frustum, 60);
        assert!((coverage(&bodies[0]) - 6.0).abs() < 1e-9);

        // Look away: everything culls, merges run, but coverage of already
        // built patches is untouched.
        let (camera, frustum) = camera_and_frustum(
            DVec3::new(RADIUS + 30.0, 0.0, 0.0),
            DVec3::new(RADIUS * 100.0, 0.0, 0.0),
        );
        for _ in 0..100 {
            controller.update(&mut bodies, &mut pool, camera, &frustum);
            assert!((coverage(&bodies[0]) - 6.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_root_rect_sanity() {
        // Traversal assumes roots are level 0 and unsplittable past
        // max_level 0.
        let mut pool = JobPool::new(0);
        let mut params = test_params(0);
        params.max_level = 0;
        let mut bodies = vec![Body::new(BodyId(1), params, &mut pool)];
        let controller = LodController::default();
        let (camera, frustum) =
            camera_and_frustum(DVec3::new(RADIUS + 10.0, 0.0, 0.0), DVec3::ZERO);
        run_frames(&controller, &mut bodies, &mut pool, camera, &frustum, 10);
        assert_eq!(bodies[0].node_count(), 6);
        for root in bodies[0].roots() {
            assert_eq!(root.rect, PatchRect::root(root.rect.face));
        }
    }
}
