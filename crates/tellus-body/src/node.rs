//! The per-patch split/merge state machine.
//!
//! A node is always in exactly one of four states, and every transition
//! preserves the coverage invariant: a region of the surface that was
//! visible stays visible until its replacement geometry is ready.
//!
//! - `Leaf`: displays its own mesh (once built).
//! - `Splitting`: children exist and are generating; the node keeps
//!   displaying its own mesh until all four are ready.
//! - `Interior`: children display; the node holds no mesh.
//! - `Merging`: children keep displaying while the node's own mesh is
//!   regenerated; they are dropped only when it arrives.
//!
//! All mutation happens on the control thread. Background workers only ever
//! produce values; results are matched to nodes by job id, so a result for
//! a node that was destroyed or regenerated in the meantime is silently
//! discarded.

use std::sync::Arc;

use tellus_cubesphere::{BoundingSphere, PatchRect};
use tellus_mesh::{PatchMesh, skirt_depth_for_edge};
use tellus_pool::{BodyId, BuildParams, JobId, JobPool};

/// Where a node's own mesh currently is.
#[derive(Debug, Default)]
pub enum MeshSlot {
    /// No mesh and none requested.
    #[default]
    Empty,
    /// A build job is outstanding; only a result with this id is accepted.
    Pending(JobId),
    /// Built and displayable.
    Ready(Arc<PatchMesh>),
}

impl MeshSlot {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

/// The four lifecycle states of a patch node.
#[derive(Debug)]
pub enum NodeState {
    Leaf {
        mesh: MeshSlot,
    },
    Splitting {
        own: MeshSlot,
        children: Box<[PatchNode; 4]>,
    },
    Interior {
        children: Box<[PatchNode; 4]>,
    },
    Merging {
        own: MeshSlot,
        children: Box<[PatchNode; 4]>,
    },
}

/// Everything a node needs to issue build jobs for its body.
pub struct BuildContext<'a> {
    pub pool: &'a mut JobPool,
    pub body_id: BodyId,
    pub grid_n: u32,
    pub normal_eps: f64,
    /// Base radius; sizes skirts and child bounding spheres.
    pub radius: f64,
    /// Lowest terrain displacement on this body.
    pub min_height: f64,
    /// Highest terrain displacement on this body.
    pub max_height: f64,
}

impl BuildContext<'_> {
    fn request(&mut self, rect: &PatchRect) -> JobId {
        let skirt_depth = skirt_depth_for_edge(rect.edge_length(self.radius));
        self.pool.request(BuildParams {
            body_id: self.body_id,
            rect: *rect,
            grid_n: self.grid_n,
            normal_eps: self.normal_eps,
            skirt_depth,
        })
    }

    fn bounds(&self, rect: &PatchRect) -> BoundingSphere {
        BoundingSphere::from_patch(rect, self.radius, self.min_height, self.max_height)
    }
}

/// One node of a body's patch quadtree.
#[derive(Debug)]
pub struct PatchNode {
    pub rect: PatchRect,
    pub bounds: BoundingSphere,
    pub state: NodeState,
}

impl PatchNode {
    /// A fresh leaf with no mesh.
    #[must_use]
    pub fn new(rect: PatchRect, ctx: &BuildContext<'_>) -> Self {
        Self {
            rect,
            bounds: ctx.bounds(&rect),
            state: NodeState::Leaf {
                mesh: MeshSlot::Empty,
            },
        }
    }

    #[must_use]
    pub fn has_children(&self) -> bool {
        self.children().is_some()
    }

    #[must_use]
    pub fn children(&self) -> Option<&[PatchNode; 4]> {
        match &self.state {
            NodeState::Leaf { .. } => None,
            NodeState::Splitting { children, .. }
            | NodeState::Interior { children }
            | NodeState::Merging { children, .. } => Some(children),
        }
    }

    #[must_use]
    pub fn children_mut(&mut self) -> Option<&mut [PatchNode; 4]> {
        match &mut self.state {
            NodeState::Leaf { .. } => None,
            NodeState::Splitting { children, .. }
            | NodeState::Interior { children }
            | NodeState::Merging { children, .. } => Some(children),
        }
    }

    #[must_use]
    pub fn is_merging(&self) -> bool {
        matches!(self.state, NodeState::Merging { .. })
    }

    fn own_slot_mut(&mut self) -> Option<&mut MeshSlot> {
        match &mut self.state {
            NodeState::Leaf { mesh } => Some(mesh),
            NodeState::Splitting { own, .. } | NodeState::Merging { own, .. } => Some(own),
            NodeState::Interior { .. } => None,
        }
    }

    /// The node's own mesh, if built.
    #[must_use]
    pub fn ready_mesh(&self) -> Option<&Arc<PatchMesh>> {
        match &self.state {
            NodeState::Leaf { mesh: MeshSlot::Ready(mesh) }
            | NodeState::Splitting { own: MeshSlot::Ready(mesh), .. }
            | NodeState::Merging { own: MeshSlot::Ready(mesh), .. } => Some(mesh),
            _ => None,
        }
    }

    /// Issue a build job if the node's own slot is empty. No-op for
    /// interior nodes and nodes that are pending or meshed.
    pub fn ensure_mesh(&mut self, ctx: &mut BuildContext<'_>) {
        let rect = self.rect;
        if let Some(slot) = self.own_slot_mut()
            && matches!(slot, MeshSlot::Empty)
        {
            *slot = MeshSlot::Pending(ctx.request(&rect));
        }
    }

    /// Split a leaf into four generating children, keeping the node's own
    /// mesh on screen until all of them are ready.
    ///
    /// Only a leaf that is pending or meshed may split; an empty leaf first
    /// needs `ensure_mesh` so the coverage invariant has something to hold
    /// on to. Returns `true` if the split happened.
    pub fn split(&mut self, ctx: &mut BuildContext<'_>) -> bool {
        let Some(rects) = self.rect.children() else {
            return false;
        };
        let state = std::mem::replace(
            &mut self.state,
            NodeState::Leaf {
                mesh: MeshSlot::Empty,
            },
        );
        match state {
            NodeState::Leaf { mesh } if !matches!(mesh, MeshSlot::Empty) => {
                let mut children = Box::new(rects.map(|rect| PatchNode::new(rect, ctx)));
                for child in children.iter_mut() {
                    child.ensure_mesh(ctx);
                }
                self.state = NodeState::Splitting {
                    own: mesh,
                    children,
                };
                true
            }
            other => {
                self.state = other;
                false
            }
        }
    }

    /// Move the node toward having no children.
    ///
    /// A `Splitting` node cancels immediately: its own mesh (or pending
    /// job) is still there, so the children can be dropped without a gap.
    /// An `Interior` node has nothing to show, so it requests its own mesh
    /// and enters `Merging`; the children survive until it arrives.
    /// Returns `true` if the call changed state.
    pub fn merge(&mut self, ctx: &mut BuildContext<'_>) -> bool {
        let state = std::mem::replace(
            &mut self.state,
            NodeState::Leaf {
                mesh: MeshSlot::Empty,
            },
        );
        match state {
            NodeState::Splitting { own, .. } => {
                self.state = NodeState::Leaf { mesh: own };
                true
            }
            NodeState::Interior { children } => {
                self.state = NodeState::Merging {
                    own: MeshSlot::Empty,
                    children,
                };
                self.ensure_mesh(ctx);
                true
            }
            other => {
                self.state = other;
                false
            }
        }
    }

    /// Abort an in-progress merge: keep the children, drop the node's own
    /// (possibly in-flight) mesh. A late result for the dropped job id is
    /// discarded on arrival.
    pub fn cancel_merge(&mut self) {
        let state = std::mem::replace(
            &mut self.state,
            NodeState::Leaf {
                mesh: MeshSlot::Empty,
            },
        );
        self.state = match state {
            NodeState::Merging { children, .. } => NodeState::Interior { children },
            other => other,
        };
    }

    /// Complete any transition whose awaited meshes have arrived:
    /// `Splitting` becomes `Interior` once all four children are meshed,
    /// `Merging` becomes `Leaf` once its own mesh is back.
    pub fn try_finalize(&mut self) {
        let ready_to_finalize = match &self.state {
            NodeState::Splitting { children, .. } => {
                children.iter().all(|c| c.ready_mesh().is_some())
            }
            NodeState::Merging { own, .. } => own.is_ready(),
            _ => false,
        };
        if !ready_to_finalize {
            return;
        }
        let state = std::mem::replace(
            &mut self.state,
            NodeState::Leaf {
                mesh: MeshSlot::Empty,
            },
        );
        self.state = match state {
            NodeState::Splitting { children, .. } => NodeState::Interior { children },
            NodeState::Merging { own, .. } => NodeState::Leaf { mesh: own },
            other => other,
        };
    }

    /// Descend to the node identified by `rect`, if it still exists.
    pub fn route(&mut self, rect: &PatchRect) -> Option<&mut PatchNode> {
        if self.rect == *rect {
            return Some(self);
        }
        let index = self.rect.child_index_toward(rect)?;
        self.children_mut()?[index].route(rect)
    }

    /// Deliver a build outcome to this node.
    ///
    /// Accepted only if the node's own slot is pending with the same job
    /// id; everything else is a stale or duplicate result and is ignored.
    /// Returns `true` if the mesh was accepted.
    pub fn apply_completion(&mut self, job_id: JobId, mesh: Option<Arc<PatchMesh>>) -> bool {
        let Some(slot) = self.own_slot_mut() else {
            return false;
        };
        if !matches!(slot, MeshSlot::Pending(pending) if *pending == job_id) {
            return false;
        }
        *slot = match mesh {
            Some(mesh) => MeshSlot::Ready(mesh),
            // Failed build: clear the pending flag so traversal retries.
            None => MeshSlot::Empty,
        };
        self.try_finalize();
        true
    }

    /// Collect the meshes this subtree currently displays.
    pub fn collect_draws<'a>(&'a self, out: &mut Vec<DisplayedPatch<'a>>) {
        match &self.state {
            NodeState::Leaf { .. } | NodeState::Splitting { .. } => {
                if let Some(mesh) = self.ready_mesh() {
                    out.push(DisplayedPatch {
                        rect: self.rect,
                        mesh,
                    });
                }
            }
            NodeState::Interior { children } | NodeState::Merging { children, .. } => {
                for child in children.iter() {
                    child.collect_draws(out);
                }
            }
        }
    }

    /// Number of nodes in this subtree, this one included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + self
            .children()
            .map_or(0, |c| c.iter().map(PatchNode::node_count).sum())
    }
}

/// A mesh the tree currently displays, borrowed during collection.
#[derive(Clone, Copy, Debug)]
pub struct DisplayedPatch<'a> {
    pub rect: PatchRect,
    pub mesh: &'a Arc<PatchMesh>,
}
