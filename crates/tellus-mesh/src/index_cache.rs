//! Shared cache of patch index buffers.
//!
//! Every patch with the same grid resolution renders with the same index
//! buffer, so indices are generated once per `(grid_n, index width)` and
//! shared across all bodies. A pre-flipped copy is stored alongside the
//! canonical one so faces whose basis winds inward can be corrected without
//! rebuilding indices per patch.

use std::collections::HashMap;
use std::sync::Arc;

use crate::buffers::{IndexData, PatchMesh};

/// Surface and skirt index buffers for one grid resolution, in both windings.
#[derive(Debug)]
pub struct PatchIndices {
    surface: IndexData,
    surface_flipped: IndexData,
    skirt: IndexData,
    skirt_flipped: IndexData,
}

impl PatchIndices {
    /// Surface indices for the requested winding.
    #[must_use]
    pub fn surface(&self, flip: bool) -> &IndexData {
        if flip { &self.surface_flipped } else { &self.surface }
    }

    /// Skirt indices for the requested winding.
    #[must_use]
    pub fn skirt(&self, flip: bool) -> &IndexData {
        if flip { &self.skirt_flipped } else { &self.skirt }
    }
}

/// Cache of [`PatchIndices`] keyed by grid resolution.
///
/// Entries are immutable once built and handed out as `Arc`s, so they can be
/// held across frames and shared between bodies.
#[derive(Debug, Default)]
pub struct IndexCache {
    entries: HashMap<u32, Arc<PatchIndices>>,
    hits: u64,
    misses: u64,
}

impl IndexCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `grid_n` needs 32-bit indices.
    #[must_use]
    pub fn wide_for(grid_n: u32) -> bool {
        PatchMesh::expected_vertex_count(grid_n) > usize::from(u16::MAX)
    }

    /// Fetch (building on first use) the index buffers for `grid_n`.
    pub fn get(&mut self, grid_n: u32) -> Arc<PatchIndices> {
        if let Some(entry) = self.entries.get(&grid_n) {
            self.hits += 1;
            return Arc::clone(entry);
        }
        self.misses += 1;
        let entry = Arc::new(build_indices(grid_n));
        self.entries.insert(grid_n, Arc::clone(&entry));
        entry
    }

    /// Cache hits since creation.
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Cache misses (entries built) since creation.
    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Number of distinct grid resolutions cached.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn narrow(indices: Vec<u32>, wide: bool) -> IndexData {
    if wide {
        IndexData::U32(indices)
    } else {
        IndexData::U16(indices.into_iter().map(|i| i as u16).collect())
    }
}

fn flip_triangles(indices: &[u32]) -> Vec<u32> {
    let mut flipped = indices.to_vec();
    for tri in flipped.chunks_exact_mut(3) {
        tri.swap(1, 2);
    }
    flipped
}

fn build_indices(grid_n: u32) -> PatchIndices {
    assert!(grid_n >= 2, "a patch grid needs at least 2x2 vertices");
    let n = grid_n;
    let wide = IndexCache::wide_for(n);

    let mut surface = Vec::with_capacity(((n - 1) * (n - 1) * 6) as usize);
    for y in 0..n - 1 {
        for x in 0..n - 1 {
            let i00 = y * n + x;
            let i10 = i00 + 1;
            let i01 = i00 + n;
            let i11 = i01 + 1;
            surface.extend_from_slice(&[i00, i01, i10, i10, i01, i11]);
        }
    }

    // Skirt vertices sit after the grid: 4 edges of n vertices each, in
    // bottom/top/left/right order, matching the layout documented on
    // PatchMesh.
    let skirt_base = n * n;
    let grid_edge_index = |edge: u32, k: u32| match edge {
        0 => k,
        1 => (n - 1) * n + k,
        2 => k * n,
        _ => k * n + (n - 1),
    };
    let mut skirt = Vec::with_capacity((4 * (n - 1) * 6) as usize);
    for edge in 0..4 {
        let base = skirt_base + edge * n;
        for k in 0..n - 1 {
            let e0 = grid_edge_index(edge, k);
            let e1 = grid_edge_index(edge, k + 1);
            let s0 = base + k;
            let s1 = base + k + 1;
            skirt.extend_from_slice(&[e0, s0, e1, e1, s0, s1]);
        }
    }

    let surface_flipped = flip_triangles(&surface);
    let skirt_flipped = flip_triangles(&skirt);
    PatchIndices {
        surface: narrow(surface, wide),
        surface_flipped: narrow(surface_flipped, wide),
        skirt: narrow(skirt, wide),
        skirt_flipped: narrow(skirt_flipped, wide),
    }
}
