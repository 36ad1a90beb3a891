//! Vertex and index buffer types shared between workers and the renderer.

use bytemuck::{Pod, Zeroable};

/// One terrain vertex as uploaded to the GPU.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct TerrainVertex {
    /// Position in body-local space.
    pub position: [f32; 3],
    /// Blended surface normal.
    pub normal: [f32; 3],
    /// Biome vertex color.
    pub color: [f32; 3],
}

/// An index buffer in either width.
///
/// Patches small enough for 16-bit indices use them; the width is decided
/// from the vertex count, not per call site.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexData {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl IndexData {
    /// Number of indices.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::U16(v) => v.len(),
            Self::U32(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw bytes for buffer upload.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::U16(v) => bytemuck::cast_slice(v),
            Self::U32(v) => bytemuck::cast_slice(v),
        }
    }

    /// Index at `i`, widened to u32.
    #[must_use]
    pub fn get(&self, i: usize) -> u32 {
        match self {
            Self::U16(v) => u32::from(v[i]),
            Self::U32(v) => v[i],
        }
    }
}

/// Identifies which cached index set a patch mesh renders with.
///
/// Carried by value in every [`PatchMesh`]; resolved against the shared
/// [`crate::IndexCache`] at draw time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IndexSelector {
    /// Grid resolution the indices were generated for.
    pub grid_n: u32,
    /// Whether triangle winding is flipped for this patch's cube face.
    pub flip: bool,
    /// True if the vertex count forced 32-bit indices.
    pub wide: bool,
}

/// A fully built patch: vertex grid plus skirt ring.
///
/// Vertex layout: `grid_n * grid_n` surface vertices in row-major `(u, v)`
/// order, followed by `4 * grid_n` skirt vertices (bottom, top, left, right
/// edges in that order). Index buffers live in the shared cache.
#[derive(Clone, Debug)]
pub struct PatchMesh {
    pub vertices: Vec<TerrainVertex>,
    pub grid_n: u32,
    pub selector: IndexSelector,
}

impl PatchMesh {
    /// Expected vertex count for a grid resolution, skirt included.
    #[must_use]
    pub fn expected_vertex_count(grid_n: u32) -> usize {
        (grid_n * grid_n + 4 * grid_n) as usize
    }

    /// True if the buffer sizes are consistent with `grid_n`.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.grid_n >= 2
            && self.vertices.len() == Self::expected_vertex_count(self.grid_n)
            && self.selector.grid_n == self.grid_n
    }

    /// Vertex bytes for buffer upload.
    #[must_use]
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }
}
