//! Grid-and-skirt vertex construction for one patch.
//!
//! Pure CPU work with no shared mutable state; this is the function worker
//! threads spend their time in, and the same function serves as the
//! synchronous fallback when no workers are available.

use glam::DVec3;

use tellus_cubesphere::{CubeFace, face_winding_flips, patch_direction};
use tellus_terrain::{BiomeParameters, BodyKind, HeightField};

use crate::buffers::{IndexSelector, PatchMesh, TerrainVertex};
use crate::index_cache::IndexCache;

/// Skirt depth for a patch with the given edge arc length.
///
/// Proportional to the edge so coarse patches get deep skirts and fine ones
/// stay shallow, clamped to `[6, 140]` engine units.
#[must_use]
pub fn skirt_depth_for_edge(edge_length: f64) -> f64 {
    (edge_length * 0.05).clamp(6.0, 140.0)
}

/// Build the vertex buffers for one UV rectangle of a cube face.
///
/// Produces `grid_n * grid_n` surface vertices followed by `4 * grid_n`
/// skirt vertices displaced inward along their normals by `skirt_depth`.
/// Index buffers come from the shared [`IndexCache`] via the returned
/// selector.
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn build_patch(
    field: &HeightField,
    biome: &BiomeParameters,
    face: CubeFace,
    (u0, v0, u1, v1): (f64, f64, f64, f64),
    grid_n: u32,
    normal_eps: f64,
    skirt_depth: f64,
) -> PatchMesh {
    assert!(grid_n >= 2, "a patch grid needs at least 2x2 vertices");
    let n = grid_n as usize;
    let mut vertices = Vec::with_capacity(PatchMesh::expected_vertex_count(grid_n));

    // Gas giants have no surface relief: the undisplaced sphere is the
    // surface, and the radial direction is its exact normal.
    let banded = biome.kind == BodyKind::GasGiant;

    let step = 1.0 / f64::from(grid_n - 1);
    for y in 0..n {
        for x in 0..n {
            let u = u0 + (u1 - u0) * (x as f64 * step);
            let v = v0 + (v1 - v0) * (y as f64 * step);
            let dir = patch_direction(face, u, v);
            let radius = if banded {
                field.config().base_radius
            } else {
                field.radius_at_direction(dir)
            };
            let position = dir * radius;
            let normal = if banded {
                dir
            } else {
                field.normal(position, normal_eps)
            };
            let color = biome.surface_color(dir, radius);
            vertices.push(TerrainVertex {
                position: position.as_vec3().to_array(),
                normal: normal.as_vec3().to_array(),
                color: color.to_array(),
            });
        }
    }

    // Skirt ring: duplicate each boundary vertex, pushed inward along its
    // normal. Edge order matches the index cache: bottom, top, left, right.
    for edge in 0..4u32 {
        for k in 0..n {
            let grid_index = match edge {
                0 => k,
                1 => (n - 1) * n + k,
                2 => k * n,
                _ => k * n + (n - 1),
            };
            let v = vertices[grid_index];
            let sunk = DVec3::from(v.position.map(f64::from))
                - DVec3::from(v.normal.map(f64::from)) * skirt_depth;
            vertices.push(TerrainVertex {
                position: sunk.as_vec3().to_array(),
                ..v
            });
        }
    }

    PatchMesh {
        vertices,
        grid_n,
        selector: IndexSelector {
            grid_n,
            flip: face_winding_flips(face),
            wide: IndexCache::wide_for(grid_n),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tellus_cubesphere::PatchRect;
    use tellus_terrain::HeightFieldConfig;

    fn test_field() -> HeightField {
        HeightField::new(HeightFieldConfig {
            seed: 42,
            base_radius: 1400.0,
            amplitude: 20.0,
            sea_level: 1400.0,
            seabed_depth: 6.0,
            ..Default::default()
        })
    }

    fn test_biome() -> BiomeParameters {
        BiomeParameters {
            sea_level: 1400.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_build_produces_well_formed_mesh() {
        let rect = PatchRect::new(CubeFace::PosX, 2, 1, 3);
        let mesh = build_patch(
            &test_field(),
            &test_biome(),
            rect.face,
            rect.uv_bounds(),
            17,
            0.5,
            10.0,
        );
        assert!(mesh.is_well_formed());
        assert_eq!(mesh.vertices.len(), 17 * 17 + 4 * 17);
    }

    #[test]
    fn test_surface_vertices_sit_on_the_height_field() {
        let field = test_field();
        let rect = PatchRect::new(CubeFace::NegY, 3, 2, 5);
        let mesh = build_patch(
            &field,
            &test_biome(),
            rect.face,
            rect.uv_bounds(),
            9,
            0.5,
            10.0,
        );
        for v in &mesh.vertices[..81] {
            let p = DVec3::from(v.position.map(f64::from));
            let dir = p.normalize();
            let expected = field.radius_at_direction(dir);
            // f32 storage loses some precision at planetary scale.
            assert!(
                (p.length() - expected).abs() < 0.01,
                "vertex radius {} vs field radius {expected}",
                p.length()
            );
        }
    }

    #[test]
    fn test_skirt_vertices_sink_below_their_edge() {
        let depth = 25.0;
        let mesh = build_patch(
            &test_field(),
            &test_biome(),
            CubeFace::PosZ,
            (0.0, 0.0, 1.0, 1.0),
            9,
            0.5,
            depth,
        );
        let n = 9usize;
        let surface = &mesh.vertices[..n * n];
        let skirt = &mesh.vertices[n * n..];
        assert_eq!(skirt.len(), 4 * n);

        // Bottom edge skirt vertex k pairs with grid vertex k.
        for k in 0..n {
            let e = DVec3::from(surface[k].position.map(f64::from));
            let s = DVec3::from(skirt[k].position.map(f64::from));
            let offset = (e - s).length();
            assert!(
                (offset - depth).abs() < 0.01,
                "skirt offset {offset} should equal depth {depth}"
            );
            assert!(s.length() < e.length(), "skirt must sink toward the body");
        }
    }

    #[test]
    fn test_adjacent_patches_share_boundary_vertices() {
        let field = test_field();
        let biome = test_biome();
        let parent = PatchRect::new(CubeFace::PosY, 1, 0, 0);
        let children = parent.children().unwrap();
        let n = 9u32;
        // children[0] right edge (u = mid) equals children[1] left edge.
        let left = build_patch(
            &field,
            &biome,
            parent.face,
            children[0].uv_bounds(),
            n,
            0.5,
            10.0,
        );
        let right = build_patch(
            &field,
            &biome,
            parent.face,
            children[1].uv_bounds(),
            n,
            0.5,
            10.0,
        );
        let n = n as usize;
        for row in 0..n {
            let a = left.vertices[row * n + (n - 1)].position;
            let b = right.vertices[row * n].position;
            assert_eq!(a, b, "boundary row {row} must match exactly");
        }
    }

    #[test]
    fn test_gas_giant_patches_are_undisplaced() {
        let field = test_field();
        let biome = BiomeParameters {
            kind: BodyKind::GasGiant,
            sea_level: 1400.0,
            ..Default::default()
        };
        let mesh = build_patch(
            &field,
            &biome,
            CubeFace::PosX,
            (0.0, 0.0, 1.0, 1.0),
            9,
            0.5,
            10.0,
        );
        let base = field.config().base_radius;
        for v in &mesh.vertices[..81] {
            let p = DVec3::from(v.position.map(f64::from));
            assert!(
                (p.length() - base).abs() < 0.01,
                "gas giant vertex at radius {}, expected {base}",
                p.length()
            );
            let dir = p.normalize();
            let n = DVec3::from(v.normal.map(f64::from));
            assert!((n - dir).length() < 1e-6, "normal must be radial");
        }
    }

    #[test]
    fn test_skirt_depth_clamps() {
        assert_eq!(skirt_depth_for_edge(10.0), 6.0);
        assert_eq!(skirt_depth_for_edge(10_000.0), 140.0);
        let mid = skirt_depth_for_edge(1000.0);
        assert!((mid - 50.0).abs() < 1e-12);
    }
}
