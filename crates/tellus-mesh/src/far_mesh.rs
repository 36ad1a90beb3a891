//! Pre-baked low-poly sphere for distant bodies.
//!
//! An icosphere (subdivided icosahedron) displaced and colored by the body's
//! height field once at body creation. Distant bodies render this single
//! mesh instead of running patch traversal.

use std::collections::HashMap;

use glam::DVec3;

use tellus_terrain::{BiomeParameters, BodyKind, HeightField};

use crate::buffers::TerrainVertex;

/// A baked far-distance mesh for one body.
#[derive(Clone, Debug)]
pub struct FarMesh {
    pub vertices: Vec<TerrainVertex>,
    pub indices: Vec<u32>,
}

impl FarMesh {
    /// Bake a far mesh by displacing a subdivided icosahedron onto the
    /// body's surface. Each subdivision quadruples the triangle count;
    /// 3 or 4 levels are plenty for a body a few pixels across.
    #[must_use]
    pub fn bake(field: &HeightField, biome: &BiomeParameters, subdivisions: u32) -> Self {
        // Gas giants have no relief; keep the undisplaced sphere.
        let banded = biome.kind == BodyKind::GasGiant;
        let (mut directions, indices) = icosphere(subdivisions);
        let vertices = directions
            .drain(..)
            .map(|dir| {
                let radius = if banded {
                    field.config().base_radius
                } else {
                    field.radius_at_direction(dir)
                };
                let position = dir * radius;
                TerrainVertex {
                    position: position.as_vec3().to_array(),
                    normal: dir.as_vec3().to_array(),
                    color: biome.surface_color(dir, radius).to_array(),
                }
            })
            .collect();
        Self { vertices, indices }
    }

    /// Number of triangles.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Unit icosphere: vertex directions and triangle indices.
fn icosphere(subdivisions: u32) -> (Vec<DVec3>, Vec<u32>) {
    // Icosahedron from three orthogonal golden rectangles.
    let phi = (1.0 + 5.0_f64.sqrt()) / 2.0;
    let mut directions: Vec<DVec3> = [
        (-1.0, phi, 0.0),
        (1.0, phi, 0.0),
        (-1.0, -phi, 0.0),
        (1.0, -phi, 0.0),
        (0.0, -1.0, phi),
        (0.0, 1.0, phi),
        (0.0, -1.0, -phi),
        (0.0, 1.0, -phi),
        (phi, 0.0, -1.0),
        (phi, 0.0, 1.0),
        (-phi, 0.0, -1.0),
        (-phi, 0.0, 1.0),
    ]
    .iter()
    .map(|&(x, y, z)| DVec3::new(x, y, z).normalize())
    .collect();

    let mut indices: Vec<u32> = vec![
        0, 11, 5, 0, 5, 1, 0, 1, 7, 0, 7, 10, 0, 10, 11, //
        1, 5, 9, 5, 11, 4, 11, 10, 2, 10, 7, 6, 7, 1, 8, //
        3, 9, 4, 3, 4, 2, 3, 2, 6, 3, 6, 8, 3, 8, 9, //
        4, 9, 5, 2, 4, 11, 6, 2, 10, 8, 6, 7, 9, 8, 1,
    ];

    for _ in 0..subdivisions {
        let mut midpoints: HashMap<(u32, u32), u32> = HashMap::new();
        let mut midpoint = |a: u32, b: u32, directions: &mut Vec<DVec3>| -> u32 {
            let key = (a.min(b), a.max(b));
            if let Some(&i) = midpoints.get(&key) {
                return i;
            }
            let dir = (directions[a as usize] + directions[b as usize]).normalize();
            let i = directions.len() as u32;
            directions.push(dir);
            midpoints.insert(key, i);
            i
        };

        let mut next = Vec::with_capacity(indices.len() * 4);
        for tri in indices.chunks_exact(3) {
            let (a, b, c) = (tri[0], tri[1], tri[2]);
            let ab = midpoint(a, b, &mut directions);
            let bc = midpoint(b, c, &mut directions);
            let ca = midpoint(c, a, &mut directions);
            next.extend_from_slice(&[a, ab, ca, b, bc, ab, c, ca, bc, ab, bc, ca]);
        }
        indices = next;
    }

    (directions, indices)
}
