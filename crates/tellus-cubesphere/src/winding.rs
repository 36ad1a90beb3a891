//! Outward-winding detection for the six cube faces.
//!
//! Triangles must wind counter-clockwise seen from outside the body so that
//! backface culling works on every face. Whether a face's natural
//! `(u, v)` grid order winds outward depends on its basis handedness
//! relative to the sphere; this is decided once per face with a single
//! triangle-normal test and consumed as a flip table by index generation.

use glam::DVec3;

use crate::{CubeFace, patch_direction};

/// True if the triangle `(v0, v1, v2)` winds outward: its cross-product
/// normal points away from the body center (positive dot with the centroid).
#[must_use]
pub fn triangle_winds_outward(v0: DVec3, v1: DVec3, v2: DVec3) -> bool {
    let normal = (v1 - v0).cross(v2 - v0);
    let centroid = (v0 + v1 + v2) / 3.0;
    normal.dot(centroid) > 0.0
}

/// Whether grid-order triangles on `face` must be flipped to wind outward.
///
/// Tested with one small triangle at the face centroid; the answer is
/// uniform across the face because the projection preserves orientation.
#[must_use]
pub fn face_winding_flips(face: CubeFace) -> bool {
    let v0 = patch_direction(face, 0.5, 0.5);
    let v1 = patch_direction(face, 0.502, 0.5);
    let v2 = patch_direction(face, 0.5, 0.502);
    !triangle_winds_outward(v0, v1, v2)
}

/// Flip table for all six faces, indexed by `CubeFace::index()`.
#[must_use]
pub fn winding_flip_table() -> [bool; 6] {
    let mut table = [false; 6];
    for face in CubeFace::ALL {
        table[face.index()] = face_winding_flips(face);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_triangle(face: CubeFace, u: f64, v: f64) -> (DVec3, DVec3, DVec3) {
        let d = 0.004;
        (
            patch_direction(face, u, v),
            patch_direction(face, (u + d).min(1.0), v),
            patch_direction(face, u, (v + d).min(1.0)),
        )
    }

    #[test]
    fn test_corrected_triangles_wind_outward_everywhere() {
        let table = winding_flip_table();
        let samples = [
            (0.1, 0.1),
            (0.9, 0.1),
            (0.1, 0.9),
            (0.9, 0.9),
            (0.5, 0.5),
            (0.3, 0.7),
        ];
        for face in CubeFace::ALL {
            for &(u, v) in &samples {
                let (v0, mut v1, mut v2) = sample_triangle(face, u, v);
                if table[face.index()] {
                    std::mem::swap(&mut v1, &mut v2);
                }
                assert!(
                    triangle_winds_outward(v0, v1, v2),
                    "triangle on {face:?} at ({u}, {v}) winds inward after correction"
                );
            }
        }
    }

    #[test]
    fn test_flip_is_consistent_across_each_face() {
        // The flip decided at the centroid must hold near the corners too.
        for face in CubeFace::ALL {
            let flip = face_winding_flips(face);
            for &(u, v) in &[(0.01, 0.01), (0.98, 0.01), (0.01, 0.98), (0.98, 0.98)] {
                let (v0, v1, v2) = sample_triangle(face, u, v);
                assert_eq!(
                    !triangle_winds_outward(v0, v1, v2),
                    flip,
                    "winding inconsistent on {face:?} at ({u}, {v})"
                );
            }
        }
    }

    #[test]
    fn test_reversing_vertices_reverses_winding() {
        let (v0, v1, v2) = sample_triangle(CubeFace::PosX, 0.4, 0.6);
        assert_ne!(
            triangle_winds_outward(v0, v1, v2),
            triangle_winds_outward(v0, v2, v1)
        );
    }
}
