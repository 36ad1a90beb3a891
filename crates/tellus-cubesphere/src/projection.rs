//! Cube-to-sphere projection.
//!
//! Face UV is first mapped onto the `[-1, 1]` cube through the face basis,
//! then warped onto the unit sphere with the analytic equal-area correction
//! (the "cubesphere correction"). The correction is what keeps patch cell
//! area roughly uniform near cube edges and corners; naive normalization
//! pinches cells toward the corners.

use glam::DVec3;

use crate::{CubeFace, FaceCoord};

/// Map a face UV coordinate to a point on the surface of the `[-1, 1]` cube.
///
/// `(u=0.5, v=0.5)` maps to the face normal.
#[inline]
#[must_use]
pub fn uv_to_cube(fc: &FaceCoord) -> DVec3 {
    let s = 2.0 * fc.u - 1.0;
    let t = 2.0 * fc.v - 1.0;
    fc.face.normal() + s * fc.face.u_axis() + t * fc.face.v_axis()
}

/// Warp a point on the cube surface onto the unit sphere.
///
/// Analytic mapping with near-uniform area distortion:
///
/// ```text
/// sx = x · sqrt(1 − y²/2 − z²/2 + y²z²/3)
/// sy = y · sqrt(1 − x²/2 − z²/2 + x²z²/3)
/// sz = z · sqrt(1 − x²/2 − y²/2 + x²y²/3)
/// ```
#[inline]
#[must_use]
pub fn cube_to_spherical(p: DVec3) -> DVec3 {
    let x2 = p.x * p.x;
    let y2 = p.y * p.y;
    let z2 = p.z * p.z;
    DVec3::new(
        p.x * (1.0 - y2 * 0.5 - z2 * 0.5 + y2 * z2 / 3.0).sqrt(),
        p.y * (1.0 - x2 * 0.5 - z2 * 0.5 + x2 * z2 / 3.0).sqrt(),
        p.z * (1.0 - x2 * 0.5 - y2 * 0.5 + x2 * y2 / 3.0).sqrt(),
    )
}

/// Unit sphere direction for a UV coordinate on a cube face.
#[inline]
#[must_use]
pub fn patch_direction(face: CubeFace, u: f64, v: f64) -> DVec3 {
    cube_to_spherical(uv_to_cube(&FaceCoord::new(face, u, v)))
}
