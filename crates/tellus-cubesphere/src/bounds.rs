//! Patch bounding spheres for culling and distance tests.

use glam::DVec3;

use crate::{PatchRect, patch_direction};

/// A bounding sphere in body-local space (origin at the body center).
#[derive(Clone, Copy, Debug)]
pub struct BoundingSphere {
    /// Sphere center relative to the body center.
    pub center: DVec3,
    /// Sphere radius.
    pub radius: f64,
}

impl BoundingSphere {
    /// Bounding sphere of a patch on a body of `base_radius`.
    ///
    /// `min_height` and `max_height` bracket the terrain displacement within
    /// the patch; passing the body's global displacement bounds is
    /// conservative but always correct.
    #[must_use]
    pub fn from_patch(rect: &PatchRect, base_radius: f64, min_height: f64, max_height: f64) -> Self {
        let (u0, v0, u1, v1) = rect.uv_bounds();
        let center_dir = patch_direction(rect.face, (u0 + u1) * 0.5, (v0 + v1) * 0.5);
        let mid_radius = base_radius + (min_height + max_height) * 0.5;
        let center = center_dir * mid_radius;

        let corner_uvs = [(u0, v0), (u1, v0), (u0, v1), (u1, v1)];
        let mut max_dist_sq: f64 = 0.0;
        for &(u, v) in &corner_uvs {
            let dir = patch_direction(rect.face, u, v);
            for &h in &[min_height, max_height] {
                let d = (dir * (base_radius + h) - center).length_squared();
                max_dist_sq = max_dist_sq.max(d);
            }
        }
        for &h in &[min_height, max_height] {
            let d = (center_dir * (base_radius + h) - center).length_squared();
            max_dist_sq = max_dist_sq.max(d);
        }

        Self {
            center,
            radius: max_dist_sq.sqrt(),
        }
    }

    /// Distance from `point` to the sphere surface (zero inside).
    #[must_use]
    pub fn distance_to(&self, point: DVec3) -> f64 {
        ((point - self.center).length() - self.radius).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CubeFace;

    const RADIUS: f64 = 1400.0;

    #[test]
    fn test_sphere_contains_patch_surface() {
        let rect = PatchRect::new(CubeFace::PosY, 3, 5, 2);
        let bs = BoundingSphere::from_patch(&rect, RADIUS, -4.0, 30.0);

        let (u0, v0, u1, v1) = rect.uv_bounds();
        for ui in 0..=6 {
            for vi in 0..=6 {
                let u = u0 + (u1 - u0) * f64::from(ui) / 6.0;
                let v = v0 + (v1 - v0) * f64::from(vi) / 6.0;
                let dir = patch_direction(rect.face, u, v);
                for &h in &[-4.0, 12.0, 30.0] {
                    let p = dir * (RADIUS + h);
                    assert!(
                        (p - bs.center).length() <= bs.radius + 1e-6,
                        "surface point ({u}, {v}, h={h}) escapes the bounding sphere"
                    );
                }
            }
        }
    }

    #[test]
    fn test_deeper_patches_have_smaller_spheres() {
        let root = PatchRect::root(CubeFace::NegX);
        let child = root.children().unwrap()[0];
        let bs_root = BoundingSphere::from_patch(&root, RADIUS, 0.0, 0.0);
        let bs_child = BoundingSphere::from_patch(&child, RADIUS, 0.0, 0.0);
        assert!(bs_child.radius < bs_root.radius);
    }

    #[test]
    fn test_height_range_grows_sphere() {
        let rect = PatchRect::new(CubeFace::PosZ, 2, 1, 1);
        let flat = BoundingSphere::from_patch(&rect, RADIUS, 0.0, 0.0);
        let tall = BoundingSphere::from_patch(&rect, RADIUS, -50.0, 80.0);
        assert!(tall.radius > flat.radius);
    }

    #[test]
    fn test_distance_to_is_zero_inside() {
        let rect = PatchRect::root(CubeFace::PosX);
        let bs = BoundingSphere::from_patch(&rect, RADIUS, 0.0, 0.0);
        assert_eq!(bs.distance_to(bs.center), 0.0);
        let outside = bs.center + DVec3::X * (bs.radius + 100.0);
        assert!((bs.distance_to(outside) - 100.0).abs() < 1e-9);
    }
}
