//! View frustum extraction and sphere culling.

use glam::{DMat4, DVec3, DVec4};

/// Six view frustum planes extracted from a view-projection matrix.
///
/// Planes point inward; a sphere is kept if it is not fully behind any
/// plane. The extraction works for any projection convention whose clip
/// space is `-w..w` in x/y.
#[derive(Clone, Copy, Debug)]
pub struct Frustum {
    planes: [DVec4; 6],
}

impl Frustum {
    /// Extract planes from `view_proj` (world space to clip space).
    #[must_use]
    pub fn from_view_projection(view_proj: &DMat4) -> Self {
        let row = |i: usize| {
            DVec4::new(
                view_proj.x_axis[i],
                view_proj.y_axis[i],
                view_proj.z_axis[i],
                view_proj.w_axis[i],
            )
        };
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));
        let mut planes = [
            r3 + r0, // left
            r3 - r0, // right
            r3 + r1, // bottom
            r3 - r1, // top
            r3 + r2, // near
            r3 - r2, // far
        ];
        for plane in &mut planes {
            let len = plane.truncate().length();
            if len > 1e-12 {
                *plane /= len;
            }
        }
        Self { planes }
    }

    /// True if a sphere at `center` with `radius` intersects the frustum.
    #[must_use]
    pub fn intersects_sphere(&self, center: DVec3, radius: f64) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.truncate().dot(center) + plane.w >= -radius)
    }
}
