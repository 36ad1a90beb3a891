//! A 2D coordinate on a cube face.

use crate::CubeFace;

/// A point on one cube face, with `u` and `v` in \[0, 1\].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceCoord {
    /// The face this coordinate lies on.
    pub face: CubeFace,
    /// Horizontal parameter in \[0, 1\].
    pub u: f64,
    /// Vertical parameter in \[0, 1\].
    pub v: f64,
}

impl FaceCoord {
    /// Construct a face coordinate, clamping `u` and `v` into \[0, 1\].
    #[must_use]
    pub fn new(face: CubeFace, u: f64, v: f64) -> Self {
        Self {
            face,
            u: u.clamp(0.0, 1.0),
            v: v.clamp(0.0, 1.0),
        }
    }
}
