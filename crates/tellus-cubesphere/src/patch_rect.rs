//! Patch identity on the quadsphere: (face, subdivision level, grid x/y).

use std::f64::consts::FRAC_PI_2;

use crate::{CubeFace, FaceCoord};

/// Identifies one quadrilateral patch of a cube face.
///
/// Level 0 is the root: a single patch covering the whole face. Each level
/// doubles the grid, so at level `l` the face is a `2^l × 2^l` grid of
/// patches and `(x, y)` index into that grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PatchRect {
    /// The cube face this patch belongs to.
    pub face: CubeFace,
    /// Subdivision level, 0 = root, each level halves the patch edge.
    pub level: u8,
    /// Horizontal grid coordinate at this level.
    pub x: u32,
    /// Vertical grid coordinate at this level.
    pub y: u32,
}

impl PatchRect {
    /// Deepest representable subdivision level.
    pub const MAX_LEVEL: u8 = 24;

    /// Number of patches along one face axis at the given level.
    #[must_use]
    pub fn grid_size(level: u8) -> u32 {
        assert!(
            level <= Self::MAX_LEVEL,
            "level {level} exceeds MAX_LEVEL {}",
            Self::MAX_LEVEL
        );
        1 << level
    }

    /// Construct a patch rect, validating the grid coordinates.
    ///
    /// # Panics
    ///
    /// Panics if `level` exceeds [`Self::MAX_LEVEL`] or `x`/`y` fall outside
    /// the level's grid.
    #[must_use]
    pub fn new(face: CubeFace, level: u8, x: u32, y: u32) -> Self {
        let size = Self::grid_size(level);
        assert!(x < size, "x={x} out of range at level {level}");
        assert!(y < size, "y={y} out of range at level {level}");
        Self { face, level, x, y }
    }

    /// The root patch of a face.
    #[must_use]
    pub fn root(face: CubeFace) -> Self {
        Self::new(face, 0, 0, 0)
    }

    /// UV rectangle of this patch on its face: `(u0, v0, u1, v1)`, all in \[0, 1\].
    #[must_use]
    pub fn uv_bounds(&self) -> (f64, f64, f64, f64) {
        let size = f64::from(Self::grid_size(self.level));
        (
            f64::from(self.x) / size,
            f64::from(self.y) / size,
            f64::from(self.x + 1) / size,
            f64::from(self.y + 1) / size,
        )
    }

    /// Face coordinate at the center of this patch.
    #[must_use]
    pub fn center(&self) -> FaceCoord {
        let (u0, v0, u1, v1) = self.uv_bounds();
        FaceCoord::new(self.face, (u0 + u1) * 0.5, (v0 + v1) * 0.5)
    }

    /// The four children at level + 1, in `(dy * 2 + dx)` order.
    ///
    /// Returns `None` at [`Self::MAX_LEVEL`].
    #[must_use]
    pub fn children(&self) -> Option<[PatchRect; 4]> {
        if self.level >= Self::MAX_LEVEL {
            return None;
        }
        let level = self.level + 1;
        let (cx, cy) = (self.x * 2, self.y * 2);
        Some([
            PatchRect::new(self.face, level, cx, cy),
            PatchRect::new(self.face, level, cx + 1, cy),
            PatchRect::new(self.face, level, cx, cy + 1),
            PatchRect::new(self.face, level, cx + 1, cy + 1),
        ])
    }

    /// The parent patch at level − 1, or `None` for a root.
    #[must_use]
    pub fn parent(&self) -> Option<PatchRect> {
        if self.level == 0 {
            return None;
        }
        Some(PatchRect {
            face: self.face,
            level: self.level - 1,
            x: self.x / 2,
            y: self.y / 2,
        })
    }

    /// True if `other` lies inside this patch (same face, deeper or equal level).
    #[must_use]
    pub fn contains(&self, other: &PatchRect) -> bool {
        if other.face != self.face || other.level < self.level {
            return false;
        }
        let shift = other.level - self.level;
        (other.x >> shift) == self.x && (other.y >> shift) == self.y
    }

    /// Index (0–3) of the child quadrant that contains `target`.
    ///
    /// Returns `None` if `target` is not a strict descendant of this patch.
    #[must_use]
    pub fn child_index_toward(&self, target: &PatchRect) -> Option<usize> {
        if !self.contains(target) || target.level <= self.level {
            return None;
        }
        let shift = target.level - self.level - 1;
        let dx = (target.x >> shift) - self.x * 2;
        let dy = (target.y >> shift) - self.y * 2;
        Some((dy * 2 + dx) as usize)
    }

    /// Approximate arc length of one patch edge on a sphere of `radius`.
    ///
    /// A cube face spans a quarter circumference, so the root edge is
    /// `π/2 · radius` and each level halves it.
    #[must_use]
    pub fn edge_length(&self, radius: f64) -> f64 {
        FRAC_PI_2 * radius / f64::from(Self::grid_size(self.level))
    }
}

impl std::fmt::Display for PatchRect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?}/L{}/{},{}",
            self.face, self.level, self.x, self.y
        )
    }
}
