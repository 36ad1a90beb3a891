//! The six faces of the quadsphere cube and their local bases.

use glam::DVec3;

/// One face of the cube that is warped onto the sphere.
///
/// Each face carries a fixed right-handed basis: `u_axis` and `v_axis` span
/// the face plane and `normal` points out of the cube.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum CubeFace {
    /// +X face
    PosX = 0,
    /// −X face
    NegX = 1,
    /// +Y face
    PosY = 2,
    /// −Y face
    NegY = 3,
    /// +Z face
    PosZ = 4,
    /// −Z face
    NegZ = 5,
}

impl CubeFace {
    /// All six faces in index order.
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PosX,
        CubeFace::NegX,
        CubeFace::PosY,
        CubeFace::NegY,
        CubeFace::PosZ,
        CubeFace::NegZ,
    ];

    /// Face from its numeric index (0–5).
    ///
    /// # Panics
    ///
    /// Panics if `index > 5`.
    #[must_use]
    pub fn from_index(index: usize) -> CubeFace {
        Self::ALL[index]
    }

    /// Numeric index of this face (0–5).
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Outward unit normal of this face.
    #[must_use]
    pub fn normal(self) -> DVec3 {
        match self {
            CubeFace::PosX => DVec3::X,
            CubeFace::NegX => DVec3::NEG_X,
            CubeFace::PosY => DVec3::Y,
            CubeFace::NegY => DVec3::NEG_Y,
            CubeFace::PosZ => DVec3::Z,
            CubeFace::NegZ => DVec3::NEG_Z,
        }
    }

    /// Direction of increasing `u` across this face.
    #[must_use]
    pub fn u_axis(self) -> DVec3 {
        match self {
            CubeFace::PosX => DVec3::NEG_Z,
            CubeFace::NegX => DVec3::Z,
            CubeFace::PosY => DVec3::X,
            CubeFace::NegY => DVec3::X,
            CubeFace::PosZ => DVec3::X,
            CubeFace::NegZ => DVec3::NEG_X,
        }
    }

    /// Direction of increasing `v` across this face.
    #[must_use]
    pub fn v_axis(self) -> DVec3 {
        match self {
            CubeFace::PosX => DVec3::Y,
            CubeFace::NegX => DVec3::Y,
            CubeFace::PosY => DVec3::NEG_Z,
            CubeFace::NegY => DVec3::Z,
            CubeFace::PosZ => DVec3::Y,
            CubeFace::NegZ => DVec3::Y,
        }
    }

    /// The face whose normal has the largest projection onto `dir`.
    ///
    /// Useful for mapping an arbitrary direction back onto the cube.
    #[must_use]
    pub fn containing(dir: DVec3) -> CubeFace {
        let ax = dir.x.abs();
        let ay = dir.y.abs();
        let az = dir.z.abs();
        if ax >= ay && ax >= az {
            if dir.x >= 0.0 { CubeFace::PosX } else { CubeFace::NegX }
        } else if ay >= az {
            if dir.y >= 0.0 { CubeFace::PosY } else { CubeFace::NegY }
        } else if dir.z >= 0.0 {
            CubeFace::PosZ
        } else {
            CubeFace::NegZ
        }
    }
}
