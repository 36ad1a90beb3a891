//! Cubesphere geometry primitives: faces, patch addressing, projection,
//! winding and bounding volumes for the quadsphere terrain engine.

mod bounds;
mod cube_face;
mod face_coord;
mod patch_rect;
mod projection;
mod winding;

pub use bounds::BoundingSphere;
pub use cube_face::CubeFace;
pub use face_coord::FaceCoord;
pub use patch_rect::PatchRect;
pub use projection::{cube_to_spherical, patch_direction, uv_to_cube};
pub use winding::{face_winding_flips, triangle_winds_outward, winding_flip_table};
