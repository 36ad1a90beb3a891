//! Procedural surface model for planetary bodies.
//!
//! A [`HeightField`] turns a unit direction into a surface radius through
//! layered seeded value noise, and derives a signed distance function and a
//! normal estimator from it. [`BiomeParameters`] map the resulting heights to
//! vertex colors. Everything here is pure and stateless after construction,
//! so the same functions run identically on a worker thread or the calling
//! thread.

mod biome;
mod height_field;

pub use biome::{BiomeParameters, BodyKind};
pub use height_field::{HeightField, HeightFieldConfig};
