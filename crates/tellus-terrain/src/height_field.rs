//! Multi-octave fractal Brownian motion (fBm) height field over the sphere.
//!
//! Composites five octaves of seeded value noise sampled in 3D on the unit
//! sphere, so heights are seam-free across cube-face boundaries.

use glam::DVec3;
use noise::{NoiseFn, Value};

const OCTAVES: u32 = 5;
const LACUNARITY: f64 = 2.0;
const PERSISTENCE: f64 = 0.5;

/// Configuration for one body's height field.
///
/// Immutable after body creation; shared by value with every worker that
/// services the body.
#[derive(Clone, Copy, Debug)]
pub struct HeightFieldConfig {
    /// Seed for deterministic generation.
    pub seed: u32,
    /// Radius of the undisplaced sphere, in engine units.
    pub base_radius: f64,
    /// Peak displacement of the first noise octave, in engine units.
    pub amplitude: f64,
    /// Spatial frequency of the first octave over the unit direction.
    pub frequency: f64,
    /// Absolute radius of the ocean surface.
    pub sea_level: f64,
    /// How far below sea level terrain is allowed to sink.
    pub seabed_depth: f64,
}

impl Default for HeightFieldConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            base_radius: 1000.0,
            amplitude: 20.0,
            frequency: 2.0,
            sea_level: 1000.0,
            seabed_depth: 8.0,
        }
    }
}

/// Deterministic surface radius function for one body.
///
/// All methods are pure; a `HeightField` can be cloned to worker threads and
/// sampled concurrently without synchronization.
#[derive(Clone)]
pub struct HeightField {
    noise: Value,
    config: HeightFieldConfig,
}

impl HeightField {
    /// Build a height field from its configuration.
    #[must_use]
    pub fn new(config: HeightFieldConfig) -> Self {
        Self {
            noise: Value::new(config.seed),
            config,
        }
    }

    /// The configuration this field was built from.
    #[must_use]
    pub fn config(&self) -> &HeightFieldConfig {
        &self.config
    }

    /// Lowest radius any direction can produce.
    #[must_use]
    pub fn floor_radius(&self) -> f64 {
        self.config.sea_level - self.config.seabed_depth
    }

    /// Theoretical maximum absolute displacement (geometric series sum).
    #[must_use]
    pub fn max_displacement(&self) -> f64 {
        let mut sum = 0.0;
        let mut amp = self.config.amplitude;
        for _ in 0..OCTAVES {
            sum += amp;
            amp *= PERSISTENCE;
        }
        sum
    }

    fn fbm(&self, d: DVec3) -> f64 {
        let mut total = 0.0;
        let mut frequency = self.config.frequency;
        let mut amplitude = 1.0;
        for _ in 0..OCTAVES {
            let p = d * frequency;
            total += self.noise.get([p.x, p.y, p.z]) * amplitude;
            frequency *= LACUNARITY;
            amplitude *= PERSISTENCE;
        }
        total
    }

    /// Surface radius in the unit direction `d`.
    ///
    /// Never returns less than `sea_level - seabed_depth`, so patch geometry
    /// cannot dip below a safe floor under the oceans.
    #[must_use]
    pub fn radius_at_direction(&self, d: DVec3) -> f64 {
        let displacement = self.config.amplitude * self.fbm(d);
        (self.config.base_radius + displacement).max(self.floor_radius())
    }

    /// Signed distance from `p` to the surface (negative inside).
    #[must_use]
    pub fn sdf(&self, p: DVec3) -> f64 {
        let len = p.length();
        if len < 1e-9 {
            return -self.config.base_radius;
        }
        len - self.radius_at_direction(p / len)
    }

    /// Estimated outward surface normal at `p`.
    ///
    /// Central-difference gradient of the signed distance, blended 65/35
    /// with the raw radial direction to suppress faceting from
    /// high-frequency noise at coarse tessellation.
    #[must_use]
    pub fn normal(&self, p: DVec3, eps: f64) -> DVec3 {
        let dx = self.sdf(p + DVec3::X * eps) - self.sdf(p - DVec3::X * eps);
        let dy = self.sdf(p + DVec3::Y * eps) - self.sdf(p - DVec3::Y * eps);
        let dz = self.sdf(p + DVec3::Z * eps) - self.sdf(p - DVec3::Z * eps);
        let gradient = DVec3::new(dx, dy, dz).normalize_or_zero();
        let radial = p.normalize_or_zero();
        if gradient == DVec3::ZERO {
            return radial;
        }
        (gradient * 0.65 + radial * 0.35).normalize()
    }
}
