//! Biome coloring: height and latitude to vertex color.
//!
//! Colors are blended with smoothsteps in a fixed order: ocean mask first,
//! then sand against grass by shore proximity, then rock by height, then snow
//! by height and latitude. Skipping hard thresholds keeps biome boundaries
//! free of banding at any tessellation density.

use glam::{DVec3, Vec3};

/// Broad body category; selects which biome layers apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyKind {
    /// Full layering: oceans, shores, rock, polar snow.
    Rocky,
    /// Airless body: no ocean layer, terrain colors only.
    Moon,
    /// Banded atmosphere: color varies with latitude, not height.
    GasGiant,
}

/// Per-body biome palette and thresholds. Immutable after body creation.
#[derive(Clone, Copy, Debug)]
pub struct BiomeParameters {
    pub kind: BodyKind,
    /// Absolute radius of the ocean surface.
    pub sea_level: f64,
    /// Height band above sea level over which sand fades into grass.
    pub shore_width: f64,
    /// Height above sea level where snow appears at the equator.
    pub snow_height: f64,
    /// `|sin(latitude)|` above which snow reaches down to sea level.
    pub snow_latitude: f64,
    /// Height above sea level where rock starts to dominate.
    pub rock_start: f64,
    /// Height band over which rock fades in.
    pub rock_span: f64,
    pub deep_water: Vec3,
    pub shallow_water: Vec3,
    pub sand: Vec3,
    pub grass: Vec3,
    pub rock: Vec3,
    pub snow: Vec3,
}

impl Default for BiomeParameters {
    fn default() -> Self {
        Self {
            kind: BodyKind::Rocky,
            sea_level: 1000.0,
            shore_width: 2.0,
            snow_height: 18.0,
            snow_latitude: 0.85,
            rock_start: 8.0,
            rock_span: 8.0,
            deep_water: Vec3::new(0.02, 0.09, 0.28),
            shallow_water: Vec3::new(0.10, 0.32, 0.48),
            sand: Vec3::new(0.76, 0.70, 0.50),
            grass: Vec3::new(0.22, 0.42, 0.16),
            rock: Vec3::new(0.42, 0.38, 0.34),
            snow: Vec3::new(0.92, 0.93, 0.95),
        }
    }
}

fn smoothstep(edge0: f64, edge1: f64, x: f64) -> f64 {
    if edge0 >= edge1 {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn mix(a: Vec3, b: Vec3, t: f64) -> Vec3 {
    a.lerp(b, t as f32)
}

impl BiomeParameters {
    /// Vertex color for a surface point in unit direction `dir` at `radius`.
    #[must_use]
    pub fn surface_color(&self, dir: DVec3, radius: f64) -> Vec3 {
        let height = radius - self.sea_level;
        let latitude = dir.y.abs();

        if self.kind == BodyKind::GasGiant {
            return self.band_color(dir.y);
        }

        // Land layers: sand -> grass -> rock -> snow.
        let shore = smoothstep(0.0, self.shore_width, height);
        let mut color = mix(self.sand, self.grass, shore);

        let rockiness = smoothstep(self.rock_start, self.rock_start + self.rock_span, height);
        color = mix(color, self.rock, rockiness);

        let polar = smoothstep(self.snow_latitude * 0.6, self.snow_latitude, latitude);
        let snow_line = self.snow_height * (1.0 - polar);
        let snow = smoothstep(snow_line, snow_line + self.snow_height * 0.2 + 0.5, height);
        color = mix(color, self.snow, snow);

        if self.kind == BodyKind::Rocky {
            // Ocean mask wins over every land layer below sea level.
            let depth = smoothstep(0.0, self.shore_width * 2.0, -height);
            let water = mix(self.shallow_water, self.deep_water, depth);
            let ocean = 1.0 - smoothstep(0.0, self.shore_width * 0.5, height);
            color = mix(color, water, ocean);
        }

        color
    }

    /// Latitude bands for gas giants, with polar caps.
    fn band_color(&self, sin_latitude: f64) -> Vec3 {
        let band = 0.5 + 0.5 * (sin_latitude * 9.0 * std::f64::consts::PI).sin();
        let mut color = mix(self.sand, self.rock, smoothstep(0.25, 0.75, band));
        let polar = smoothstep(self.snow_latitude * 0.8, 1.0, sin_latitude.abs());
        color = mix(color, self.snow, polar);
        color
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn equator() -> DVec3 {
        DVec3::X
    }

    fn pole() -> DVec3 {
        DVec3::Y
    }

    #[test]
    fn test_deep_ocean_is_deep_water() {
        let biome = BiomeParameters::default();
        let color = biome.surface_color(equator(), biome.sea_level - 50.0);
        assert!(
            (color - biome.deep_water).length() < 1e-5,
            "deep point should be pure deep water, got {color:?}"
        );
    }

    #[test]
    fn test_high_equatorial_terrain_is_snowy() {
        let biome = BiomeParameters::default();
        let color = biome.surface_color(equator(), biome.sea_level + biome.snow_height * 3.0);
        assert!((color - biome.snow).length() < 1e-3);
    }

    #[test]
    fn test_snow_line_drops_toward_the_poles() {
        let biome = BiomeParameters::default();
        let height = biome.snow_height * 0.5;
        let at_equator = biome.surface_color(equator(), biome.sea_level + height);
        let at_pole = biome.surface_color(pole(), biome.sea_level + height);
        let snow_dist_eq = (at_equator - biome.snow).length();
        let snow_dist_pole = (at_pole - biome.snow).length();
        assert!(
            snow_dist_pole < snow_dist_eq,
            "poles should be snowier at the same height"
        );
    }

    #[test]
    fn test_moons_have_no_ocean() {
        let biome = BiomeParameters {
            kind: BodyKind::Moon,
            ..Default::default()
        };
        let color = biome.surface_color(equator(), biome.sea_level - 50.0);
        assert!(
            (color - biome.deep_water).length() > 0.1,
            "a moon must not render water"
        );
        assert!((color - biome.sand).length() < 1e-5);
    }

    #[test]
    fn test_gas_giant_color_ignores_height() {
        let biome = BiomeParameters {
            kind: BodyKind::GasGiant,
            ..Default::default()
        };
        let dir = DVec3::new(0.8, 0.3, 0.52).normalize();
        let low = biome.surface_color(dir, biome.sea_level - 100.0);
        let high = biome.surface_color(dir, biome.sea_level + 100.0);
        assert_eq!(low, high, "gas giant bands depend on latitude only");
    }

    #[test]
    fn test_gas_giant_bands_vary_with_latitude() {
        let biome = BiomeParameters {
            kind: BodyKind::GasGiant,
            ..Default::default()
        };
        let a = biome.surface_color(DVec3::new(1.0, 0.0, 0.0), biome.sea_level);
        let b = biome.surface_color(DVec3::new(0.95, 0.312, 0.0).normalize(), biome.sea_level);
        assert!((a - b).length() > 1e-3);
    }

    #[test]
    fn test_shore_blends_sand_to_grass() {
        let biome = BiomeParameters::default();
        let beach = biome.surface_color(equator(), biome.sea_level + biome.shore_width * 0.5);
        let inland = biome.surface_color(equator(), biome.sea_level + biome.shore_width * 2.0);
        assert!(
            (beach - biome.sand).length() < (inland - biome.sand).length(),
            "color should move from sand toward grass with height"
        );
    }
}
