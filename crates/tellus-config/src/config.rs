//! Configuration structs and their mapping onto engine parameters.

use std::path::Path;

use glam::{DVec3, Vec3};
use log::warn;
use serde::{Deserialize, Serialize};

use tellus_body::BodyParams;
use tellus_cubesphere::PatchRect;
use tellus_terrain::{BiomeParameters, BodyKind, HeightFieldConfig};

use crate::error::ConfigError;

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker pool settings.
    pub pool: PoolConfig,
    /// How many bodies (nearest first) run full quadtree traversal.
    pub detailed_bodies: usize,
    /// Log level override (e.g., "debug", "info", "warn"). Empty uses the
    /// built-in default.
    pub log_level: String,
    /// The bodies to create at startup.
    pub bodies: Vec<BodyConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            detailed_bodies: 3,
            log_level: String::new(),
            bodies: Vec::new(),
        }
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PoolConfig {
    /// Explicit worker count; `None` derives it from hardware parallelism
    /// minus one. `Some(0)` forces fully synchronous generation.
    pub workers: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { workers: None }
    }
}

/// Body category, mirrored here so configs stay plain data.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum BodyKindConfig {
    #[default]
    Rocky,
    Moon,
    GasGiant,
}

impl From<BodyKindConfig> for BodyKind {
    fn from(kind: BodyKindConfig) -> Self {
        match kind {
            BodyKindConfig::Rocky => BodyKind::Rocky,
            BodyKindConfig::Moon => BodyKind::Moon,
            BodyKindConfig::GasGiant => BodyKind::GasGiant,
        }
    }
}

/// One body's construction values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BodyConfig {
    pub name: String,
    pub kind: BodyKindConfig,
    /// Body center in world space.
    pub position: [f64; 3],
    pub seed: u32,
    pub base_radius: f64,
    /// Peak terrain displacement.
    pub amplitude: f64,
    /// Noise frequency over the unit sphere.
    pub frequency: f64,
    /// Ocean surface relative to the base radius.
    pub sea_level_offset: f64,
    /// How far below sea level terrain may sink.
    pub seabed_depth: f64,
    /// Biome palette: deep water, shallow water, sand, grass, rock, snow.
    pub colors: [[f32; 3]; 6],
    pub shore_width: f64,
    pub snow_height: f64,
    pub snow_latitude: f64,
    pub rock_start: f64,
    pub rock_span: f64,
    /// Vertices per patch edge.
    pub grid_n: u32,
    pub max_level: u8,
    pub split_factor: f64,
    pub merge_factor: f64,
    pub split_budget: u32,
    pub merge_budget: u32,
    pub active_distance: f64,
    pub far_distance: f64,
    pub far_mesh_subdivisions: u32,
}

impl Default for BodyConfig {
    fn default() -> Self {
        let defaults = BodyParams::default();
        let biome = defaults.biome;
        Self {
            name: defaults.name.clone(),
            kind: BodyKindConfig::Rocky,
            position: [0.0; 3],
            seed: defaults.height_field.seed,
            base_radius: defaults.height_field.base_radius,
            amplitude: defaults.height_field.amplitude,
            frequency: defaults.height_field.frequency,
            sea_level_offset: defaults.height_field.sea_level
                - defaults.height_field.base_radius,
            seabed_depth: defaults.height_field.seabed_depth,
            colors: [
                biome.deep_water.to_array(),
                biome.shallow_water.to_array(),
                biome.sand.to_array(),
                biome.grass.to_array(),
                biome.rock.to_array(),
                biome.snow.to_array(),
            ],
            shore_width: biome.shore_width,
            snow_height: biome.snow_height,
            snow_latitude: biome.snow_latitude,
            rock_start: biome.rock_start,
            rock_span: biome.rock_span,
            grid_n: defaults.grid_n,
            max_level: defaults.max_level,
            split_factor: defaults.split_factor,
            merge_factor: defaults.merge_factor,
            split_budget: defaults.split_budget,
            merge_budget: defaults.merge_budget,
            active_distance: defaults.active_distance,
            far_distance: defaults.far_distance,
            far_mesh_subdivisions: defaults.far_mesh_subdivisions,
        }
    }
}

impl BodyConfig {
    /// Turn the config values into engine body parameters.
    ///
    /// Out-of-range values from a hand-edited file are clamped into the
    /// ranges the engine supports rather than allowed to panic the build
    /// path: the grid needs at least 2x2 vertices and subdivision cannot
    /// exceed [`PatchRect::MAX_LEVEL`].
    #[must_use]
    pub fn to_params(&self) -> BodyParams {
        let grid_n = self.grid_n.max(2);
        let max_level = self.max_level.min(PatchRect::MAX_LEVEL);
        if grid_n != self.grid_n || max_level != self.max_level {
            warn!(
                "body \"{}\": clamped grid_n {} -> {grid_n}, max_level {} -> {max_level}",
                self.name, self.grid_n, self.max_level
            );
        }
        let sea_level = self.base_radius + self.sea_level_offset;
        BodyParams {
            name: self.name.clone(),
            kind: self.kind.into(),
            position: DVec3::from(self.position),
            height_field: HeightFieldConfig {
                seed: self.seed,
                base_radius: self.base_radius,
                amplitude: self.amplitude,
                frequency: self.frequency,
                sea_level,
                seabed_depth: self.seabed_depth,
            },
            biome: BiomeParameters {
                kind: self.kind.into(),
                sea_level,
                shore_width: self.shore_width,
                snow_height: self.snow_height,
                snow_latitude: self.snow_latitude,
                rock_start: self.rock_start,
                rock_span: self.rock_span,
                deep_water: Vec3::from(self.colors[0]),
                shallow_water: Vec3::from(self.colors[1]),
                sand: Vec3::from(self.colors[2]),
                grass: Vec3::from(self.colors[3]),
                rock: Vec3::from(self.colors[4]),
                snow: Vec3::from(self.colors[5]),
            },
            grid_n,
            normal_eps: 0.5,
            max_level,
            split_factor: self.split_factor,
            merge_factor: self.merge_factor,
            split_budget: self.split_budget,
            merge_budget: self.merge_budget,
            active_distance: self.active_distance,
            far_distance: self.far_distance,
            far_mesh_subdivisions: self.far_mesh_subdivisions,
        }
    }
}

impl EngineConfig {
    /// Parse a config from RON text.
    pub fn from_ron(content: &str) -> Result<Self, ConfigError> {
        ron::from_str(content).map_err(ConfigError::ParseError)
    }

    /// Load a config file from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::from_ron(&content)
    }

    /// Write the config to disk as pretty-printed RON.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(ConfigError::SerializeError)?;
        std::fs::write(path, content).map_err(ConfigError::WriteError)
    }

    /// Load from disk, falling back to (and persisting) defaults when the
    /// file does not exist yet.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();
            config.save(path)?;
            Ok(config)
        }
    }
}
