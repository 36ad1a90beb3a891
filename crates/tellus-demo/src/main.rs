//! Headless LOD demo.
//!
//! Creates the bodies from `tellus.ron` (writing a default config with one
//! seed-42 world on first run), then flies a scripted camera from deep
//! space down to the surface and back out, logging what the engine does
//! each second of flight. Useful for profiling and for eyeballing
//! split/merge behavior without a renderer attached.

use std::path::Path;

use glam::{DMat4, DVec3};
use tracing::info;

use tellus_body::{BodyParams, TerrainEngine};
use tellus_config::{BodyConfig, EngineConfig};

const FRAMES: usize = 600;

fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tellus.ron".into());
    let config = match EngineConfig::load_or_default(Path::new(&config_path)) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{config_path}: {err}");
            std::process::exit(1);
        }
    };
    tellus_log::init_logging(Some(Path::new("logs")), cfg!(debug_assertions), Some(&config));

    let mut engine = TerrainEngine::with_worker_count(config.pool.workers);
    engine.set_detailed_bodies(config.detailed_bodies);
    info!("engine running with {} workers", engine.worker_count());

    let bodies: Vec<BodyParams> = if config.bodies.is_empty() {
        vec![
            BodyConfig {
                name: "aurin".into(),
                seed: 42,
                base_radius: 1400.0,
                amplitude: 25.0,
                sea_level_offset: 2.0,
                max_level: 8,
                ..Default::default()
            }
            .to_params(),
        ]
    } else {
        config.bodies.iter().map(BodyConfig::to_params).collect()
    };
    let radius = bodies[0].height_field.base_radius;
    for params in bodies {
        let id = engine.add_body(params);
        info!("created {id}");
    }

    let proj = DMat4::perspective_rh(70_f64.to_radians(), 16.0 / 9.0, 0.1, 1.0e9);
    for frame in 0..FRAMES {
        let camera = flight_path(frame, radius);
        let view_proj = proj * DMat4::look_at_rh(camera, DVec3::ZERO, DVec3::Y);
        let stats = engine.update(camera, &view_proj);

        if frame % 60 == 0 {
            let draws = engine.draw_lists(camera);
            let patches: usize = draws.iter().map(|d| d.patches.len()).sum();
            let nodes: usize = engine.bodies().iter().map(|b| b.node_count()).sum();
            info!(
                frame,
                altitude = format!("{:.0}", camera.length() - radius),
                patches,
                nodes,
                splits = stats.splits,
                merges = stats.merges,
                culled = stats.culled,
                "flight"
            );
        }
        std::thread::sleep(std::time::Duration::from_millis(4));
    }

    info!(
        "flight complete: {} cached index sets, {} cache hits",
        engine.index_cache().len(),
        engine.index_cache().hits()
    );
}

/// Descend from 30 radii to 40 units over the surface, hold and drift
/// sideways, then climb back out.
fn flight_path(frame: usize, radius: f64) -> DVec3 {
    let t = frame as f64 / FRAMES as f64;
    let altitude = if t < 0.4 {
        let k = t / 0.4;
        (radius * 30.0) * (1.0 - k).powi(3) + 40.0
    } else if t < 0.7 {
        40.0
    } else {
        let k = (t - 0.7) / 0.3;
        40.0 + (radius * 30.0) * k.powi(3)
    };
    // Slow drift around the equator keeps the split frontier moving.
    let angle = t * 0.6;
    DVec3::new(angle.cos(), 0.15 * (t * 2.1).sin(), angle.sin()).normalize() * (radius + altitude)
}
