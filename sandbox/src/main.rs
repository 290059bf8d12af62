// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Lumen Sandbox
// Drives the renderer on a headless device from a fixed-rate simulation loop
// and prints per-frame statistics as JSON lines.

use anyhow::{Context, Result};
use lumen_core::asset::{
    Camera3D, Image, Light3D, Material, Mesh3D, MeshData, RenderMode, RenderSettings, Texture2D,
};
use lumen_core::math::{LinearRgba, Vec2, Vec3, Vec4};
use lumen_core::renderer::{GraphicsDevice, PrimitiveTopology};
use lumen_core::{EntityId, Transform};
use lumen_infra::HeadlessDevice;
use lumen_render::frame::TickLoop;
use lumen_render::{command_channel, AssetContext, FrameRate, RenderConfig, RenderThread};
use std::sync::Arc;

/// Simulation ticks before the sandbox exits.
const DEMO_TICKS: u64 = 600;

struct Scene {
    crates: Vec<EntityId>,
    lamps: Vec<EntityId>,
    crate_mesh: Arc<Mesh3D>,
}

fn quad() -> Arc<MeshData> {
    Arc::new(
        MeshData::new(
            PrimitiveTopology::Triangles,
            vec![
                Vec3::new(-0.5, -0.5, 0.0),
                Vec3::new(0.5, -0.5, 0.0),
                Vec3::new(0.5, 0.5, 0.0),
                Vec3::new(-0.5, 0.5, 0.0),
            ],
        )
        .with_normals(vec![Vec3::new(0.0, 0.0, 1.0); 4])
        .with_tex_coords(vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ])
        .with_indices(vec![0, 1, 2, 0, 2, 3]),
    )
}

fn checker() -> Arc<Texture2D> {
    let mut pixels = Vec::with_capacity(8 * 8 * 4);
    for y in 0..8 {
        for x in 0..8 {
            let value = if (x + y) % 2 == 0 { 230 } else { 40 };
            pixels.extend_from_slice(&[value, value, value, 255]);
        }
    }
    Arc::new(Texture2D::new(Image::rgba8(8, 8, Arc::from(pixels))).with_mipmaps(true))
}

fn build_scene(assets: &mut AssetContext) -> Scene {
    let world = &mut assets.world;

    let camera = world.spawn();
    world.insert(
        camera,
        Transform::looking_at(Vec3::new(0.0, 6.0, 14.0), Vec3::ZERO, Vec3::Y),
    );
    world.insert(
        camera,
        Arc::new(Camera3D::perspective(60.0, 0.1, 150.0)),
    );

    let sun = world.spawn();
    world.insert(
        sun,
        Transform::looking_at(Vec3::new(5.0, 10.0, 5.0), Vec3::ZERO, Vec3::Y),
    );
    world.insert(sun, Arc::new(Light3D::directional(LinearRgba::WHITE, 0.8)));

    let settings = world.spawn();
    world.insert(settings, Arc::new(RenderSettings::default().with_sun_light(sun)));

    let geometry = quad();
    let textured = Arc::new(Material::default().with_property("DiffuseTex", checker()));
    let crate_mesh = Arc::new(Mesh3D::new(geometry.clone(), textured));
    let glass = Arc::new(
        Material::default()
            .with_render_mode(RenderMode::Transparent)
            .with_property("Color", Vec4::new(0.4, 0.7, 1.0, 0.5)),
    );
    let pane = Arc::new(Mesh3D::new(geometry, glass));

    let mut crates = Vec::new();
    for x in -4..=4 {
        for z in -4..=4 {
            let entity = world.spawn();
            let at = Vec3::new(x as f32 * 1.5, 0.0, z as f32 * 1.5);
            world.insert(entity, Transform::from_translation(at));
            let mesh = if (x + z) % 3 == 0 { &pane } else { &crate_mesh };
            world.insert(entity, mesh.clone());
            crates.push(entity);
        }
    }

    let lamps = (0..16)
        .map(|i| {
            let entity = world.spawn();
            let hue = i as f32 / 16.0;
            let color = LinearRgba::new(hue, 1.0 - hue, 0.5, 1.0);
            world.insert(entity, Arc::new(Light3D::point(color, 4.0, 3.5)));
            entity
        })
        .collect();

    Scene {
        crates,
        lamps,
        crate_mesh,
    }
}

/// Circles the lamps around the origin and periodically swaps a row of
/// meshes in and out.
fn animate(assets: &mut AssetContext, scene: &mut Scene, tick: u64, seconds: f32) {
    let count = scene.lamps.len() as f32;
    for (i, lamp) in scene.lamps.iter().enumerate() {
        let angle = seconds * 0.5 + i as f32 / count * std::f32::consts::TAU;
        let at = Vec3::new(angle.cos() * 6.0, 1.5, angle.sin() * 6.0);
        assets.world.insert(*lamp, Transform::from_translation(at));
    }

    if tick % 120 == 60 {
        let row = scene.crates.len().min(9);
        for entity in scene.crates.drain(..row) {
            assets.world.despawn(entity);
        }
        log::info!("Despawned a row of meshes at tick {tick}");
    } else if tick % 120 == 0 && tick > 0 {
        for x in -4..=4 {
            let entity = assets.world.spawn();
            let at = Vec3::new(x as f32 * 1.5, 1.5, -8.0);
            assets.world.insert(entity, Transform::from_translation(at));
            assets.world.insert(entity, scene.crate_mesh.clone());
            scene.crates.push(entity);
        }
        log::info!("Spawned a row of meshes at tick {tick}");
    }
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => RenderConfig::load(&path).with_context(|| format!("loading {path}"))?,
        None => RenderConfig::default(),
    };

    let (sender, queue) = command_channel(config.deferral);
    let mut assets = AssetContext::new(sender, &config);
    let device = Arc::new(HeadlessDevice::new());
    let render_device = device.clone();
    let mut render = RenderThread::spawn(
        &config,
        queue,
        move || Ok(render_device as Arc<dyn GraphicsDevice>),
        Vec::new(),
    )?;
    render.resize(1920, 1080);

    let mut scene = build_scene(&mut assets);
    let simulation_rate = match config.simulation_rate {
        FrameRate::Adaptive => FrameRate::Fixed(60),
        fixed => fixed,
    };
    let simulation = TickLoop::new(simulation_rate);
    let stopper = simulation.clone();

    let ticks = simulation.run(|time| {
        animate(&mut assets, &mut scene, time.frame, time.total.as_secs_f32());
        let handled = assets.sync();
        log::trace!("Tick {} synced {handled} component changes", time.frame);

        if time.frame % 60 == 0 {
            if let Some(stats) = render.drain_stats().pop() {
                match serde_json::to_string(&stats) {
                    Ok(line) => println!("{line}"),
                    Err(e) => log::error!("Failed to serialize frame stats: {e}"),
                }
            }
        }
        if time.frame + 1 >= DEMO_TICKS || !render.is_running() {
            stopper.stop();
        }
    });

    render.stop()?;
    log::info!("Simulation ran {ticks} ticks");
    println!("{}", serde_json::to_string(&device.stats())?);
    Ok(())
}
