#![allow(dead_code)]

use lumen_core::asset::{Material, Mesh3D, MeshData};
use lumen_core::math::{Vec3, Vec4};
use lumen_core::renderer::PrimitiveTopology;
use lumen_core::{EntityId, Transform};
use lumen_infra::HeadlessDevice;
use lumen_render::{command_channel, AssetContext, FrameDriver, FrameStats, RenderConfig, RenderContext};
use std::sync::Arc;

/// A simulation context wired to a frame driver running on a headless device.
pub struct Engine {
    pub assets: AssetContext,
    pub driver: FrameDriver,
    pub device: Arc<HeadlessDevice>,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_config(RenderConfig::default())
    }

    pub fn with_config(config: RenderConfig) -> Self {
        let device = Arc::new(HeadlessDevice::new());
        let (sender, queue) = command_channel(config.deferral);
        let context = RenderContext::new(device.clone(), &config);
        Self {
            assets: AssetContext::new(sender, &config),
            driver: FrameDriver::with_default_passes(context, queue),
            device,
        }
    }

    pub fn render(&self) -> &RenderContext {
        self.driver.context()
    }

    /// Syncs the world and renders frames until no command is pending.
    /// Returns the stats of the last frame.
    pub fn settle(&mut self) -> FrameStats {
        self.assets.sync();
        let mut stats = self.driver.tick();
        for _ in 0..8 {
            if self.driver.queue().pending_count() == 0 {
                break;
            }
            stats = self.driver.tick();
        }
        stats
    }

    pub fn spawn_camera(&mut self, camera: lumen_core::asset::Camera3D) -> EntityId {
        let entity = self.assets.world.spawn();
        self.assets.world.insert(entity, Arc::new(camera));
        entity
    }

    pub fn spawn_mesh(&mut self, mesh: &Arc<Mesh3D>, at: Vec3) -> EntityId {
        let entity = self.assets.world.spawn();
        self.assets.world.insert(entity, Transform::from_translation(at));
        self.assets.world.insert(entity, mesh.clone());
        entity
    }
}

pub fn triangle() -> Arc<MeshData> {
    Arc::new(MeshData::new(
        PrimitiveTopology::Triangles,
        vec![Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)],
    ))
}

pub fn tinted(r: f32) -> Arc<Material> {
    Arc::new(Material::default().with_property("Color", Vec4::new(r, 0.0, 0.0, 1.0)))
}
