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

//! The two halves of the resource lifecycle.
//!
//! [`AssetContext`] lives on the simulation thread: it owns the world, the
//! reference graph and the asset library, and turns component changes into
//! render commands. [`RenderContext`] lives on the render thread: it owns the
//! graphics device and every GPU-side state the commands create.

use crate::camera::CameraState;
use crate::config::RenderConfig;
use crate::light::{ClusterEngine, LightLibrary};
use crate::managers::{
    self, CameraManager, CubemapManager, LightManager, MaterialManager, MeshManager,
    ProgramManager, ProgramRegistry, RenderSettingsManager, ResourceManager, TextureManager,
    Tileset2DManager,
};
use crate::mesh::{InstanceGroups, MeshDataLibrary};
use crate::queue::{RenderCommand, RenderCommandSender};
use lumen_core::asset::{Asset, Camera3D, Light3D, Mesh3D};
use lumen_core::math::Mat4;
use lumen_core::renderer::{GraphicsDevice, RenderError};
use lumen_core::{AddonRegistry, EntityId, Transform};
use lumen_data::assets::{AssetLibrary, ReferenceGraph, Unreferred};
use lumen_data::ecs::{ComponentEvent, StateStore, World};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Upper bound on event passes per [`AssetContext::sync`].
const MAX_SYNC_PASSES: usize = 64;

/// Size of the render target in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Viewport {
    /// Creates a viewport.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width over height. A zero height counts as one pixel.
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

/// Render-thread state shared by commands and passes.
pub struct RenderContext {
    /// The graphics backend.
    pub device: Arc<dyn GraphicsDevice>,
    /// GPU states paired with asset entities.
    pub states: StateStore,
    /// The dense light array.
    pub lights: LightLibrary,
    /// Shared geometry buffers.
    pub mesh_data: MeshDataLibrary,
    /// Per-instance transform batches.
    pub instances: InstanceGroups,
    /// Per-camera light clusters.
    pub clusters: ClusterEngine,
    /// Current render target size.
    pub viewport: Viewport,
    /// Extra state registered by the application for its passes.
    pub addons: AddonRegistry,
}

impl RenderContext {
    /// Creates an empty context on `device`.
    pub fn new(device: Arc<dyn GraphicsDevice>, config: &RenderConfig) -> Self {
        Self {
            device,
            states: StateStore::new(),
            lights: LightLibrary::new(),
            mesh_data: MeshDataLibrary::new(),
            instances: InstanceGroups::new(),
            clusters: ClusterEngine::new(config.clusters),
            viewport: Viewport::default(),
            addons: AddonRegistry::new(),
        }
    }

    /// Resizes the render target. Cameras following the viewport aspect
    /// re-derive their projection.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = Viewport::new(width, height);
        let aspect = self.viewport.aspect();
        let mut changed = 0;
        for (_, camera) in self.states.iter_mut::<CameraState>() {
            if camera.resize(aspect) {
                changed += 1;
            }
        }
        self.device.set_viewport(width, height);
        log::debug!("Viewport resized to {width}x{height}, {changed} cameras updated");
    }

    /// Destroys every GPU object the context owns.
    pub fn release(&mut self) {
        managers::release_gpu_states(self);
        let device = self.device.clone();
        self.clusters.release(&*device);
        self.lights.release(&*device);
        self.instances.release(&*device);
    }
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("device", &self.device)
            .field("lights", &self.lights.len())
            .field("mesh_data", &self.mesh_data.len())
            .field("instance_groups", &self.instances.len())
            .field("viewport", &self.viewport)
            .finish()
    }
}

/// Simulation-side state of the resource lifecycle.
///
/// Applications mutate [`Self::world`] and call [`Self::sync`] once per
/// simulation tick; the managers translate every change into reference graph
/// edits and render commands.
pub struct AssetContext {
    /// The component store.
    pub world: World,
    /// Referrer/referred edges between assets.
    pub graph: ReferenceGraph,
    /// Content-keyed shared assets.
    pub library: AssetLibrary,
    /// Programs used by materials that name none.
    pub programs: ProgramRegistry,
    commands: RenderCommandSender,
    glsl_version: String,
}

impl AssetContext {
    /// Creates a context sending its commands through `commands`.
    pub fn new(commands: RenderCommandSender, config: &RenderConfig) -> Self {
        Self {
            world: World::new(),
            graph: ReferenceGraph::new(),
            library: AssetLibrary::new(),
            programs: ProgramRegistry::with_builtins(),
            commands,
            glsl_version: config.glsl_version.clone(),
        }
    }

    /// The `#version` string prepended to shader sources.
    pub fn glsl_version(&self) -> &str {
        &self.glsl_version
    }

    /// Enqueues a render command.
    pub fn submit(&self, command: RenderCommand) {
        log::trace!("Submitting '{}' for {}", command.label(), command.target());
        self.commands.send(command);
    }

    /// Resolves `asset` to its shared entity and records the edge
    /// `referrer -> entity`.
    pub fn acquire<A: Asset>(
        &mut self,
        referrer: EntityId,
        asset: Arc<A>,
    ) -> Result<EntityId, RenderError> {
        let entity = self
            .library
            .acquire(&mut self.world, &mut self.graph, asset)?;
        self.graph.refer(referrer, entity)?;
        Ok(entity)
    }

    /// Removes the edge `referrer -> referred`. A library asset left without
    /// referrers is evicted; its manager tears it down on the next sync pass.
    pub fn release(&mut self, referrer: EntityId, referred: EntityId) -> Result<(), RenderError> {
        let outcome = self.graph.unrefer(referrer, referred)?;
        if let Unreferred::Removed { remaining: 0 } = outcome {
            if self.library.evict(&mut self.world, referred) {
                log::trace!("{referred} has no referrer left and was evicted");
            }
        }
        Ok(())
    }

    /// Releases every edge leaving `referrer` except those to `keep`.
    pub fn release_except(&mut self, referrer: EntityId, keep: &[EntityId]) {
        let stale: Vec<EntityId> = self
            .graph
            .referred(referrer)
            .filter(|referred| !keep.contains(referred))
            .collect();
        for referred in stale {
            if let Err(e) = self.release(referrer, referred) {
                log::error!("Failed to release {referrer} -> {referred}: {e}");
            }
        }
    }

    /// Releases every edge leaving `referrer`.
    pub fn release_all(&mut self, referrer: EntityId) {
        self.release_except(referrer, &[]);
    }

    /// Releases every edge leaving `entity` and drops its graph node.
    pub fn forget(&mut self, entity: EntityId) {
        self.release_all(entity);
        if let Err(e) = self.graph.unregister(entity) {
            log::warn!("Failed to unregister {entity} from the reference graph: {e}");
        }
    }

    /// Processes every pending component change until no manager produces
    /// new ones. Returns the number of events handled.
    ///
    /// Managers run in dependency order: programs and textures before the
    /// materials that use them, materials before meshes, lights before the
    /// render settings naming a sun, transforms last.
    pub fn sync(&mut self) -> usize {
        let mut handled = 0;
        for _ in 0..MAX_SYNC_PASSES {
            let before = handled;
            handled += self.dispatch::<ProgramManager>();
            handled += self.dispatch::<TextureManager>();
            handled += self.dispatch::<CubemapManager>();
            handled += self.dispatch::<Tileset2DManager>();
            handled += self.dispatch::<MaterialManager>();
            handled += self.dispatch::<MeshManager>();
            handled += self.dispatch::<LightManager>();
            handled += self.dispatch::<CameraManager>();
            handled += self.dispatch::<RenderSettingsManager>();
            handled += self.sync_transforms();
            if handled == before {
                return handled;
            }
        }
        log::warn!("Asset sync did not settle after {MAX_SYNC_PASSES} passes");
        handled
    }

    fn dispatch<M: ResourceManager>(&mut self) -> usize {
        let events = self.world.drain_events::<Arc<M::Asset>>();
        let count = events.len();
        for event in events {
            let (entity, result) = match event {
                ComponentEvent::Set {
                    entity,
                    value,
                    previous,
                } => (entity, M::initialize(self, entity, &value, previous.as_ref())),
                ComponentEvent::Removed { entity, value } => {
                    (entity, M::uninitialize(self, entity, &value))
                }
            };
            if let Err(e) = result {
                log::error!("{} manager failed on {entity}: {e}", M::NAME);
            }
        }
        count
    }

    fn sync_transforms(&mut self) -> usize {
        let events = self.world.drain_events::<Transform>();
        let count = events.len();
        for event in events {
            let (entity, world) = match event {
                ComponentEvent::Set { entity, value, .. } => (entity, value.0),
                ComponentEvent::Removed { entity, .. } if self.world.is_alive(entity) => {
                    (entity, Mat4::IDENTITY)
                }
                ComponentEvent::Removed { .. } => continue,
            };
            if self.world.contains::<Arc<Mesh3D>>(entity) {
                MeshManager::update_transform(self, entity, world);
            }
            if self.world.contains::<Arc<Light3D>>(entity) {
                LightManager::update_transform(self, entity, world);
            }
            if self.world.contains::<Arc<Camera3D>>(entity) {
                CameraManager::update_transform(self, entity, world);
            }
        }
        count
    }

    /// The world matrix of `entity`, identity if it has no transform.
    pub fn world_matrix(&self, entity: EntityId) -> Mat4 {
        self.world
            .get::<Transform>(entity)
            .copied()
            .unwrap_or_default()
            .0
    }
}

impl fmt::Debug for AssetContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetContext")
            .field("world", &self.world)
            .field("graph_nodes", &self.graph.len())
            .field("library", &self.library.len())
            .field("glsl_version", &self.glsl_version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::command_channel;
    use lumen_core::asset::{Image, Texture2D};

    fn context() -> AssetContext {
        let (sender, _queue) = command_channel(Default::default());
        AssetContext::new(sender, &RenderConfig::default())
    }

    fn texture(value: u8) -> Arc<Texture2D> {
        Arc::new(Texture2D::new(Image::rgba8(1, 1, Arc::from(vec![value; 4]))))
    }

    #[test]
    fn viewport_aspect_tolerates_zero_height() {
        assert_eq!(Viewport::new(1920, 1080).aspect(), 1920.0 / 1080.0);
        assert_eq!(Viewport::new(64, 0).aspect(), 64.0);
    }

    #[test]
    fn acquiring_equal_assets_shares_one_entity() {
        let mut ctx = context();
        let a = ctx.world.spawn();
        let b = ctx.world.spawn();
        ctx.graph.register(a);
        ctx.graph.register(b);

        let first = ctx.acquire(a, texture(1)).unwrap();
        let second = ctx.acquire(b, texture(1)).unwrap();
        assert_eq!(first, second);
        assert_eq!(ctx.graph.referrer_count(first), 2);
    }

    #[test]
    fn last_release_evicts_library_asset() {
        let mut ctx = context();
        let a = ctx.world.spawn();
        let b = ctx.world.spawn();
        ctx.graph.register(a);
        ctx.graph.register(b);
        let shared = ctx.acquire(a, texture(7)).unwrap();
        ctx.acquire(b, texture(7)).unwrap();

        ctx.release(a, shared).unwrap();
        assert!(ctx.world.is_alive(shared));
        ctx.release(a, shared).unwrap();
        assert_eq!(ctx.graph.referrer_count(shared), 1);

        ctx.release(b, shared).unwrap();
        assert!(!ctx.world.is_alive(shared));
        assert!(!ctx.library.owns(shared));
    }

    #[test]
    fn release_except_keeps_listed_edges() {
        let mut ctx = context();
        let owner = ctx.world.spawn();
        ctx.graph.register(owner);
        let keep = ctx.acquire(owner, texture(1)).unwrap();
        let drop = ctx.acquire(owner, texture(2)).unwrap();

        ctx.release_except(owner, &[keep]);
        let referred: Vec<_> = ctx.graph.referred(owner).collect();
        assert_eq!(referred, vec![keep]);
        assert!(!ctx.world.is_alive(drop));
    }

    #[test]
    fn forgetting_an_unknown_entity_leaves_the_graph_alone() {
        let mut ctx = context();
        let owner = ctx.world.spawn();
        ctx.graph.register(owner);
        let shared = ctx.acquire(owner, texture(3)).unwrap();
        let nodes = ctx.graph.len();

        let stranger = ctx.world.spawn();
        ctx.forget(stranger);
        assert_eq!(ctx.graph.len(), nodes);
        assert_eq!(ctx.graph.referrer_count(shared), 1);
    }
}
