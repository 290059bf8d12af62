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

use super::ResourceManager;
use crate::context::{AssetContext, RenderContext};
use crate::queue::{CommandKind, CommandStatus, RenderCommand};
use lumen_core::asset::Light3D;
use lumen_core::math::Mat4;
use lumen_core::renderer::gpu_types::LightParameters;
use lumen_core::renderer::RenderError;
use lumen_core::EntityId;
use std::sync::Arc;

/// Slot of a light entity in the light library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightState {
    /// Index into [`crate::light::LightLibrary::parameters`].
    pub index: usize,
}

/// Writes `parameters` into the slot of `entity`, allocating one if needed.
fn store(ctx: &mut RenderContext, entity: EntityId, parameters: LightParameters, allocate: bool) {
    match ctx.states.get::<LightState>(entity) {
        Some(state) => {
            ctx.lights.update(state.index, parameters);
        }
        None if allocate => {
            let index = ctx.lights.add(entity, parameters);
            ctx.states.insert(entity, LightState { index });
            log::trace!("Light {entity} placed in slot {index}");
        }
        None => {}
    }
}

/// Keeps the light library in sync with [`Light3D`] entities.
#[derive(Debug)]
pub struct LightManager;

impl LightManager {
    /// Recomputes the world position and direction of a light entity.
    pub fn update_transform(ctx: &mut AssetContext, entity: EntityId, world: Mat4) {
        let Some(light) = ctx.world.get::<Arc<Light3D>>(entity) else {
            return;
        };
        let parameters = light.parameters(&world);
        ctx.submit(RenderCommand::new(
            entity,
            CommandKind::Update,
            "move light",
            move |ctx: &mut RenderContext| {
                store(ctx, entity, parameters, false);
                Ok(CommandStatus::Done)
            },
        ));
    }
}

impl ResourceManager for LightManager {
    type Asset = Light3D;
    const NAME: &'static str = "Light3D";

    fn initialize(
        ctx: &mut AssetContext,
        entity: EntityId,
        light: &Arc<Light3D>,
        previous: Option<&Arc<Light3D>>,
    ) -> Result<(), RenderError> {
        ctx.graph.register(entity);
        let parameters = light.parameters(&ctx.world_matrix(entity));
        let kind = if previous.is_some() {
            CommandKind::Update
        } else {
            CommandKind::Initialize
        };
        ctx.submit(RenderCommand::new(entity, kind, "store light", move |ctx: &mut RenderContext| {
            store(ctx, entity, parameters, true);
            Ok(CommandStatus::Done)
        }));
        Ok(())
    }

    fn uninitialize(
        ctx: &mut AssetContext,
        entity: EntityId,
        _light: &Arc<Light3D>,
    ) -> Result<(), RenderError> {
        ctx.forget(entity);
        ctx.submit(RenderCommand::new(
            entity,
            CommandKind::Uninitialize,
            "remove light",
            move |ctx: &mut RenderContext| {
                let Some(state) = ctx.states.remove::<LightState>(entity) else {
                    return Ok(CommandStatus::Done);
                };
                if let Some(removal) = ctx.lights.remove(state.index) {
                    if let Some(moved) = removal.moved {
                        if let Some(other) = ctx.states.get_mut::<LightState>(moved.owner) {
                            other.index = moved.index;
                        }
                    }
                }
                Ok(CommandStatus::Done)
            },
        ));
        Ok(())
    }
}

pub(super) fn release_all(ctx: &mut RenderContext) {
    for entity in ctx.states.entities::<LightState>() {
        ctx.states.remove::<LightState>(entity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderConfig;
    use crate::queue::command_channel;
    use lumen_core::math::{LinearRgba, Vec3};
    use lumen_core::Transform;
    use lumen_infra::HeadlessDevice;

    #[test]
    fn removal_keeps_slots_packed_and_indices_current() {
        let config = RenderConfig::default();
        let (sender, mut queue) = command_channel(config.deferral);
        let mut assets = AssetContext::new(sender, &config);
        let mut render = RenderContext::new(Arc::new(HeadlessDevice::new()), &config);

        let lights: Vec<EntityId> = (0..4)
            .map(|i| {
                let entity = assets.world.spawn();
                let at = Vec3::new(i as f32, 0.0, 0.0);
                assets.world.insert(entity, Transform::from_translation(at));
                let light = Light3D::point(LinearRgba::WHITE, 1.0, 5.0 + i as f32);
                assets.world.insert(entity, Arc::new(light));
                entity
            })
            .collect();
        assets.sync();
        queue.execute(&mut render);
        assert_eq!(render.lights.len(), 4);

        assets.world.despawn(lights[1]);
        assets.sync();
        queue.execute(&mut render);

        assert_eq!(render.lights.len(), 3);
        for (index, owner) in render.lights.owners().iter().enumerate() {
            assert_eq!(render.states.get::<LightState>(*owner).unwrap().index, index);
        }
        let moved = render.states.get::<LightState>(lights[3]).unwrap().index;
        assert_eq!(moved, 1);
        assert_eq!(render.lights.get(moved).unwrap().range, 8.0);
    }

    #[test]
    fn moving_a_light_updates_its_slot_in_place() {
        let config = RenderConfig::default();
        let (sender, mut queue) = command_channel(config.deferral);
        let mut assets = AssetContext::new(sender, &config);
        let mut render = RenderContext::new(Arc::new(HeadlessDevice::new()), &config);

        let entity = assets.world.spawn();
        assets
            .world
            .insert(entity, Arc::new(Light3D::point(LinearRgba::WHITE, 1.0, 3.0)));
        assets.sync();
        queue.execute(&mut render);

        let target = Vec3::new(0.0, 4.0, -2.0);
        assets.world.insert(entity, Transform::from_translation(target));
        assets.sync();
        queue.execute(&mut render);

        assert_eq!(render.lights.len(), 1);
        assert_eq!(render.lights.get(0).unwrap().position, target);
    }
}
