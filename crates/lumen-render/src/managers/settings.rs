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

use super::{LightState, ResourceManager};
use crate::context::{AssetContext, RenderContext};
use crate::queue::{CommandKind, CommandStatus, RenderCommand};
use lumen_core::asset::{AssetError, Light3D, RenderSettings};
use lumen_core::renderer::RenderError;
use lumen_core::EntityId;
use lumen_data::ecs::StateStore;
use std::sync::Arc;

/// Render-side copy of a [`RenderSettings`] entity. Always loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSettingsState {
    /// Fixed render target size, `None` to follow the window.
    pub resolution: Option<(u32, u32)>,
    /// Whether occluded geometry may be skipped.
    pub occlusion_culling: bool,
    /// The light entity used as the sun.
    pub sun_light: Option<EntityId>,
}

impl RenderSettingsState {
    /// The settings in effect: those of the oldest settings entity.
    pub fn current(states: &StateStore) -> Option<&RenderSettingsState> {
        states
            .iter::<RenderSettingsState>()
            .min_by_key(|(entity, _)| *entity)
            .map(|(_, settings)| settings)
    }

    /// Slot of the sun in the light library, if the sun light is loaded.
    pub fn sun_light_index(&self, states: &StateStore) -> Option<usize> {
        let sun = self.sun_light?;
        states.get::<LightState>(sun).map(|state| state.index)
    }
}

fn validate(settings: &RenderSettings) -> Result<(), AssetError> {
    match settings.resolution {
        Some((width, height)) if width == 0 || height == 0 => Err(AssetError::InvalidData(
            format!("render resolution must be non-zero, got {width}x{height}"),
        )),
        _ => Ok(()),
    }
}

fn teardown(entity: EntityId) -> RenderCommand {
    RenderCommand::new(
        entity,
        CommandKind::Uninitialize,
        "remove render settings",
        move |ctx: &mut RenderContext| {
            ctx.states.remove::<RenderSettingsState>(entity);
            Ok(CommandStatus::Done)
        },
    )
}

/// Mirrors [`RenderSettings`] entities on the render thread and keeps a
/// reference from each to its sun light.
#[derive(Debug)]
pub struct RenderSettingsManager;

impl ResourceManager for RenderSettingsManager {
    type Asset = RenderSettings;
    const NAME: &'static str = "RenderSettings";

    fn initialize(
        ctx: &mut AssetContext,
        entity: EntityId,
        settings: &Arc<RenderSettings>,
        previous: Option<&Arc<RenderSettings>>,
    ) -> Result<(), RenderError> {
        ctx.graph.register(entity);
        if let Err(e) = validate(settings) {
            if previous.is_some() {
                ctx.release_all(entity);
                ctx.submit(teardown(entity));
            }
            return Err(e.into());
        }

        let sun_light = settings.sun_light.filter(|&light| {
            let is_light = ctx.world.contains::<Arc<Light3D>>(light);
            if !is_light {
                log::warn!("Sun light {light} of {entity} is not a light entity");
            }
            is_light
        });
        if let Some(light) = sun_light {
            ctx.graph.refer(entity, light)?;
        }
        let keep: Vec<EntityId> = sun_light.into_iter().collect();
        ctx.release_except(entity, &keep);

        let state = RenderSettingsState {
            resolution: settings.resolution,
            occlusion_culling: settings.occlusion_culling,
            sun_light,
        };
        let kind = if previous.is_some() {
            CommandKind::Update
        } else {
            CommandKind::Initialize
        };
        ctx.submit(RenderCommand::new(entity, kind, "apply render settings", move |ctx: &mut RenderContext| {
            ctx.states.insert(entity, state);
            if let Some((width, height)) = state.resolution {
                if (ctx.viewport.width, ctx.viewport.height) != (width, height) {
                    ctx.resize(width, height);
                }
            }
            Ok(CommandStatus::Done)
        }));
        Ok(())
    }

    fn uninitialize(
        ctx: &mut AssetContext,
        entity: EntityId,
        _settings: &Arc<RenderSettings>,
    ) -> Result<(), RenderError> {
        ctx.forget(entity);
        ctx.submit(teardown(entity));
        Ok(())
    }
}

pub(super) fn release_all(ctx: &mut RenderContext) {
    for entity in ctx.states.entities::<RenderSettingsState>() {
        ctx.states.remove::<RenderSettingsState>(entity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderConfig;
    use crate::queue::{command_channel, RenderCommandQueue};
    use lumen_core::math::LinearRgba;
    use lumen_infra::HeadlessDevice;

    struct Harness {
        assets: AssetContext,
        render: RenderContext,
        queue: RenderCommandQueue,
    }

    impl Harness {
        fn new() -> Self {
            let config = RenderConfig::default();
            let (sender, queue) = command_channel(config.deferral);
            Self {
                assets: AssetContext::new(sender, &config),
                render: RenderContext::new(Arc::new(HeadlessDevice::new()), &config),
                queue,
            }
        }

        fn settle(&mut self) {
            self.assets.sync();
            self.queue.execute(&mut self.render);
        }

        fn spawn_sun(&mut self) -> EntityId {
            let sun = self.assets.world.spawn();
            let light = Light3D::directional(LinearRgba::WHITE, 1.0);
            self.assets.world.insert(sun, Arc::new(light));
            sun
        }
    }

    #[test]
    fn settings_reference_their_sun_light() {
        let mut h = Harness::new();
        let sun = h.spawn_sun();
        let entity = h.assets.world.spawn();
        let settings = RenderSettings::default()
            .with_resolution(640, 360)
            .with_sun_light(sun);
        h.assets.world.insert(entity, Arc::new(settings));
        h.settle();

        assert!(h.assets.graph.referred(entity).eq([sun]));
        let state = *RenderSettingsState::current(&h.render.states).unwrap();
        assert_eq!(state.sun_light, Some(sun));
        assert!(state.occlusion_culling);
        assert_eq!(state.sun_light_index(&h.render.states), Some(0));
        assert_eq!((h.render.viewport.width, h.render.viewport.height), (640, 360));

        h.assets.world.remove::<Arc<Light3D>>(sun);
        h.settle();
        assert_eq!(h.assets.graph.referred(entity).count(), 0);
        let state = *RenderSettingsState::current(&h.render.states).unwrap();
        assert_eq!(state.sun_light_index(&h.render.states), None);
    }

    #[test]
    fn changing_the_sun_moves_the_reference() {
        let mut h = Harness::new();
        let (first, second) = (h.spawn_sun(), h.spawn_sun());
        let entity = h.assets.world.spawn();
        h.assets
            .world
            .insert(entity, Arc::new(RenderSettings::default().with_sun_light(first)));
        h.settle();

        h.assets
            .world
            .insert(entity, Arc::new(RenderSettings::default().with_sun_light(second)));
        h.settle();
        assert!(h.assets.graph.referred(entity).eq([second]));
        assert_eq!(h.assets.graph.referrer_count(first), 0);
        // Lights are not library assets: releasing one keeps it alive.
        assert!(h.assets.world.contains::<Arc<Light3D>>(first));
    }

    #[test]
    fn a_non_light_sun_is_ignored() {
        let mut h = Harness::new();
        let stranger = h.assets.world.spawn();
        let entity = h.assets.world.spawn();
        h.assets
            .world
            .insert(entity, Arc::new(RenderSettings::default().with_sun_light(stranger)));
        h.settle();
        let state = RenderSettingsState::current(&h.render.states).unwrap();
        assert_eq!(state.sun_light, None);
    }

    #[test]
    fn zero_resolution_is_rejected() {
        let mut h = Harness::new();
        let entity = h.assets.world.spawn();
        h.assets
            .world
            .insert(entity, Arc::new(RenderSettings::default().with_resolution(0, 720)));
        h.settle();
        assert!(RenderSettingsState::current(&h.render.states).is_none());
    }
}
