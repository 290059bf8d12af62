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
use crate::camera::CameraState;
use crate::context::{AssetContext, RenderContext};
use crate::queue::{CommandKind, CommandStatus, RenderCommand};
use lumen_core::asset::{AssetError, Camera3D};
use lumen_core::math::Mat4;
use lumen_core::renderer::RenderError;
use lumen_core::EntityId;
use std::sync::Arc;

fn teardown(entity: EntityId) -> RenderCommand {
    RenderCommand::new(
        entity,
        CommandKind::Uninitialize,
        "destroy camera",
        move |ctx: &mut RenderContext| {
            let device = ctx.device.clone();
            if let Some(mut state) = ctx.states.remove::<CameraState>(entity) {
                state.release(&*device);
            }
            ctx.clusters.remove_camera(&*device, entity);
            Ok(CommandStatus::Done)
        },
    )
}

fn validate(camera: &Camera3D) -> Result<(), AssetError> {
    if camera.near > 0.0 && camera.far > camera.near {
        Ok(())
    } else {
        Err(AssetError::InvalidData(format!(
            "camera planes must satisfy 0 < near < far, got near {} far {}",
            camera.near, camera.far
        )))
    }
}

/// Creates a [`CameraState`] per [`Camera3D`] entity.
#[derive(Debug)]
pub struct CameraManager;

impl CameraManager {
    /// Moves a camera; its parameters version is bumped.
    pub fn update_transform(ctx: &mut AssetContext, entity: EntityId, world: Mat4) {
        ctx.submit(RenderCommand::new(
            entity,
            CommandKind::Update,
            "move camera",
            move |ctx: &mut RenderContext| {
                if let Some(state) = ctx.states.get_mut::<CameraState>(entity) {
                    state.set_world(world);
                }
                Ok(CommandStatus::Done)
            },
        ));
    }
}

impl ResourceManager for CameraManager {
    type Asset = Camera3D;
    const NAME: &'static str = "Camera3D";

    fn initialize(
        ctx: &mut AssetContext,
        entity: EntityId,
        camera: &Arc<Camera3D>,
        previous: Option<&Arc<Camera3D>>,
    ) -> Result<(), RenderError> {
        ctx.graph.register(entity);
        if let Err(e) = validate(camera) {
            if previous.is_some() {
                ctx.submit(teardown(entity));
            }
            return Err(e.into());
        }

        let camera = Camera3D::clone(camera);
        let world = ctx.world_matrix(entity);
        let kind = if previous.is_some() {
            CommandKind::Update
        } else {
            CommandKind::Initialize
        };
        ctx.submit(RenderCommand::new(entity, kind, "configure camera", move |ctx: &mut RenderContext| {
            let aspect = ctx.viewport.aspect();
            match ctx.states.get_mut::<CameraState>(entity) {
                Some(state) => state.set_camera(camera.clone(), aspect),
                None => {
                    ctx.states
                        .insert(entity, CameraState::new(camera.clone(), world, aspect));
                    log::debug!("Camera {entity} created");
                }
            }
            Ok(CommandStatus::Done)
        }));
        Ok(())
    }

    fn uninitialize(
        ctx: &mut AssetContext,
        entity: EntityId,
        _camera: &Arc<Camera3D>,
    ) -> Result<(), RenderError> {
        ctx.forget(entity);
        ctx.submit(teardown(entity));
        Ok(())
    }
}

pub(super) fn release_all(ctx: &mut RenderContext) {
    let device = ctx.device.clone();
    for entity in ctx.states.entities::<CameraState>() {
        if let Some(mut state) = ctx.states.remove::<CameraState>(entity) {
            state.release(&*device);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderConfig;
    use crate::queue::command_channel;
    use lumen_core::math::Vec3;
    use lumen_core::Transform;
    use lumen_infra::HeadlessDevice;

    #[test]
    fn projection_and_view_changes_bump_the_version() {
        let config = RenderConfig::default();
        let (sender, mut queue) = command_channel(config.deferral);
        let mut assets = AssetContext::new(sender, &config);
        let mut render = RenderContext::new(Arc::new(HeadlessDevice::new()), &config);

        let entity = assets.world.spawn();
        assets.world.insert(entity, Arc::new(Camera3D::perspective(60.0, 0.1, 100.0)));
        assets.sync();
        queue.execute(&mut render);
        let v0 = render.states.get::<CameraState>(entity).unwrap().version();

        assets
            .world
            .insert(entity, Transform::from_translation(Vec3::new(0.0, 0.0, 5.0)));
        assets.sync();
        queue.execute(&mut render);
        let v1 = render.states.get::<CameraState>(entity).unwrap().version();
        assert!(v1 > v0);

        assets.world.insert(entity, Arc::new(Camera3D::perspective(45.0, 0.1, 100.0)));
        assets.sync();
        queue.execute(&mut render);
        let state = render.states.get::<CameraState>(entity).unwrap();
        assert!(state.version() > v1);
        assert_eq!(state.world().translation(), Vec3::new(0.0, 0.0, 5.0));
    }

    #[test]
    fn inverted_planes_are_rejected() {
        let config = RenderConfig::default();
        let (sender, mut queue) = command_channel(config.deferral);
        let mut assets = AssetContext::new(sender, &config);
        let mut render = RenderContext::new(Arc::new(HeadlessDevice::new()), &config);

        let entity = assets.world.spawn();
        assets.world.insert(entity, Arc::new(Camera3D::perspective(60.0, 10.0, 1.0)));
        assets.sync();
        queue.execute(&mut render);
        assert!(!render.states.contains::<CameraState>(entity));
    }
}
