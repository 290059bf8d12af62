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

//! Texture uploads shared by [`Texture2D`], [`Cubemap`] and [`Tileset2D`].

use super::ResourceManager;
use crate::context::{AssetContext, RenderContext};
use crate::queue::{CommandKind, CommandStatus, RenderCommand};
use lumen_core::asset::{Cubemap, Texture2D, TextureAsset, TextureRef, Tileset2D};
use lumen_core::renderer::{
    GraphicsDevice, RenderError, SamplerState, TextureDescriptor, TextureDimension, TextureHandle,
};
use lumen_core::EntityId;
use std::sync::Arc;

/// An uploaded texture of any dimension.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureGpuState {
    /// The texture object.
    pub handle: TextureHandle,
    /// Storage shape.
    pub dimension: TextureDimension,
    /// The sampler state last applied.
    pub sampler: SamplerState,
}

impl TextureGpuState {
    /// Returns `true` if the texture exists on the GPU.
    pub fn is_loaded(&self) -> bool {
        self.handle.is_valid()
    }
}

fn destroy(device: &dyn GraphicsDevice, entity: EntityId, state: &TextureGpuState) {
    if let Err(e) = device.destroy_texture(state.handle) {
        log::error!("Failed to destroy texture {} of {entity}: {e}", state.handle);
    }
}

fn teardown(entity: EntityId) -> RenderCommand {
    RenderCommand::new(
        entity,
        CommandKind::Uninitialize,
        "destroy texture",
        move |ctx: &mut RenderContext| {
            if let Some(state) = ctx.states.remove::<TextureGpuState>(entity) {
                destroy(&*ctx.device, entity, &state);
            }
            Ok(CommandStatus::Done)
        },
    )
}

/// Resolves a material texture to its shared entity and records the edge
/// `referrer -> texture`.
pub(crate) fn acquire(
    ctx: &mut AssetContext,
    referrer: EntityId,
    texture: &TextureRef,
) -> Result<EntityId, RenderError> {
    match texture {
        TextureRef::Texture2D(texture) => ctx.acquire(referrer, texture.clone()),
        TextureRef::Cubemap(texture) => ctx.acquire(referrer, texture.clone()),
        TextureRef::Tileset2D(texture) => ctx.acquire(referrer, texture.clone()),
    }
}

/// Submits the upload of a new texture, or the cheapest update bringing a
/// live one from `previous` to `texture`.
///
/// Sampler-only changes update the existing texture in place; new pixels or
/// layout re-create it. Invalid contents tear down what was live.
pub(crate) fn initialize_texture<T: TextureAsset>(
    ctx: &mut AssetContext,
    entity: EntityId,
    texture: &Arc<T>,
    previous: Option<&Arc<T>>,
) -> Result<(), RenderError> {
    ctx.graph.register(entity);
    if let Err(e) = texture.contents() {
        if previous.is_some() {
            ctx.submit(teardown(entity));
        }
        return Err(e.into());
    }

    let regenerate = previous.map_or(true, |previous| texture.requires_regeneration(previous));
    let texture = texture.clone();
    if regenerate {
        let kind = if previous.is_some() {
            CommandKind::Update
        } else {
            CommandKind::Initialize
        };
        ctx.submit(RenderCommand::new(entity, kind, "upload texture", move |ctx: &mut RenderContext| {
            let device = ctx.device.clone();
            let contents = texture.contents()?;
            let sampler = texture.sampler_state();
            let handle = device.create_texture(&TextureDescriptor {
                label: None,
                dimension: contents.dimension,
                width: contents.width,
                height: contents.height,
                format: contents.format,
                data: Some(&contents.pixels[..]),
                mipmaps: texture.mipmaps(),
                sampler,
            })?;
            let state = TextureGpuState {
                handle,
                dimension: contents.dimension,
                sampler,
            };
            if let Some(old) = ctx.states.insert(entity, state) {
                destroy(&*device, entity, &old);
            }
            log::debug!(
                "Uploaded {}x{} {:?} texture {handle} for {entity}",
                contents.width,
                contents.height,
                contents.dimension
            );
            Ok(CommandStatus::Done)
        }));
    } else {
        ctx.submit(RenderCommand::new(
            entity,
            CommandKind::Update,
            "update sampler",
            move |ctx: &mut RenderContext| {
                let sampler = texture.sampler_state();
                let Some(state) = ctx.states.get_mut::<TextureGpuState>(entity) else {
                    return Err(RenderError::NotLoaded(entity));
                };
                ctx.device.set_sampler_state(state.handle, &sampler)?;
                state.sampler = sampler;
                Ok(CommandStatus::Done)
            },
        ));
    }
    Ok(())
}

/// Drops the graph node of a removed texture and destroys its storage.
pub(crate) fn uninitialize_texture(ctx: &mut AssetContext, entity: EntityId) {
    ctx.forget(entity);
    ctx.submit(teardown(entity));
}

/// Uploads [`Texture2D`] assets.
#[derive(Debug)]
pub struct TextureManager;

impl ResourceManager for TextureManager {
    type Asset = Texture2D;
    const NAME: &'static str = "Texture2D";

    fn initialize(
        ctx: &mut AssetContext,
        entity: EntityId,
        texture: &Arc<Texture2D>,
        previous: Option<&Arc<Texture2D>>,
    ) -> Result<(), RenderError> {
        initialize_texture(ctx, entity, texture, previous)
    }

    fn uninitialize(
        ctx: &mut AssetContext,
        entity: EntityId,
        _texture: &Arc<Texture2D>,
    ) -> Result<(), RenderError> {
        uninitialize_texture(ctx, entity);
        Ok(())
    }
}

/// Uploads [`Cubemap`] assets as cube textures.
#[derive(Debug)]
pub struct CubemapManager;

impl ResourceManager for CubemapManager {
    type Asset = Cubemap;
    const NAME: &'static str = "Cubemap";

    fn initialize(
        ctx: &mut AssetContext,
        entity: EntityId,
        cubemap: &Arc<Cubemap>,
        previous: Option<&Arc<Cubemap>>,
    ) -> Result<(), RenderError> {
        initialize_texture(ctx, entity, cubemap, previous)
    }

    fn uninitialize(
        ctx: &mut AssetContext,
        entity: EntityId,
        _cubemap: &Arc<Cubemap>,
    ) -> Result<(), RenderError> {
        uninitialize_texture(ctx, entity);
        Ok(())
    }
}

/// Uploads [`Tileset2D`] assets as texture arrays.
#[derive(Debug)]
pub struct Tileset2DManager;

impl ResourceManager for Tileset2DManager {
    type Asset = Tileset2D;
    const NAME: &'static str = "Tileset2D";

    fn initialize(
        ctx: &mut AssetContext,
        entity: EntityId,
        tileset: &Arc<Tileset2D>,
        previous: Option<&Arc<Tileset2D>>,
    ) -> Result<(), RenderError> {
        initialize_texture(ctx, entity, tileset, previous)
    }

    fn uninitialize(
        ctx: &mut AssetContext,
        entity: EntityId,
        _tileset: &Arc<Tileset2D>,
    ) -> Result<(), RenderError> {
        uninitialize_texture(ctx, entity);
        Ok(())
    }
}

pub(super) fn release_all(ctx: &mut RenderContext) {
    for entity in ctx.states.entities::<TextureGpuState>() {
        if let Some(state) = ctx.states.remove::<TextureGpuState>(entity) {
            destroy(&*ctx.device, entity, &state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderConfig;
    use crate::queue::command_channel;
    use lumen_core::asset::Image;
    use lumen_core::renderer::{TextureFilter, TextureWrap};
    use lumen_infra::{HeadlessDevice, TextureStorage};

    fn texture() -> Texture2D {
        Texture2D::new(Image::rgba8(2, 2, Arc::from(vec![200u8; 16])))
    }

    #[test]
    fn sampler_changes_keep_the_texture_object() {
        let config = RenderConfig::default();
        let device = Arc::new(HeadlessDevice::new());
        let (sender, mut queue) = command_channel(config.deferral);
        let mut assets = AssetContext::new(sender, &config);
        let mut render = RenderContext::new(device.clone(), &config);

        let entity = assets.world.spawn();
        assets.world.insert(entity, Arc::new(texture()));
        assets.sync();
        queue.execute(&mut render);
        let first = *render.states.get::<TextureGpuState>(entity).unwrap();

        let clamped = texture().with_wrap(TextureWrap::ClampToEdge, TextureWrap::ClampToEdge);
        assets.world.insert(entity, Arc::new(clamped));
        assets.sync();
        queue.execute(&mut render);
        let second = *render.states.get::<TextureGpuState>(entity).unwrap();
        assert_eq!(first.handle, second.handle);
        assert_eq!(device.texture(second.handle).unwrap().sampler, second.sampler);

        let mipmapped = texture()
            .with_filters(TextureFilter::Linear, TextureFilter::Linear)
            .with_mipmaps(true);
        assets.world.insert(entity, Arc::new(mipmapped));
        assets.sync();
        queue.execute(&mut render);
        let third = *render.states.get::<TextureGpuState>(entity).unwrap();
        assert_ne!(third.handle, second.handle);
        assert!(device.texture(second.handle).is_none());
        assert_eq!(device.stats().textures, 1);
    }

    #[test]
    fn invalid_image_tears_down_the_previous_texture() {
        let config = RenderConfig::default();
        let device = Arc::new(HeadlessDevice::new());
        let (sender, mut queue) = command_channel(config.deferral);
        let mut assets = AssetContext::new(sender, &config);
        let mut render = RenderContext::new(device.clone(), &config);

        let entity = assets.world.spawn();
        assets.world.insert(entity, Arc::new(texture()));
        assets.sync();
        queue.execute(&mut render);
        assert_eq!(device.stats().textures, 1);

        let broken = Texture2D::new(Image::rgba8(2, 2, Arc::from(vec![0u8; 3])));
        assets.world.insert(entity, Arc::new(broken));
        assets.sync();
        queue.execute(&mut render);
        assert!(!render.states.contains::<TextureGpuState>(entity));
        assert_eq!(device.stats().textures, 0);
    }

    fn solid(value: u8) -> Image {
        Image::rgba8(1, 1, Arc::from(vec![value; 4]))
    }

    #[test]
    fn cubemap_uploads_six_faces_and_updates_wrap_w_in_place() {
        let config = RenderConfig::default();
        let device = Arc::new(HeadlessDevice::new());
        let (sender, mut queue) = command_channel(config.deferral);
        let mut assets = AssetContext::new(sender, &config);
        let mut render = RenderContext::new(device.clone(), &config);

        let sky = Cubemap::new(std::array::from_fn(|face| solid(face as u8)));
        let entity = assets.world.spawn();
        assets.world.insert(entity, Arc::new(sky.clone()));
        assets.sync();
        queue.execute(&mut render);
        let first = *render.states.get::<TextureGpuState>(entity).unwrap();
        assert_eq!(first.dimension, TextureDimension::Cube);
        assert!(matches!(
            device.texture(first.handle).unwrap().storage,
            TextureStorage::Image { dimension: TextureDimension::Cube, width: 1, .. }
        ));

        let mirrored = sky.with_wrap(
            TextureWrap::ClampToEdge,
            TextureWrap::ClampToEdge,
            TextureWrap::MirroredRepeat,
        );
        assets.world.insert(entity, Arc::new(mirrored));
        assets.sync();
        queue.execute(&mut render);
        let second = *render.states.get::<TextureGpuState>(entity).unwrap();
        assert_eq!(second.handle, first.handle);
        assert_eq!(
            device.texture(second.handle).unwrap().sampler.wrap_w,
            TextureWrap::MirroredRepeat
        );
    }

    #[test]
    fn tileset_count_change_recreates_the_array() {
        let config = RenderConfig::default();
        let device = Arc::new(HeadlessDevice::new());
        let (sender, mut queue) = command_channel(config.deferral);
        let mut assets = AssetContext::new(sender, &config);
        let mut render = RenderContext::new(device.clone(), &config);

        let atlas = Image::rgba8(4, 2, Arc::from(vec![7u8; 32]));
        let tiles = Tileset2D::new(atlas, 2, 1);
        let entity = assets.world.spawn();
        assets.world.insert(entity, Arc::new(tiles.clone()));
        assets.sync();
        queue.execute(&mut render);
        let first = *render.states.get::<TextureGpuState>(entity).unwrap();
        assert_eq!(first.dimension, TextureDimension::D2Array { layers: 4 });

        assets.world.insert(entity, Arc::new(tiles.with_count(3)));
        assets.sync();
        queue.execute(&mut render);
        let second = *render.states.get::<TextureGpuState>(entity).unwrap();
        assert_ne!(second.handle, first.handle);
        assert_eq!(second.dimension, TextureDimension::D2Array { layers: 3 });
        assert_eq!(device.stats().textures, 1);

        assets.world.remove::<Arc<Tileset2D>>(entity);
        assets.sync();
        queue.execute(&mut render);
        assert!(!render.states.contains::<TextureGpuState>(entity));
        assert_eq!(device.stats().textures, 0);
    }
}
