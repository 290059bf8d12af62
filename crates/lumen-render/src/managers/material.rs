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

//! Materials: program variants, the packed parameter block and texture
//! bindings.

use super::{ProgramGpuState, ResourceManager, TextureGpuState};
use crate::context::{AssetContext, RenderContext};
use crate::queue::{CommandKind, CommandStatus, RenderCommand};
use lumen_core::asset::program::EMPTY_FRAGMENT_SOURCE;
use lumen_core::asset::{AssetError, LightingMode, Material, RenderMode, ShaderProgram};
use lumen_core::renderer::gpu_types::{bindings, texture_units};
use lumen_core::renderer::uniform::UniformBlock;
use lumen_core::renderer::{
    BufferDescriptor, BufferHandle, BufferTarget, BufferUsage, CullMode, GraphicsDevice,
    ProgramHandle, RenderError, ShaderStage, ShaderValue, UniformError,
};
use lumen_core::EntityId;
use lumen_data::ecs::StateStore;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Smallest uniform buffer created for a material.
const MIN_BLOCK_SIZE: usize = 16;

/// Which program variant of a material to bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialPass {
    /// Depth-only variant with an empty fragment stage.
    Depth,
    /// Full shading variant.
    Color,
}

/// A material texture and the unit it is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureBinding {
    /// The texture entity.
    pub entity: EntityId,
    /// Location of the sampler uniform in the color program, if active.
    pub location: Option<i32>,
    /// The texture unit.
    pub unit: u32,
}

/// The render-side state of a material.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialGpuState {
    /// The `MaterialParameters` uniform buffer.
    pub buffer: BufferHandle,
    /// Size of [`Self::buffer`] in bytes.
    pub block_size: usize,
    /// The color program entity.
    pub color_program: EntityId,
    /// The depth program entity.
    pub depth_program: EntityId,
    /// Texture bindings, in declaration order.
    pub textures: Vec<TextureBinding>,
    /// Face culling applied while the material is bound.
    pub cull_mode: CullMode,
    /// How the material blends.
    pub render_mode: RenderMode,
}

impl MaterialGpuState {
    /// Returns `true` if the parameter buffer exists.
    pub fn is_loaded(&self) -> bool {
        self.buffer.is_valid()
    }

    /// Returns `true` if the material is drawn in the opaque queue.
    pub fn is_opaque(&self) -> bool {
        matches!(self.render_mode, RenderMode::Opaque | RenderMode::Cutoff)
    }

    /// The program entity used for `pass`.
    pub fn program(&self, pass: MaterialPass) -> EntityId {
        match pass {
            MaterialPass::Depth => self.depth_program,
            MaterialPass::Color => self.color_program,
        }
    }

    /// Makes the material current for `pass`: program, parameter block, cull
    /// mode and, for the color pass, textures and their sampler uniforms.
    ///
    /// # Errors
    /// * [`RenderError::NotLoaded`] if a program or texture state is missing.
    pub fn bind(
        &self,
        device: &dyn GraphicsDevice,
        states: &StateStore,
        pass: MaterialPass,
    ) -> Result<ProgramHandle, RenderError> {
        let program_entity = self.program(pass);
        let program = states
            .get::<ProgramGpuState>(program_entity)
            .filter(|p| p.is_loaded())
            .ok_or(RenderError::NotLoaded(program_entity))?;

        device.use_program(program.handle)?;
        device.bind_uniform_buffer(bindings::MATERIAL, self.buffer)?;
        device.set_cull_mode(self.cull_mode);

        if pass == MaterialPass::Color {
            for binding in &self.textures {
                let texture = states
                    .get::<TextureGpuState>(binding.entity)
                    .filter(|t| t.is_loaded())
                    .ok_or(RenderError::NotLoaded(binding.entity))?;
                device.bind_texture(binding.unit, texture.handle)?;
                if let Some(location) = binding.location {
                    device.set_uniform_i32(location, binding.unit as i32)?;
                }
            }
        }
        Ok(program.handle)
    }
}

fn present_property_macros<'a>(
    base: &'a ShaderProgram,
    material: &'a Material,
) -> impl Iterator<Item = String> + 'a {
    base.parameters
        .iter()
        .filter(|p| match material.properties.get(&p.name) {
            Some(ShaderValue::Texture(None)) | None => false,
            Some(_) => true,
        })
        .map(|p| format!("_{}", p.name))
}

/// Derives the color variant of `base` for `material`.
///
/// The variant adds `RenderMode_<Mode>`, `LightingMode_<Mode>`, the shadow
/// flags and one `_<Name>` macro per declared parameter the material sets.
pub fn derive_color_program(base: &ShaderProgram, material: &Material) -> ShaderProgram {
    let mut program = base.clone();
    program.macros.insert(material.render_mode.macro_name().to_owned());
    program.macros.insert(material.lighting_mode.macro_name().to_owned());
    if material.is_shadow_caster {
        program.macros.insert("_IsShadowCaster".to_owned());
    }
    if material.is_shadow_receiver {
        program.macros.insert("_IsShadowReceiver".to_owned());
    }
    program.macros.extend(present_property_macros(base, material));
    program
}

/// Derives the depth-only variant of `base` for `material`.
///
/// Only the `_`-prefixed macros of the color variant are kept; alpha-tested
/// and blended materials compile as cutoff, lighting is always unlit and the
/// fragment stage is empty.
pub fn derive_depth_program(base: &ShaderProgram, material: &Material) -> ShaderProgram {
    let color = derive_color_program(base, material);
    let mut program = base.clone();
    program.name = format!("{} (depth)", base.name);
    program.macros = color.macros.into_iter().filter(|m| m.starts_with('_')).collect();
    let render_mode = match material.render_mode {
        RenderMode::Opaque => RenderMode::Opaque,
        _ => RenderMode::Cutoff,
    };
    program.macros.insert(render_mode.macro_name().to_owned());
    program.macros.insert(LightingMode::Unlit.macro_name().to_owned());
    if program.stages.contains_key(&ShaderStage::Fragment) {
        program
            .stages
            .insert(ShaderStage::Fragment, Arc::from(EMPTY_FRAGMENT_SOURCE));
    }
    program
}

/// Packs the declared defaults of `program`, then `properties`, into a block
/// laid out for `program`.
///
/// Unknown names are logged and skipped, and so are type mismatches. Samplers
/// take no room in the block.
pub fn build_uniform_block(
    program: &ShaderProgram,
    properties: &BTreeMap<String, ShaderValue>,
) -> UniformBlock {
    let mut block = UniformBlock::new(program.uniform_layout());
    let defaults = program
        .parameters
        .iter()
        .filter(|p| !p.ty.is_texture())
        .filter_map(|p| p.default.as_ref().map(|d| (p.name.as_str(), d)));
    let values = properties.iter().map(|(name, value)| (name.as_str(), value));

    for (name, value) in defaults.chain(values) {
        if block.layout().is_texture(name) {
            continue;
        }
        match block.set(name, value) {
            Ok(()) => {}
            Err(UniformError::UnknownParameter(_)) => {
                log::warn!("Program '{}' declares no parameter '{name}'; skipped", program.name);
            }
            Err(e) => {
                log::error!("Cannot write '{name}' for program '{}': {e}", program.name);
            }
        }
    }
    block
}

fn destroy(device: &dyn GraphicsDevice, entity: EntityId, state: &MaterialGpuState) {
    if state.buffer.is_valid() {
        if let Err(e) = device.destroy_buffer(state.buffer) {
            log::error!("Failed to destroy material buffer {} of {entity}: {e}", state.buffer);
        }
    }
}

fn teardown(entity: EntityId) -> RenderCommand {
    RenderCommand::new(
        entity,
        CommandKind::Uninitialize,
        "destroy material",
        move |ctx: &mut RenderContext| {
            if let Some(state) = ctx.states.remove::<MaterialGpuState>(entity) {
                destroy(&*ctx.device, entity, &state);
            }
            Ok(CommandStatus::Done)
        },
    )
}

/// Plain data a material command carries to the render thread.
struct MaterialUpload {
    label: String,
    color_program: EntityId,
    depth_program: EntityId,
    textures: Vec<(String, EntityId)>,
    block: Vec<u8>,
    cull_mode: CullMode,
    render_mode: RenderMode,
}

impl MaterialUpload {
    fn is_ready(&self, states: &StateStore) -> bool {
        let program_ready = |e| states.get::<ProgramGpuState>(e).is_some_and(|p| p.is_loaded());
        let texture_ready = |e| states.get::<TextureGpuState>(e).is_some_and(|t| t.is_loaded());
        program_ready(self.color_program)
            && program_ready(self.depth_program)
            && self.textures.iter().all(|(_, e)| texture_ready(*e))
    }

    fn apply(&self, ctx: &mut RenderContext, entity: EntityId) -> Result<(), RenderError> {
        let device = ctx.device.clone();

        let mut textures = Vec::with_capacity(self.textures.len());
        if let Some(program) = ctx.states.get_mut::<ProgramGpuState>(self.color_program) {
            for (unit, (name, texture)) in (texture_units::FIRST_MATERIAL..).zip(&self.textures) {
                textures.push(TextureBinding {
                    entity: *texture,
                    location: program.uniform_location(&*device, name),
                    unit,
                });
            }
        }

        let existing = ctx
            .states
            .get::<MaterialGpuState>(entity)
            .filter(|s| s.is_loaded() && s.block_size == self.block.len())
            .map(|s| s.buffer);
        let buffer = match existing {
            Some(buffer) => {
                device.write_buffer(buffer, 0, &self.block)?;
                buffer
            }
            None => {
                let buffer = device.create_buffer_with_data(
                    &BufferDescriptor {
                        label: Some(format!("{} parameters", self.label).into()),
                        target: BufferTarget::Uniform,
                        usage: BufferUsage::Dynamic,
                        size: self.block.len() as u64,
                    },
                    &self.block,
                )?;
                log::debug!("Created material buffer {buffer} for {entity}");
                buffer
            }
        };

        let state = MaterialGpuState {
            buffer,
            block_size: self.block.len(),
            color_program: self.color_program,
            depth_program: self.depth_program,
            textures,
            cull_mode: self.cull_mode,
            render_mode: self.render_mode,
        };
        if let Some(old) = ctx.states.insert(entity, state) {
            if old.buffer != buffer {
                destroy(&*device, entity, &old);
            }
        }
        Ok(())
    }
}

/// Resolves [`Material`] assets into program variants, textures and a
/// parameter buffer.
#[derive(Debug)]
pub struct MaterialManager;

impl MaterialManager {
    fn prepare(
        ctx: &mut AssetContext,
        entity: EntityId,
        material: &Material,
    ) -> Result<MaterialUpload, RenderError> {
        let base = material
            .shader_program
            .clone()
            .or_else(|| ctx.programs.default_program())
            .ok_or_else(|| AssetError::InvalidData("material has no shader program".to_owned()))?;

        let color = derive_color_program(&base, material);
        let depth = derive_depth_program(&base, material);
        let color_program = ctx.acquire(entity, Arc::new(color))?;
        let depth_program = ctx.acquire(entity, Arc::new(depth))?;

        let mut keep = vec![color_program, depth_program];
        let mut textures = Vec::new();
        for parameter in base.parameters.iter().filter(|p| p.ty.is_texture()) {
            let value = material
                .properties
                .get(&parameter.name)
                .or(parameter.default.as_ref());
            let Some(texture) = value.and_then(ShaderValue::as_texture) else {
                continue;
            };
            let texture_entity = super::texture::acquire(ctx, entity, texture)?;
            keep.push(texture_entity);
            textures.push((parameter.name.clone(), texture_entity));
        }
        ctx.release_except(entity, &keep);

        let mut block = build_uniform_block(&base, &material.properties).into_bytes();
        if block.len() < MIN_BLOCK_SIZE {
            block.resize(MIN_BLOCK_SIZE, 0);
        }

        Ok(MaterialUpload {
            label: base.name.clone(),
            color_program,
            depth_program,
            textures,
            block,
            cull_mode: if material.is_two_sided {
                CullMode::None
            } else {
                CullMode::Back
            },
            render_mode: material.render_mode,
        })
    }
}

impl ResourceManager for MaterialManager {
    type Asset = Material;
    const NAME: &'static str = "Material";

    fn initialize(
        ctx: &mut AssetContext,
        entity: EntityId,
        material: &Arc<Material>,
        previous: Option<&Arc<Material>>,
    ) -> Result<(), RenderError> {
        ctx.graph.register(entity);
        let upload = match Self::prepare(ctx, entity, material) {
            Ok(upload) => upload,
            Err(e) => {
                if previous.is_some() {
                    ctx.release_all(entity);
                    ctx.submit(teardown(entity));
                }
                return Err(e);
            }
        };

        let kind = if previous.is_some() {
            CommandKind::Update
        } else {
            CommandKind::Initialize
        };
        ctx.submit(RenderCommand::new(entity, kind, "upload material", move |ctx: &mut RenderContext| {
            if !upload.is_ready(&ctx.states) {
                return Ok(CommandStatus::Deferred);
            }
            upload.apply(ctx, entity)?;
            Ok(CommandStatus::Done)
        })
        .superseding());
        Ok(())
    }

    fn uninitialize(
        ctx: &mut AssetContext,
        entity: EntityId,
        _material: &Arc<Material>,
    ) -> Result<(), RenderError> {
        ctx.forget(entity);
        ctx.submit(teardown(entity));
        Ok(())
    }
}

pub(super) fn release_all(ctx: &mut RenderContext) {
    for entity in ctx.states.entities::<MaterialGpuState>() {
        if let Some(state) = ctx.states.remove::<MaterialGpuState>(entity) {
            destroy(&*ctx.device, entity, &state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::math::Vec3;
    use lumen_core::renderer::ShaderParameterType;

    fn base() -> ShaderProgram {
        ShaderProgram::new("Lit")
            .with_stage(ShaderStage::Vertex, "void main() {}")
            .with_stage(ShaderStage::Fragment, "out vec4 c; void main() { c = vec4(1.0); }")
            .with_macro("HAS_FOG")
            .with_default("Brightness", ShaderValue::Float(0.5))
            .with_parameter("Tint", ShaderParameterType::Vector3)
            .with_parameter("Albedo", ShaderParameterType::Texture)
    }

    #[test]
    fn color_variant_carries_mode_and_property_macros() {
        let material = Material::default()
            .with_render_mode(RenderMode::Transparent)
            .with_shadows(true, false)
            .with_property("Tint", Vec3::new(1.0, 0.0, 0.0))
            .with_property("Unknown", 1.0f32);
        let program = derive_color_program(&base(), &material);
        let macros: Vec<_> = program.macros.iter().map(String::as_str).collect();
        assert_eq!(
            macros,
            vec![
                "HAS_FOG",
                "LightingMode_Lit",
                "RenderMode_Transparent",
                "_IsShadowCaster",
                "_Tint"
            ]
        );
    }

    #[test]
    fn depth_variant_strips_lighting_and_fragment() {
        let material = Material::default()
            .with_render_mode(RenderMode::Additive)
            .with_lighting_mode(LightingMode::Lit)
            .with_property("Tint", Vec3::ONE);
        let program = derive_depth_program(&base(), &material);
        let macros: Vec<_> = program.macros.iter().map(String::as_str).collect();
        assert_eq!(
            macros,
            vec![
                "LightingMode_Unlit",
                "RenderMode_Cutoff",
                "_IsShadowCaster",
                "_IsShadowReceiver",
                "_Tint"
            ]
        );
        assert_eq!(program.name, "Lit (depth)");
        assert_eq!(&*program.stages[&ShaderStage::Fragment], EMPTY_FRAGMENT_SOURCE);
        assert_eq!(program.stages[&ShaderStage::Vertex], base().stages[&ShaderStage::Vertex]);
    }

    #[test]
    fn block_starts_from_defaults_and_skips_bad_writes() {
        let mut properties = BTreeMap::new();
        properties.insert("Tint".to_owned(), ShaderValue::Vector3(Vec3::new(0.0, 2.0, 0.0)));
        properties.insert("Brightness".to_owned(), ShaderValue::Int(4));
        properties.insert("Missing".to_owned(), ShaderValue::Float(1.0));
        let block = build_uniform_block(&base(), &properties);

        let layout = block.layout();
        let brightness = layout.get("Brightness").unwrap().offset;
        let tint = layout.get("Tint").unwrap().offset;
        let bytes = block.bytes();
        let b: f32 = bytemuck::pod_read_unaligned(&bytes[brightness..brightness + 4]);
        let t: [f32; 3] = bytemuck::pod_read_unaligned(&bytes[tint..tint + 12]);
        assert_eq!(b, 0.5);
        assert_eq!(t, [0.0, 2.0, 0.0]);
    }
}
