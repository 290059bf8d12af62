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

//! Render passes and the built-in forward+ pipeline.

use crate::camera::CameraState;
use crate::context::RenderContext;
use crate::managers::{MaterialGpuState, MaterialPass};
use lumen_core::renderer::gpu_types::{bindings, texture_units};
use lumen_core::renderer::{DrawCall, FramebufferHandle, RenderError};
use lumen_core::EntityId;

/// A named step of the frame, run after clustering.
pub trait RenderPass: Send {
    /// The name the pass is registered under.
    fn name(&self) -> &str;

    /// Records the pass.
    fn execute(&mut self, ctx: &mut RenderContext) -> Result<(), RenderError>;
}

/// The framebuffer the built-in passes draw into, stored as a context addon.
/// Without it they draw to the default framebuffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderTarget {
    /// The target framebuffer, `None` for the default one.
    pub framebuffer: Option<FramebufferHandle>,
}

fn loaded_cameras(ctx: &RenderContext) -> Vec<EntityId> {
    ctx.states
        .iter::<CameraState>()
        .filter(|(_, camera)| camera.is_loaded())
        .map(|(entity, _)| entity)
        .collect()
}

fn bind_target(ctx: &RenderContext) -> Result<(), RenderError> {
    let framebuffer = ctx.addons.get::<RenderTarget>().and_then(|t| t.framebuffer);
    ctx.device.bind_framebuffer(framebuffer)?;
    Ok(())
}

/// Draws every instance group whose material passes `filter`. Groups whose
/// material or geometry is not ready are skipped.
fn draw_groups(
    ctx: &RenderContext,
    pass: MaterialPass,
    filter: impl Fn(&MaterialGpuState) -> bool,
) -> Result<usize, RenderError> {
    let device = &*ctx.device;
    let mut draws = 0;
    for (key, group) in ctx.instances.iter() {
        if group.instance_count() == 0 || !group.buffer().is_valid() {
            continue;
        }
        let Some(material) = ctx
            .states
            .get::<MaterialGpuState>(key.material)
            .filter(|m| m.is_loaded() && filter(m))
        else {
            continue;
        };
        let Some(buffers) = ctx.mesh_data.get(&key.mesh_data) else {
            continue;
        };
        let program = match material.bind(device, &ctx.states, pass) {
            Ok(program) => program,
            Err(e) => {
                log::debug!("Skipping group of material {}: {e}", key.material);
                continue;
            }
        };
        device.bind_uniform_buffer(bindings::MESH, buffers.bounds_buffer)?;
        device.draw(&DrawCall {
            program,
            topology: buffers.topology,
            vertex_buffers: buffers.vertex_buffers,
            index_buffer: buffers.index_buffer,
            element_count: buffers.element_count,
            instance_buffer: group.buffer(),
            instance_count: group.instance_count() as u32,
        })?;
        draws += 1;
    }
    Ok(draws)
}

/// Fills the depth buffer with opaque and alpha-tested geometry using the
/// depth-only program variants.
#[derive(Debug, Default)]
pub struct DepthPrepass;

impl RenderPass for DepthPrepass {
    fn name(&self) -> &str {
        "DepthPrepass"
    }

    fn execute(&mut self, ctx: &mut RenderContext) -> Result<(), RenderError> {
        bind_target(ctx)?;
        for entity in loaded_cameras(ctx) {
            let Some(camera) = ctx.states.get::<CameraState>(entity) else {
                continue;
            };
            camera.bind(&*ctx.device)?;
            ctx.device.set_color_write(false);
            ctx.device.clear(None, Some(1.0));
            let drawn = draw_groups(ctx, MaterialPass::Depth, MaterialGpuState::is_opaque);
            ctx.device.set_color_write(true);
            let drawn = drawn?;
            log::trace!("Depth prepass of {entity}: {drawn} draws");
        }
        Ok(())
    }
}

/// Shades every instance group with its color program: opaque materials
/// first, then blended ones. Depth is expected to be filled by
/// [`DepthPrepass`].
#[derive(Debug, Default)]
pub struct ForwardPass;

impl RenderPass for ForwardPass {
    fn name(&self) -> &str {
        "ForwardPass"
    }

    fn execute(&mut self, ctx: &mut RenderContext) -> Result<(), RenderError> {
        bind_target(ctx)?;
        let lights = ctx.lights.texture();
        if lights.is_valid() {
            ctx.device.bind_texture(texture_units::LIGHTS, lights)?;
        }
        for entity in loaded_cameras(ctx) {
            let Some(camera) = ctx.states.get::<CameraState>(entity) else {
                continue;
            };
            camera.bind(&*ctx.device)?;
            ctx.device.clear(Some(camera.camera().clear_color), None);
            if let Some(clusters) = ctx.clusters.get(entity) {
                clusters.bind(&*ctx.device)?;
            }
            let opaque = draw_groups(ctx, MaterialPass::Color, MaterialGpuState::is_opaque)?;
            let blended = draw_groups(ctx, MaterialPass::Color, |m| !m.is_opaque())?;
            log::trace!("Forward pass of {entity}: {opaque} opaque and {blended} blended draws");
        }
        Ok(())
    }
}

/// Blocks until the GPU has completed the frame.
#[derive(Debug, Default)]
pub struct FinishPass;

impl RenderPass for FinishPass {
    fn name(&self) -> &str {
        "FinishPass"
    }

    fn execute(&mut self, ctx: &mut RenderContext) -> Result<(), RenderError> {
        ctx.device.finish();
        Ok(())
    }
}
