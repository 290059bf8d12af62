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

use super::descriptors::{
    BufferDescriptor, CullMode, DrawCall, FramebufferDescriptor, PixelFormat, ProgramDescriptor,
    SamplerState, TextureDescriptor,
};
use super::error::ResourceError;
use super::handles::{BufferHandle, FramebufferHandle, ProgramHandle, TextureHandle};
use crate::math::LinearRgba;
use std::fmt::Debug;

/// The graphics backend used by the render thread.
///
/// Every method is called from the render thread only. Implementations may
/// rely on thread affinity (an OpenGL context is current on exactly one
/// thread), which is why the trait does not require `Send` or `Sync`.
/// Methods take `&self`; backends keep their bookkeeping behind interior
/// mutability so the device can be shared with render passes.
pub trait GraphicsDevice: Debug {
    // --- Buffers ---

    /// Creates an uninitialized buffer.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferHandle, ResourceError>;

    /// Creates a buffer sized to `data` and uploads it.
    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferHandle, ResourceError>;

    /// Writes `data` into a buffer at `offset` bytes.
    ///
    /// # Errors
    /// * `ResourceError::OutOfBounds` if the range exceeds the buffer size.
    fn write_buffer(&self, buffer: BufferHandle, offset: u64, data: &[u8])
        -> Result<(), ResourceError>;

    /// Destroys a buffer.
    fn destroy_buffer(&self, buffer: BufferHandle) -> Result<(), ResourceError>;

    /// Binds a buffer to an indexed uniform block binding point.
    fn bind_uniform_buffer(&self, binding: u32, buffer: BufferHandle) -> Result<(), ResourceError>;

    // --- Textures ---

    /// Creates a 2D, array or cube texture and uploads its initial data.
    fn create_texture(&self, descriptor: &TextureDescriptor)
        -> Result<TextureHandle, ResourceError>;

    /// Creates a texture view over a buffer (a texture buffer object).
    fn create_texture_buffer(
        &self,
        buffer: BufferHandle,
        format: PixelFormat,
    ) -> Result<TextureHandle, ResourceError>;

    /// Replaces the sampler state of a texture without touching its storage.
    fn set_sampler_state(
        &self,
        texture: TextureHandle,
        sampler: &SamplerState,
    ) -> Result<(), ResourceError>;

    /// Destroys a texture.
    fn destroy_texture(&self, texture: TextureHandle) -> Result<(), ResourceError>;

    /// Binds a texture to a texture unit.
    fn bind_texture(&self, unit: u32, texture: TextureHandle) -> Result<(), ResourceError>;

    // --- Programs ---

    /// Compiles and links a program.
    ///
    /// # Errors
    /// * `ResourceError::Shader` carrying the compiler or linker log.
    fn create_program(&self, descriptor: &ProgramDescriptor)
        -> Result<ProgramHandle, ResourceError>;

    /// Queries the location of a uniform, `None` if the linker removed it.
    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<i32>;

    /// Destroys a program.
    fn destroy_program(&self, program: ProgramHandle) -> Result<(), ResourceError>;

    /// Makes a program current.
    fn use_program(&self, program: ProgramHandle) -> Result<(), ResourceError>;

    /// Sets an integer uniform of the current program (sampler units use this).
    fn set_uniform_i32(&self, location: i32, value: i32) -> Result<(), ResourceError>;

    // --- Framebuffers and state ---

    /// Creates a framebuffer from existing textures.
    fn create_framebuffer(
        &self,
        descriptor: &FramebufferDescriptor,
    ) -> Result<FramebufferHandle, ResourceError>;

    /// Destroys a framebuffer.
    fn destroy_framebuffer(&self, framebuffer: FramebufferHandle) -> Result<(), ResourceError>;

    /// Binds a framebuffer, or the default one for `None`.
    fn bind_framebuffer(&self, framebuffer: Option<FramebufferHandle>)
        -> Result<(), ResourceError>;

    /// Sets the viewport size in pixels.
    fn set_viewport(&self, width: u32, height: u32);

    /// Sets the face culling mode.
    fn set_cull_mode(&self, mode: CullMode);

    /// Enables or disables color writes (disabled during depth-only passes).
    fn set_color_write(&self, enabled: bool);

    /// Clears the bound framebuffer.
    fn clear(&self, color: Option<LinearRgba>, depth: Option<f32>);

    /// Issues an instanced draw.
    fn draw(&self, call: &DrawCall) -> Result<(), ResourceError>;

    /// Blocks until every previously issued command has completed.
    fn finish(&self);
}
