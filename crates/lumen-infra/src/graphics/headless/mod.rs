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

//! An in-memory [`GraphicsDevice`] that records everything it is asked to do.
//!
//! The headless device keeps buffer contents on the CPU, resolves uniform
//! locations from free-standing `uniform` declarations, fails compilation on
//! `#error` directives and logs every draw with the pipeline state it was
//! issued under. It backs the sandbox and every render test.

mod glsl;

use lumen_core::math::LinearRgba;
use lumen_core::renderer::{
    BufferDescriptor, BufferHandle, BufferTarget, BufferUsage, CullMode, DrawCall,
    FramebufferDescriptor, FramebufferHandle, GraphicsDevice, PixelFormat, ProgramDescriptor,
    ProgramHandle, ResourceError, SamplerState, ShaderError, ShaderStage, TextureDescriptor,
    TextureDimension, TextureHandle,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct BufferEntry {
    target: BufferTarget,
    usage: BufferUsage,
    data: Vec<u8>,
}

/// Where the storage of a texture lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureStorage {
    /// Uploaded pixel data (or allocated storage).
    Image {
        /// Storage shape.
        dimension: TextureDimension,
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
        /// Whether a mip chain was generated.
        mipmaps: bool,
    },
    /// A view over a buffer.
    Buffer(BufferHandle),
}

/// A snapshot of a texture object.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureInfo {
    /// The storage backing the texture.
    pub storage: TextureStorage,
    /// The pixel format.
    pub format: PixelFormat,
    /// The current sampler state.
    pub sampler: SamplerState,
}

#[derive(Debug, Clone)]
struct ProgramEntry {
    label: String,
    stages: Vec<(ShaderStage, String)>,
    uniforms: BTreeMap<String, i32>,
}

/// A draw call together with the state it was issued under.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    /// The draw call as issued.
    pub call: DrawCall,
    /// The framebuffer bound at the time, `None` for the default one.
    pub framebuffer: Option<FramebufferHandle>,
    /// The face culling mode.
    pub cull_mode: CullMode,
    /// Whether color writes were enabled.
    pub color_write: bool,
    /// Buffers bound to uniform block binding points.
    pub uniform_buffers: BTreeMap<u32, BufferHandle>,
    /// Textures bound to texture units.
    pub textures: BTreeMap<u32, TextureHandle>,
}

/// Counters describing the device's live objects and activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeviceStats {
    /// Live buffers.
    pub buffers: usize,
    /// Live textures.
    pub textures: usize,
    /// Live programs.
    pub programs: usize,
    /// Live framebuffers.
    pub framebuffers: usize,
    /// Buffer writes since creation.
    pub buffer_writes: u64,
    /// Bytes written to buffers since creation.
    pub bytes_written: u64,
    /// Draw calls recorded since the last [`HeadlessDevice::take_draws`].
    pub draws: usize,
    /// Completed `finish` calls.
    pub frames_finished: u64,
}

#[derive(Debug, Default)]
struct DeviceState {
    buffers: HashMap<BufferHandle, BufferEntry>,
    textures: HashMap<TextureHandle, TextureInfo>,
    programs: HashMap<ProgramHandle, ProgramEntry>,
    framebuffers: HashMap<FramebufferHandle, FramebufferDescriptor<'static>>,

    uniform_buffers: BTreeMap<u32, BufferHandle>,
    texture_units: BTreeMap<u32, TextureHandle>,
    current_program: Option<ProgramHandle>,
    uniform_values: HashMap<(ProgramHandle, i32), i32>,
    framebuffer: Option<FramebufferHandle>,
    viewport: (u32, u32),
    cull_mode: CullMode,
    color_write: bool,
    clears: u64,

    draws: Vec<DrawRecord>,
    buffer_writes: u64,
    bytes_written: u64,
    frames_finished: u64,
}

/// The headless graphics device.
#[derive(Debug)]
pub struct HeadlessDevice {
    state: Mutex<DeviceState>,
    next_name: AtomicU32,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    /// Creates a device with no objects and color writes enabled.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DeviceState {
                color_write: true,
                ..Default::default()
            }),
            next_name: AtomicU32::new(1),
        }
    }

    fn generate_name(&self) -> u32 {
        self.next_name.fetch_add(1, Ordering::Relaxed)
    }

    fn lock(&self) -> Result<MutexGuard<'_, DeviceState>, ResourceError> {
        self.state
            .lock()
            .map_err(|e| ResourceError::BackendError(format!("Headless device state poisoned: {e}")))
    }

    fn with_state<R: Default>(&self, f: impl FnOnce(&mut DeviceState) -> R) -> R {
        match self.state.lock() {
            Ok(mut state) => f(&mut state),
            Err(e) => {
                log::error!("Headless device state poisoned: {e}");
                R::default()
            }
        }
    }

    // --- Inspection ---

    /// The current contents of a buffer.
    pub fn buffer_data(&self, buffer: BufferHandle) -> Option<Vec<u8>> {
        self.with_state(|s| s.buffers.get(&buffer).map(|b| b.data.clone()))
    }

    /// The target and usage a buffer was created with.
    pub fn buffer_kind(&self, buffer: BufferHandle) -> Option<(BufferTarget, BufferUsage)> {
        self.with_state(|s| s.buffers.get(&buffer).map(|b| (b.target, b.usage)))
    }

    /// Returns `true` if `buffer` names a live buffer.
    pub fn has_buffer(&self, buffer: BufferHandle) -> bool {
        self.with_state(|s| s.buffers.contains_key(&buffer))
    }

    /// A snapshot of a texture object.
    pub fn texture(&self, texture: TextureHandle) -> Option<TextureInfo> {
        self.with_state(|s| s.textures.get(&texture).cloned())
    }

    /// The final stage sources of a program.
    pub fn program_sources(&self, program: ProgramHandle) -> Option<Vec<(ShaderStage, String)>> {
        self.with_state(|s| s.programs.get(&program).map(|p| p.stages.clone()))
    }

    /// The debug label of a program.
    pub fn program_label(&self, program: ProgramHandle) -> Option<String> {
        self.with_state(|s| s.programs.get(&program).map(|p| p.label.clone()))
    }

    /// The buffer currently bound to a uniform block binding point.
    pub fn uniform_buffer_binding(&self, binding: u32) -> Option<BufferHandle> {
        self.with_state(|s| s.uniform_buffers.get(&binding).copied())
    }

    /// The texture currently bound to a unit.
    pub fn bound_texture(&self, unit: u32) -> Option<TextureHandle> {
        self.with_state(|s| s.texture_units.get(&unit).copied())
    }

    /// The last integer value set for a uniform location of a program.
    pub fn uniform_value(&self, program: ProgramHandle, location: i32) -> Option<i32> {
        self.with_state(|s| s.uniform_values.get(&(program, location)).copied())
    }

    /// The current viewport size.
    pub fn viewport(&self) -> (u32, u32) {
        self.with_state(|s| s.viewport)
    }

    /// Number of clears issued.
    pub fn clear_count(&self) -> u64 {
        self.with_state(|s| s.clears)
    }

    /// The draws recorded so far.
    pub fn draws(&self) -> Vec<DrawRecord> {
        self.with_state(|s| s.draws.clone())
    }

    /// Takes the draws recorded so far, leaving the log empty.
    pub fn take_draws(&self) -> Vec<DrawRecord> {
        self.with_state(|s| std::mem::take(&mut s.draws))
    }

    /// Object counts and activity counters.
    pub fn stats(&self) -> DeviceStats {
        self.with_state(|s| DeviceStats {
            buffers: s.buffers.len(),
            textures: s.textures.len(),
            programs: s.programs.len(),
            framebuffers: s.framebuffers.len(),
            buffer_writes: s.buffer_writes,
            bytes_written: s.bytes_written,
            draws: s.draws.len(),
            frames_finished: s.frames_finished,
        })
    }
}

fn check_range(offset: u64, len: usize, size: usize) -> Result<std::ops::Range<usize>, ResourceError> {
    let len = len as u64;
    let out_of_bounds = ResourceError::OutOfBounds {
        offset,
        len,
        size: size as u64,
    };
    let end = offset.checked_add(len).ok_or(out_of_bounds.clone())?;
    if end > size as u64 {
        return Err(out_of_bounds);
    }
    Ok(offset as usize..end as usize)
}

impl GraphicsDevice for HeadlessDevice {
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferHandle, ResourceError> {
        let size = usize::try_from(descriptor.size)
            .map_err(|_| ResourceError::InvalidData(format!("Buffer size {} too large", descriptor.size)))?;
        let handle = BufferHandle(self.generate_name());
        self.lock()?.buffers.insert(
            handle,
            BufferEntry {
                target: descriptor.target,
                usage: descriptor.usage,
                data: vec![0; size],
            },
        );
        log::trace!(
            "HeadlessDevice: Created buffer '{}' ({handle}), {size} bytes",
            descriptor.label.as_deref().unwrap_or_default()
        );
        Ok(handle)
    }

    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferHandle, ResourceError> {
        let handle = BufferHandle(self.generate_name());
        let mut state = self.lock()?;
        state.buffers.insert(
            handle,
            BufferEntry {
                target: descriptor.target,
                usage: descriptor.usage,
                data: data.to_vec(),
            },
        );
        state.buffer_writes += 1;
        state.bytes_written += data.len() as u64;
        log::trace!(
            "HeadlessDevice: Created buffer '{}' ({handle}) with {} bytes",
            descriptor.label.as_deref().unwrap_or_default(),
            data.len()
        );
        Ok(handle)
    }

    fn write_buffer(
        &self,
        buffer: BufferHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        let mut state = self.lock()?;
        let entry = state
            .buffers
            .get_mut(&buffer)
            .ok_or(ResourceError::InvalidHandle)?;
        let range = check_range(offset, data.len(), entry.data.len())?;
        entry.data[range].copy_from_slice(data);
        state.buffer_writes += 1;
        state.bytes_written += data.len() as u64;
        Ok(())
    }

    fn destroy_buffer(&self, buffer: BufferHandle) -> Result<(), ResourceError> {
        let mut state = self.lock()?;
        state
            .buffers
            .remove(&buffer)
            .ok_or(ResourceError::InvalidHandle)?;
        state.uniform_buffers.retain(|_, bound| *bound != buffer);
        Ok(())
    }

    fn bind_uniform_buffer(&self, binding: u32, buffer: BufferHandle) -> Result<(), ResourceError> {
        let mut state = self.lock()?;
        if !state.buffers.contains_key(&buffer) {
            return Err(ResourceError::InvalidHandle);
        }
        state.uniform_buffers.insert(binding, buffer);
        Ok(())
    }

    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
    ) -> Result<TextureHandle, ResourceError> {
        if descriptor.format == PixelFormat::Depth24Stencil8 && descriptor.data.is_some() {
            return Err(ResourceError::UnsupportedFormat(descriptor.format));
        }
        match descriptor.dimension {
            TextureDimension::D2Array { layers: 0 } => {
                return Err(ResourceError::InvalidData("Texture array has no layers".into()));
            }
            TextureDimension::Cube if descriptor.width != descriptor.height => {
                return Err(ResourceError::InvalidData(format!(
                    "Cube map faces must be square, got {}x{}",
                    descriptor.width, descriptor.height
                )));
            }
            _ => {}
        }
        if let Some(data) = descriptor.data {
            let expected = descriptor.width as usize
                * descriptor.height as usize
                * descriptor.dimension.layers() as usize
                * descriptor.format.bytes_per_pixel();
            if data.len() != expected {
                return Err(ResourceError::InvalidData(format!(
                    "Texture data is {} bytes, expected {expected}",
                    data.len()
                )));
            }
        }
        let handle = TextureHandle(self.generate_name());
        self.lock()?.textures.insert(
            handle,
            TextureInfo {
                storage: TextureStorage::Image {
                    dimension: descriptor.dimension,
                    width: descriptor.width,
                    height: descriptor.height,
                    mipmaps: descriptor.mipmaps,
                },
                format: descriptor.format,
                sampler: descriptor.sampler,
            },
        );
        log::trace!(
            "HeadlessDevice: Created {:?} texture '{}' ({handle}) {}x{}",
            descriptor.dimension,
            descriptor.label.as_deref().unwrap_or_default(),
            descriptor.width,
            descriptor.height
        );
        Ok(handle)
    }

    fn create_texture_buffer(
        &self,
        buffer: BufferHandle,
        format: PixelFormat,
    ) -> Result<TextureHandle, ResourceError> {
        let mut state = self.lock()?;
        if !state.buffers.contains_key(&buffer) {
            return Err(ResourceError::InvalidHandle);
        }
        let handle = TextureHandle(self.generate_name());
        state.textures.insert(
            handle,
            TextureInfo {
                storage: TextureStorage::Buffer(buffer),
                format,
                sampler: SamplerState::default(),
            },
        );
        Ok(handle)
    }

    fn set_sampler_state(
        &self,
        texture: TextureHandle,
        sampler: &SamplerState,
    ) -> Result<(), ResourceError> {
        let mut state = self.lock()?;
        let entry = state
            .textures
            .get_mut(&texture)
            .ok_or(ResourceError::InvalidHandle)?;
        entry.sampler = *sampler;
        Ok(())
    }

    fn destroy_texture(&self, texture: TextureHandle) -> Result<(), ResourceError> {
        let mut state = self.lock()?;
        state
            .textures
            .remove(&texture)
            .ok_or(ResourceError::InvalidHandle)?;
        state.texture_units.retain(|_, bound| *bound != texture);
        Ok(())
    }

    fn bind_texture(&self, unit: u32, texture: TextureHandle) -> Result<(), ResourceError> {
        let mut state = self.lock()?;
        if !state.textures.contains_key(&texture) {
            return Err(ResourceError::InvalidHandle);
        }
        state.texture_units.insert(unit, texture);
        Ok(())
    }

    fn create_program(
        &self,
        descriptor: &ProgramDescriptor,
    ) -> Result<ProgramHandle, ResourceError> {
        let label = descriptor.label.as_deref().unwrap_or("unnamed").to_owned();
        if descriptor.stages.is_empty() {
            return Err(ShaderError::MissingStages { label }.into());
        }
        for (stage, source) in descriptor.stages {
            if let Some(message) = glsl::find_error_directive(source) {
                return Err(ShaderError::CompilationFailed {
                    label,
                    details: format!("{stage:?} stage: {message}"),
                }
                .into());
            }
        }
        let has_vertex = descriptor
            .stages
            .iter()
            .any(|(stage, _)| matches!(stage, ShaderStage::Vertex | ShaderStage::Compute));
        if !has_vertex {
            return Err(ShaderError::LinkFailed {
                label,
                details: "no vertex or compute stage".to_owned(),
            }
            .into());
        }

        let mut uniforms = BTreeMap::new();
        for (_, source) in descriptor.stages {
            for name in glsl::scan_uniforms(source) {
                let next = uniforms.len() as i32;
                uniforms.entry(name).or_insert(next);
            }
        }

        let handle = ProgramHandle(self.generate_name());
        log::trace!(
            "HeadlessDevice: Linked program '{label}' ({handle}) with {} uniforms",
            uniforms.len()
        );
        self.lock()?.programs.insert(
            handle,
            ProgramEntry {
                label,
                stages: descriptor.stages.to_vec(),
                uniforms,
            },
        );
        Ok(handle)
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<i32> {
        self.with_state(|s| {
            s.programs
                .get(&program)
                .and_then(|p| p.uniforms.get(name).copied())
        })
    }

    fn destroy_program(&self, program: ProgramHandle) -> Result<(), ResourceError> {
        let mut state = self.lock()?;
        state
            .programs
            .remove(&program)
            .ok_or(ResourceError::InvalidHandle)?;
        if state.current_program == Some(program) {
            state.current_program = None;
        }
        state.uniform_values.retain(|(p, _), _| *p != program);
        Ok(())
    }

    fn use_program(&self, program: ProgramHandle) -> Result<(), ResourceError> {
        let mut state = self.lock()?;
        if !state.programs.contains_key(&program) {
            return Err(ResourceError::InvalidHandle);
        }
        state.current_program = Some(program);
        Ok(())
    }

    fn set_uniform_i32(&self, location: i32, value: i32) -> Result<(), ResourceError> {
        let mut state = self.lock()?;
        let program = state.current_program.ok_or_else(|| {
            ResourceError::BackendError("No program in use while setting a uniform".to_owned())
        })?;
        state.uniform_values.insert((program, location), value);
        Ok(())
    }

    fn create_framebuffer(
        &self,
        descriptor: &FramebufferDescriptor,
    ) -> Result<FramebufferHandle, ResourceError> {
        let mut state = self.lock()?;
        let attachments = descriptor
            .color_attachments
            .iter()
            .chain(descriptor.depth_attachment.iter());
        for texture in attachments {
            if !state.textures.contains_key(texture) {
                return Err(ResourceError::InvalidHandle);
            }
        }
        let handle = FramebufferHandle(self.generate_name());
        state.framebuffers.insert(
            handle,
            FramebufferDescriptor {
                label: descriptor.label.clone().map(|l| l.into_owned().into()),
                color_attachments: descriptor.color_attachments.clone(),
                depth_attachment: descriptor.depth_attachment,
            },
        );
        Ok(handle)
    }

    fn destroy_framebuffer(&self, framebuffer: FramebufferHandle) -> Result<(), ResourceError> {
        let mut state = self.lock()?;
        state
            .framebuffers
            .remove(&framebuffer)
            .ok_or(ResourceError::InvalidHandle)?;
        if state.framebuffer == Some(framebuffer) {
            state.framebuffer = None;
        }
        Ok(())
    }

    fn bind_framebuffer(
        &self,
        framebuffer: Option<FramebufferHandle>,
    ) -> Result<(), ResourceError> {
        let mut state = self.lock()?;
        if let Some(handle) = framebuffer {
            if !state.framebuffers.contains_key(&handle) {
                return Err(ResourceError::InvalidHandle);
            }
        }
        state.framebuffer = framebuffer;
        Ok(())
    }

    fn set_viewport(&self, width: u32, height: u32) {
        self.with_state(|s| s.viewport = (width, height));
    }

    fn set_cull_mode(&self, mode: CullMode) {
        self.with_state(|s| s.cull_mode = mode);
    }

    fn set_color_write(&self, enabled: bool) {
        self.with_state(|s| s.color_write = enabled);
    }

    fn clear(&self, _color: Option<LinearRgba>, _depth: Option<f32>) {
        self.with_state(|s| s.clears += 1);
    }

    fn draw(&self, call: &DrawCall) -> Result<(), ResourceError> {
        let mut state = self.lock()?;
        if !state.programs.contains_key(&call.program) {
            return Err(ResourceError::InvalidHandle);
        }
        let referenced = call
            .vertex_buffers
            .iter()
            .flatten()
            .chain(call.index_buffer.iter())
            .chain(std::iter::once(&call.instance_buffer));
        for buffer in referenced {
            if !state.buffers.contains_key(buffer) {
                return Err(ResourceError::InvalidHandle);
            }
        }
        let record = DrawRecord {
            call: call.clone(),
            framebuffer: state.framebuffer,
            cull_mode: state.cull_mode,
            color_write: state.color_write,
            uniform_buffers: state.uniform_buffers.clone(),
            textures: state.texture_units.clone(),
        };
        state.draws.push(record);
        Ok(())
    }

    fn finish(&self) {
        self.with_state(|s| s.frames_finished += 1);
    }
}
