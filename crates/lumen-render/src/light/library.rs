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

use lumen_core::renderer::gpu_types::LightParameters;
use lumen_core::renderer::{
    BufferDescriptor, BufferHandle, BufferTarget, BufferUsage, GraphicsDevice, PixelFormat,
    RenderError, TextureHandle,
};
use lumen_core::utils::{DenseSlots, SlotRemoval};
use lumen_core::EntityId;

/// The dense array of active lights and its GPU mirror.
///
/// Every light occupies one slot; slots stay packed on removal (the last
/// light moves into the hole and its owner must be told its new index). The
/// array is mirrored into a texel buffer sampled by the shading passes.
#[derive(Debug, Default)]
pub struct LightLibrary {
    slots: DenseSlots<EntityId, LightParameters>,
    buffer: BufferHandle,
    texture: TextureHandle,
    capacity: usize,
    dirty: bool,
}

impl LightLibrary {
    /// Creates an empty library. GPU objects are created on first flush.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a light and returns its slot index.
    pub fn add(&mut self, owner: EntityId, parameters: LightParameters) -> usize {
        self.dirty = true;
        self.slots.push(owner, parameters)
    }

    /// Replaces the parameters at `index`.
    pub fn update(&mut self, index: usize, parameters: LightParameters) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) => {
                *slot = parameters;
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Removes the light at `index`, moving the last light into its slot.
    pub fn remove(&mut self, index: usize) -> Option<SlotRemoval<EntityId, LightParameters>> {
        let removal = self.slots.swap_remove(index)?;
        self.dirty = true;
        Some(removal)
    }

    /// The parameters at `index`.
    pub fn get(&self, index: usize) -> Option<&LightParameters> {
        self.slots.get(index)
    }

    /// The owner of the light at `index`.
    pub fn owner(&self, index: usize) -> Option<EntityId> {
        self.slots.owner(index)
    }

    /// The packed parameters, in slot order.
    pub fn parameters(&self) -> &[LightParameters] {
        self.slots.values()
    }

    /// The owners, index-aligned with [`Self::parameters`].
    pub fn owners(&self) -> &[EntityId] {
        self.slots.owners()
    }

    /// Number of lights.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if there are no lights.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The texel buffer view of the light array.
    pub fn texture(&self) -> TextureHandle {
        self.texture
    }

    /// The buffer backing [`Self::texture`].
    pub fn buffer(&self) -> BufferHandle {
        self.buffer
    }

    /// Uploads the array if it changed since the last flush, growing the
    /// buffer when needed.
    pub fn flush(&mut self, device: &dyn GraphicsDevice) -> Result<(), RenderError> {
        if !self.dirty && self.buffer.is_valid() {
            return Ok(());
        }
        let required = self.slots.len().max(1);
        if required > self.capacity {
            self.release(device);
            let capacity = required.next_power_of_two();
            self.buffer = device.create_buffer(&BufferDescriptor {
                label: Some("Light parameters".into()),
                target: BufferTarget::Texel,
                usage: BufferUsage::Dynamic,
                size: (capacity * std::mem::size_of::<LightParameters>()) as u64,
            })?;
            self.texture = device.create_texture_buffer(self.buffer, PixelFormat::Rgba32Float)?;
            self.capacity = capacity;
            log::debug!("Light library buffer grown to {capacity} lights");
        }
        if !self.slots.is_empty() {
            device.write_buffer(self.buffer, 0, bytemuck::cast_slice(self.slots.values()))?;
        }
        self.dirty = false;
        Ok(())
    }

    /// Destroys the GPU mirror. The next flush recreates it.
    pub fn release(&mut self, device: &dyn GraphicsDevice) {
        if self.texture.is_valid() {
            if let Err(e) = device.destroy_texture(self.texture) {
                log::error!("Failed to destroy light texture {}: {e}", self.texture);
            }
        }
        if self.buffer.is_valid() {
            if let Err(e) = device.destroy_buffer(self.buffer) {
                log::error!("Failed to destroy light buffer {}: {e}", self.buffer);
            }
        }
        self.texture = TextureHandle::NONE;
        self.buffer = BufferHandle::NONE;
        self.capacity = 0;
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::asset::Light3D;
    use lumen_core::math::{LinearRgba, Mat4, Vec3};
    use lumen_infra::HeadlessDevice;

    fn light_at(x: f32) -> LightParameters {
        Light3D::point(LinearRgba::WHITE, 1.0, 2.0)
            .parameters(&Mat4::from_translation(Vec3::new(x, 0.0, 0.0)))
    }

    #[test]
    fn flush_mirrors_the_dense_array() {
        let device = HeadlessDevice::new();
        let mut library = LightLibrary::new();
        for i in 0..3 {
            library.add(EntityId::new(i, 0), light_at(i as f32));
        }
        library.flush(&device).unwrap();
        library.remove(0).unwrap();
        library.flush(&device).unwrap();

        let data = device.buffer_data(library.buffer()).unwrap();
        let expected: &[u8] = bytemuck::cast_slice(library.parameters());
        assert_eq!(&data[..expected.len()], expected);
        assert_eq!(library.get(0).unwrap().position.x, 2.0);
        assert_eq!(library.owner(0), Some(EntityId::new(2, 0)));
    }

    #[test]
    fn growing_recreates_the_texture_view() {
        let device = HeadlessDevice::new();
        let mut library = LightLibrary::new();
        library.flush(&device).unwrap();
        let first = library.texture();
        assert!(first.is_valid());

        for i in 0..5 {
            library.add(EntityId::new(i, 0), light_at(0.0));
        }
        library.flush(&device).unwrap();
        assert_ne!(library.texture(), first);
        assert!(device.texture(first).is_none());
        assert_eq!(device.stats().textures, 1);
    }
}
