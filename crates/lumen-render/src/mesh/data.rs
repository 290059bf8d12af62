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

use lumen_core::asset::{AssetId, MeshData};
use lumen_core::math::{Aabb, Vec2, Vec3};
use lumen_core::renderer::gpu_types::MeshUniforms;
use lumen_core::renderer::{
    BufferDescriptor, BufferHandle, BufferTarget, BufferUsage, GraphicsDevice, PrimitiveTopology,
    RenderError, VertexChannel,
};
use std::collections::HashMap;
use std::sync::Arc;

/// The GPU buffers of one piece of geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshBuffers {
    /// Attribute buffers indexed by [`VertexChannel`].
    pub vertex_buffers: [Option<BufferHandle>; VertexChannel::COUNT],
    /// Index buffer, for indexed geometry.
    pub index_buffer: Option<BufferHandle>,
    /// Number of indices, or vertices when not indexed.
    pub element_count: u32,
    /// Primitive assembly.
    pub topology: PrimitiveTopology,
    /// Object-space bounds.
    pub bounds: Option<Aabb>,
    /// The `MeshParameters` block holding [`Self::bounds`].
    pub bounds_buffer: BufferHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Slot {
    Channel(VertexChannel),
    Index,
}

/// Keeps a shared source array alive so its address cannot be reused while
/// it keys a buffer.
#[derive(Debug)]
enum SourceArray {
    Vec3(Arc<[Vec3]>),
    Vec2(Arc<[Vec2]>),
    U32(Arc<[u32]>),
}

impl SourceArray {
    fn address(&self) -> usize {
        match self {
            SourceArray::Vec3(a) => Arc::as_ptr(a) as *const u8 as usize,
            SourceArray::Vec2(a) => Arc::as_ptr(a) as *const u8 as usize,
            SourceArray::U32(a) => Arc::as_ptr(a) as *const u8 as usize,
        }
    }

    fn bytes(&self) -> &[u8] {
        match self {
            SourceArray::Vec3(a) => bytemuck::cast_slice(a),
            SourceArray::Vec2(a) => bytemuck::cast_slice(a),
            SourceArray::U32(a) => bytemuck::cast_slice(a),
        }
    }
}

type SubBufferKey = (Slot, usize);

#[derive(Debug)]
struct SubBuffer {
    handle: BufferHandle,
    refcount: usize,
    _source: SourceArray,
}

#[derive(Debug)]
struct Entry {
    buffers: MeshBuffers,
    refcount: usize,
    sub_buffers: Vec<SubBufferKey>,
}

/// Render-side cache of geometry buffers.
///
/// Geometry is keyed by the content key of its [`MeshData`]: every mesh
/// instance using structurally equal geometry shares one entry, counted once
/// per acquisition. Each array of an entry (positions, normals, ...) is
/// uploaded to its own buffer, shared again by array identity, so two
/// different geometries reusing the same `Arc` slice share that buffer.
/// Buffers are destroyed when the last user releases them.
#[derive(Debug, Default)]
pub struct MeshDataLibrary {
    entries: HashMap<AssetId, Entry>,
    sub_buffers: HashMap<SubBufferKey, SubBuffer>,
}

impl MeshDataLibrary {
    /// Creates an empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the buffers of `data`, uploading them on first use.
    pub fn acquire(
        &mut self,
        device: &dyn GraphicsDevice,
        key: AssetId,
        data: &MeshData,
    ) -> Result<&MeshBuffers, RenderError> {
        if !self.entries.contains_key(&key) {
            let entry = self.upload(device, key, data)?;
            self.entries.insert(key, entry);
        }
        match self.entries.get_mut(&key) {
            Some(entry) => {
                entry.refcount += 1;
                Ok(&entry.buffers)
            }
            None => Err(RenderError::Internal(format!("Mesh data {key} vanished"))),
        }
    }

    fn upload(
        &mut self,
        device: &dyn GraphicsDevice,
        key: AssetId,
        data: &MeshData,
    ) -> Result<Entry, RenderError> {
        let mut sources = vec![(
            Slot::Channel(VertexChannel::Position),
            SourceArray::Vec3(data.vertices.clone()),
        )];
        if let Some(normals) = &data.normals {
            sources.push((Slot::Channel(VertexChannel::Normal), SourceArray::Vec3(normals.clone())));
        }
        if let Some(tex_coords) = &data.tex_coords {
            sources.push((
                Slot::Channel(VertexChannel::TexCoord),
                SourceArray::Vec2(tex_coords.clone()),
            ));
        }
        if let Some(tangents) = &data.tangents {
            sources.push((Slot::Channel(VertexChannel::Tangent), SourceArray::Vec3(tangents.clone())));
        }
        if let Some(indices) = &data.indices {
            sources.push((Slot::Index, SourceArray::U32(indices.clone())));
        }

        let bounds = data.bounding_box();
        let bounds_buffer = Self::create_bounds_buffer(device, bounds)?;
        let mut buffers = MeshBuffers {
            vertex_buffers: [None; VertexChannel::COUNT],
            index_buffer: None,
            element_count: data.element_count(),
            topology: data.topology,
            bounds,
            bounds_buffer,
        };
        let mut keys = Vec::with_capacity(sources.len());
        for (slot, source) in sources {
            let sub_key = (slot, source.address());
            let handle = match self.sub_buffers.get_mut(&sub_key) {
                Some(shared) => {
                    shared.refcount += 1;
                    shared.handle
                }
                None => {
                    let handle = match Self::create_sub_buffer(device, slot, &source) {
                        Ok(handle) => handle,
                        Err(e) => {
                            self.release_sub_buffers(device, &keys);
                            Self::destroy_bounds_buffer(device, bounds_buffer);
                            return Err(e);
                        }
                    };
                    self.sub_buffers.insert(
                        sub_key,
                        SubBuffer {
                            handle,
                            refcount: 1,
                            _source: source,
                        },
                    );
                    handle
                }
            };
            keys.push(sub_key);
            match slot {
                Slot::Channel(channel) => buffers.vertex_buffers[channel as usize] = Some(handle),
                Slot::Index => buffers.index_buffer = Some(handle),
            }
        }
        log::debug!(
            "Uploaded mesh data {key}: {} elements in {} buffers",
            buffers.element_count,
            keys.len()
        );
        Ok(Entry {
            buffers,
            refcount: 0,
            sub_buffers: keys,
        })
    }

    fn create_bounds_buffer(
        device: &dyn GraphicsDevice,
        bounds: Option<Aabb>,
    ) -> Result<BufferHandle, RenderError> {
        // Geometry without vertices gets a zeroed box.
        let uniforms =
            bounds.map_or_else(<MeshUniforms as bytemuck::Zeroable>::zeroed, MeshUniforms::from);
        let bytes = bytemuck::bytes_of(&uniforms);
        let descriptor = BufferDescriptor {
            label: Some("Mesh bounds".into()),
            target: BufferTarget::Uniform,
            usage: BufferUsage::Static,
            size: bytes.len() as u64,
        };
        Ok(device.create_buffer_with_data(&descriptor, bytes)?)
    }

    fn destroy_bounds_buffer(device: &dyn GraphicsDevice, buffer: BufferHandle) {
        if let Err(e) = device.destroy_buffer(buffer) {
            log::error!("Failed to destroy mesh bounds buffer {buffer}: {e}");
        }
    }

    fn create_sub_buffer(
        device: &dyn GraphicsDevice,
        slot: Slot,
        source: &SourceArray,
    ) -> Result<BufferHandle, RenderError> {
        let (target, label) = match slot {
            Slot::Channel(channel) => (BufferTarget::Vertex, format!("{channel:?} buffer")),
            Slot::Index => (BufferTarget::Index, "Index buffer".to_owned()),
        };
        let bytes = source.bytes();
        let descriptor = BufferDescriptor {
            label: Some(label.into()),
            target,
            usage: BufferUsage::Static,
            size: bytes.len() as u64,
        };
        Ok(device.create_buffer_with_data(&descriptor, bytes)?)
    }

    fn release_sub_buffers(&mut self, device: &dyn GraphicsDevice, keys: &[SubBufferKey]) {
        for key in keys {
            let Some(shared) = self.sub_buffers.get_mut(key) else {
                continue;
            };
            shared.refcount -= 1;
            if shared.refcount == 0 {
                if let Some(shared) = self.sub_buffers.remove(key) {
                    if let Err(e) = device.destroy_buffer(shared.handle) {
                        log::error!("Failed to destroy mesh buffer {}: {e}", shared.handle);
                    }
                }
            }
        }
    }

    /// Releases one acquisition of `key`. Returns `true` if that was the last
    /// one and the buffers were destroyed; releasing an unknown key is a no-op.
    pub fn release(&mut self, device: &dyn GraphicsDevice, key: AssetId) -> bool {
        let Some(entry) = self.entries.get_mut(&key) else {
            log::warn!("Released unknown mesh data {key}");
            return false;
        };
        entry.refcount = entry.refcount.saturating_sub(1);
        if entry.refcount > 0 {
            return false;
        }
        if let Some(entry) = self.entries.remove(&key) {
            self.release_sub_buffers(device, &entry.sub_buffers);
            Self::destroy_bounds_buffer(device, entry.buffers.bounds_buffer);
            log::debug!("Destroyed mesh data {key}");
        }
        true
    }

    /// The buffers of `key`.
    pub fn get(&self, key: &AssetId) -> Option<&MeshBuffers> {
        self.entries.get(key).map(|e| &e.buffers)
    }

    /// Number of live acquisitions of `key`.
    pub fn refcount(&self, key: &AssetId) -> usize {
        self.entries.get(key).map_or(0, |e| e.refcount)
    }

    /// Number of distinct geometries held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no geometry is held.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of live vertex and index buffers.
    pub fn buffer_count(&self) -> usize {
        self.sub_buffers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_infra::HeadlessDevice;

    fn triangle() -> MeshData {
        MeshData::new(
            PrimitiveTopology::Triangles,
            vec![Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), Vec3::Y],
        )
        .with_indices(vec![0u32, 1, 2])
    }

    #[test]
    fn equal_geometry_shares_one_entry() {
        let device = HeadlessDevice::new();
        let mut library = MeshDataLibrary::new();
        let a = triangle();
        let key = AssetId::of(&a).unwrap();
        assert_eq!(key, AssetId::of(&triangle()).unwrap());

        let first = library.acquire(&device, key, &a).unwrap().clone();
        let second = library.acquire(&device, key, &triangle()).unwrap().clone();
        assert_eq!(first, second);
        assert_eq!(library.refcount(&key), 2);
        assert_eq!(device.stats().buffers, 3);

        assert!(!library.release(&device, key));
        assert!(library.release(&device, key));
        assert_eq!(device.stats().buffers, 0);
        assert!(!library.release(&device, key));
    }

    #[test]
    fn sub_buffers_are_shared_by_array_identity() {
        let device = HeadlessDevice::new();
        let mut library = MeshDataLibrary::new();
        let positions: Arc<[Vec3]> = Arc::from(vec![Vec3::ZERO, Vec3::ONE, Vec3::Y]);
        let lines = MeshData::new(PrimitiveTopology::Lines, positions.clone());
        let points = MeshData::new(PrimitiveTopology::Points, positions);
        let (lines_key, points_key) = (AssetId::of(&lines).unwrap(), AssetId::of(&points).unwrap());
        assert_ne!(lines_key, points_key);

        let a = library.acquire(&device, lines_key, &lines).unwrap().clone();
        let b = library.acquire(&device, points_key, &points).unwrap().clone();
        assert_eq!(a.vertex_buffers[0], b.vertex_buffers[0]);
        assert_eq!(library.buffer_count(), 1);

        library.release(&device, lines_key);
        assert!(device.has_buffer(b.vertex_buffers[0].unwrap()));
        library.release(&device, points_key);
        assert_eq!(device.stats().buffers, 0);
    }

    #[test]
    fn bounds_block_lives_with_the_geometry() {
        let device = HeadlessDevice::new();
        let mut library = MeshDataLibrary::new();
        let data = MeshData::new(
            PrimitiveTopology::Triangles,
            vec![Vec3::new(-1.0, 0.0, 2.0), Vec3::new(3.0, -4.0, 0.5), Vec3::Y],
        );
        let key = AssetId::of(&data).unwrap();
        let buffers = library.acquire(&device, key, &data).unwrap().clone();

        let uniforms: MeshUniforms =
            bytemuck::pod_read_unaligned(&device.buffer_data(buffers.bounds_buffer).unwrap());
        assert_eq!(uniforms.bounds_min, Vec3::new(-1.0, -4.0, 0.0));
        assert_eq!(uniforms.bounds_max, Vec3::new(3.0, 1.0, 2.0));

        library.acquire(&device, key, &data).unwrap();
        assert!(!library.release(&device, key));
        assert!(device.has_buffer(buffers.bounds_buffer));
        assert!(library.release(&device, key));
        assert!(!device.has_buffer(buffers.bounds_buffer));
    }
}
