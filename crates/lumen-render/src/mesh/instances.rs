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

use lumen_core::asset::AssetId;
use lumen_core::math::Mat4;
use lumen_core::renderer::{
    BufferDescriptor, BufferHandle, BufferTarget, BufferUsage, GraphicsDevice, RenderError,
};
use lumen_core::utils::{DenseSlots, SlotRemoval};
use lumen_core::EntityId;
use std::collections::BTreeMap;
use std::ops::Range;

const MATRIX_SIZE: usize = std::mem::size_of::<Mat4>();

/// Identifies the batch a mesh instance is drawn in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceGroupKey {
    /// The material entity.
    pub material: EntityId,
    /// Content key of the geometry.
    pub mesh_data: AssetId,
}

/// Mesh instances sharing one material and one geometry, drawn with a
/// single instanced call.
#[derive(Debug)]
pub struct InstanceGroup {
    transforms: DenseSlots<EntityId, Mat4>,
    buffer: BufferHandle,
    capacity: usize,
    dirty: Option<Range<usize>>,
}

impl InstanceGroup {
    fn new() -> Self {
        Self {
            transforms: DenseSlots::new(),
            buffer: BufferHandle::NONE,
            capacity: 0,
            dirty: None,
        }
    }

    /// Widens the pending upload to cover slot `index`.
    fn touch(&mut self, index: usize) {
        self.dirty = Some(match self.dirty.take() {
            Some(range) => range.start.min(index)..range.end.max(index + 1),
            None => index..index + 1,
        });
    }

    /// The per-instance world matrices, packed.
    pub fn transforms(&self) -> &[Mat4] {
        self.transforms.values()
    }

    /// The owning mesh entities, index-aligned with [`Self::transforms`].
    pub fn owners(&self) -> &[EntityId] {
        self.transforms.owners()
    }

    /// Number of instances.
    pub fn instance_count(&self) -> usize {
        self.transforms.len()
    }

    /// The instance buffer, [`BufferHandle::NONE`] until first flushed.
    pub fn buffer(&self) -> BufferHandle {
        self.buffer
    }

    /// Writes the slots changed since the last flush. A buffer too small for
    /// the group is recreated and filled whole.
    fn flush(&mut self, device: &dyn GraphicsDevice) -> Result<(), RenderError> {
        let Some(dirty) = self.dirty.take() else {
            return Ok(());
        };
        let result = self.upload(device, dirty.clone());
        if result.is_err() {
            self.dirty = Some(dirty);
        }
        result
    }

    fn upload(&mut self, device: &dyn GraphicsDevice, dirty: Range<usize>) -> Result<(), RenderError> {
        let count = self.transforms.len();
        let range = if count > self.capacity {
            if self.buffer.is_valid() {
                device.destroy_buffer(self.buffer)?;
                self.buffer = BufferHandle::NONE;
                self.capacity = 0;
            }
            let capacity = count.next_power_of_two();
            self.buffer = device.create_buffer(&BufferDescriptor {
                label: Some("Instance transforms".into()),
                target: BufferTarget::Vertex,
                usage: BufferUsage::Dynamic,
                size: (capacity * MATRIX_SIZE) as u64,
            })?;
            self.capacity = capacity;
            0..count
        } else {
            dirty.start.min(count)..dirty.end.min(count)
        };
        if range.is_empty() {
            return Ok(());
        }

        let offset = (range.start * MATRIX_SIZE) as u64;
        let bytes: &[u8] = bytemuck::cast_slice(&self.transforms.values()[range]);
        device.write_buffer(self.buffer, offset, bytes)?;
        Ok(())
    }
}

/// Every instance group, keyed by material and geometry.
#[derive(Debug, Default)]
pub struct InstanceGroups {
    groups: BTreeMap<InstanceGroupKey, InstanceGroup>,
}

impl InstanceGroups {
    /// Creates an empty set of groups.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an instance, creating the group if needed. Returns its slot index.
    pub fn insert(&mut self, key: InstanceGroupKey, owner: EntityId, transform: Mat4) -> usize {
        let group = self.groups.entry(key).or_insert_with(InstanceGroup::new);
        let index = group.transforms.push(owner, transform);
        group.touch(index);
        index
    }

    /// Replaces the transform of the instance at `index`.
    pub fn set_transform(&mut self, key: &InstanceGroupKey, index: usize, transform: Mat4) -> bool {
        let Some(group) = self.groups.get_mut(key) else {
            return false;
        };
        match group.transforms.get_mut(index) {
            Some(slot) => {
                *slot = transform;
                group.touch(index);
                true
            }
            None => false,
        }
    }

    /// Removes the instance at `index`, moving the group's last instance into
    /// its slot. A group left empty is destroyed along with its buffer.
    ///
    /// The caller must update the index stored by the moved owner, if any.
    pub fn remove(
        &mut self,
        device: &dyn GraphicsDevice,
        key: &InstanceGroupKey,
        index: usize,
    ) -> Option<SlotRemoval<EntityId, Mat4>> {
        let group = self.groups.get_mut(key)?;
        let removal = group.transforms.swap_remove(index)?;
        if removal.moved.is_some() {
            group.touch(index);
        }
        if group.transforms.is_empty() {
            if let Some(group) = self.groups.remove(key) {
                if group.buffer.is_valid() {
                    if let Err(e) = device.destroy_buffer(group.buffer) {
                        log::error!("Failed to destroy instance buffer {}: {e}", group.buffer);
                    }
                }
            }
        }
        Some(removal)
    }

    /// Uploads the transforms changed since the last flush. A group that fails
    /// is logged and retried on the next flush. Returns the number of failures.
    pub fn flush(&mut self, device: &dyn GraphicsDevice) -> usize {
        let mut failed = 0;
        for (key, group) in self.groups.iter_mut() {
            if let Err(e) = group.flush(device) {
                log::error!(
                    "Failed to upload instance transforms of material {}: {e}",
                    key.material
                );
                failed += 1;
            }
        }
        failed
    }

    /// The group for `key`.
    pub fn get(&self, key: &InstanceGroupKey) -> Option<&InstanceGroup> {
        self.groups.get(key)
    }

    /// Iterates over the groups in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&InstanceGroupKey, &InstanceGroup)> {
        self.groups.iter()
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Returns `true` if there are no groups.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Destroys every group buffer.
    pub fn release(&mut self, device: &dyn GraphicsDevice) {
        for (_, group) in std::mem::take(&mut self.groups) {
            if group.buffer.is_valid() {
                if let Err(e) = device.destroy_buffer(group.buffer) {
                    log::error!("Failed to destroy instance buffer {}: {e}", group.buffer);
                }
            }
        }
    }
}
