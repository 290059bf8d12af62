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

//! Dense arrays with owner back-references.
//!
//! Both the light library and the mesh instance groups keep their GPU-mirrored
//! data packed without gaps. Removing an entry moves the last element into the
//! freed slot, and the owner of that moved element must learn its new index.
//! [`DenseSlots`] performs the move and reports who moved where.

/// The element that was relocated by a [`DenseSlots::swap_remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovedSlot<K> {
    /// Owner of the relocated element.
    pub owner: K,
    /// The element's new index (the index that was just freed).
    pub index: usize,
}

/// The outcome of a [`DenseSlots::swap_remove`].
#[derive(Debug, Clone, PartialEq)]
pub struct SlotRemoval<K, V> {
    /// Owner of the removed element.
    pub owner: K,
    /// The removed element.
    pub value: V,
    /// The element that filled the hole, if the removed one was not last.
    pub moved: Option<MovedSlot<K>>,
}

/// A gap-free array of values, each tagged with the key of its owner.
#[derive(Debug, Clone)]
pub struct DenseSlots<K, V> {
    owners: Vec<K>,
    values: Vec<V>,
}

impl<K: Copy, V> DenseSlots<K, V> {
    /// Creates an empty array.
    pub fn new() -> Self {
        Self {
            owners: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Appends `value` owned by `owner` and returns its index.
    pub fn push(&mut self, owner: K, value: V) -> usize {
        self.owners.push(owner);
        self.values.push(value);
        self.values.len() - 1
    }

    /// Removes the element at `index`, moving the last element into its place.
    ///
    /// Returns `None` if `index` is out of bounds.
    pub fn swap_remove(&mut self, index: usize) -> Option<SlotRemoval<K, V>> {
        if index >= self.values.len() {
            return None;
        }
        let owner = self.owners.swap_remove(index);
        let value = self.values.swap_remove(index);
        let moved = self.owners.get(index).map(|&owner| MovedSlot { owner, index });
        Some(SlotRemoval {
            owner,
            value,
            moved,
        })
    }

    /// Returns the value at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&V> {
        self.values.get(index)
    }

    /// Returns the value at `index` mutably.
    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut V> {
        self.values.get_mut(index)
    }

    /// Returns the owner of the value at `index`.
    #[inline]
    pub fn owner(&self, index: usize) -> Option<K> {
        self.owners.get(index).copied()
    }

    /// The packed values, in slot order.
    #[inline]
    pub fn values(&self) -> &[V] {
        &self.values
    }

    /// The owners, index-aligned with [`Self::values`].
    #[inline]
    pub fn owners(&self) -> &[K] {
        &self.owners
    }

    /// Number of occupied slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no slot is occupied.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Copy, V> Default for DenseSlots<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn removing_last_moves_nothing() {
        let mut slots = DenseSlots::new();
        slots.push('a', 1);
        slots.push('b', 2);
        let removal = slots.swap_remove(1).unwrap();
        assert_eq!(removal.owner, 'b');
        assert_eq!(removal.value, 2);
        assert!(removal.moved.is_none());
        assert_eq!(slots.values(), &[1]);
    }

    #[test]
    fn removing_middle_reports_moved_owner() {
        let mut slots = DenseSlots::new();
        for (i, owner) in ['a', 'b', 'c', 'd'].into_iter().enumerate() {
            slots.push(owner, i * 10);
        }
        let removal = slots.swap_remove(1).unwrap();
        assert_eq!(removal.value, 10);
        assert_eq!(
            removal.moved,
            Some(MovedSlot {
                owner: 'd',
                index: 1
            })
        );
        assert_eq!(slots.values(), &[0, 30, 20]);
        assert_eq!(slots.owners(), &['a', 'd', 'c']);
    }

    #[test]
    fn out_of_bounds_removal_is_none() {
        let mut slots: DenseSlots<u32, u32> = DenseSlots::new();
        assert!(slots.swap_remove(0).is_none());
    }

    #[test]
    fn back_references_stay_consistent_under_removals() {
        let mut slots = DenseSlots::new();
        let mut index_of: HashMap<u32, usize> = HashMap::new();
        for owner in 0..32u32 {
            let index = slots.push(owner, owner * 2);
            index_of.insert(owner, index);
        }

        for owner in [5u32, 31, 0, 17, 16, 8, 30, 1] {
            let index = index_of.remove(&owner).unwrap();
            let removal = slots.swap_remove(index).unwrap();
            assert_eq!(removal.owner, owner);
            if let Some(moved) = removal.moved {
                index_of.insert(moved.owner, moved.index);
            }
        }

        assert_eq!(slots.len(), 24);
        for (owner, index) in &index_of {
            assert_eq!(slots.owner(*index), Some(*owner));
            assert_eq!(slots.get(*index), Some(&(owner * 2)));
        }
    }
}
