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

use lumen_core::EntityId;
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};

/// Render-thread state paired with simulation entities.
///
/// Holds one map per state type, keyed by the same [`EntityId`] the
/// simulation uses for the logical asset. Nothing here is shared with the
/// simulation thread; mutations publish no events.
#[derive(Default)]
pub struct StateStore {
    maps: HashMap<TypeId, Box<dyn Any + Send>>,
}

impl StateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn map<T: Send + 'static>(&self) -> Option<&BTreeMap<EntityId, T>> {
        self.maps
            .get(&TypeId::of::<T>())
            .and_then(|map| map.downcast_ref::<BTreeMap<EntityId, T>>())
    }

    fn map_mut<T: Send + 'static>(&mut self) -> &mut BTreeMap<EntityId, T> {
        let map = self
            .maps
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(BTreeMap::<EntityId, T>::new()));
        match map.downcast_mut::<BTreeMap<EntityId, T>>() {
            Some(map) => map,
            None => unreachable!("state maps are keyed by their own TypeId"),
        }
    }

    /// Inserts or replaces the state of `entity`, returning the previous one.
    pub fn insert<T: Send + 'static>(&mut self, entity: EntityId, state: T) -> Option<T> {
        self.map_mut::<T>().insert(entity, state)
    }

    /// Returns the state of `entity`.
    pub fn get<T: Send + 'static>(&self, entity: EntityId) -> Option<&T> {
        self.map::<T>().and_then(|map| map.get(&entity))
    }

    /// Returns the state of `entity` mutably.
    pub fn get_mut<T: Send + 'static>(&mut self, entity: EntityId) -> Option<&mut T> {
        self.maps
            .get_mut(&TypeId::of::<T>())
            .and_then(|map| map.downcast_mut::<BTreeMap<EntityId, T>>())
            .and_then(|map| map.get_mut(&entity))
    }

    /// Returns the state of `entity`, creating a default one first if absent.
    pub fn acquire<T: Default + Send + 'static>(&mut self, entity: EntityId) -> &mut T {
        self.map_mut::<T>().entry(entity).or_default()
    }

    /// Removes and returns the state of `entity`.
    pub fn remove<T: Send + 'static>(&mut self, entity: EntityId) -> Option<T> {
        self.maps
            .get_mut(&TypeId::of::<T>())
            .and_then(|map| map.downcast_mut::<BTreeMap<EntityId, T>>())
            .and_then(|map| map.remove(&entity))
    }

    /// Returns `true` if `entity` has a state of type `T`.
    pub fn contains<T: Send + 'static>(&self, entity: EntityId) -> bool {
        self.get::<T>(entity).is_some()
    }

    /// Iterates over the states of type `T` in entity order.
    pub fn iter<T: Send + 'static>(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.map::<T>()
            .into_iter()
            .flat_map(|map| map.iter().map(|(e, s)| (*e, s)))
    }

    /// Iterates mutably over the states of type `T` in entity order.
    pub fn iter_mut<T: Send + 'static>(&mut self) -> impl Iterator<Item = (EntityId, &mut T)> {
        self.maps
            .get_mut(&TypeId::of::<T>())
            .and_then(|map| map.downcast_mut::<BTreeMap<EntityId, T>>())
            .into_iter()
            .flat_map(|map| map.iter_mut().map(|(e, s)| (*e, s)))
    }

    /// The entities owning a state of type `T`.
    pub fn entities<T: Send + 'static>(&self) -> Vec<EntityId> {
        self.iter::<T>().map(|(e, _)| e).collect()
    }

    /// Number of states of type `T`.
    pub fn len<T: Send + 'static>(&self) -> usize {
        self.map::<T>().map_or(0, BTreeMap::len)
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("state_types", &self.maps.len())
            .finish()
    }
}
