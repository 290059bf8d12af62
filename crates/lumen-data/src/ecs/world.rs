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

//! The simulation-side component store.

use lumen_core::{EntityId, EventBus};
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};

/// Any value that can be stored as a component.
pub trait Component: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Component for T {}

/// A mutation of a component of type `T`.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentEvent<T> {
    /// A value was inserted or replaced.
    Set {
        /// The entity owning the component.
        entity: EntityId,
        /// The new value.
        value: T,
        /// The replaced value, if any.
        previous: Option<T>,
    },
    /// A value was removed, either explicitly or by despawning its entity.
    Removed {
        /// The entity that owned the component.
        entity: EntityId,
        /// The removed value.
        value: T,
    },
}

struct ComponentStore<T: Component> {
    components: BTreeMap<EntityId, T>,
    events: EventBus<ComponentEvent<T>>,
}

impl<T: Component> ComponentStore<T> {
    fn new() -> Self {
        Self {
            components: BTreeMap::new(),
            events: EventBus::new(),
        }
    }
}

trait ErasedStore: Send + Sync {
    fn remove_entity(&mut self, entity: EntityId);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ErasedStore for ComponentStore<T> {
    fn remove_entity(&mut self, entity: EntityId) {
        if let Some(value) = self.components.remove(&entity) {
            self.events.publish(ComponentEvent::Removed { entity, value });
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A minimal entity-component world.
///
/// Every mutation through [`World::insert`], [`World::remove`] and
/// [`World::despawn`] publishes a [`ComponentEvent`] on the component type's
/// bus, which systems consume with [`World::drain_events`].
#[derive(Default)]
pub struct World {
    generations: Vec<u32>,
    alive: Vec<bool>,
    free: Vec<u32>,
    stores: HashMap<TypeId, Box<dyn ErasedStore>>,
}

impl World {
    /// Creates an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a new entity, recycling despawned slots.
    pub fn spawn(&mut self) -> EntityId {
        if let Some(index) = self.free.pop() {
            let slot = index as usize;
            self.alive[slot] = true;
            return EntityId::new(index, self.generations[slot]);
        }
        let index = u32::try_from(self.generations.len()).unwrap_or(u32::MAX);
        self.generations.push(0);
        self.alive.push(true);
        EntityId::new(index, 0)
    }

    /// Returns `true` if `entity` has been spawned and not despawned.
    pub fn is_alive(&self, entity: EntityId) -> bool {
        let slot = entity.index as usize;
        self.alive.get(slot).copied().unwrap_or(false) && self.generations[slot] == entity.generation
    }

    /// Despawns an entity, removing (and announcing the removal of) all of
    /// its components. Returns `false` if the entity was not alive.
    pub fn despawn(&mut self, entity: EntityId) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        for store in self.stores.values_mut() {
            store.remove_entity(entity);
        }
        let slot = entity.index as usize;
        self.alive[slot] = false;
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        self.free.push(entity.index);
        true
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.alive.iter().filter(|alive| **alive).count()
    }

    fn store<T: Component>(&self) -> Option<&ComponentStore<T>> {
        self.stores
            .get(&TypeId::of::<T>())
            .and_then(|store| store.as_any().downcast_ref::<ComponentStore<T>>())
    }

    fn store_mut<T: Component>(&mut self) -> &mut ComponentStore<T> {
        let store = self
            .stores
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(ComponentStore::<T>::new()));
        match store.as_any_mut().downcast_mut::<ComponentStore<T>>() {
            Some(store) => store,
            None => unreachable!("component stores are keyed by their own TypeId"),
        }
    }

    /// Inserts or replaces a component, returning the previous value.
    ///
    /// Inserting on a dead entity is ignored with a warning.
    pub fn insert<T: Component>(&mut self, entity: EntityId, value: T) -> Option<T> {
        if !self.is_alive(entity) {
            log::warn!(
                "Ignoring insert of {} on dead entity {entity}",
                std::any::type_name::<T>()
            );
            return None;
        }
        let store = self.store_mut::<T>();
        let previous = store.components.insert(entity, value.clone());
        store.events.publish(ComponentEvent::Set {
            entity,
            value,
            previous: previous.clone(),
        });
        previous
    }

    /// Returns the component of `entity`, inserting `T::default()` first if
    /// it has none.
    pub fn acquire<T: Component + Default>(&mut self, entity: EntityId) -> Option<&T> {
        if !self.contains::<T>(entity) {
            self.insert(entity, T::default());
        }
        self.get::<T>(entity)
    }

    /// Returns the component of `entity`.
    pub fn get<T: Component>(&self, entity: EntityId) -> Option<&T> {
        self.store::<T>()
            .and_then(|store| store.components.get(&entity))
    }

    /// Returns `true` if `entity` has a component of type `T`.
    pub fn contains<T: Component>(&self, entity: EntityId) -> bool {
        self.get::<T>(entity).is_some()
    }

    /// Removes and returns the component of `entity`.
    pub fn remove<T: Component>(&mut self, entity: EntityId) -> Option<T> {
        let store = self.store_mut::<T>();
        let value = store.components.remove(&entity)?;
        store.events.publish(ComponentEvent::Removed {
            entity,
            value: value.clone(),
        });
        Some(value)
    }

    /// Iterates over every component of type `T` in entity order.
    pub fn iter<T: Component>(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.store::<T>()
            .into_iter()
            .flat_map(|store| store.components.iter().map(|(e, v)| (*e, v)))
    }

    /// Takes every pending change event of type `T` in publication order.
    pub fn drain_events<T: Component>(&self) -> Vec<ComponentEvent<T>> {
        self.store::<T>()
            .map(|store| store.events.drain())
            .unwrap_or_default()
    }

    /// Returns `true` if components of type `T` have undrained events.
    pub fn has_pending_events<T: Component>(&self) -> bool {
        self.store::<T>()
            .is_some_and(|store| store.events.pending() > 0)
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.entity_count())
            .field("component_types", &self.stores.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Name(&'static str);

    #[derive(Debug, Clone, PartialEq)]
    struct Range(f32);

    #[test]
    fn spawn_recycles_with_new_generation() {
        let mut world = World::new();
        let a = world.spawn();
        assert!(world.despawn(a));
        assert!(!world.despawn(a));
        let b = world.spawn();
        assert_eq!(b.index, a.index);
        assert_ne!(b.generation, a.generation);
        assert!(!world.is_alive(a));
        assert!(world.is_alive(b));
    }

    #[test]
    fn insert_publishes_set_with_previous() {
        let mut world = World::new();
        let e = world.spawn();
        world.insert(e, Name("first"));
        world.insert(e, Name("second"));

        let events = world.drain_events::<Name>();
        assert_eq!(
            events,
            vec![
                ComponentEvent::Set {
                    entity: e,
                    value: Name("first"),
                    previous: None
                },
                ComponentEvent::Set {
                    entity: e,
                    value: Name("second"),
                    previous: Some(Name("first"))
                },
            ]
        );
        assert!(world.drain_events::<Name>().is_empty());
    }

    #[test]
    fn despawn_announces_removal_of_every_component() {
        let mut world = World::new();
        let e = world.spawn();
        world.insert(e, Name("light"));
        world.insert(e, Range(4.0));
        world.drain_events::<Name>();
        world.drain_events::<Range>();

        world.despawn(e);
        assert_eq!(
            world.drain_events::<Range>(),
            vec![ComponentEvent::Removed {
                entity: e,
                value: Range(4.0)
            }]
        );
        assert_eq!(world.drain_events::<Name>().len(), 1);
        assert!(world.get::<Name>(e).is_none());
    }

    #[test]
    fn acquire_inserts_default_once() {
        let mut world = World::new();
        let e = world.spawn();
        assert_eq!(world.acquire::<Name>(e), Some(&Name("")));
        world.acquire::<Name>(e);
        assert_eq!(world.drain_events::<Name>().len(), 1);
    }

    #[test]
    fn inserting_on_dead_entity_is_ignored() {
        let mut world = World::new();
        let e = world.spawn();
        world.despawn(e);
        assert!(world.insert(e, Range(1.0)).is_none());
        assert!(world.get::<Range>(e).is_none());
        assert!(!world.has_pending_events::<Range>());
    }

    #[test]
    fn iter_is_ordered_by_entity() {
        let mut world = World::new();
        let a = world.spawn();
        let b = world.spawn();
        world.insert(b, Range(2.0));
        world.insert(a, Range(1.0));
        let ranges: Vec<_> = world.iter::<Range>().map(|(e, r)| (e, r.0)).collect();
        assert_eq!(ranges, vec![(a, 1.0), (b, 2.0)]);
    }
}
