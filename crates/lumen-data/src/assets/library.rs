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

use super::ReferenceGraph;
use crate::ecs::World;
use lumen_core::asset::{Asset, AssetError, AssetId};
use lumen_core::EntityId;
use std::collections::HashMap;
use std::sync::Arc;

/// Deduplicates shareable assets by content key.
///
/// Acquiring a record that is structurally equal to one already held returns
/// the existing entity. Library-owned entities are evicted once nothing
/// refers to them anymore.
#[derive(Debug, Default)]
pub struct AssetLibrary {
    entities: HashMap<AssetId, EntityId>,
    keys: HashMap<EntityId, AssetId>,
}

impl AssetLibrary {
    /// Creates an empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entity holding `asset`'s content, spawning one on first use.
    ///
    /// A new entity gets the asset as its `Arc<A>` component and is registered
    /// in `graph`.
    ///
    /// # Errors
    /// * [`AssetError::Encoding`] if the content key cannot be computed.
    pub fn acquire<A: Asset>(
        &mut self,
        world: &mut World,
        graph: &mut ReferenceGraph,
        asset: Arc<A>,
    ) -> Result<EntityId, AssetError> {
        let key = AssetId::of(asset.as_ref())?;
        if let Some(&entity) = self.entities.get(&key) {
            return Ok(entity);
        }

        let entity = world.spawn();
        graph.register(entity);
        world.insert(entity, asset);
        self.entities.insert(key, entity);
        self.keys.insert(entity, key);
        log::trace!("Library spawned {:?} asset {entity} ({key})", A::KIND);
        Ok(entity)
    }

    /// Despawns a library-owned entity, announcing the removal of its
    /// components. Its graph node stays until its manager tears it down.
    ///
    /// Returns `false` if `entity` is not owned by the library.
    pub fn evict(&mut self, world: &mut World, entity: EntityId) -> bool {
        let Some(key) = self.keys.remove(&entity) else {
            return false;
        };
        self.entities.remove(&key);
        world.despawn(entity);
        log::trace!("Library evicted asset {entity} ({key})");
        true
    }

    /// The entity holding the content `key`.
    pub fn get(&self, key: &AssetId) -> Option<EntityId> {
        self.entities.get(key).copied()
    }

    /// The content key of a library-owned entity.
    pub fn key_of(&self, entity: EntityId) -> Option<AssetId> {
        self.keys.get(&entity).copied()
    }

    /// Returns `true` if `entity` is owned by the library.
    pub fn owns(&self, entity: EntityId) -> bool {
        self.keys.contains_key(&entity)
    }

    /// Number of library-owned assets.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if the library owns nothing.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::ComponentEvent;
    use lumen_core::asset::{Image, Texture2D};

    fn checker() -> Arc<Texture2D> {
        Arc::new(Texture2D::new(Image::rgba8(
            1,
            1,
            Arc::from(vec![0u8, 255, 0, 255]),
        )))
    }

    #[test]
    fn equal_content_resolves_to_one_entity() {
        let mut world = World::new();
        let mut graph = ReferenceGraph::new();
        let mut library = AssetLibrary::new();

        let a = library.acquire(&mut world, &mut graph, checker()).unwrap();
        let b = library.acquire(&mut world, &mut graph, checker()).unwrap();
        assert_eq!(a, b);
        assert_eq!(library.len(), 1);
        assert!(graph.contains(a));
        assert_eq!(world.drain_events::<Arc<Texture2D>>().len(), 1);
    }

    #[test]
    fn evict_despawns_and_forgets_key() {
        let mut world = World::new();
        let mut graph = ReferenceGraph::new();
        let mut library = AssetLibrary::new();

        let texture = checker();
        let key = AssetId::of(texture.as_ref()).unwrap();
        let entity = library.acquire(&mut world, &mut graph, texture).unwrap();
        world.drain_events::<Arc<Texture2D>>();

        assert!(library.evict(&mut world, entity));
        assert!(!library.evict(&mut world, entity));
        assert!(!world.is_alive(entity));
        assert!(library.get(&key).is_none());
        assert!(matches!(
            world.drain_events::<Arc<Texture2D>>().as_slice(),
            [ComponentEvent::Removed { .. }]
        ));
        assert!(graph.contains(entity));
    }
}
