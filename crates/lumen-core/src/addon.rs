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

//! A type-keyed registry of render addons.
//!
//! Render passes receive shared render-thread state (render targets, extra
//! buffers registered by the application) through an [`AddonRegistry`]. Each
//! addon is stored once per concrete type and looked up by that type.

use std::any::{Any, TypeId};
use std::collections::HashMap;

/// A registry holding at most one value per concrete type.
///
/// # Example
///
/// ```rust
/// use lumen_core::addon::AddonRegistry;
///
/// struct Exposure(f32);
///
/// let mut addons = AddonRegistry::new();
/// addons.insert(Exposure(1.5));
/// addons.get_mut::<Exposure>().unwrap().0 = 2.0;
/// assert_eq!(addons.get::<Exposure>().unwrap().0, 2.0);
/// ```
#[derive(Default)]
pub struct AddonRegistry {
    addons: HashMap<TypeId, Box<dyn Any + Send>>,
}

impl AddonRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            addons: HashMap::new(),
        }
    }

    /// Inserts an addon, returning the previous value of the same type.
    pub fn insert<T: Send + 'static>(&mut self, addon: T) -> Option<T> {
        self.addons
            .insert(TypeId::of::<T>(), Box::new(addon))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    /// Retrieves a shared reference to an addon.
    #[must_use]
    pub fn get<T: Send + 'static>(&self) -> Option<&T> {
        self.addons
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
    }

    /// Retrieves a mutable reference to an addon.
    pub fn get_mut<T: Send + 'static>(&mut self) -> Option<&mut T> {
        self.addons
            .get_mut(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_mut::<T>())
    }

    /// Returns the addon of type `T`, inserting the result of `init` first if absent.
    pub fn get_or_insert_with<T: Send + 'static>(&mut self, init: impl FnOnce() -> T) -> &mut T {
        let boxed = self
            .addons
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(init()));
        match boxed.downcast_mut::<T>() {
            Some(addon) => addon,
            None => unreachable!("addon registry entries are keyed by their own TypeId"),
        }
    }

    /// Removes and returns an addon.
    pub fn remove<T: Send + 'static>(&mut self) -> Option<T> {
        self.addons
            .remove(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }

    /// Returns `true` if an addon of type `T` is registered.
    #[must_use]
    pub fn contains<T: Send + 'static>(&self) -> bool {
        self.addons.contains_key(&TypeId::of::<T>())
    }

    /// Returns the number of registered addons.
    #[must_use]
    pub fn len(&self) -> usize {
        self.addons.len()
    }

    /// Returns `true` if no addons are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.addons.is_empty()
    }
}

impl std::fmt::Debug for AddonRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddonRegistry")
            .field("count", &self.addons.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct ShadowAtlas {
        size: u32,
    }

    struct Exposure(f32);

    #[test]
    fn insert_replaces_and_returns_previous() {
        let mut addons = AddonRegistry::new();
        assert!(addons.insert(ShadowAtlas { size: 1024 }).is_none());
        let old = addons.insert(ShadowAtlas { size: 2048 });
        assert_eq!(old, Some(ShadowAtlas { size: 1024 }));
        assert_eq!(addons.get::<ShadowAtlas>().unwrap().size, 2048);
        assert_eq!(addons.len(), 1);
    }

    #[test]
    fn get_or_insert_with_only_initializes_once() {
        let mut addons = AddonRegistry::new();
        addons.get_or_insert_with(|| Exposure(1.0)).0 += 1.0;
        addons.get_or_insert_with(|| Exposure(10.0)).0 += 1.0;
        assert_eq!(addons.get::<Exposure>().unwrap().0, 3.0);
    }

    #[test]
    fn remove_empties_registry() {
        let mut addons = AddonRegistry::new();
        addons.insert(Exposure(0.5));
        assert!(addons.contains::<Exposure>());
        assert!(addons.remove::<Exposure>().is_some());
        assert!(addons.is_empty());
        assert!(addons.get::<Exposure>().is_none());
    }
}
