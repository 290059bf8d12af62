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

use lumen_core::asset::AssetError;
use lumen_core::EntityId;
use std::collections::{BTreeSet, HashMap, VecDeque};

#[derive(Debug, Default)]
struct Node {
    referred: BTreeSet<EntityId>,
    referrers: BTreeSet<EntityId>,
}

/// The outcome of [`ReferenceGraph::unrefer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unreferred {
    /// The edge did not exist; nothing changed.
    NotReferred,
    /// The edge was removed.
    Removed {
        /// Referrers the referred asset still has.
        remaining: usize,
    },
}

impl Unreferred {
    /// Returns `true` if the edge was removed and it was the last one.
    pub fn orphaned(&self) -> bool {
        matches!(self, Unreferred::Removed { remaining: 0 })
    }
}

/// A directed "refers to" graph between assets.
///
/// Edges are sets: referring twice is a no-op, and so is unreferring a
/// missing edge. Both endpoints of an edge must be registered. Cycles are
/// tolerated by the recursive queries.
#[derive(Debug, Default)]
pub struct ReferenceGraph {
    nodes: HashMap<EntityId, Node>,
}

impl ReferenceGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `entity` as a node. Returns `false` if it already was one.
    pub fn register(&mut self, entity: EntityId) -> bool {
        if self.nodes.contains_key(&entity) {
            return false;
        }
        self.nodes.insert(entity, Node::default());
        true
    }

    /// Returns `true` if `entity` is a registered node.
    pub fn contains(&self, entity: EntityId) -> bool {
        self.nodes.contains_key(&entity)
    }

    /// Removes `entity` and every edge touching it.
    ///
    /// Returns the assets that `entity` referred to and that have no referrer
    /// left afterwards.
    ///
    /// # Errors
    /// * [`AssetError::InvalidAsset`] if `entity` is not registered.
    pub fn unregister(&mut self, entity: EntityId) -> Result<Vec<EntityId>, AssetError> {
        let node = self
            .nodes
            .remove(&entity)
            .ok_or(AssetError::InvalidAsset(entity))?;

        for referrer in &node.referrers {
            if let Some(other) = self.nodes.get_mut(referrer) {
                other.referred.remove(&entity);
            }
        }

        let mut orphans = Vec::new();
        for referred in &node.referred {
            if let Some(other) = self.nodes.get_mut(referred) {
                other.referrers.remove(&entity);
                if other.referrers.is_empty() {
                    orphans.push(*referred);
                }
            }
        }
        Ok(orphans)
    }

    fn check(&self, entity: EntityId) -> Result<(), AssetError> {
        if self.contains(entity) {
            Ok(())
        } else {
            Err(AssetError::InvalidAsset(entity))
        }
    }

    /// Adds the edge `referrer -> referred`. Returns `false` if it existed.
    ///
    /// # Errors
    /// * [`AssetError::InvalidAsset`] if either endpoint is not registered.
    pub fn refer(&mut self, referrer: EntityId, referred: EntityId) -> Result<bool, AssetError> {
        self.check(referrer)?;
        self.check(referred)?;
        let added = self
            .nodes
            .get_mut(&referrer)
            .is_some_and(|node| node.referred.insert(referred));
        if added {
            if let Some(node) = self.nodes.get_mut(&referred) {
                node.referrers.insert(referrer);
            }
        }
        Ok(added)
    }

    /// Removes the edge `referrer -> referred`.
    ///
    /// # Errors
    /// * [`AssetError::InvalidAsset`] if either endpoint is not registered.
    pub fn unrefer(
        &mut self,
        referrer: EntityId,
        referred: EntityId,
    ) -> Result<Unreferred, AssetError> {
        self.check(referrer)?;
        self.check(referred)?;
        let removed = self
            .nodes
            .get_mut(&referrer)
            .is_some_and(|node| node.referred.remove(&referred));
        if !removed {
            return Ok(Unreferred::NotReferred);
        }
        let remaining = self.nodes.get_mut(&referred).map_or(0, |node| {
            node.referrers.remove(&referrer);
            node.referrers.len()
        });
        Ok(Unreferred::Removed { remaining })
    }

    /// Direct referrers of `entity`.
    pub fn referrers(&self, entity: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        self.nodes
            .get(&entity)
            .into_iter()
            .flat_map(|node| node.referrers.iter().copied())
    }

    /// Assets directly referred to by `entity`.
    pub fn referred(&self, entity: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        self.nodes
            .get(&entity)
            .into_iter()
            .flat_map(|node| node.referred.iter().copied())
    }

    /// Number of direct referrers of `entity`.
    pub fn referrer_count(&self, entity: EntityId) -> usize {
        self.nodes.get(&entity).map_or(0, |node| node.referrers.len())
    }

    /// Every asset that transitively refers to `entity`, excluding itself.
    pub fn find_referrers_recursively(&self, entity: EntityId) -> BTreeSet<EntityId> {
        self.walk(entity, |node| &node.referrers)
    }

    /// Every asset `entity` transitively refers to, excluding itself.
    pub fn find_referred_recursively(&self, entity: EntityId) -> BTreeSet<EntityId> {
        self.walk(entity, |node| &node.referred)
    }

    fn walk(&self, start: EntityId, next: impl Fn(&Node) -> &BTreeSet<EntityId>) -> BTreeSet<EntityId> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            for &neighbour in next(node) {
                if neighbour != start && seen.insert(neighbour) {
                    queue.push_back(neighbour);
                }
            }
        }
        seen
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if no node is registered.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with(count: u32) -> (ReferenceGraph, Vec<EntityId>) {
        let mut graph = ReferenceGraph::new();
        let ids: Vec<_> = (0..count).map(|i| EntityId::new(i, 0)).collect();
        for id in &ids {
            graph.register(*id);
        }
        (graph, ids)
    }

    #[test]
    fn refer_is_idempotent() {
        let (mut graph, ids) = graph_with(2);
        assert_eq!(graph.refer(ids[0], ids[1]), Ok(true));
        assert_eq!(graph.refer(ids[0], ids[1]), Ok(false));
        assert_eq!(graph.referrer_count(ids[1]), 1);
    }

    #[test]
    fn unrefer_reports_orphans_once() {
        let (mut graph, ids) = graph_with(3);
        graph.refer(ids[0], ids[2]).unwrap();
        graph.refer(ids[1], ids[2]).unwrap();

        let first = graph.unrefer(ids[0], ids[2]).unwrap();
        assert_eq!(first, Unreferred::Removed { remaining: 1 });
        assert!(!first.orphaned());
        assert!(graph.unrefer(ids[1], ids[2]).unwrap().orphaned());
        assert_eq!(graph.unrefer(ids[1], ids[2]), Ok(Unreferred::NotReferred));
    }

    #[test]
    fn unknown_endpoint_is_invalid_asset() {
        let (mut graph, ids) = graph_with(1);
        let ghost = EntityId::new(9, 0);
        assert_eq!(
            graph.refer(ids[0], ghost),
            Err(AssetError::InvalidAsset(ghost))
        );
        assert_eq!(
            graph.unrefer(ghost, ids[0]),
            Err(AssetError::InvalidAsset(ghost))
        );
        assert_eq!(graph.unregister(ghost), Err(AssetError::InvalidAsset(ghost)));
    }

    #[test]
    fn unregister_removes_edges_on_both_sides() {
        let (mut graph, ids) = graph_with(3);
        graph.refer(ids[0], ids[1]).unwrap();
        graph.refer(ids[1], ids[2]).unwrap();

        let orphans = graph.unregister(ids[1]).unwrap();
        assert_eq!(orphans, vec![ids[2]]);
        assert_eq!(graph.referred(ids[0]).count(), 0);
        assert_eq!(graph.referrer_count(ids[2]), 0);
        assert!(!graph.contains(ids[1]));
    }

    #[test]
    fn recursive_queries_tolerate_cycles() {
        let (mut graph, ids) = graph_with(4);
        graph.refer(ids[0], ids[1]).unwrap();
        graph.refer(ids[1], ids[2]).unwrap();
        graph.refer(ids[2], ids[0]).unwrap();
        graph.refer(ids[3], ids[2]).unwrap();

        let referred: Vec<_> = graph.find_referred_recursively(ids[0]).into_iter().collect();
        assert_eq!(referred, vec![ids[1], ids[2]]);
        let referrers: Vec<_> = graph.find_referrers_recursively(ids[2]).into_iter().collect();
        assert_eq!(referrers, vec![ids[0], ids[1], ids[3]]);
    }
}
