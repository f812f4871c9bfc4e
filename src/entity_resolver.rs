//! Identity between program nodes and scene entities.
//!
//! The registry holds the two O(1) maps (node to key, key to node). Live
//! entities are never cached: a key is resolved to an entity by scanning the
//! scene's identity metadata each time, because the entity behind a key can be
//! replaced at any moment.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::program::NodeId;
use crate::scene_graph::{EntityId, SceneGraph};

/// Identity stamped on the root entity a program node owns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct EntityKey(String);

impl EntityKey {
    pub fn for_node(node: NodeId) -> Self {
        Self(format!("node:{}", node.0))
    }

    /// Temporary identity for an entity still being built off to the side.
    pub fn pending(node: NodeId, ticket: u64) -> Self {
        Self(format!("pending:{}:{ticket}", node.0))
    }

    pub fn is_pending(&self) -> bool {
        self.0.starts_with("pending:")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bidirectional node/key map plus the set of nodes whose construction is in
/// flight.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    keys: HashMap<NodeId, EntityKey>,
    owners: HashMap<EntityKey, NodeId>,
    pending: HashSet<NodeId>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key for `node`, registering it on first use.
    pub fn register(&mut self, node: NodeId) -> EntityKey {
        if let Some(key) = self.keys.get(&node) {
            return key.clone();
        }
        let key = EntityKey::for_node(node);
        self.keys.insert(node, key.clone());
        self.owners.insert(key.clone(), node);
        key
    }

    /// Drop both directions of the mapping.
    pub fn unregister(&mut self, node: NodeId) -> Option<EntityKey> {
        self.pending.remove(&node);
        let key = self.keys.remove(&node)?;
        self.owners.remove(&key);
        Some(key)
    }

    pub fn key_of(&self, node: NodeId) -> Option<&EntityKey> {
        self.keys.get(&node)
    }

    pub fn owner_of_key(&self, key: &EntityKey) -> Option<NodeId> {
        self.owners.get(key).copied()
    }

    pub fn mark_pending(&mut self, node: NodeId) {
        self.pending.insert(node);
    }

    pub fn clear_pending(&mut self, node: NodeId) {
        self.pending.remove(&node);
    }

    pub fn is_pending(&self, node: NodeId) -> bool {
        self.pending.contains(&node)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Registered nodes, sorted.
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut nodes: Vec<_> = self.keys.keys().copied().collect();
        nodes.sort();
        nodes
    }
}

/// Why an entity could not be traced to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerLookup {
    /// No entity on the parent chain carries an identity key.
    Untagged,
    /// A key was found but no node owns it any more.
    Unowned,
    /// The parent chain is longer than allowed or cyclic.
    TooDeep,
}

#[derive(Debug)]
pub struct EntityResolver {
    registry: EntityRegistry,
    max_depth: usize,
}

impl EntityResolver {
    pub fn new(max_depth: usize) -> Self {
        Self {
            registry: EntityRegistry::new(),
            max_depth,
        }
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut EntityRegistry {
        &mut self.registry
    }

    /// The live entity carrying `key`, found by scanning the scene.
    pub fn entity_for_key(&self, scene: &SceneGraph, key: &EntityKey) -> Option<EntityId> {
        scene
            .entities()
            .find(|(_, e)| e.key.as_ref() == Some(key))
            .map(|(id, _)| id)
    }

    pub fn entity_for_node(&self, scene: &SceneGraph, node: NodeId) -> Option<EntityId> {
        let key = self.registry.key_of(node)?;
        self.entity_for_key(scene, key)
    }

    /// Ultimate ancestor of `entity`, or `None` when the chain is broken or
    /// exceeds the depth bound.
    pub fn root_of(&self, scene: &SceneGraph, entity: EntityId) -> Option<EntityId> {
        let mut current = entity;
        for _ in 0..=self.max_depth {
            match scene.get(current)?.parent {
                Some(parent) => current = parent,
                None => return Some(current),
            }
        }
        log::warn!("entity {} exceeds the parent depth bound", entity.0);
        None
    }

    /// Program node owning `entity`: the nearest keyed entity on its parent
    /// chain, mapped back through the registry.
    pub fn owner_of(&self, scene: &SceneGraph, entity: EntityId) -> Result<NodeId, OwnerLookup> {
        let mut current = Some(entity);
        for _ in 0..=self.max_depth {
            let Some(id) = current else {
                return Err(OwnerLookup::Untagged);
            };
            let Some(e) = scene.get(id) else {
                return Err(OwnerLookup::Untagged);
            };
            if let Some(key) = &e.key {
                if key.is_pending() {
                    return Err(OwnerLookup::Unowned);
                }
                return self.registry.owner_of_key(key).ok_or(OwnerLookup::Unowned);
            }
            current = e.parent;
        }
        Err(OwnerLookup::TooDeep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregister_clears_both_directions() {
        let mut registry = EntityRegistry::new();
        let key = registry.register(NodeId(3));
        assert_eq!(registry.owner_of_key(&key), Some(NodeId(3)));
        assert_eq!(registry.register(NodeId(3)), key);

        registry.mark_pending(NodeId(3));
        assert_eq!(registry.unregister(NodeId(3)), Some(key.clone()));
        assert_eq!(registry.owner_of_key(&key), None);
        assert!(registry.key_of(NodeId(3)).is_none());
        assert!(!registry.is_pending(NodeId(3)));
    }

    #[test]
    fn owner_is_found_from_a_nested_part() {
        let mut resolver = EntityResolver::new(8);
        let key = resolver.registry_mut().register(NodeId(5));
        let mut scene = SceneGraph::new();
        let container = scene.spawn("container");
        scene.set_key(container, Some(key.clone()));
        let root = scene.spawn_child(container, "root");
        let part = scene.spawn_child(root, "part");

        assert_eq!(resolver.owner_of(&scene, part), Ok(NodeId(5)));
        assert_eq!(resolver.root_of(&scene, part), Some(container));
        assert_eq!(resolver.entity_for_key(&scene, &key), Some(container));
    }

    #[test]
    fn untagged_entities_have_no_owner() {
        let resolver = EntityResolver::new(8);
        let mut scene = SceneGraph::new();
        let loose = scene.spawn("loose");
        assert_eq!(resolver.owner_of(&scene, loose), Err(OwnerLookup::Untagged));
    }

    #[test]
    fn root_walk_is_bounded() {
        let resolver = EntityResolver::new(2);
        let mut scene = SceneGraph::new();
        let mut current = scene.spawn("0");
        for i in 1..6 {
            current = scene.spawn_child(current, &i.to_string());
        }
        assert_eq!(resolver.root_of(&scene, current), None);
    }
}
