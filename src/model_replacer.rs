//! Swapping the asset behind a model entity.
//!
//! The container entity keeps its identity key, its node ownership and the
//! single authoritative physics body; only its renderable child changes. What
//! the old child looked like (scale, feet height, animation, part colors) is
//! captured before the load starts and carried over when it completes.

use std::collections::{BTreeMap, HashMap};

use glam::Vec3;

use crate::asset_loader::{AssetLoader, LoadTicket, LoadedModel};
use crate::entity_resolver::{EntityKey, EntityRegistry};
use crate::material_resolver::{apply_palette, extract_palette};
use crate::program::NodeId;
use crate::scene_graph::{AnimationState, AppliedMaterial, EntityCapability, EntityId, SceneGraph};

/// State captured from the entity before its asset is replaced.
#[derive(Debug, Clone)]
pub struct PendingSwap {
    pub node: NodeId,
    pub container: EntityId,
    pub model: String,
    /// Direct children of the container when the swap started.
    pub prior_children: Vec<EntityId>,
    /// Local scale of the first rendered child.
    pub prior_scale: Option<Vec3>,
    /// World-space minimum Y of the old renderable subtree.
    pub base_y: Option<f32>,
    pub animation: Option<AnimationState>,
    pub palette: BTreeMap<String, AppliedMaterial>,
}

/// Outcome of a completed swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapResult {
    pub node: NodeId,
    pub container: EntityId,
    pub root: EntityId,
    /// Whether the container had a renderable child before (a real swap rather
    /// than a first construction).
    pub replaced: bool,
}

#[derive(Debug, Default)]
pub struct ModelReplacer {
    pending: HashMap<LoadTicket, PendingSwap>,
}

impl ModelReplacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self, node: NodeId) -> bool {
        self.pending.values().any(|swap| swap.node == node)
    }

    pub fn pending_for(&self, ticket: LoadTicket) -> Option<&PendingSwap> {
        self.pending.get(&ticket)
    }

    /// Model an in-flight swap of `node` is loading.
    pub fn pending_model(&self, node: NodeId) -> Option<&str> {
        self.pending
            .values()
            .find(|swap| swap.node == node)
            .map(|swap| swap.model.as_str())
    }

    /// Capture the container's current state, hide it and queue the load of
    /// `model` under a temporary identity. A swap already in flight for the
    /// same node is superseded.
    pub fn begin(
        &mut self,
        scene: &mut SceneGraph,
        loader: &mut AssetLoader,
        registry: &mut EntityRegistry,
        node: NodeId,
        container: EntityId,
        model: &str,
    ) -> LoadTicket {
        self.cancel_node(loader, node);

        let prior_children = scene.get(container).map(|e| e.children.clone()).unwrap_or_default();
        let first = prior_children.first().copied();
        let prior_scale = first.and_then(|c| scene.get(c)).map(|e| e.transform.scale);
        let base_y = first.and_then(|c| scene.world_bounds(c)).map(|b| b.min.y);
        let animation = first.and_then(|c| scene.get(c)).and_then(|e| e.animation.clone());
        let palette = first.map(|c| extract_palette(scene, c)).unwrap_or_default();

        // (1) hide
        scene.set_visible_recursive(container, false);
        // (2) build the replacement off to the side
        let temporary = EntityKey::pending(node, loader.peek_ticket().0);
        let ticket = loader.request(model, temporary);
        registry.mark_pending(node);

        log::debug!(
            "swapping {node} to '{model}' (ticket {}, {} prior children)",
            ticket.0,
            prior_children.len()
        );
        self.pending.insert(
            ticket,
            PendingSwap {
                node,
                container,
                model: model.to_string(),
                prior_children,
                prior_scale,
                base_y,
                animation,
                palette,
            },
        );
        ticket
    }

    /// Take the swap a finished load belongs to.
    pub fn take(&mut self, ticket: LoadTicket) -> Option<PendingSwap> {
        self.pending.remove(&ticket)
    }

    /// Drop any swap in flight for `node`, cancelling its load.
    pub fn cancel_node(&mut self, loader: &mut AssetLoader, node: NodeId) -> Option<PendingSwap> {
        let ticket = self
            .pending
            .iter()
            .find(|(_, swap)| swap.node == node)
            .map(|(ticket, _)| *ticket)?;
        loader.cancel(ticket);
        self.pending.remove(&ticket)
    }

    /// Install a finished load into its container.
    pub fn finish(&mut self, scene: &mut SceneGraph, swap: &PendingSwap, loaded: LoadedModel) -> SwapResult {
        let root = loaded.root;

        // (3) detach from the loader wrapper; only the container keeps a body
        scene.set_parent(root, None);
        for id in scene.subtree(root) {
            scene.apply_physics_shape(id, None);
        }

        // (4) dispose what the container held before the swap, and nothing else
        for old in &swap.prior_children {
            let still_ours = scene.get(*old).and_then(|e| e.parent) == Some(swap.container);
            if still_ours && *old != root {
                scene.dispose(*old);
            }
        }

        // (5) adopt
        scene.set_parent(root, Some(swap.container));

        // (6) scale
        if let Some(scale) = swap.prior_scale {
            if let Some(mut transform) = scene.get(root).map(|e| e.transform) {
                transform.scale = scale;
                scene.apply_transform(root, transform);
            }
        }

        // (7) feet
        if let (Some(base_y), Some(bounds)) = (swap.base_y, scene.world_bounds(root)) {
            if let Some(mut transform) = scene.get(root).map(|e| e.transform) {
                transform.translation.y += base_y - bounds.min.y;
                scene.apply_transform(root, transform);
            }
        }

        // (8) animation and palette
        if let Some(animation) = &swap.animation {
            let available = scene
                .get(root)
                .is_some_and(|e| e.animations.iter().any(|a| a == &animation.name));
            if available {
                scene.set_animation(root, Some(animation.clone()));
            } else {
                log::debug!("'{}' has no clip '{}'; keeping its default", swap.model, animation.name);
            }
        }
        if !swap.palette.is_empty() {
            apply_palette(scene, root, &swap.palette);
        }

        // (9) the wrapper is empty now
        scene.dispose(loaded.wrapper);

        // (10) show
        scene.set_visible_recursive(swap.container, true);

        SwapResult {
            node: swap.node,
            container: swap.container,
            root,
            replaced: !swap.prior_children.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh_asset::ModelRegistry;
    use crate::scene_graph::Transform;

    fn load(
        replacer: &mut ModelReplacer,
        scene: &mut SceneGraph,
        registry: &mut EntityRegistry,
        container: EntityId,
        model: &str,
    ) -> SwapResult {
        let models = ModelRegistry::with_builtins();
        let mut loader = AssetLoader::new();
        let ticket = replacer.begin(scene, &mut loader, registry, NodeId(1), container, model);
        let loaded = loader.poll(&models, scene).remove(0).unwrap();
        let swap = replacer.take(ticket).unwrap();
        replacer.finish(scene, &swap, loaded)
    }

    #[test]
    fn swap_preserves_scale_feet_and_container() {
        let mut scene = SceneGraph::new();
        let mut registry = EntityRegistry::new();
        let mut replacer = ModelReplacer::new();
        let container = scene.spawn("model");
        scene.apply_transform(container, Transform::from_translation(Vec3::new(2.0, 0.0, 0.0)));

        let first = load(&mut replacer, &mut scene, &mut registry, container, "character");
        assert!(!first.replaced);
        let mut transform = scene.get(first.root).unwrap().transform;
        transform.scale = Vec3::splat(2.0);
        transform.translation.y = 1.5;
        scene.apply_transform(first.root, transform);
        let feet = scene.world_bounds(container).unwrap().min.y;

        let second = load(&mut replacer, &mut scene, &mut registry, container, "robot");
        assert!(second.replaced);
        assert_eq!(scene.get(container).unwrap().children, vec![second.root]);
        assert!(!scene.exists(first.root));
        assert_eq!(scene.get(second.root).unwrap().transform.scale, Vec3::splat(2.0));
        assert!((scene.world_bounds(container).unwrap().min.y - feet).abs() < 1e-5);
        assert!(scene.get(second.root).unwrap().physics.is_none());
        assert!(scene.get(container).unwrap().visible);
        // Only the container and the robot's hierarchy remain.
        assert_eq!(scene.len(), 1 + 1 + 6);
    }

    #[test]
    fn animation_and_palette_carry_over() {
        let mut scene = SceneGraph::new();
        let mut registry = EntityRegistry::new();
        let mut replacer = ModelReplacer::new();
        let container = scene.spawn("model");
        let first = load(&mut replacer, &mut scene, &mut registry, container, "character");
        scene.set_animation(
            first.root,
            Some(AnimationState {
                name: "Walk".into(),
                looping: false,
            }),
        );
        let green = AppliedMaterial::solid(crate::color::Color::new(0.0, 1.0, 0.0));
        crate::material_resolver::apply_to_part(&mut scene, first.root, "TShirt", &green);

        let second = load(&mut replacer, &mut scene, &mut registry, container, "robot");
        let root = scene.get(second.root).unwrap();
        assert_eq!(
            root.animation,
            Some(AnimationState {
                name: "Walk".into(),
                looping: false
            })
        );
        assert_eq!(extract_palette(&scene, second.root)["TShirt"], green);
    }

    #[test]
    fn newer_swap_supersedes_pending_one() {
        let mut scene = SceneGraph::new();
        let mut registry = EntityRegistry::new();
        let mut replacer = ModelReplacer::new();
        let mut loader = AssetLoader::new();
        let container = scene.spawn("model");
        let first = replacer.begin(&mut scene, &mut loader, &mut registry, NodeId(1), container, "tree");
        let second = replacer.begin(&mut scene, &mut loader, &mut registry, NodeId(1), container, "rock");
        assert_ne!(first, second);
        assert!(replacer.pending_for(first).is_none());
        assert_eq!(replacer.pending_model(NodeId(1)), Some("rock"));
        assert_eq!(loader.pending(), 1);
        assert!(registry.is_pending(NodeId(1)));
    }
}
