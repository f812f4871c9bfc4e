//! Deferred model construction.
//!
//! A request is queued and completed on the next [`AssetLoader::poll`], which
//! builds the model the way an engine importer would: a loader wrapper entity
//! (carrying the temporary identity) whose single child is the renderable
//! root, with one child per named part. The importer puts a physics body on
//! the renderable root and autoplays the first animation clip.

use std::collections::VecDeque;

use glam::Vec3;

use crate::entity_resolver::EntityKey;
use crate::geometry::physics_shape_for;
use crate::mesh_asset::{AssetError, BoundingBox, ModelRegistry};
use crate::scene_graph::{
    AnimationState, AppliedMaterial, EntityCapability, EntityId, MotionMode, PhysicsBody, SceneGraph, Transform,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadTicket(pub u64);

#[derive(Debug, Clone)]
struct LoadRequest {
    ticket: LoadTicket,
    model: String,
    key: EntityKey,
}

/// A finished load, still parked under its wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedModel {
    pub ticket: LoadTicket,
    pub wrapper: EntityId,
    pub root: EntityId,
}

#[derive(Debug)]
pub struct LoadFailure {
    pub ticket: LoadTicket,
    pub error: AssetError,
}

#[derive(Debug, Default)]
pub struct AssetLoader {
    queue: VecDeque<LoadRequest>,
    next_ticket: u64,
}

impl AssetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue construction of `model`; the wrapper will carry `key`.
    pub fn request(&mut self, model: &str, key: EntityKey) -> LoadTicket {
        self.next_ticket += 1;
        let ticket = LoadTicket(self.next_ticket);
        log::debug!("queued load of '{model}' as ticket {}", ticket.0);
        self.queue.push_back(LoadRequest {
            ticket,
            model: model.to_string(),
            key,
        });
        ticket
    }

    /// Ticket the next call to [`AssetLoader::request`] will return.
    pub fn peek_ticket(&self) -> LoadTicket {
        LoadTicket(self.next_ticket + 1)
    }

    pub fn cancel(&mut self, ticket: LoadTicket) -> bool {
        let before = self.queue.len();
        self.queue.retain(|r| r.ticket != ticket);
        before != self.queue.len()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// Complete every queued request.
    pub fn poll(
        &mut self,
        models: &ModelRegistry,
        scene: &mut SceneGraph,
    ) -> Vec<Result<LoadedModel, LoadFailure>> {
        let requests: Vec<LoadRequest> = self.queue.drain(..).collect();
        requests
            .into_iter()
            .map(|request| Self::construct(models, scene, request))
            .collect()
    }

    fn construct(models: &ModelRegistry, scene: &mut SceneGraph, request: LoadRequest) -> Result<LoadedModel, LoadFailure> {
        let Some(asset) = models.get(&request.model) else {
            return Err(LoadFailure {
                ticket: request.ticket,
                error: AssetError::UnknownModel(request.model),
            });
        };

        let wrapper = scene.spawn(&format!("__loader__{}", asset.id));
        scene.set_key(wrapper, Some(request.key));
        let root = scene.spawn_child(wrapper, &asset.id);
        for part in &asset.parts {
            let piece = scene.spawn_child(root, &part.name);
            scene.set_mesh(piece, part.mesh.clone());
            scene.apply_material(piece, AppliedMaterial::solid(part.color));
            scene.set_part(piece, Some(part.name.clone()));
        }

        scene.apply_transform(
            root,
            Transform {
                scale: Vec3::splat(asset.import_scale),
                ..Default::default()
            },
        );
        scene.set_animation_clips(root, asset.animations.clone());
        scene.set_animation(
            root,
            asset.animations.first().map(|name| AnimationState {
                name: name.clone(),
                looping: true,
            }),
        );
        if let Some(bounds) = scene.local_bounds(root) {
            let scaled = BoundingBox::new(bounds.min * asset.import_scale, bounds.max * asset.import_scale);
            scene.set_physics(
                root,
                Some(PhysicsBody {
                    shape: physics_shape_for(None, &scaled),
                    motion: MotionMode::Dynamic,
                }),
            );
        }

        log::debug!("constructed '{}' for ticket {}", asset.id, request.ticket.0);
        Ok(LoadedModel {
            ticket: request.ticket,
            wrapper,
            root,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::NodeId;

    #[test]
    fn loads_complete_on_poll() {
        let models = ModelRegistry::with_builtins();
        let mut scene = SceneGraph::new();
        let mut loader = AssetLoader::new();
        let ticket = loader.request("character", EntityKey::pending(NodeId(1), 1));
        assert_eq!(scene.len(), 0);

        let results = loader.poll(&models, &mut scene);
        let loaded = results.into_iter().next().unwrap().unwrap();
        assert_eq!(loaded.ticket, ticket);
        assert_eq!(scene.get(loaded.wrapper).unwrap().children, vec![loaded.root]);
        let root = scene.get(loaded.root).unwrap();
        assert_eq!(root.children.len(), 6);
        assert!(root.physics.is_some());
        assert_eq!(root.animation.as_ref().unwrap().name, "Idle");
        assert!(loader.is_idle());
    }

    #[test]
    fn unknown_models_fail() {
        let models = ModelRegistry::new();
        let mut scene = SceneGraph::new();
        let mut loader = AssetLoader::new();
        loader.request("ghost", EntityKey::pending(NodeId(1), 1));
        let results = loader.poll(&models, &mut scene);
        assert!(matches!(
            results[0],
            Err(LoadFailure {
                error: AssetError::UnknownModel(_),
                ..
            })
        ));
        assert!(scene.is_empty());
    }

    #[test]
    fn cancelled_requests_never_build() {
        let models = ModelRegistry::with_builtins();
        let mut scene = SceneGraph::new();
        let mut loader = AssetLoader::new();
        let ticket = loader.request("tree", EntityKey::pending(NodeId(1), 1));
        assert!(loader.cancel(ticket));
        assert!(loader.poll(&models, &mut scene).is_empty());
        assert!(scene.is_empty());
    }
}
