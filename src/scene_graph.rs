//! Engine-neutral scene graph.
//!
//! Entities form a hierarchy (composite models attach their parts as children
//! of a renderable root). Every entity the sync engine owns carries an
//! [`EntityKey`] in its metadata; the scene itself knows nothing about program
//! nodes. An engine adapter mirrors this model; the sync core only goes through
//! the [`EntityCapability`] methods and the read accessors here.

use std::collections::HashMap;

use glam::{Mat4, Quat, Vec3};
use serde::Serialize;

use crate::color::Color;
use crate::entity_resolver::EntityKey;
use crate::mesh_asset::{BoundingBox, MeshData};

/// Unique identifier for scene entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntityId(pub u64);

/// Transform component for scene entities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedMaterial {
    pub color: Color,
    pub alpha: f32,
    pub texture_set: Option<String>,
}

impl AppliedMaterial {
    pub fn solid(color: Color) -> Self {
        Self {
            color,
            alpha: 1.0,
            texture_set: None,
        }
    }
}

/// Collision shape in entity-local space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PhysicsShape {
    Box { half_extents: [f32; 3] },
    Sphere { radius: f32 },
    Cylinder { half_height: f32, radius: f32 },
    Capsule { half_height: f32, radius: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionMode {
    Static,
    /// Driven by user or animation, not by the solver.
    Kinematic,
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PhysicsBody {
    pub shape: PhysicsShape,
    pub motion: MotionMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnimationState {
    pub name: String,
    pub looping: bool,
}

#[derive(Debug, Clone)]
pub struct SceneEntity {
    pub name: String,
    pub key: Option<EntityKey>,
    pub parent: Option<EntityId>,
    pub children: Vec<EntityId>,
    pub transform: Transform,
    pub mesh: Option<MeshData>,
    pub material: Option<AppliedMaterial>,
    pub physics: Option<PhysicsBody>,
    pub animation: Option<AnimationState>,
    /// Clips the entity can play.
    pub animations: Vec<String>,
    /// Semantic part name (e.g. `Skin`) for pieces of multi-part models.
    pub part: Option<String>,
    pub visible: bool,
}

impl SceneEntity {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            key: None,
            parent: None,
            children: Vec::new(),
            transform: Transform::default(),
            mesh: None,
            material: None,
            physics: None,
            animation: None,
            animations: Vec::new(),
            part: None,
            visible: true,
        }
    }
}

/// The capability set sync handlers drive. Everything engine-specific lives
/// behind these four calls.
pub trait EntityCapability {
    fn apply_material(&mut self, id: EntityId, material: AppliedMaterial) -> bool;
    fn apply_transform(&mut self, id: EntityId, transform: Transform) -> bool;
    /// Replace (or with `None`, remove) the collision shape, keeping the motion mode.
    fn apply_physics_shape(&mut self, id: EntityId, shape: Option<PhysicsShape>) -> bool;
    /// Destroy an entity and everything below it.
    fn dispose(&mut self, id: EntityId) -> bool;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Environment {
    pub sky_color: Color,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            sky_color: Color::new(0.53, 0.81, 0.92),
        }
    }
}

/// The scene graph: every live entity plus environment state.
#[derive(Debug)]
pub struct SceneGraph {
    entities: HashMap<EntityId, SceneEntity>,
    /// Creation order, used for enumeration.
    order: Vec<EntityId>,
    next_id: u64,
    environment: Environment,
    /// Bumped on every mutation.
    revision: u64,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
            order: Vec::new(),
            next_id: 1,
            environment: Environment::default(),
            revision: 0,
        }
    }

    fn new_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    /// Create a root entity.
    pub fn spawn(&mut self, name: &str) -> EntityId {
        let id = self.new_id();
        self.entities.insert(id, SceneEntity::new(name));
        self.order.push(id);
        self.touch();
        id
    }

    /// Create an entity under `parent`. Falls back to a root entity when the
    /// parent does not exist.
    pub fn spawn_child(&mut self, parent: EntityId, name: &str) -> EntityId {
        let id = self.spawn(name);
        self.set_parent(id, Some(parent));
        id
    }

    pub fn get(&self, id: EntityId) -> Option<&SceneEntity> {
        self.entities.get(&id)
    }

    /// Mutable access for a write; counts as a mutation only when the entity exists.
    fn entity_mut(&mut self, id: EntityId) -> Option<&mut SceneEntity> {
        let entity = self.entities.get_mut(&id)?;
        self.revision += 1;
        Some(entity)
    }

    pub fn exists(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// All entities in creation order.
    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &SceneEntity)> {
        self.order
            .iter()
            .filter_map(|id| self.entities.get(id).map(|e| (*id, e)))
    }

    /// Entities without a parent.
    pub fn roots(&self) -> impl Iterator<Item = (EntityId, &SceneEntity)> {
        self.entities().filter(|(_, e)| e.parent.is_none())
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn set_sky_color(&mut self, color: Color) {
        self.environment.sky_color = color;
        self.touch();
    }

    pub fn set_key(&mut self, id: EntityId, key: Option<EntityKey>) -> bool {
        match self.entity_mut(id) {
            Some(entity) => {
                entity.key = key;
                true
            }
            None => false,
        }
    }

    pub fn set_mesh(&mut self, id: EntityId, mesh: MeshData) -> bool {
        match self.entity_mut(id) {
            Some(entity) => {
                entity.mesh = Some(mesh);
                true
            }
            None => false,
        }
    }

    pub fn set_animation(&mut self, id: EntityId, animation: Option<AnimationState>) -> bool {
        match self.entity_mut(id) {
            Some(entity) => {
                entity.animation = animation;
                true
            }
            None => false,
        }
    }

    pub fn set_part(&mut self, id: EntityId, part: Option<String>) -> bool {
        match self.entity_mut(id) {
            Some(entity) => {
                entity.part = part;
                true
            }
            None => false,
        }
    }

    /// Replace the clips an entity can play. The current animation is untouched.
    pub fn set_animation_clips(&mut self, id: EntityId, clips: Vec<String>) -> bool {
        match self.entity_mut(id) {
            Some(entity) => {
                entity.animations = clips;
                true
            }
            None => false,
        }
    }

    /// Whether `ancestor` is `id` or one of its parents.
    pub fn is_ancestor(&self, ancestor: EntityId, id: EntityId) -> bool {
        let mut current = Some(id);
        let mut steps = 0;
        while let Some(cur) = current {
            if cur == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.entities.len() {
                return false;
            }
            current = self.entities.get(&cur).and_then(|e| e.parent);
        }
        false
    }

    /// Reparent `child`. Returns false if either side is missing or the move
    /// would create a cycle. The local transform is kept as is.
    pub fn set_parent(&mut self, child: EntityId, parent: Option<EntityId>) -> bool {
        if !self.exists(child) {
            return false;
        }
        if let Some(p) = parent {
            if !self.exists(p) || self.is_ancestor(child, p) {
                return false;
            }
        }
        let old = self.entities.get(&child).and_then(|e| e.parent);
        if let Some(old) = old {
            if let Some(old_parent) = self.entities.get_mut(&old) {
                old_parent.children.retain(|c| *c != child);
            }
        }
        if let Some(p) = parent {
            if let Some(new_parent) = self.entities.get_mut(&p) {
                new_parent.children.push(child);
            }
        }
        if let Some(entity) = self.entities.get_mut(&child) {
            entity.parent = parent;
        }
        self.touch();
        true
    }

    /// `id` and everything below it, parents before children.
    pub fn subtree(&self, id: EntityId) -> Vec<EntityId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if out.contains(&current) || out.len() > self.entities.len() {
                continue;
            }
            let Some(entity) = self.entities.get(&current) else {
                continue;
            };
            out.push(current);
            stack.extend(entity.children.iter().rev().copied());
        }
        out
    }

    /// Local-to-world matrix, walking at most `max_depth` parents.
    pub fn world_matrix(&self, id: EntityId, max_depth: usize) -> Option<Mat4> {
        let mut matrix = self.entities.get(&id)?.transform.matrix();
        let mut current = self.entities.get(&id)?.parent;
        let mut depth = 0;
        while let Some(parent) = current {
            depth += 1;
            if depth > max_depth {
                log::warn!("parent chain of entity {} exceeds {max_depth} levels", id.0);
                return None;
            }
            let entity = self.entities.get(&parent)?;
            matrix = entity.transform.matrix() * matrix;
            current = entity.parent;
        }
        Some(matrix)
    }

    /// World-space bounds of every mesh in the subtree rooted at `id`.
    pub fn world_bounds(&self, id: EntityId) -> Option<BoundingBox> {
        let depth = self.entities.len();
        self.subtree(id)
            .into_iter()
            .filter_map(|e| {
                let mesh = self.entities.get(&e)?.mesh.as_ref()?;
                mesh.transformed_bounds(&self.world_matrix(e, depth)?)
            })
            .fold(None, BoundingBox::union_opt)
    }

    /// Bounds of the subtree expressed in `id`'s own local frame.
    pub fn local_bounds(&self, id: EntityId) -> Option<BoundingBox> {
        let depth = self.entities.len();
        let inverse = self.world_matrix(id, depth)?.inverse();
        self.subtree(id)
            .into_iter()
            .filter_map(|e| {
                let mesh = self.entities.get(&e)?.mesh.as_ref()?;
                let to_local = inverse * self.world_matrix(e, depth)?;
                mesh.transformed_bounds(&to_local)
            })
            .fold(None, BoundingBox::union_opt)
    }

    pub fn set_visible_recursive(&mut self, id: EntityId, visible: bool) {
        for e in self.subtree(id) {
            if let Some(entity) = self.entities.get_mut(&e) {
                entity.visible = visible;
            }
        }
        self.touch();
    }

    pub fn motion_mode(&self, id: EntityId) -> Option<MotionMode> {
        self.entities.get(&id)?.physics.map(|b| b.motion)
    }

    pub fn set_motion_mode(&mut self, id: EntityId, motion: MotionMode) -> bool {
        match self.entity_mut(id).and_then(|e| e.physics.as_mut()) {
            Some(body) => {
                body.motion = motion;
                true
            }
            None => false,
        }
    }

    /// Install a body with an explicit motion mode.
    pub fn set_physics(&mut self, id: EntityId, body: Option<PhysicsBody>) -> bool {
        match self.entity_mut(id) {
            Some(entity) => {
                entity.physics = body;
                true
            }
            None => false,
        }
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityCapability for SceneGraph {
    fn apply_material(&mut self, id: EntityId, material: AppliedMaterial) -> bool {
        match self.entity_mut(id) {
            Some(entity) => {
                entity.material = Some(material);
                true
            }
            None => false,
        }
    }

    fn apply_transform(&mut self, id: EntityId, transform: Transform) -> bool {
        match self.entity_mut(id) {
            Some(entity) => {
                entity.transform = transform;
                true
            }
            None => false,
        }
    }

    fn apply_physics_shape(&mut self, id: EntityId, shape: Option<PhysicsShape>) -> bool {
        let Some(entity) = self.entity_mut(id) else {
            return false;
        };
        entity.physics = match (shape, entity.physics) {
            (Some(shape), Some(body)) => Some(PhysicsBody { shape, ..body }),
            (Some(shape), None) => Some(PhysicsBody {
                shape,
                motion: MotionMode::Dynamic,
            }),
            (None, _) => None,
        };
        true
    }

    fn dispose(&mut self, id: EntityId) -> bool {
        if !self.exists(id) {
            return false;
        }
        self.set_parent(id, None);
        let doomed = self.subtree(id);
        for e in &doomed {
            self.entities.remove(e);
        }
        self.order.retain(|e| !doomed.contains(e));
        self.touch();
        true
    }
}
