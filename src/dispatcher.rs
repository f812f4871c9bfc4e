//! Routing classified changes to handlers.
//!
//! Construction and destruction are decided first. Everything else runs the
//! fixed handler sequence [`handler_plan`] returns for the node's category and
//! the attribute's role, always in the order replace, rebuild, appearance,
//! transform, physics. A model reference change never also rebuilds geometry
//! in the same dispatch; the replacement re-anchors itself when it lands.

use glam::Vec3;

use crate::change_classifier::{ChangeAttribute, ChangeTarget};
use crate::geometry::{physics_shape_for, PrimitiveShape};
use crate::material_resolver::{apply_resolution, apply_to_part, default_color, Resolution, ResolveIssue};
use crate::node_kind::{AttributeRole, EnvironmentKind, NodeCategory, NodeKind, ObjectKind, PrimitiveKind, CHARACTER_PARTS};
use crate::program::{input_source, GraphHost, NodeId};
use crate::scene_graph::{EntityCapability, EntityId, MotionMode, PhysicsBody, SceneGraph};
use crate::sync::{model_name, SyncEngine};
use crate::sync_diagnostics::{SyncDiagnostic, SyncIssueKind};
use crate::transform::{apply_placement, read_placement, PlacementTarget, TransformBaseline};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    Replace,
    Rebuild,
    Appearance,
    Transform,
    Physics,
}

/// Handlers a change of `role` on a node of `category` runs, in order.
pub fn handler_plan(category: NodeCategory, role: AttributeRole) -> &'static [Handler] {
    use AttributeRole::*;
    use Handler::*;
    match (category, role) {
        (NodeCategory::Environment(EnvironmentKind::Map), ModelRef) => &[Rebuild, Physics],
        (NodeCategory::Environment(_), AttributeRole::Appearance) => &[Handler::Appearance],
        (NodeCategory::Environment(_), _) => &[],
        (NodeCategory::Object(_), ModelRef) => &[Replace],
        (NodeCategory::Object(_), Dimension | Tessellation) => &[Rebuild, Handler::Transform, Physics],
        (NodeCategory::Object(_), AttributeRole::Appearance) => &[Handler::Appearance],
        (NodeCategory::Object(_), Position) => &[Handler::Transform],
        (NodeCategory::Object(_), Scale | Children | TransformParam) => &[Handler::Transform, Physics],
        _ => &[],
    }
}

impl SyncEngine {
    pub(crate) fn dispatch(&mut self, graph: &dyn GraphHost, scene: &mut SceneGraph, target: &ChangeTarget) {
        let owner = target.owner;
        let role = match &target.attribute {
            ChangeAttribute::Deleted | ChangeAttribute::Toggled { enabled: false } => {
                self.destroy(scene, owner);
                return;
            }
            ChangeAttribute::Created | ChangeAttribute::Toggled { enabled: true } => {
                self.ensure_constructed(graph, scene, owner);
                return;
            }
            ChangeAttribute::Role { role, .. } => *role,
        };

        let Some(node) = graph.node(owner) else {
            self.diagnostics
                .report(SyncIssueKind::StaleEntity, Some(owner), "owner vanished before dispatch");
            return;
        };
        if !node.enabled {
            log::trace!("{owner} is disabled; ignoring {role:?}");
            return;
        }
        let category = node.kind.category();

        let entity = match self.resolver.entity_for_node(scene, owner) {
            Some(entity) => Some(entity),
            // The sky is environment state without an entity of its own.
            None if category == NodeCategory::Environment(EnvironmentKind::Sky) => None,
            None => {
                self.ensure_constructed(graph, scene, owner);
                return;
            }
        };
        if self.resolver.registry().is_pending(owner) && role != AttributeRole::ModelRef {
            log::debug!("{owner} is still loading; {role:?} waits for completion");
            return;
        }

        for handler in handler_plan(category, role) {
            if let Some(id) = entity {
                if !scene.exists(id) {
                    self.diagnostics.push(
                        SyncDiagnostic::new(SyncIssueKind::StaleEntity, format!("entity gone before {handler:?}"))
                            .with_node(owner)
                            .with_entity(id),
                    );
                    return;
                }
            }
            match handler {
                Handler::Replace => self.replace_model(graph, scene, owner, entity),
                Handler::Rebuild => self.rebuild_geometry(graph, scene, owner, entity),
                Handler::Appearance => self.apply_appearance(graph, scene, owner, entity),
                Handler::Transform => {
                    if let Some(id) = entity {
                        self.apply_object_transform(graph, scene, owner, id);
                    }
                }
                Handler::Physics => {
                    if let Some(id) = entity {
                        self.reconcile_physics(graph, scene, owner, id);
                    }
                }
            }
        }
    }

    /// Start swapping the asset of a model or character to the one its node names.
    pub(crate) fn replace_model(
        &mut self,
        graph: &dyn GraphHost,
        scene: &mut SceneGraph,
        node: NodeId,
        container: Option<EntityId>,
    ) {
        let Some(container) = container else {
            return;
        };
        let Some(model) = model_name(graph, node) else {
            self.diagnostics
                .report(SyncIssueKind::UnresolvedReference, Some(node), "no model name set");
            return;
        };
        let unchanged = match self.replacer.pending_model(node) {
            Some(loading) => loading == model,
            None => scene
                .get(container)
                .and_then(|c| c.children.first())
                .and_then(|root| scene.get(*root))
                .is_some_and(|root| root.name == model),
        };
        if unchanged {
            log::trace!("{node} already shows '{model}'");
            return;
        }
        self.replacer
            .begin(scene, &mut self.loader, self.resolver.registry_mut(), node, container, &model);
    }

    pub(crate) fn rebuild_geometry(
        &mut self,
        graph: &dyn GraphHost,
        scene: &mut SceneGraph,
        node: NodeId,
        entity: Option<EntityId>,
    ) {
        let (Some(entity), Some(kind)) = (entity, graph.node(node).map(|n| n.kind)) else {
            return;
        };
        match kind.category() {
            NodeCategory::Object(ObjectKind::Primitive(_)) => {
                let Some((shape, missing)) = PrimitiveShape::read(graph, node, kind) else {
                    return;
                };
                self.report_missing(node, &missing);
                if self.geometry.rebuild(scene, node, entity, &shape) {
                    log::debug!("rebuilt {} of {node} at {:?}", kind.label(), shape.extents());
                }
            }
            NodeCategory::Environment(EnvironmentKind::Map) => {
                let mesh = self.map_for(graph, node);
                scene.set_mesh(entity, mesh);
            }
            _ => {}
        }
    }

    fn resolve_appearance(
        &mut self,
        graph: &dyn GraphHost,
        node: NodeId,
        kind: NodeKind,
        input: &str,
    ) -> Option<Resolution> {
        match self.materials.resolve_input(graph, node, input) {
            Ok(resolution) => Some(resolution),
            Err(ResolveIssue::Unresolved(reason)) => {
                let fallback = default_color(kind, input);
                let message = match fallback {
                    Some(color) => format!("{reason}; using {}", color.to_hex()),
                    None => reason,
                };
                self.diagnostics
                    .report(SyncIssueKind::UnresolvedReference, Some(node), message);
                fallback.map(Resolution::Single)
            }
            Err(ResolveIssue::Unready(reason)) => {
                let outcome = if self.materials.schedule_retry(node, self.frame) {
                    "retrying on a later frame"
                } else if self.materials.retry_pending(node) {
                    "retry already scheduled"
                } else {
                    "giving up"
                };
                self.diagnostics
                    .report(SyncIssueKind::TransientUnready, Some(node), format!("{reason}; {outcome}"));
                None
            }
        }
    }

    pub(crate) fn apply_appearance(
        &mut self,
        graph: &dyn GraphHost,
        scene: &mut SceneGraph,
        node: NodeId,
        entity: Option<EntityId>,
    ) {
        let Some(kind) = graph.node(node).map(|n| n.kind) else {
            return;
        };
        match (kind.category(), entity) {
            (NodeCategory::Environment(EnvironmentKind::Sky), _) => {
                let color = self
                    .resolve_appearance(graph, node, kind, "COLOR")
                    .and_then(|r| r.first_color());
                if let Some(color) = color {
                    scene.set_sky_color(color);
                    self.sky_owner = Some(node);
                }
            }
            (NodeCategory::Object(ObjectKind::Character), Some(entity)) => {
                for (input, part) in CHARACTER_PARTS {
                    let material = self
                        .resolve_appearance(graph, node, kind, input)
                        .and_then(|r| r.primary_material());
                    if let Some(material) = material {
                        apply_to_part(scene, entity, part, &material);
                    }
                }
            }
            (NodeCategory::Object(ObjectKind::Model), Some(entity)) => {
                // Unbound models keep their native part colors.
                if input_source(graph, node, "COLOR").is_none() {
                    return;
                }
                if let Some(resolution) = self.resolve_appearance(graph, node, kind, "COLOR") {
                    apply_resolution(scene, entity, &resolution);
                }
            }
            (NodeCategory::Environment(EnvironmentKind::Map), Some(entity)) => {
                if input_source(graph, node, "MATERIAL").is_none() {
                    return;
                }
                let material = self
                    .resolve_appearance(graph, node, kind, "MATERIAL")
                    .and_then(|r| r.primary_material());
                if let Some(material) = material {
                    scene.apply_material(entity, material);
                }
            }
            (NodeCategory::Object(ObjectKind::Primitive(_)), Some(entity))
            | (NodeCategory::Environment(EnvironmentKind::Ground), Some(entity)) => {
                let material = self
                    .resolve_appearance(graph, node, kind, "COLOR")
                    .and_then(|r| r.primary_material());
                if let Some(material) = material {
                    scene.apply_material(entity, material);
                }
            }
            _ => {}
        }
    }

    /// Recompute the entity's transform from the node's position inputs and
    /// its child instructions.
    pub(crate) fn apply_object_transform(
        &mut self,
        graph: &dyn GraphHost,
        scene: &mut SceneGraph,
        node: NodeId,
        entity: EntityId,
    ) -> bool {
        let Some(kind) = graph.node(node).map(|n| n.kind) else {
            return false;
        };
        let placement = read_placement(graph, node);
        match kind.category() {
            NodeCategory::Object(ObjectKind::Primitive(_)) => {
                // Rebuilt geometry is always at unit scale, so the mesh itself
                // is the baseline.
                let baseline = scene
                    .get(entity)
                    .and_then(|e| e.mesh.as_ref())
                    .and_then(|m| m.bounds())
                    .map(|b| TransformBaseline {
                        extents: b.size(),
                        unit_scale: Vec3::ONE,
                    });
                let target = PlacementTarget {
                    anchor: entity,
                    scaled: entity,
                };
                apply_placement(scene, target, &placement, Vec3::ONE, baseline.as_ref())
            }
            NodeCategory::Object(_) => {
                let Some(root) = scene.get(entity).and_then(|e| e.children.first().copied()) else {
                    let target = PlacementTarget {
                        anchor: entity,
                        scaled: entity,
                    };
                    return apply_placement(scene, target, &placement, Vec3::ONE, None);
                };
                let scaled = (placement.scale - 1.0).abs() > f32::EPSILON || placement.resize.is_some();
                let baseline = if scaled {
                    self.capture_baseline(scene, node, root)
                } else {
                    self.baselines.get(&node).copied()
                };
                let base_scale = match &baseline {
                    Some(baseline) => baseline.unit_scale * placement.scale,
                    None => scene.get(root).map(|e| e.transform.scale).unwrap_or(Vec3::ONE),
                };
                let target = PlacementTarget { anchor: entity, scaled: root };
                apply_placement(scene, target, &placement, base_scale, baseline.as_ref())
            }
            _ => false,
        }
    }

    /// Fit the collision shape to the entity's current geometry.
    pub(crate) fn reconcile_physics(
        &mut self,
        graph: &dyn GraphHost,
        scene: &mut SceneGraph,
        node: NodeId,
        entity: EntityId,
    ) -> bool {
        let Some(kind) = graph.node(node).map(|n| n.kind) else {
            return false;
        };
        match kind.category() {
            NodeCategory::Object(ObjectKind::Primitive(primitive)) => {
                self.geometry.reconcile_physics(scene, entity, Some(primitive))
            }
            NodeCategory::Object(_) => {
                // The container keeps its unit scale; the root carries the scale.
                let Some(bounds) = scene.local_bounds(entity) else {
                    return false;
                };
                scene.apply_physics_shape(entity, Some(physics_shape_for(None, &bounds)))
            }
            NodeCategory::Environment(EnvironmentKind::Ground | EnvironmentKind::Map) => {
                let Some(bounds) = scene.local_bounds(entity) else {
                    return false;
                };
                scene.set_physics(
                    entity,
                    Some(PhysicsBody {
                        shape: physics_shape_for(Some(PrimitiveKind::Plane), &bounds),
                        motion: MotionMode::Static,
                    }),
                )
            }
            _ => false,
        }
    }
}
