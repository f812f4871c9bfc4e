//! The forward sync engine: program graph mutations in, scene updates out.
//!
//! Events are handled strictly one at a time, in the order the host delivers
//! them, against the graph as it stands after the commit. Model loads and the
//! single material retry complete on [`SyncEngine::tick`].

use std::collections::{HashMap, HashSet};

use glam::Vec3;

use crate::asset_loader::{AssetLoader, LoadFailure, LoadedModel};
use crate::change_classifier::{ChangeClassifier, Classification};
use crate::config::SyncConfig;
use crate::entity_resolver::{EntityResolver, OwnerLookup};
use crate::geometry::{GeometryRebuilder, PrimitiveShape};
use crate::material_resolver::MaterialResolver;
use crate::mesh_asset::{MeshData, ModelRegistry};
use crate::model_replacer::ModelReplacer;
use crate::node_kind::{EnvironmentKind, NodeCategory, NodeKind, ObjectKind, MAP_FIELD, MODEL_FIELD};
use crate::primitives;
use crate::program::{GraphHost, MutationEvent, NodeId};
use crate::scene_graph::{EntityCapability, EntityId, Environment, SceneGraph};
use crate::sync_diagnostics::{DiagnosticLog, SyncDiagnostic, SyncIssueKind};
use crate::transform::TransformBaseline;

/// Terrain resolution of generated maps, in cells per side.
const MAP_RESOLUTION: u32 = 32;

/// Built-in terrain for map nodes.
pub fn map_mesh(name: &str, size: f32) -> Option<MeshData> {
    match name.trim().to_ascii_lowercase().as_str() {
        "flat" => Some(primitives::plane_mesh(size, size)),
        "hills" => Some(primitives::terrain_mesh(size, MAP_RESOLUTION, |x, z| {
            1.5 * (1.0 + (x * 0.25).sin() * (z * 0.25).cos())
        })),
        "dunes" => Some(primitives::terrain_mesh(size, MAP_RESOLUTION, |x, _| {
            0.6 * (1.0 + (x * 0.5).sin())
        })),
        _ => None,
    }
}

/// Asset name a model or character node asks for.
pub fn model_name(graph: &dyn GraphHost, node: NodeId) -> Option<String> {
    graph
        .node(node)?
        .field(MODEL_FIELD)?
        .as_text()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

pub struct SyncEngine {
    pub(crate) config: SyncConfig,
    pub(crate) classifier: ChangeClassifier,
    pub(crate) resolver: EntityResolver,
    pub(crate) models: ModelRegistry,
    pub(crate) loader: AssetLoader,
    pub(crate) replacer: ModelReplacer,
    pub(crate) geometry: GeometryRebuilder,
    pub(crate) materials: MaterialResolver,
    /// Scale baselines of model entities, captured on the first scale or resize.
    pub(crate) baselines: HashMap<NodeId, TransformBaseline>,
    pub(crate) diagnostics: DiagnosticLog,
    /// Node whose color the sky currently shows.
    pub(crate) sky_owner: Option<NodeId>,
    pub(crate) frame: u64,
}

impl SyncEngine {
    pub fn new(config: SyncConfig) -> Self {
        Self::with_models(config, ModelRegistry::with_builtins())
    }

    pub fn with_models(config: SyncConfig, models: ModelRegistry) -> Self {
        Self {
            classifier: ChangeClassifier::new(config.max_parent_depth),
            resolver: EntityResolver::new(config.max_parent_depth),
            models,
            loader: AssetLoader::new(),
            replacer: ModelReplacer::new(),
            geometry: GeometryRebuilder::new(),
            materials: MaterialResolver::new(config.random_seed, config.retry_frames),
            baselines: HashMap::new(),
            diagnostics: DiagnosticLog::new(config.max_diagnostics),
            sky_owner: None,
            frame: 0,
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    pub fn models_mut(&mut self) -> &mut ModelRegistry {
        &mut self.models
    }

    pub fn resolver(&self) -> &EntityResolver {
        &self.resolver
    }

    pub fn diagnostics(&self) -> &DiagnosticLog {
        &self.diagnostics
    }

    pub fn diagnostics_mut(&mut self) -> &mut DiagnosticLog {
        &mut self.diagnostics
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Whether any model load is still in flight.
    pub fn is_loading(&self) -> bool {
        !self.loader.is_idle()
    }

    /// The live root entity of `node`.
    pub fn entity_for(&self, scene: &SceneGraph, node: NodeId) -> Option<EntityId> {
        self.resolver.entity_for_node(scene, node)
    }

    /// The program node owning `entity`, recording a diagnostic when there is none.
    pub fn owner_of(&mut self, scene: &SceneGraph, entity: EntityId) -> Option<NodeId> {
        match self.resolver.owner_of(scene, entity) {
            Ok(node) => Some(node),
            Err(reason) => {
                let message = match reason {
                    OwnerLookup::Untagged => "no identity key on the parent chain",
                    OwnerLookup::Unowned => "identity key has no owning node",
                    OwnerLookup::TooDeep => "parent chain exceeds the depth bound",
                };
                self.diagnostics
                    .push(SyncDiagnostic::new(SyncIssueKind::MissingOwner, message).with_entity(entity));
                None
            }
        }
    }

    /// Classify one committed mutation and apply it to the scene.
    pub fn handle_event(
        &mut self,
        graph: &dyn GraphHost,
        scene: &mut SceneGraph,
        event: &MutationEvent,
    ) -> Classification {
        let classification = self.classifier.classify(graph, event);
        match &classification {
            Classification::Change(target) => {
                log::debug!("{:?} on {} -> {:?} of {}", event.kind, event.node, target.attribute, target.owner);
                self.dispatch(graph, scene, target);
            }
            Classification::Ambiguous(reason) => {
                self.diagnostics
                    .report(SyncIssueKind::AmbiguousChange, Some(event.node), reason.clone());
            }
            Classification::None => {
                log::trace!("{:?} on {} touches nothing tracked", event.kind, event.node);
            }
        }
        classification
    }

    /// Drain the host's outbox. Returns the number of events handled.
    pub fn pump(&mut self, graph: &mut dyn GraphHost, scene: &mut SceneGraph) -> usize {
        let mut handled = 0;
        while let Some(event) = graph.next_event() {
            self.handle_event(&*graph, scene, &event);
            handled += 1;
        }
        handled
    }

    /// Advance one frame: finish queued model loads, then run due retries.
    pub fn tick(&mut self, graph: &dyn GraphHost, scene: &mut SceneGraph) {
        self.frame += 1;
        for result in self.loader.poll(&self.models, scene) {
            match result {
                Ok(loaded) => self.complete_load(graph, scene, loaded),
                Err(failure) => self.fail_load(scene, failure),
            }
        }
        for node in self.materials.due_retries(self.frame) {
            log::debug!("retrying appearance of {node}");
            let entity = self.resolver.entity_for_node(scene, node);
            self.apply_appearance(graph, scene, node, entity);
            self.materials.finish_retry(node);
        }
    }

    /// Bring the scene in line with every node already in the graph:
    /// entities of vanished or disabled nodes go, missing ones are built.
    /// Returns the number of constructions started.
    pub fn rebuild_all(&mut self, graph: &dyn GraphHost, scene: &mut SceneGraph) -> usize {
        for node in self.resolver.registry().nodes() {
            if graph.node(node).map_or(true, |n| !n.enabled) {
                self.destroy(scene, node);
            }
        }

        let mut constructed = 0;
        let mut visited = HashSet::new();
        let mut stack: Vec<NodeId> = graph.top_level().into_iter().rev().collect();
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let Some(node) = graph.node(id) else {
                continue;
            };
            if node.shadow {
                continue;
            }
            let children = node.child_ids();
            if matches!(node.kind.category(), NodeCategory::Object(_) | NodeCategory::Environment(_)) {
                let before = self.resolver.registry().key_of(id).is_some();
                self.ensure_constructed(graph, scene, id);
                if !before && self.resolver.registry().key_of(id).is_some() {
                    constructed += 1;
                }
            }
            stack.extend(children.into_iter().rev());
        }
        log::info!("initial sync started {constructed} constructions");
        constructed
    }

    /// Build the entity of `node` unless it exists or is already being built.
    pub(crate) fn ensure_constructed(&mut self, graph: &dyn GraphHost, scene: &mut SceneGraph, node: NodeId) {
        let Some(program_node) = graph.node(node) else {
            return;
        };
        if !program_node.enabled || program_node.shadow {
            return;
        }
        let kind = program_node.kind;
        if self.resolver.registry().is_pending(node) || self.resolver.entity_for_node(scene, node).is_some() {
            return;
        }
        match kind.category() {
            NodeCategory::Object(ObjectKind::Primitive(_)) => self.construct_primitive(graph, scene, node, kind),
            NodeCategory::Object(_) => self.construct_model(graph, scene, node, kind),
            NodeCategory::Environment(EnvironmentKind::Sky) => self.apply_appearance(graph, scene, node, None),
            NodeCategory::Environment(_) => self.construct_environment(graph, scene, node, kind),
            _ => {}
        }
    }

    fn spawn_keyed(&mut self, scene: &mut SceneGraph, node: NodeId, kind: NodeKind) -> EntityId {
        let key = self.resolver.registry_mut().register(node);
        let entity = scene.spawn(&format!("{}_{}", kind.label(), node.0));
        scene.set_key(entity, Some(key));
        entity
    }

    fn construct_primitive(&mut self, graph: &dyn GraphHost, scene: &mut SceneGraph, node: NodeId, kind: NodeKind) {
        let Some((shape, missing)) = PrimitiveShape::read(graph, node, kind) else {
            return;
        };
        self.report_missing(node, &missing);
        let entity = self.spawn_keyed(scene, node, kind);
        self.geometry.build(scene, node, entity, &shape);
        log::debug!("constructed {} {} for {node}", kind.label(), entity.0);

        self.apply_appearance(graph, scene, node, Some(entity));
        self.apply_object_transform(graph, scene, node, entity);
        self.reconcile_physics(graph, scene, node, entity);
    }

    fn construct_model(&mut self, graph: &dyn GraphHost, scene: &mut SceneGraph, node: NodeId, kind: NodeKind) {
        let Some(model) = model_name(graph, node) else {
            self.diagnostics
                .report(SyncIssueKind::UnresolvedReference, Some(node), "no model name set");
            return;
        };
        let container = self.spawn_keyed(scene, node, kind);
        self.replacer
            .begin(scene, &mut self.loader, self.resolver.registry_mut(), node, container, &model);
    }

    fn construct_environment(&mut self, graph: &dyn GraphHost, scene: &mut SceneGraph, node: NodeId, kind: NodeKind) {
        let mesh = match kind.category() {
            NodeCategory::Environment(EnvironmentKind::Ground) => {
                primitives::plane_mesh(self.config.ground_size, self.config.ground_size)
            }
            NodeCategory::Environment(EnvironmentKind::Map) => self.map_for(graph, node),
            _ => return,
        };
        let entity = self.spawn_keyed(scene, node, kind);
        scene.set_mesh(entity, mesh);
        log::debug!("constructed {} {} for {node}", kind.label(), entity.0);

        self.apply_appearance(graph, scene, node, Some(entity));
        self.reconcile_physics(graph, scene, node, entity);
    }

    /// Terrain a map node names, flat when the name is unknown.
    pub(crate) fn map_for(&mut self, graph: &dyn GraphHost, node: NodeId) -> MeshData {
        let size = self.config.ground_size;
        let name = graph
            .node(node)
            .and_then(|n| n.field(MAP_FIELD))
            .and_then(|v| v.as_text())
            .unwrap_or_default()
            .to_string();
        map_mesh(&name, size).unwrap_or_else(|| {
            self.diagnostics.report(
                SyncIssueKind::UnresolvedReference,
                Some(node),
                format!("unknown map '{name}'; using flat ground"),
            );
            primitives::plane_mesh(size, size)
        })
    }

    /// Tear down everything held for `node`: entity, identity, baselines,
    /// pending loads and retries.
    pub(crate) fn destroy(&mut self, scene: &mut SceneGraph, node: NodeId) {
        if let Some(swap) = self.replacer.cancel_node(&mut self.loader, node) {
            log::debug!("cancelled load of '{}' for {node}", swap.model);
        }
        if let Some(entity) = self.resolver.entity_for_node(scene, node) {
            scene.dispose(entity);
            log::debug!("disposed entity {} of {node}", entity.0);
        }
        self.resolver.registry_mut().unregister(node);
        self.geometry.forget(node);
        self.baselines.remove(&node);
        self.materials.cancel_retry(node);
        if self.sky_owner == Some(node) {
            self.sky_owner = None;
            scene.set_sky_color(Environment::default().sky_color);
        }
    }

    fn complete_load(&mut self, graph: &dyn GraphHost, scene: &mut SceneGraph, loaded: LoadedModel) {
        let Some(swap) = self.replacer.take(loaded.ticket) else {
            log::debug!("discarding load {} nobody waits for", loaded.ticket.0);
            scene.dispose(loaded.wrapper);
            return;
        };
        let node = swap.node;
        let alive = graph.node(node).is_some_and(|n| n.enabled) && scene.exists(swap.container);
        if !alive {
            self.diagnostics.push(
                SyncDiagnostic::new(
                    SyncIssueKind::StaleEntity,
                    format!("'{}' finished loading after its entity went away", swap.model),
                )
                .with_node(node),
            );
            scene.dispose(loaded.wrapper);
            self.resolver.registry_mut().clear_pending(node);
            return;
        }
        if model_name(graph, node).as_deref() != Some(swap.model.as_str()) {
            self.diagnostics.report(
                SyncIssueKind::StaleEntity,
                Some(node),
                format!("'{}' finished loading but the node names another model", swap.model),
            );
            scene.dispose(loaded.wrapper);
            self.resolver.registry_mut().clear_pending(node);
            scene.set_visible_recursive(swap.container, true);
            self.replace_model(graph, scene, node, Some(swap.container));
            return;
        }

        let result = self.replacer.finish(scene, &swap, loaded);
        self.resolver.registry_mut().clear_pending(node);
        if let Some(baseline) = self.baselines.get_mut(&node) {
            if let Some(bounds) = scene.local_bounds(result.root) {
                baseline.extents = bounds.size() * baseline.unit_scale;
            }
        }
        log::info!(
            "{} '{}' for {node}",
            if result.replaced { "swapped in" } else { "loaded" },
            swap.model
        );

        let container = Some(result.container);
        self.apply_appearance(graph, scene, node, container);
        self.apply_object_transform(graph, scene, node, result.container);
        self.reconcile_physics(graph, scene, node, result.container);
    }

    fn fail_load(&mut self, scene: &mut SceneGraph, failure: LoadFailure) {
        let Some(swap) = self.replacer.take(failure.ticket) else {
            return;
        };
        let node = swap.node;
        self.resolver.registry_mut().clear_pending(node);
        self.diagnostics
            .report(SyncIssueKind::UnresolvedReference, Some(node), failure.error.to_string());
        if swap.prior_children.is_empty() {
            // Nothing was ever shown for this node.
            scene.dispose(swap.container);
            self.resolver.registry_mut().unregister(node);
        } else {
            scene.set_visible_recursive(swap.container, true);
        }
    }

    pub(crate) fn report_missing(&mut self, node: NodeId, missing: &[&str]) {
        for input in missing {
            self.diagnostics.report(
                SyncIssueKind::UnresolvedReference,
                Some(node),
                format!("{input} carries no number; using its default"),
            );
        }
    }

    /// Capture the scale baseline of a model's renderable root once.
    pub(crate) fn capture_baseline(&mut self, scene: &SceneGraph, node: NodeId, root: EntityId) -> Option<TransformBaseline> {
        if let Some(baseline) = self.baselines.get(&node) {
            return Some(*baseline);
        }
        let unit_scale = scene.get(root)?.transform.scale;
        let extents = scene
            .local_bounds(root)
            .map(|b| b.size() * unit_scale)
            .unwrap_or(Vec3::ZERO);
        let baseline = TransformBaseline { extents, unit_scale };
        self.baselines.insert(node, baseline);
        Some(baseline)
    }
}
