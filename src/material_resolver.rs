//! Color and material resolution.
//!
//! An appearance input resolves to a bare color, a color list, or a composite
//! material. A connected node always wins; with nothing connected the shadow's
//! stored value is used, so disconnecting reverts cleanly. Random colors are
//! drawn once per resolve. A material whose base color cannot be read yet is
//! retried exactly once on a later frame, guarded by a per-node in-flight flag.

use std::collections::{BTreeMap, HashMap, HashSet};

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::color::Color;
use crate::node_kind::{NodeKind, ShadowDefault, COLOR_FIELD, TEXTURE_FIELD};
use crate::program::{input_source, number_input, GraphHost, NodeId};
use crate::scene_graph::{AppliedMaterial, EntityCapability, EntityId, SceneGraph};

/// Maximum nesting of lists inside lists.
const MAX_VALUE_DEPTH: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Single(Color),
    List(Vec<Color>),
    Material {
        texture_set: Option<String>,
        base: Vec<Color>,
        alpha: f32,
    },
}

impl Resolution {
    /// Colors in assignment order.
    pub fn colors(&self) -> Vec<Color> {
        match self {
            Resolution::Single(c) => vec![*c],
            Resolution::List(colors) => colors.clone(),
            Resolution::Material { base, .. } => base.clone(),
        }
    }

    pub fn first_color(&self) -> Option<Color> {
        self.colors().first().copied()
    }

    /// Material applied to a piece colored with `color`.
    pub fn material_with(&self, color: Color) -> AppliedMaterial {
        match self {
            Resolution::Material { texture_set, alpha, .. } => AppliedMaterial {
                color,
                alpha: *alpha,
                texture_set: texture_set.clone(),
            },
            _ => AppliedMaterial::solid(color),
        }
    }

    /// Material for single-mesh entities.
    pub fn primary_material(&self) -> Option<AppliedMaterial> {
        self.first_color().map(|c| self.material_with(c))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolveIssue {
    /// Nothing usable is connected; the caller substitutes a default.
    Unresolved(String),
    /// A sub-node exists but is not readable yet.
    Unready(String),
}

/// Declared default color of `input` on `kind`.
pub fn default_color(kind: NodeKind, input: &str) -> Option<Color> {
    match kind.slot_template(input)?.shadow {
        ShadowDefault::Color(hex) => Color::from_hex(hex),
        ShadowDefault::Number(_) => None,
    }
}

/// Value inputs of a color list in numeric order (`ADD0`, `ADD1`, ... `ADD10`).
fn list_inputs(graph: &dyn GraphHost, node: NodeId) -> Vec<String> {
    let Some(list) = graph.node(node) else {
        return Vec::new();
    };
    let mut inputs: Vec<(u32, String)> = list
        .inputs
        .keys()
        .map(|name| {
            let index = name.trim_start_matches(|c: char| !c.is_ascii_digit()).parse().unwrap_or(u32::MAX);
            (index, name.clone())
        })
        .collect();
    inputs.sort();
    inputs.into_iter().map(|(_, name)| name).collect()
}

#[derive(Debug, Default)]
struct RetryQueue {
    /// Node to frame its retry is due on.
    in_flight: HashMap<NodeId, u64>,
    /// Nodes whose single retry is running right now.
    retrying: HashSet<NodeId>,
}

pub struct MaterialResolver {
    rng: StdRng,
    retries: RetryQueue,
    retry_frames: u64,
}

impl MaterialResolver {
    pub fn new(seed: Option<u64>, retry_frames: u32) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            retries: RetryQueue::default(),
            retry_frames: u64::from(retry_frames.max(1)),
        }
    }

    /// Resolve whatever feeds `input` of `node`.
    pub fn resolve_input(&mut self, graph: &dyn GraphHost, node: NodeId, input: &str) -> Result<Resolution, ResolveIssue> {
        match input_source(graph, node, input) {
            Some(source) => self.resolve_value(graph, source, 0),
            None => Err(ResolveIssue::Unresolved(format!("{node}.{input} has nothing connected"))),
        }
    }

    /// Resolve a value node.
    pub fn resolve_value(&mut self, graph: &dyn GraphHost, value: NodeId, depth: usize) -> Result<Resolution, ResolveIssue> {
        let Some(node) = graph.node(value) else {
            return Err(ResolveIssue::Unresolved(format!("value node {value} is missing")));
        };
        if depth > MAX_VALUE_DEPTH {
            return Err(ResolveIssue::Unresolved(format!("value chain at {value} is too deep")));
        }
        match node.kind {
            NodeKind::Color => {
                let hex = node.field(COLOR_FIELD).and_then(|v| v.as_text()).unwrap_or_default();
                Color::from_hex(hex)
                    .map(Resolution::Single)
                    .ok_or_else(|| ResolveIssue::Unresolved(format!("{value} holds an invalid color '{hex}'")))
            }
            NodeKind::RandomColor => Ok(Resolution::Single(Color::random(&mut self.rng))),
            NodeKind::ColorList => {
                let mut colors = Vec::new();
                for input in list_inputs(graph, value) {
                    let Some(item) = input_source(graph, value, &input) else {
                        continue;
                    };
                    match self.resolve_value(graph, item, depth + 1) {
                        Ok(resolution) => colors.extend(resolution.colors()),
                        Err(ResolveIssue::Unresolved(reason)) => log::debug!("skipping list item: {reason}"),
                        Err(unready) => return Err(unready),
                    }
                }
                if colors.is_empty() {
                    Err(ResolveIssue::Unresolved(format!("color list {value} is empty")))
                } else {
                    Ok(Resolution::List(colors))
                }
            }
            NodeKind::Material => {
                let Some(base_source) = input_source(graph, value, "BASE_COLOR") else {
                    return Err(ResolveIssue::Unready(format!("material {value} has no base color yet")));
                };
                let base = match self.resolve_value(graph, base_source, depth + 1)? {
                    Resolution::Material { base, .. } => base,
                    other => other.colors(),
                };
                let texture_set = node
                    .field(TEXTURE_FIELD)
                    .and_then(|v| v.as_text())
                    .filter(|t| !t.is_empty() && *t != "none")
                    .map(str::to_string);
                let alpha = number_input(graph, value, "ALPHA").unwrap_or(1.0).clamp(0.0, 1.0) as f32;
                Ok(Resolution::Material {
                    texture_set,
                    base,
                    alpha,
                })
            }
            other => Err(ResolveIssue::Unresolved(format!(
                "{value} is a {} node, not a color",
                other.label()
            ))),
        }
    }

    /// Ask for one retry of `node` on a later frame. Returns false if one is
    /// already in flight, or if this resolve *is* the retry.
    pub fn schedule_retry(&mut self, node: NodeId, frame: u64) -> bool {
        if self.retries.retrying.contains(&node) || self.retries.in_flight.contains_key(&node) {
            return false;
        }
        self.retries.in_flight.insert(node, frame + self.retry_frames);
        true
    }

    /// Nodes whose retry is due at `frame`. They stay marked as retrying
    /// until [`MaterialResolver::finish_retry`].
    pub fn due_retries(&mut self, frame: u64) -> Vec<NodeId> {
        let mut due: Vec<NodeId> = self
            .retries
            .in_flight
            .iter()
            .filter(|(_, at)| **at <= frame)
            .map(|(node, _)| *node)
            .collect();
        due.sort();
        for node in &due {
            self.retries.in_flight.remove(node);
            self.retries.retrying.insert(*node);
        }
        due
    }

    pub fn finish_retry(&mut self, node: NodeId) {
        self.retries.retrying.remove(&node);
    }

    pub fn cancel_retry(&mut self, node: NodeId) {
        self.retries.in_flight.remove(&node);
        self.retries.retrying.remove(&node);
    }

    pub fn retry_pending(&self, node: NodeId) -> bool {
        self.retries.in_flight.contains_key(&node)
    }
}

/// Mesh-bearing pieces under `root`, ordered by part name for stable color
/// assignment.
pub fn ordered_parts(scene: &SceneGraph, root: EntityId) -> Vec<(String, EntityId)> {
    let mut parts: Vec<(String, EntityId)> = scene
        .subtree(root)
        .into_iter()
        .filter_map(|id| {
            let entity = scene.get(id)?;
            entity.mesh.as_ref()?;
            let name = entity.part.clone().unwrap_or_else(|| entity.name.clone());
            Some((name, id))
        })
        .collect();
    parts.sort();
    parts
}

/// Apply a resolution to every piece under `root`. A list assigns one color
/// per piece in part-name order, cycling when it runs short.
pub fn apply_resolution(scene: &mut SceneGraph, root: EntityId, resolution: &Resolution) -> usize {
    let colors = resolution.colors();
    if colors.is_empty() {
        return 0;
    }
    let parts = ordered_parts(scene, root);
    for (i, (_, id)) in parts.iter().enumerate() {
        let color = colors[i % colors.len()];
        scene.apply_material(*id, resolution.material_with(color));
    }
    parts.len()
}

/// Color the pieces whose part name matches `part` (case-insensitive).
pub fn apply_to_part(scene: &mut SceneGraph, root: EntityId, part: &str, material: &AppliedMaterial) -> usize {
    let targets: Vec<EntityId> = scene
        .subtree(root)
        .into_iter()
        .filter(|id| {
            scene
                .get(*id)
                .and_then(|e| e.part.as_deref())
                .is_some_and(|p| p.eq_ignore_ascii_case(part))
        })
        .collect();
    for id in &targets {
        scene.apply_material(*id, material.clone());
    }
    targets.len()
}

/// Current material of every named part under `root`.
pub fn extract_palette(scene: &SceneGraph, root: EntityId) -> BTreeMap<String, AppliedMaterial> {
    scene
        .subtree(root)
        .into_iter()
        .filter_map(|id| {
            let entity = scene.get(id)?;
            Some((entity.part.clone()?, entity.material.clone()?))
        })
        .collect()
}

pub fn apply_palette(scene: &mut SceneGraph, root: EntityId, palette: &BTreeMap<String, AppliedMaterial>) -> usize {
    palette
        .iter()
        .map(|(part, material)| apply_to_part(scene, root, part, material))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{FieldValue, ProgramGraph};
    use crate::primitives;

    fn color_node(graph: &mut ProgramGraph, hex: &str) -> NodeId {
        let id = graph.add_node(NodeKind::Color);
        graph.edit_field(id, COLOR_FIELD, FieldValue::from(hex)).unwrap();
        id
    }

    #[test]
    fn connected_value_wins_and_shadow_is_the_fallback() {
        let mut graph = ProgramGraph::new();
        let cube = graph.add_node_with_shadows(NodeKind::CreateBox);
        let mut resolver = MaterialResolver::new(Some(1), 1);
        let purple = Color::from_hex("#9932cc").unwrap();
        assert_eq!(resolver.resolve_input(&graph, cube, "COLOR"), Ok(Resolution::Single(purple)));

        let red = color_node(&mut graph, "#ff0000");
        graph.attach(cube, "COLOR", red).unwrap();
        assert_eq!(
            resolver.resolve_input(&graph, cube, "COLOR"),
            Ok(Resolution::Single(Color::new(1.0, 0.0, 0.0)))
        );

        graph.detach(red).unwrap();
        assert_eq!(resolver.resolve_input(&graph, cube, "COLOR"), Ok(Resolution::Single(purple)));
    }

    #[test]
    fn list_items_resolve_in_numeric_order() {
        let mut graph = ProgramGraph::new();
        let list = graph.add_node(NodeKind::ColorList);
        let hexes = ["#000001", "#000002", "#000003"];
        for (i, hex) in hexes.iter().enumerate().rev() {
            let c = color_node(&mut graph, hex);
            graph.attach(list, &format!("ADD{i}"), c).unwrap();
        }
        let mut resolver = MaterialResolver::new(Some(1), 1);
        let colors = resolver.resolve_value(&graph, list, 0).unwrap().colors();
        let got: Vec<String> = colors.iter().map(Color::to_hex).collect();
        assert_eq!(got, hexes);
    }

    #[test]
    fn material_without_base_color_is_unready() {
        let mut graph = ProgramGraph::new();
        let material = graph.add_node(NodeKind::Material);
        let mut resolver = MaterialResolver::new(Some(1), 1);
        assert!(matches!(
            resolver.resolve_value(&graph, material, 0),
            Err(ResolveIssue::Unready(_))
        ));
    }

    #[test]
    fn material_carries_texture_and_alpha() {
        let mut graph = ProgramGraph::new();
        let material = graph.add_node_with_shadows(NodeKind::Material);
        graph.edit_field(material, TEXTURE_FIELD, FieldValue::from("bricks")).unwrap();
        let mut resolver = MaterialResolver::new(Some(1), 1);
        match resolver.resolve_value(&graph, material, 0).unwrap() {
            Resolution::Material { texture_set, base, alpha } => {
                assert_eq!(texture_set.as_deref(), Some("bricks"));
                assert_eq!(base, vec![Color::WHITE]);
                assert_eq!(alpha, 1.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn retry_is_scheduled_once() {
        let mut resolver = MaterialResolver::new(Some(1), 1);
        assert!(resolver.schedule_retry(NodeId(1), 10));
        assert!(!resolver.schedule_retry(NodeId(1), 10));
        assert!(resolver.due_retries(10).is_empty());
        assert_eq!(resolver.due_retries(11), vec![NodeId(1)]);
        // While the retry runs, a second failure does not queue another.
        assert!(!resolver.schedule_retry(NodeId(1), 11));
        resolver.finish_retry(NodeId(1));
        assert!(resolver.schedule_retry(NodeId(1), 12));
    }

    #[test]
    fn list_assignment_is_alphabetical_and_cycles() {
        let mut scene = SceneGraph::new();
        let root = scene.spawn("root");
        for name in ["c", "a", "b"] {
            let part = scene.spawn_child(root, name);
            scene.set_part(part, Some(name.to_string()));
            scene.set_mesh(part, primitives::box_mesh(1.0, 1.0, 1.0));
        }
        let red = Color::new(1.0, 0.0, 0.0);
        let blue = Color::new(0.0, 0.0, 1.0);
        apply_resolution(&mut scene, root, &Resolution::List(vec![red, blue]));

        let palette = extract_palette(&scene, root);
        assert_eq!(palette["a"].color, red);
        assert_eq!(palette["b"].color, blue);
        assert_eq!(palette["c"].color, red);
    }
}
