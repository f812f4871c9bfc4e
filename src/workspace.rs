//! A program graph, its scene and the engines keeping them in sync, driven by
//! scripted steps.
//!
//! This is what the `replay` command runs. Steps refer to nodes by names the
//! script binds on creation, so a replay file never depends on node ids.

use std::collections::HashMap;

use anyhow::{anyhow, bail, Context, Result};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::config::SyncConfig;
use crate::node_kind::{NodeKind, COLOR_FIELD, NUMBER_FIELD, TEXT_FIELD};
use crate::program::{input_source, FieldValue, GraphHost, NodeId, ProgramGraph};
use crate::reverse_sync::{GizmoMode, InputEvent, Key, Outcome, ReverseSyncController};
use crate::scene_graph::{EntityCapability, MotionMode, SceneGraph};
use crate::sync::SyncEngine;
use crate::sync_diagnostics::SyncDiagnostic;
use crate::transform::rotation_from_degrees;

fn yes() -> bool {
    true
}

fn one() -> u32 {
    1
}

/// One scripted edit or gesture.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Create {
        kind: NodeKind,
        #[serde(default)]
        name: Option<String>,
        #[serde(default = "yes")]
        shadows: bool,
    },
    /// Write a field of the node itself.
    Set {
        node: String,
        field: String,
        value: FieldValue,
    },
    /// Write the value of whatever currently feeds an input.
    SetInput {
        node: String,
        input: String,
        value: FieldValue,
    },
    Connect {
        parent: String,
        input: String,
        child: String,
    },
    Detach {
        node: String,
    },
    Delete {
        node: String,
    },
    Toggle {
        node: String,
        enabled: bool,
    },
    /// Placement session: optional reticle keys, then a click or a confirm.
    Place {
        kind: NodeKind,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        keys: Vec<Key>,
        #[serde(default)]
        screen: Option<[f32; 2]>,
    },
    /// Color pick session, resolved the same way as a placement.
    Pick {
        color: String,
        #[serde(default)]
        keys: Vec<Key>,
        #[serde(default)]
        screen: Option<[f32; 2]>,
    },
    /// Gizmo drag of a node's entity to an absolute transform.
    Drag {
        node: String,
        mode: GizmoMode,
        #[serde(default)]
        translation: Option<[f32; 3]>,
        /// Euler degrees.
        #[serde(default)]
        rotation: Option<[f32; 3]>,
        #[serde(default)]
        scale: Option<[f32; 3]>,
    },
    Undo,
    Redo,
    Tick {
        #[serde(default = "one")]
        frames: u32,
    },
    /// Reconcile the whole scene with the graph.
    Sync,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntitySummary {
    pub node: Option<NodeId>,
    pub name: String,
    pub position: [f32; 3],
    pub size: Option<[f32; 3]>,
    pub color: Option<String>,
    pub visible: bool,
    pub motion: Option<MotionMode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SceneSummary {
    pub nodes: usize,
    pub entities: Vec<EntitySummary>,
    pub sky: String,
    pub outcomes: Vec<Outcome>,
    pub diagnostics: Vec<SyncDiagnostic>,
}

pub struct Workspace {
    pub graph: ProgramGraph,
    pub scene: SceneGraph,
    pub engine: SyncEngine,
    pub controller: ReverseSyncController,
    names: HashMap<String, NodeId>,
    outcomes: Vec<Outcome>,
}

impl Workspace {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            controller: ReverseSyncController::new(config.nudge_step),
            graph: ProgramGraph::new(),
            scene: SceneGraph::new(),
            engine: SyncEngine::new(config),
            names: HashMap::new(),
            outcomes: Vec::new(),
        }
    }

    /// Parse a JSON array of steps.
    pub fn parse_steps(json: &str) -> Result<Vec<Step>> {
        serde_json::from_str(json).context("invalid replay steps")
    }

    /// Node bound to `name` by an earlier step.
    pub fn node(&self, name: &str) -> Result<NodeId> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("no node named '{name}'"))
    }

    fn bind(&mut self, name: Option<String>, node: NodeId) {
        if let Some(name) = name {
            self.names.insert(name, node);
        }
    }

    /// Deliver pending graph events to the engine.
    pub fn pump(&mut self) -> usize {
        self.engine.pump(&mut self.graph, &mut self.scene)
    }

    pub fn tick(&mut self) {
        self.engine.tick(&self.graph, &mut self.scene);
    }

    /// Run every step in order.
    pub fn run(&mut self, steps: &[Step]) -> Result<()> {
        for (index, step) in steps.iter().enumerate() {
            self.apply(step)
                .with_context(|| format!("step {} ({step:?}) failed", index + 1))?;
        }
        Ok(())
    }

    pub fn apply(&mut self, step: &Step) -> Result<()> {
        log::debug!("replaying {step:?}");
        match step {
            Step::Create { kind, name, shadows } => {
                let node = if *shadows {
                    self.graph.add_node_with_shadows(*kind)
                } else {
                    self.graph.add_node(*kind)
                };
                self.bind(name.clone(), node);
            }
            Step::Set { node, field, value } => {
                let node = self.node(node)?;
                self.graph.edit_field(node, field, value.clone())?;
            }
            Step::SetInput { node, input, value } => {
                let owner = self.node(node)?;
                let source = input_source(&self.graph, owner, input)
                    .ok_or_else(|| anyhow!("{node}.{input} has nothing connected"))?;
                let field = match self.graph.node(source).map(|n| n.kind) {
                    Some(NodeKind::Number) => NUMBER_FIELD,
                    Some(NodeKind::Color) => COLOR_FIELD,
                    Some(NodeKind::Text) => TEXT_FIELD,
                    other => bail!("{node}.{input} is fed by {other:?}, which holds no plain value"),
                };
                self.graph.edit_field(source, field, value.clone())?;
            }
            Step::Connect { parent, input, child } => {
                let (parent, child) = (self.node(parent)?, self.node(child)?);
                self.graph.attach(parent, input, child)?;
            }
            Step::Detach { node } => {
                let node = self.node(node)?;
                self.graph.detach(node)?;
            }
            Step::Delete { node } => {
                let node = self.node(node)?;
                self.graph.delete_node(node)?;
            }
            Step::Toggle { node, enabled } => {
                let node = self.node(node)?;
                self.graph.set_enabled(node, *enabled)?;
            }
            Step::Place { kind, name, keys, screen } => {
                if !self.controller.begin_placement(*kind) {
                    bail!("{} cannot be placed", kind.label());
                }
                if let Outcome::Placed { node } = self.gesture(keys, *screen)? {
                    self.bind(name.clone(), node);
                }
            }
            Step::Pick { color, keys, screen } => {
                let color = Color::from_hex(color).ok_or_else(|| anyhow!("'{color}' is not a color"))?;
                self.controller.begin_color_pick(color);
                self.gesture(keys, *screen)?;
            }
            Step::Drag {
                node,
                mode,
                translation,
                rotation,
                scale,
            } => {
                let owner = self.node(node)?;
                self.drag(owner, *mode, *translation, *rotation, *scale)?;
            }
            Step::Undo => {
                if !self.graph.undo() {
                    log::warn!("nothing to undo");
                }
            }
            Step::Redo => {
                if !self.graph.redo() {
                    log::warn!("nothing to redo");
                }
            }
            Step::Tick { frames } => {
                for _ in 0..*frames {
                    self.tick();
                }
            }
            Step::Sync => {
                self.engine.rebuild_all(&self.graph, &mut self.scene);
            }
        }
        self.pump();
        Ok(())
    }

    fn input(&mut self, input: InputEvent) -> Result<Outcome> {
        let outcome = self
            .controller
            .handle_input(input, &mut self.graph, &self.scene, &mut self.engine)?;
        Ok(outcome)
    }

    fn gesture(&mut self, keys: &[Key], screen: Option<[f32; 2]>) -> Result<Outcome> {
        for key in keys {
            let outcome = self.input(InputEvent::Key(*key))?;
            if outcome != Outcome::Pending {
                self.outcomes.push(outcome.clone());
                return Ok(outcome);
            }
        }
        let outcome = match screen {
            Some([x, y]) => self.input(InputEvent::PointerDown {
                screen: Vec2::new(x, y),
            })?,
            None => self.input(InputEvent::Key(Key::Enter))?,
        };
        self.outcomes.push(outcome.clone());
        Ok(outcome)
    }

    fn drag(
        &mut self,
        owner: NodeId,
        mode: GizmoMode,
        translation: Option<[f32; 3]>,
        rotation: Option<[f32; 3]>,
        scale: Option<[f32; 3]>,
    ) -> Result<()> {
        let entity = self
            .engine
            .entity_for(&self.scene, owner)
            .ok_or_else(|| anyhow!("{owner} has no entity to drag"))?;
        self.controller
            .begin_drag(&self.graph, &mut self.scene, &mut self.engine, entity, mode)
            .ok_or_else(|| anyhow!("{owner} cannot be dragged"))?;

        let mut transform = self
            .scene
            .get(entity)
            .map(|e| e.transform)
            .ok_or_else(|| anyhow!("entity of {owner} vanished"))?;
        if let Some(t) = translation {
            transform.translation = Vec3::from_array(t);
        }
        if let Some(r) = rotation {
            transform.rotation = rotation_from_degrees(Vec3::from_array(r));
        }
        if let Some(s) = scale {
            transform.scale = Vec3::from_array(s);
        }
        self.scene.apply_transform(entity, transform);
        self.controller.end_drag(&mut self.graph, &mut self.scene)?;
        Ok(())
    }

    pub fn summary(&self) -> SceneSummary {
        let mut entities: Vec<EntitySummary> = Vec::new();
        let roots: Vec<_> = self.scene.roots().map(|(id, _)| id).collect();
        for id in roots {
            let node = self.engine.resolver().owner_of(&self.scene, id).ok();
            let Some(entity) = self.scene.get(id) else {
                continue;
            };
            let color = self
                .scene
                .subtree(id)
                .into_iter()
                .find_map(|e| self.scene.get(e)?.material.as_ref().map(|m| m.color.to_hex()));
            entities.push(EntitySummary {
                node,
                name: entity.name.clone(),
                position: entity.transform.translation.to_array(),
                size: self.scene.world_bounds(id).map(|b| b.size().to_array()),
                color,
                visible: entity.visible,
                motion: self.scene.motion_mode(id),
            });
        }
        SceneSummary {
            nodes: self.graph.len(),
            entities,
            sky: self.scene.environment().sky_color.to_hex(),
            outcomes: self.outcomes.clone(),
            diagnostics: self.engine.diagnostics().iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace() -> Workspace {
        Workspace::new(SyncConfig {
            random_seed: Some(11),
            ..Default::default()
        })
    }

    #[test]
    fn steps_parse_from_json() {
        let steps = Workspace::parse_steps(
            r#"[
                { "op": "create", "kind": "create_box", "name": "cube" },
                { "op": "set_input", "node": "cube", "input": "WIDTH", "value": 4 },
                { "op": "place", "kind": "add_model", "keys": ["arrow_left", "enter"] },
                { "op": "tick" },
                { "op": "undo" }
            ]"#,
        )
        .unwrap();
        assert_eq!(steps.len(), 5);
        assert!(matches!(steps[3], Step::Tick { frames: 1 }));
    }

    #[test]
    fn unknown_names_fail_with_context() {
        let mut ws = workspace();
        let steps = Workspace::parse_steps(r#"[{ "op": "delete", "node": "nobody" }]"#).unwrap();
        let err = ws.run(&steps).unwrap_err();
        assert!(format!("{err:#}").contains("no node named 'nobody'"));
    }

    #[test]
    fn replay_builds_and_summarizes_a_scene() {
        let mut ws = workspace();
        let steps = Workspace::parse_steps(
            r##"[
                { "op": "create", "kind": "create_box", "name": "cube" },
                { "op": "set_input", "node": "cube", "input": "X", "value": 2 },
                { "op": "pick", "color": "#00ff00", "keys": ["arrow_right", "arrow_right", "arrow_right", "arrow_right"] },
                { "op": "place", "kind": "add_model", "name": "tree", "keys": ["arrow_left", "arrow_left", "enter"] },
                { "op": "tick" }
            ]"##,
        )
        .unwrap();
        ws.run(&steps).unwrap();

        let summary = ws.summary();
        let cube = ws.node("cube").unwrap();
        let box_summary = summary.entities.iter().find(|e| e.node == Some(cube)).unwrap();
        assert_eq!(box_summary.color.as_deref(), Some("#00ff00"));
        assert_eq!(box_summary.position[0], 2.0);
        let tree = ws.node("tree").unwrap();
        assert!(summary.entities.iter().any(|e| e.node == Some(tree) && e.visible));
        assert_eq!(summary.outcomes.len(), 2);
        assert!(serde_json::to_string(&summary).unwrap().contains("\"sky\""));
    }
}
