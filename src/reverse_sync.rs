//! Writing direct manipulation back into the program graph.
//!
//! Placement and color picks run as sessions in a single slot: starting one
//! replaces whatever was active, and escape ends it through the same path.
//! Pointer clicks and the keyboard reticle both resolve to one world-space
//! ray and share the session handler. Gizmo drags switch the dragged body to
//! kinematic for their duration and write the result on release. Every graph
//! write a single gesture makes goes through one [`TransactionGroup`].

use std::collections::HashSet;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::node_kind::{
    character_input_for_part, EnvironmentKind, NodeCategory, NodeKind, ObjectKind, ShadowDefault, COLOR_FIELD,
    DO_INPUT, NUMBER_FIELD,
};
use crate::picking::{pick_point, Camera, Ray};
use crate::program::{input_source, FieldValue, GraphError, GraphHost, NodeId};
use crate::scene_graph::{EntityId, MotionMode, SceneGraph};
use crate::sync::SyncEngine;
use crate::transaction::TransactionGroup;
use crate::transform::rotation_to_degrees;

/// Maximum material nesting followed when writing a picked color.
const MAX_MATERIAL_DEPTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    Enter,
    Space,
    Escape,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerDown { screen: Vec2 },
    Key(Key),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GizmoMode {
    Translate,
    Rotate,
    Scale,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Session {
    Place(NodeKind),
    ColorPick(Color),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// The session is still waiting for a target.
    Pending,
    Placed { node: NodeId },
    Colored { node: NodeId, input: String },
    Cancelled,
    /// No session was active, or the target had no owner.
    Ignored,
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    owner: NodeId,
    anchor: EntityId,
    mode: GizmoMode,
    prior_motion: Option<MotionMode>,
}

fn round2(v: f32) -> f64 {
    (f64::from(v) * 100.0).round() / 100.0
}

pub struct ReverseSyncController {
    pub camera: Camera,
    nudge_step: f32,
    session: Option<Session>,
    reticle: Vec3,
    drag: Option<Drag>,
}

impl ReverseSyncController {
    pub fn new(nudge_step: f32) -> Self {
        Self {
            camera: Camera::default(),
            nudge_step,
            session: None,
            reticle: Vec3::ZERO,
            drag: None,
        }
    }

    pub fn session(&self) -> Option<Session> {
        self.session
    }

    pub fn reticle(&self) -> Vec3 {
        self.reticle
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    fn start(&mut self, session: Session) {
        if let Some(previous) = self.session.replace(session) {
            log::debug!("{previous:?} replaced by {session:?}");
        }
    }

    /// Arm a placement session. Only scene objects can be placed.
    pub fn begin_placement(&mut self, kind: NodeKind) -> bool {
        if !matches!(kind.category(), NodeCategory::Object(_)) {
            log::warn!("{} cannot be placed in the scene", kind.label());
            return false;
        }
        self.start(Session::Place(kind));
        true
    }

    pub fn begin_color_pick(&mut self, color: Color) {
        self.start(Session::ColorPick(color));
    }

    pub fn cancel(&mut self) -> bool {
        self.session.take().is_some()
    }

    pub fn handle_input(
        &mut self,
        input: InputEvent,
        graph: &mut dyn GraphHost,
        scene: &SceneGraph,
        engine: &mut SyncEngine,
    ) -> Result<Outcome, GraphError> {
        let Some(session) = self.session else {
            return Ok(Outcome::Ignored);
        };
        let ray = match input {
            InputEvent::Key(Key::Escape) => {
                self.cancel();
                return Ok(Outcome::Cancelled);
            }
            InputEvent::Key(key @ (Key::ArrowLeft | Key::ArrowRight | Key::ArrowUp | Key::ArrowDown)) => {
                let step = match key {
                    Key::ArrowLeft => Vec3::NEG_X,
                    Key::ArrowRight => Vec3::X,
                    Key::ArrowUp => Vec3::NEG_Z,
                    _ => Vec3::Z,
                };
                self.reticle += step * self.nudge_step;
                log::trace!("reticle at {:?}", self.reticle);
                return Ok(Outcome::Pending);
            }
            InputEvent::Key(_) => Some(Ray::downward_through(self.reticle)),
            InputEvent::PointerDown { screen } => self.camera.screen_ray(screen),
        };
        let Some(ray) = ray else {
            return Ok(Outcome::Pending);
        };

        self.session = None;
        match session {
            Session::Place(kind) => {
                let Some((point, _)) = pick_point(scene, &ray) else {
                    log::debug!("placement ray hit nothing");
                    self.session = Some(session);
                    return Ok(Outcome::Pending);
                };
                let node = place(graph, kind, point)?;
                Ok(Outcome::Placed { node })
            }
            Session::ColorPick(color) => self.pick_color(graph, scene, engine, &ray, color),
        }
    }

    fn pick_color(
        &self,
        graph: &mut dyn GraphHost,
        scene: &SceneGraph,
        engine: &mut SyncEngine,
        ray: &Ray,
        color: Color,
    ) -> Result<Outcome, GraphError> {
        let hit = pick_point(scene, ray);
        let Some(entity) = hit.and_then(|(_, entity)| entity) else {
            // Nothing under the cursor: the ground plane if the ray reaches it,
            // the sky otherwise.
            let environment = if hit.is_some() {
                NodeKind::SetGround
            } else {
                NodeKind::SetSky
            };
            let mut txn = TransactionGroup::begin(graph);
            let node = ensure_environment(&mut txn, environment)?;
            write_color(&mut txn, node, "COLOR", color, 0)?;
            txn.select_and_reveal(node);
            txn.commit();
            return Ok(Outcome::Colored {
                node,
                input: "COLOR".to_string(),
            });
        };

        let Some(owner) = engine.owner_of(scene, entity) else {
            return Ok(Outcome::Ignored);
        };
        let Some(kind) = graph.node(owner).map(|n| n.kind) else {
            return Ok(Outcome::Ignored);
        };
        let input = match kind.category() {
            NodeCategory::Object(ObjectKind::Character) => scene
                .get(entity)
                .and_then(|e| e.part.as_deref())
                .and_then(character_input_for_part)
                .unwrap_or("SKIN"),
            NodeCategory::Environment(EnvironmentKind::Map) => "MATERIAL",
            NodeCategory::Object(_) | NodeCategory::Environment(_) => "COLOR",
            _ => return Ok(Outcome::Ignored),
        };

        let mut txn = TransactionGroup::begin(graph);
        write_color(&mut txn, owner, input, color, 0)?;
        txn.select_and_reveal(owner);
        txn.commit();
        log::debug!("picked {} onto {owner}.{input}", color.to_hex());
        Ok(Outcome::Colored {
            node: owner,
            input: input.to_string(),
        })
    }

    /// Start dragging the object that owns `entity`. Returns its node.
    pub fn begin_drag(
        &mut self,
        graph: &dyn GraphHost,
        scene: &mut SceneGraph,
        engine: &mut SyncEngine,
        entity: EntityId,
        mode: GizmoMode,
    ) -> Option<NodeId> {
        self.cancel_drag(scene);
        let owner = engine.owner_of(scene, entity)?;
        if !matches!(graph.node(owner)?.kind.category(), NodeCategory::Object(_)) {
            log::debug!("{owner} is not a movable object");
            return None;
        }
        let anchor = engine.entity_for(scene, owner)?;
        let prior_motion = scene.motion_mode(anchor);
        if prior_motion.is_some() {
            scene.set_motion_mode(anchor, MotionMode::Kinematic);
        }
        self.drag = Some(Drag {
            owner,
            anchor,
            mode,
            prior_motion,
        });
        Some(owner)
    }

    /// Abandon a drag without writing anything back.
    pub fn cancel_drag(&mut self, scene: &mut SceneGraph) -> bool {
        let Some(drag) = self.drag.take() else {
            return false;
        };
        if let Some(motion) = drag.prior_motion {
            scene.set_motion_mode(drag.anchor, motion);
        }
        true
    }

    /// Finish the drag: restore the motion mode and write the entity's
    /// transform into its owner. Returns the node that received the values.
    pub fn end_drag(&mut self, graph: &mut dyn GraphHost, scene: &mut SceneGraph) -> Result<Option<NodeId>, GraphError> {
        let Some(drag) = self.drag.take() else {
            return Ok(None);
        };
        if let Some(motion) = drag.prior_motion {
            scene.set_motion_mode(drag.anchor, motion);
        }
        let Some(transform) = scene.get(drag.anchor).map(|e| e.transform) else {
            return Ok(None);
        };
        if graph.node(drag.owner).is_none() {
            return Ok(None);
        }

        let mut txn = TransactionGroup::begin(graph);
        let target = match drag.mode {
            GizmoMode::Translate => {
                let feet = scene
                    .world_bounds(drag.anchor)
                    .map(|b| b.min.y)
                    .unwrap_or(transform.translation.y);
                let position = Vec3::new(transform.translation.x, feet, transform.translation.z);
                let target = last_child(txn.host(), drag.owner, NodeKind::MoveTo).unwrap_or(drag.owner);
                write_xyz(&mut txn, target, position)?;
                target
            }
            GizmoMode::Rotate => {
                let target = child_instruction(&mut txn, drag.owner, NodeKind::RotateTo)?;
                write_xyz(&mut txn, target, rotation_to_degrees(transform.rotation))?;
                target
            }
            GizmoMode::Scale => {
                let size = scene.local_bounds(drag.anchor).map(|b| b.size()).unwrap_or(Vec3::ONE);
                let target = child_instruction(&mut txn, drag.owner, NodeKind::Resize)?;
                write_xyz(&mut txn, target, size * transform.scale)?;
                target
            }
        };
        txn.select_and_reveal(drag.owner);
        txn.commit();
        log::debug!("{:?} drag of {} written to {target}", drag.mode, drag.owner);
        Ok(Some(target))
    }
}

/// Create `kind` at `point` under the entry point, as one undo step.
fn place(graph: &mut dyn GraphHost, kind: NodeKind, point: Vec3) -> Result<NodeId, GraphError> {
    let mut txn = TransactionGroup::begin(graph);
    let start = entry_point(&mut txn);
    let node = txn.create_node(kind);
    txn.inject_shadows(node);
    write_xyz(&mut txn, node, point)?;
    txn.append_statement(start, DO_INPUT, node)?;
    txn.select_and_reveal(node);
    txn.commit();
    log::info!("placed {} {node} at ({:.2}, {:.2}, {:.2})", kind.label(), point.x, point.y, point.z);
    Ok(node)
}

fn entry_point(txn: &mut TransactionGroup<'_>) -> NodeId {
    let existing = txn
        .host()
        .top_level()
        .into_iter()
        .find(|id| txn.host().node(*id).map(|n| n.kind) == Some(NodeKind::WhenStarted));
    match existing {
        Some(start) => start,
        None => txn.create_node(NodeKind::WhenStarted),
    }
}

/// First enabled node of `kind` reachable from the top level.
fn find_reachable(host: &dyn GraphHost, kind: NodeKind) -> Option<NodeId> {
    let mut visited = HashSet::new();
    let mut stack: Vec<NodeId> = host.top_level().into_iter().rev().collect();
    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        let Some(node) = host.node(id) else {
            continue;
        };
        if node.kind == kind && node.enabled {
            return Some(id);
        }
        stack.extend(node.child_ids().into_iter().rev());
    }
    None
}

fn ensure_environment(txn: &mut TransactionGroup<'_>, kind: NodeKind) -> Result<NodeId, GraphError> {
    if let Some(existing) = find_reachable(txn.host(), kind) {
        return Ok(existing);
    }
    let start = entry_point(txn);
    let node = txn.create_node(kind);
    txn.inject_shadows(node);
    txn.append_statement(start, DO_INPUT, node)?;
    log::debug!("synthesized {} {node}", kind.label());
    Ok(node)
}

fn last_child(host: &dyn GraphHost, owner: NodeId, kind: NodeKind) -> Option<NodeId> {
    let node = host.node(owner)?;
    node.statement(DO_INPUT)
        .iter()
        .rev()
        .copied()
        .find(|id| host.node(*id).is_some_and(|child| child.kind == kind && child.enabled))
}

/// The owner's existing instruction of `kind`, or a new one appended to it.
fn child_instruction(txn: &mut TransactionGroup<'_>, owner: NodeId, kind: NodeKind) -> Result<NodeId, GraphError> {
    if let Some(existing) = last_child(txn.host(), owner, kind) {
        return Ok(existing);
    }
    let child = txn.create_node(kind);
    txn.inject_shadows(child);
    txn.append_statement(owner, DO_INPUT, child)?;
    Ok(child)
}

fn write_xyz(txn: &mut TransactionGroup<'_>, node: NodeId, value: Vec3) -> Result<(), GraphError> {
    for (input, v) in [("X", value.x), ("Y", value.y), ("Z", value.z)] {
        write_number(txn, node, input, round2(v))?;
    }
    Ok(())
}

/// Store a number in whatever feeds `node.input`, adding a shadow if nothing does.
fn write_number(txn: &mut TransactionGroup<'_>, node: NodeId, input: &str, value: f64) -> Result<(), GraphError> {
    let source = input_source(txn.host(), node, input).map(|s| (s, txn.host().node(s).map(|n| n.kind)));
    match source {
        Some((source, Some(NodeKind::Number))) => txn.set_field(source, NUMBER_FIELD, FieldValue::Number(value)),
        None => txn.inject_shadow(node, input, ShadowDefault::Number(value)).map(|_| ()),
        Some((source, kind)) => {
            log::warn!("{node}.{input} is fed by {source} ({kind:?}); leaving it alone");
            Ok(())
        }
    }
}

/// Store `color` in whatever feeds `node.input`: a color node is edited, a
/// material has its base color written, anything else is replaced by a new
/// color node.
fn write_color(
    txn: &mut TransactionGroup<'_>,
    node: NodeId,
    input: &str,
    color: Color,
    depth: usize,
) -> Result<(), GraphError> {
    let hex = color.to_hex();
    let source = input_source(txn.host(), node, input);
    let kind = source.and_then(|s| txn.host().node(s)).map(|n| n.kind);
    match (source, kind) {
        (Some(source), Some(NodeKind::Color)) => txn.set_field(source, COLOR_FIELD, FieldValue::from(hex.as_str())),
        (Some(source), Some(NodeKind::Material)) if depth < MAX_MATERIAL_DEPTH => {
            write_color(txn, source, "BASE_COLOR", color, depth + 1)
        }
        _ => {
            let swatch = txn.create_node(NodeKind::Color);
            txn.set_field(swatch, COLOR_FIELD, FieldValue::from(hex.as_str()))?;
            txn.connect(node, input, swatch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::program::{number_input, ProgramGraph};
    use crate::scene_graph::{EntityCapability, Transform};

    struct Rig {
        graph: ProgramGraph,
        scene: SceneGraph,
        engine: SyncEngine,
        controller: ReverseSyncController,
    }

    impl Rig {
        fn new() -> Self {
            let config = SyncConfig {
                random_seed: Some(1),
                ..Default::default()
            };
            Self {
                controller: ReverseSyncController::new(config.nudge_step),
                graph: ProgramGraph::new(),
                scene: SceneGraph::new(),
                engine: SyncEngine::new(config),
            }
        }

        fn input(&mut self, input: InputEvent) -> Outcome {
            let outcome = self
                .controller
                .handle_input(input, &mut self.graph, &self.scene, &mut self.engine)
                .unwrap();
            self.engine.pump(&mut self.graph, &mut self.scene);
            outcome
        }

        fn key(&mut self, key: Key) -> Outcome {
            self.input(InputEvent::Key(key))
        }

        fn color_of(&self, node: NodeId) -> String {
            let entity = self.engine.entity_for(&self.scene, node).unwrap();
            self.scene.get(entity).unwrap().material.as_ref().unwrap().color.to_hex()
        }
    }

    fn red() -> Color {
        Color::new(1.0, 0.0, 0.0)
    }

    #[test]
    fn keyboard_placement_lands_on_the_reticle() {
        let mut rig = Rig::new();
        assert!(rig.controller.begin_placement(NodeKind::CreateBox));
        assert_eq!(rig.key(Key::ArrowRight), Outcome::Pending);
        assert_eq!(rig.key(Key::ArrowRight), Outcome::Pending);
        assert_eq!(rig.key(Key::ArrowUp), Outcome::Pending);

        let Outcome::Placed { node } = rig.key(Key::Enter) else {
            panic!("nothing placed");
        };
        assert_eq!(number_input(&rig.graph, node, "X"), Some(1.0));
        assert_eq!(number_input(&rig.graph, node, "Z"), Some(-0.5));
        assert_eq!(rig.graph.selected(), Some(node));
        assert!(rig.engine.entity_for(&rig.scene, node).is_some());
        assert!(rig.controller.session().is_none());

        assert!(rig.graph.undo());
        rig.engine.pump(&mut rig.graph, &mut rig.scene);
        assert!(rig.graph.is_empty());
        assert!(rig.scene.is_empty());
    }

    #[test]
    fn pointer_placement_reuses_the_entry_point() {
        let mut rig = Rig::new();
        let start = rig.graph.add_node(NodeKind::WhenStarted);
        rig.controller.begin_placement(NodeKind::CreateSphere);
        let center = rig.controller.camera.viewport * 0.5;
        let Outcome::Placed { node } = rig.input(InputEvent::PointerDown { screen: center }) else {
            panic!("nothing placed");
        };
        assert_eq!(rig.graph.node(start).unwrap().statement(DO_INPUT), &[node]);
        assert_eq!(rig.graph.nodes_of_kind(NodeKind::WhenStarted).len(), 1);
    }

    #[test]
    fn escape_cancels_and_later_keys_are_ignored() {
        let mut rig = Rig::new();
        rig.controller.begin_placement(NodeKind::CreateBox);
        assert_eq!(rig.key(Key::Escape), Outcome::Cancelled);
        assert_eq!(rig.key(Key::Enter), Outcome::Ignored);
        assert!(rig.graph.is_empty());
        assert!(!rig.controller.begin_placement(NodeKind::Number));
    }

    #[test]
    fn a_new_session_replaces_the_old_one() {
        let mut rig = Rig::new();
        let cube = rig.graph.add_node_with_shadows(NodeKind::CreateBox);
        rig.engine.pump(&mut rig.graph, &mut rig.scene);
        rig.controller.begin_placement(NodeKind::CreateBox);
        rig.controller.begin_color_pick(red());

        let outcome = rig.key(Key::Space);
        assert_eq!(
            outcome,
            Outcome::Colored {
                node: cube,
                input: "COLOR".into()
            }
        );
        assert_eq!(rig.graph.nodes_of_kind(NodeKind::CreateBox), vec![cube]);
        assert_eq!(rig.color_of(cube), "#ff0000");

        assert!(rig.graph.undo());
        rig.engine.pump(&mut rig.graph, &mut rig.scene);
        assert_eq!(rig.color_of(cube), "#9932cc");
    }

    #[test]
    fn picking_a_character_colors_the_part_under_the_cursor() {
        let mut rig = Rig::new();
        let hero = rig.graph.add_node_with_shadows(NodeKind::AddCharacter);
        rig.engine.pump(&mut rig.graph, &mut rig.scene);
        rig.engine.tick(&rig.graph, &mut rig.scene);

        rig.controller.begin_color_pick(red());
        let Outcome::Colored { node, input } = rig.key(Key::Enter) else {
            panic!("nothing colored");
        };
        assert_eq!(node, hero);
        // Straight down onto the origin lands on the top of the head.
        assert_eq!(input, "HAIR");
        let swatch = input_source(&rig.graph, hero, "HAIR").unwrap();
        assert_eq!(
            rig.graph.node(swatch).unwrap().field(COLOR_FIELD),
            Some(&FieldValue::from("#ff0000"))
        );
    }

    #[test]
    fn empty_ground_synthesizes_a_ground_node_once() {
        let mut rig = Rig::new();
        rig.controller.begin_color_pick(red());
        let Outcome::Colored { node, .. } = rig.key(Key::Enter) else {
            panic!("nothing colored");
        };
        assert_eq!(rig.graph.node(node).unwrap().kind, NodeKind::SetGround);
        assert_eq!(rig.color_of(node), "#ff0000");
        let count = rig.graph.len();

        rig.controller.begin_color_pick(Color::new(0.0, 0.0, 1.0));
        assert!(matches!(rig.key(Key::Enter), Outcome::Colored { node: n, .. } if n == node));
        assert_eq!(rig.graph.len(), count);
        assert_eq!(rig.color_of(node), "#0000ff");
    }

    #[test]
    fn looking_at_the_horizon_colors_the_sky() {
        let mut rig = Rig::new();
        rig.controller.camera.target = Vec3::new(0.0, 10.0, 0.0);
        rig.controller.begin_color_pick(red());
        let outcome = rig.input(InputEvent::PointerDown {
            screen: Vec2::new(640.0, 100.0),
        });
        let Outcome::Colored { node, .. } = outcome else {
            panic!("nothing colored");
        };
        assert_eq!(rig.graph.node(node).unwrap().kind, NodeKind::SetSky);
        assert_eq!(rig.scene.environment().sky_color.to_hex(), "#ff0000");
    }

    #[test]
    fn translate_drag_writes_fields_and_restores_motion() {
        let mut rig = Rig::new();
        let cube = rig.graph.add_node_with_shadows(NodeKind::CreateBox);
        rig.engine.pump(&mut rig.graph, &mut rig.scene);
        let entity = rig.engine.entity_for(&rig.scene, cube).unwrap();

        let owner = rig
            .controller
            .begin_drag(&rig.graph, &mut rig.scene, &mut rig.engine, entity, GizmoMode::Translate);
        assert_eq!(owner, Some(cube));
        assert_eq!(rig.scene.motion_mode(entity), Some(MotionMode::Kinematic));

        rig.scene
            .apply_transform(entity, Transform::from_translation(Vec3::new(3.004, 0.5, -1.0)));
        let written = rig.controller.end_drag(&mut rig.graph, &mut rig.scene).unwrap();
        assert_eq!(written, Some(cube));
        assert_eq!(rig.scene.motion_mode(entity), Some(MotionMode::Dynamic));
        assert_eq!(number_input(&rig.graph, cube, "X"), Some(3.0));
        assert_eq!(number_input(&rig.graph, cube, "Y"), Some(0.0));
        assert_eq!(number_input(&rig.graph, cube, "Z"), Some(-1.0));

        rig.engine.pump(&mut rig.graph, &mut rig.scene);
        let translation = rig.scene.get(entity).unwrap().transform.translation;
        assert!((translation - Vec3::new(3.0, 0.5, -1.0)).length() < 1e-5);
    }

    #[test]
    fn repeated_rotate_drags_reuse_one_instruction() {
        let mut rig = Rig::new();
        let cube = rig.graph.add_node_with_shadows(NodeKind::CreateBox);
        rig.engine.pump(&mut rig.graph, &mut rig.scene);
        let entity = rig.engine.entity_for(&rig.scene, cube).unwrap();

        for degrees in [30.0f32, 45.0] {
            rig.controller
                .begin_drag(&rig.graph, &mut rig.scene, &mut rig.engine, entity, GizmoMode::Rotate);
            let transform = Transform {
                rotation: glam::Quat::from_rotation_y(degrees.to_radians()),
                ..rig.scene.get(entity).unwrap().transform
            };
            rig.scene.apply_transform(entity, transform);
            rig.controller.end_drag(&mut rig.graph, &mut rig.scene).unwrap();
            rig.engine.pump(&mut rig.graph, &mut rig.scene);
        }

        let rotations = rig.graph.nodes_of_kind(NodeKind::RotateTo);
        assert_eq!(rotations.len(), 1);
        assert_eq!(number_input(&rig.graph, rotations[0], "Y"), Some(45.0));
        assert_eq!(rig.graph.node(cube).unwrap().statement(DO_INPUT), &rotations[..]);
    }
}
