//! Transform application for scene objects.
//!
//! An object's transform is recomputed from scratch on every application: its
//! own X/Y/Z inputs, then its enabled move/rotate/resize children in statement
//! order (a later child of the same kind wins). Objects stand on their feet:
//! after placement the subtree's minimum world Y equals the authored Y, unless
//! a resize names a different vertical origin.

use glam::{EulerRot, Quat, Vec3};

use crate::mesh_asset::BoundingBox;
use crate::node_kind::{NodeKind, DO_INPUT};
use crate::program::{number_input, GraphHost, NodeId};
use crate::scene_graph::{EntityCapability, EntityId, SceneGraph, Transform};

/// Which point of the bounds stays put along one axis when resizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisOrigin {
    Min,
    Center,
    Max,
}

impl AxisOrigin {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "min" | "bottom" | "left" | "back" => Some(AxisOrigin::Min),
            "center" | "centre" | "middle" => Some(AxisOrigin::Center),
            "max" | "top" | "right" | "front" => Some(AxisOrigin::Max),
            _ => None,
        }
    }

    fn pick(self, min: f32, max: f32) -> f32 {
        match self {
            AxisOrigin::Min => min,
            AxisOrigin::Center => (min + max) * 0.5,
            AxisOrigin::Max => max,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeTarget {
    pub extents: Vec3,
    pub origins: [AxisOrigin; 3],
}

/// Authored transform of one object node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// X, Z of the origin and Y of the feet.
    pub position: Vec3,
    pub rotation: Quat,
    /// Uniform SCALE input (models only; 1 otherwise).
    pub scale: f32,
    pub resize: Option<ResizeTarget>,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: 1.0,
            resize: None,
        }
    }
}

fn read_xyz(graph: &dyn GraphHost, node: NodeId, default: f64) -> Vec3 {
    let axis = |name: &str| number_input(graph, node, name).unwrap_or(default) as f32;
    Vec3::new(axis("X"), axis("Y"), axis("Z"))
}

/// Euler angles in degrees, applied X then Y then Z.
pub fn rotation_from_degrees(degrees: Vec3) -> Quat {
    Quat::from_euler(
        EulerRot::XYZ,
        degrees.x.to_radians(),
        degrees.y.to_radians(),
        degrees.z.to_radians(),
    )
}

pub fn rotation_to_degrees(rotation: Quat) -> Vec3 {
    let (x, y, z) = rotation.to_euler(EulerRot::XYZ);
    Vec3::new(x.to_degrees(), y.to_degrees(), z.to_degrees())
}

/// Collect the authored placement of `node` from the graph.
pub fn read_placement(graph: &dyn GraphHost, node: NodeId) -> Placement {
    let mut placement = Placement {
        position: read_xyz(graph, node, 0.0),
        ..Default::default()
    };
    let Some(object) = graph.node(node) else {
        return placement;
    };
    if object.kind.attribute_role("SCALE").is_some() {
        placement.scale = number_input(graph, node, "SCALE").unwrap_or(1.0).max(0.0) as f32;
    }

    for child_id in object.statement(DO_INPUT) {
        let Some(child) = graph.node(*child_id) else {
            continue;
        };
        if !child.enabled {
            continue;
        }
        match child.kind {
            NodeKind::MoveTo => placement.position = read_xyz(graph, *child_id, 0.0),
            NodeKind::RotateTo => placement.rotation = rotation_from_degrees(read_xyz(graph, *child_id, 0.0)),
            NodeKind::Resize => {
                let origin = |field: &str, fallback: AxisOrigin| {
                    child
                        .field(field)
                        .and_then(|v| v.as_text())
                        .and_then(AxisOrigin::parse)
                        .unwrap_or(fallback)
                };
                placement.resize = Some(ResizeTarget {
                    extents: read_xyz(graph, *child_id, 1.0),
                    origins: [
                        origin("X_ORIGIN", AxisOrigin::Center),
                        origin("Y_ORIGIN", AxisOrigin::Min),
                        origin("Z_ORIGIN", AxisOrigin::Center),
                    ],
                });
            }
            _ => {}
        }
    }
    placement
}

/// Unscaled extents and unit scale of an entity, captured the first time a
/// scale or resize needs them and reused afterwards so relative scaling never
/// compounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformBaseline {
    /// Extents of the scaled entity's subtree at `unit_scale`.
    pub extents: Vec3,
    pub unit_scale: Vec3,
}

impl TransformBaseline {
    /// Scale reproducing `target` extents.
    pub fn scale_for_extents(&self, target: Vec3) -> Vec3 {
        let ratio = |t: f32, e: f32| if e.abs() > 1e-6 { t / e } else { 1.0 };
        self.unit_scale
            * Vec3::new(
                ratio(target.x, self.extents.x),
                ratio(target.y, self.extents.y),
                ratio(target.z, self.extents.z),
            )
    }
}

/// Where a placement lands: the entity that moves, and the entity that scales
/// (the renderable root of a model, or the entity itself for primitives).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementTarget {
    pub anchor: EntityId,
    pub scaled: EntityId,
}

fn with_transform(scene: &mut SceneGraph, id: EntityId, f: impl FnOnce(&mut Transform)) -> bool {
    let Some(mut transform) = scene.get(id).map(|e| e.transform) else {
        return false;
    };
    f(&mut transform);
    scene.apply_transform(id, transform)
}

/// Apply `placement` to `target`. `base_scale` is the scale of the unresized
/// object; `baseline` is required to honor a resize.
pub fn apply_placement(
    scene: &mut SceneGraph,
    target: PlacementTarget,
    placement: &Placement,
    base_scale: Vec3,
    baseline: Option<&TransformBaseline>,
) -> bool {
    let separate = target.anchor != target.scaled;
    let anchor_transform = Transform {
        translation: placement.position,
        rotation: placement.rotation,
        scale: if separate {
            Vec3::ONE
        } else {
            base_scale
        },
    };
    if !scene.apply_transform(target.anchor, anchor_transform) {
        return false;
    }
    if separate {
        with_transform(scene, target.scaled, |t| t.scale = base_scale);
    }

    // Feet on the authored Y.
    let Some(unresized) = scene.world_bounds(target.anchor) else {
        return true;
    };
    let lift = placement.position.y - unresized.min.y;
    with_transform(scene, target.anchor, |t| t.translation.y += lift);
    let unresized = BoundingBox::new(unresized.min + Vec3::Y * lift, unresized.max + Vec3::Y * lift);

    let (Some(resize), Some(baseline)) = (placement.resize, baseline) else {
        return true;
    };
    let scale = baseline.scale_for_extents(resize.extents);
    with_transform(scene, target.scaled, |t| t.scale = scale);
    let Some(resized) = scene.world_bounds(target.anchor) else {
        return true;
    };
    let mut shift = Vec3::ZERO;
    for axis in 0..3 {
        let origin = resize.origins[axis];
        shift[axis] = origin.pick(unresized.min[axis], unresized.max[axis])
            - origin.pick(resized.min[axis], resized.max[axis]);
    }
    with_transform(scene, target.anchor, |t| t.translation += shift);
    true
}
