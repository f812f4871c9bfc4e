//! Primitive geometry rebuilds.
//!
//! Dimension edits on boxes, capsules and planes rescale the vertex data the
//! entity was created with: `scale = dimension / (2 * original_half_extent)`
//! is baked into a copy of the original vertices and the live scale goes back
//! to identity. The original half extents are captured once when the entity is
//! built and never re-measured, so repeated edits cannot drift. Spheres and
//! cylinders, whose tessellation is itself editable, regenerate from scratch.

use std::collections::HashMap;

use glam::Vec3;

use crate::mesh_asset::{BoundingBox, MeshData};
use crate::node_kind::{NodeKind, PrimitiveKind, ShadowDefault};
use crate::primitives;
use crate::program::{number_input, GraphHost, NodeId};
use crate::scene_graph::{EntityCapability, EntityId, PhysicsShape, SceneGraph, Transform};

/// Smallest accepted dimension.
pub const MIN_DIMENSION: f32 = 0.01;

/// Authored parameters of a primitive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PrimitiveShape {
    Box { width: f32, height: f32, depth: f32 },
    Sphere { diameter: f32, segments: u32 },
    Cylinder { height: f32, diameter_top: f32, diameter_bottom: f32, tessellation: u32 },
    Capsule { diameter: f32, height: f32 },
    Plane { width: f32, depth: f32 },
}

impl PrimitiveShape {
    /// Read the shape of `node` from the graph. Inputs that carry no number
    /// fall back to their declared default and are listed in the second value.
    pub fn read(graph: &dyn GraphHost, node: NodeId, kind: NodeKind) -> Option<(Self, Vec<&'static str>)> {
        let primitive = kind.primitive()?;
        let mut missing = Vec::new();
        let mut value = |input: &'static str| -> f32 {
            match number_input(graph, node, input) {
                Some(v) => v as f32,
                None => {
                    missing.push(input);
                    match kind.slot_template(input).map(|t| t.shadow) {
                        Some(ShadowDefault::Number(v)) => v as f32,
                        _ => 1.0,
                    }
                }
            }
        };
        let dim = |v: f32| v.max(MIN_DIMENSION);
        let shape = match primitive {
            PrimitiveKind::Box => PrimitiveShape::Box {
                width: dim(value("WIDTH")),
                height: dim(value("HEIGHT")),
                depth: dim(value("DEPTH")),
            },
            PrimitiveKind::Sphere => PrimitiveShape::Sphere {
                diameter: dim(value("DIAMETER")),
                segments: value("SEGMENTS").round().max(0.0) as u32,
            },
            PrimitiveKind::Cylinder => PrimitiveShape::Cylinder {
                height: dim(value("HEIGHT")),
                diameter_top: value("DIAMETER_TOP").max(0.0),
                diameter_bottom: value("DIAMETER_BOTTOM").max(0.0),
                tessellation: value("TESSELLATION").round().max(0.0) as u32,
            },
            PrimitiveKind::Capsule => PrimitiveShape::Capsule {
                diameter: dim(value("DIAMETER")),
                height: dim(value("HEIGHT")),
            },
            PrimitiveKind::Plane => PrimitiveShape::Plane {
                width: dim(value("WIDTH")),
                depth: dim(value("HEIGHT")),
            },
        };
        Some((shape, missing))
    }

    pub fn kind(&self) -> PrimitiveKind {
        match self {
            PrimitiveShape::Box { .. } => PrimitiveKind::Box,
            PrimitiveShape::Sphere { .. } => PrimitiveKind::Sphere,
            PrimitiveShape::Cylinder { .. } => PrimitiveKind::Cylinder,
            PrimitiveShape::Capsule { .. } => PrimitiveKind::Capsule,
            PrimitiveShape::Plane { .. } => PrimitiveKind::Plane,
        }
    }

    /// Fresh vertex data at these parameters.
    pub fn mesh(&self) -> MeshData {
        match *self {
            PrimitiveShape::Box { width, height, depth } => primitives::box_mesh(width, height, depth),
            PrimitiveShape::Sphere { diameter, segments } => primitives::sphere_mesh(diameter, segments),
            PrimitiveShape::Cylinder {
                height,
                diameter_top,
                diameter_bottom,
                tessellation,
            } => primitives::cylinder_mesh(height, diameter_top, diameter_bottom, tessellation),
            PrimitiveShape::Capsule { diameter, height } => primitives::capsule_mesh(diameter, height),
            PrimitiveShape::Plane { width, depth } => primitives::plane_mesh(width, depth),
        }
    }

    /// Full extents the authored dimensions ask for.
    pub fn extents(&self) -> Vec3 {
        match *self {
            PrimitiveShape::Box { width, height, depth } => Vec3::new(width, height, depth),
            PrimitiveShape::Sphere { diameter, .. } => Vec3::splat(diameter),
            PrimitiveShape::Cylinder {
                height,
                diameter_top,
                diameter_bottom,
                ..
            } => {
                let d = diameter_top.max(diameter_bottom);
                Vec3::new(d, height, d)
            }
            PrimitiveShape::Capsule { diameter, height } => Vec3::new(diameter, height.max(diameter), diameter),
            PrimitiveShape::Plane { width, depth } => Vec3::new(width, 0.0, depth),
        }
    }

    /// Shapes that rebuild from parameters instead of rescaling vertices.
    pub fn regenerates(&self) -> bool {
        matches!(self, PrimitiveShape::Sphere { .. } | PrimitiveShape::Cylinder { .. })
    }
}

/// Collision shape matching `bounds` (entity-local, already scaled).
pub fn physics_shape_for(kind: Option<PrimitiveKind>, bounds: &BoundingBox) -> PhysicsShape {
    let half = bounds.half_extents();
    match kind {
        Some(PrimitiveKind::Sphere) => PhysicsShape::Sphere {
            radius: half.max_element(),
        },
        Some(PrimitiveKind::Cylinder) => PhysicsShape::Cylinder {
            half_height: half.y,
            radius: half.x.max(half.z),
        },
        Some(PrimitiveKind::Capsule) => {
            let radius = half.x.max(half.z);
            PhysicsShape::Capsule {
                half_height: (half.y - radius).max(0.0),
                radius,
            }
        }
        Some(PrimitiveKind::Plane) => PhysicsShape::Box {
            half_extents: [half.x, half.y.max(0.005), half.z],
        },
        Some(PrimitiveKind::Box) | None => PhysicsShape::Box {
            half_extents: half.to_array(),
        },
    }
}

/// Vertex data and half extents captured when the entity was first built.
#[derive(Debug, Clone)]
pub struct GeometryBaseline {
    pub mesh: MeshData,
    pub half_extents: Vec3,
}

impl GeometryBaseline {
    fn capture(mesh: &MeshData) -> Self {
        Self {
            half_extents: mesh.bounds().map(|b| b.half_extents()).unwrap_or(Vec3::ZERO),
            mesh: mesh.clone(),
        }
    }

    /// The original vertices rescaled to `extents`.
    fn rescaled(&self, extents: Vec3) -> MeshData {
        let ratio = |target: f32, half: f32| if half > 1e-6 { target / (2.0 * half) } else { 1.0 };
        self.mesh.scaled(Vec3::new(
            ratio(extents.x, self.half_extents.x),
            ratio(extents.y, self.half_extents.y),
            ratio(extents.z, self.half_extents.z),
        ))
    }
}

#[derive(Debug, Default)]
pub struct GeometryRebuilder {
    baselines: HashMap<NodeId, GeometryBaseline>,
}

impl GeometryRebuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give a freshly spawned entity its mesh and remember the original geometry.
    pub fn build(&mut self, scene: &mut SceneGraph, node: NodeId, entity: EntityId, shape: &PrimitiveShape) {
        let mesh = shape.mesh();
        self.baselines.insert(node, GeometryBaseline::capture(&mesh));
        scene.set_mesh(entity, mesh);
    }

    /// Rebuild the entity's vertex data for `shape`, keeping its translation
    /// and rotation. Returns false when the entity is gone.
    pub fn rebuild(&mut self, scene: &mut SceneGraph, node: NodeId, entity: EntityId, shape: &PrimitiveShape) -> bool {
        let Some(current) = scene.get(entity) else {
            return false;
        };
        let transform = current.transform;
        let mesh = if shape.regenerates() {
            shape.mesh()
        } else {
            let baseline = match self.baselines.get(&node) {
                Some(baseline) => baseline,
                None => {
                    let Some(existing) = current.mesh.as_ref() else {
                        return false;
                    };
                    log::debug!("no geometry baseline for {node}; capturing the live mesh");
                    self.baselines
                        .entry(node)
                        .or_insert_with(|| GeometryBaseline::capture(existing))
                }
            };
            baseline.rescaled(shape.extents())
        };
        scene.set_mesh(entity, mesh);
        scene.apply_transform(
            entity,
            Transform {
                scale: Vec3::ONE,
                ..transform
            },
        );
        true
    }

    /// Replace the entity's collision shape with one fitted to its geometry.
    pub fn reconcile_physics(&self, scene: &mut SceneGraph, entity: EntityId, kind: Option<PrimitiveKind>) -> bool {
        let Some(scale) = scene.get(entity).map(|e| e.transform.scale.abs()) else {
            return false;
        };
        let Some(bounds) = scene.local_bounds(entity) else {
            return false;
        };
        let scaled = BoundingBox::new(bounds.min * scale, bounds.max * scale);
        scene.apply_physics_shape(entity, Some(physics_shape_for(kind, &scaled)))
    }

    pub fn baseline(&self, node: NodeId) -> Option<&GeometryBaseline> {
        self.baselines.get(&node)
    }

    pub fn forget(&mut self, node: NodeId) {
        self.baselines.remove(&node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn size_of(scene: &SceneGraph, id: EntityId) -> Vec3 {
        scene.world_bounds(id).unwrap().size()
    }

    #[rstest]
    #[case(PrimitiveShape::Box { width: 4.0, height: 3.0, depth: 1.0 }, Vec3::new(4.0, 3.0, 1.0))]
    #[case(PrimitiveShape::Box { width: 0.5, height: 3.0, depth: 7.0 }, Vec3::new(0.5, 3.0, 7.0))]
    #[case(PrimitiveShape::Capsule { diameter: 2.0, height: 5.0 }, Vec3::new(2.0, 5.0, 2.0))]
    // Shorter than its diameter: the capsule closes into a sphere.
    #[case(PrimitiveShape::Capsule { diameter: 2.0, height: 1.0 }, Vec3::splat(2.0))]
    #[case(PrimitiveShape::Plane { width: 5.0, depth: 1.5 }, Vec3::new(5.0, 0.0, 1.5))]
    #[case(PrimitiveShape::Sphere { diameter: 3.0, segments: 8 }, Vec3::splat(3.0))]
    #[case(PrimitiveShape::Cylinder { height: 4.0, diameter_top: 1.0, diameter_bottom: 2.0, tessellation: 12 }, Vec3::new(2.0, 4.0, 2.0))]
    fn rebuild_matches_authored_extents(#[case] shape: PrimitiveShape, #[case] expected: Vec3) {
        let mut scene = SceneGraph::new();
        let entity = scene.spawn("shape");
        let mut rebuilder = GeometryRebuilder::new();
        let original = match shape.kind() {
            PrimitiveKind::Box => PrimitiveShape::Box { width: 2.0, height: 3.0, depth: 1.0 },
            PrimitiveKind::Capsule => PrimitiveShape::Capsule { diameter: 1.0, height: 2.0 },
            PrimitiveKind::Sphere => PrimitiveShape::Sphere { diameter: 1.0, segments: 16 },
            PrimitiveKind::Cylinder => PrimitiveShape::Cylinder {
                height: 2.0,
                diameter_top: 1.0,
                diameter_bottom: 1.0,
                tessellation: 24,
            },
            PrimitiveKind::Plane => PrimitiveShape::Plane { width: 2.0, depth: 2.0 },
        };
        rebuilder.build(&mut scene, NodeId(1), entity, &original);
        assert!(rebuilder.rebuild(&mut scene, NodeId(1), entity, &shape));
        assert!((size_of(&scene, entity) - expected).length() < 1e-4);
    }

    #[test]
    fn repeated_edits_do_not_drift() {
        let mut scene = SceneGraph::new();
        let entity = scene.spawn("box");
        let mut rebuilder = GeometryRebuilder::new();
        rebuilder.build(&mut scene, NodeId(1), entity, &PrimitiveShape::Box { width: 1.0, height: 1.0, depth: 1.0 });
        for width in [3.0, 0.1, 7.5, 2.0] {
            let shape = PrimitiveShape::Box { width, height: 1.0, depth: 1.0 };
            rebuilder.rebuild(&mut scene, NodeId(1), entity, &shape);
        }
        assert!((size_of(&scene, entity).x - 2.0).abs() < 1e-5);
        assert_eq!(rebuilder.baseline(NodeId(1)).unwrap().half_extents, Vec3::splat(0.5));
    }

    #[test]
    fn rebuild_keeps_translation_and_resets_scale() {
        let mut scene = SceneGraph::new();
        let entity = scene.spawn("box");
        let mut rebuilder = GeometryRebuilder::new();
        rebuilder.build(&mut scene, NodeId(1), entity, &PrimitiveShape::Box { width: 1.0, height: 1.0, depth: 1.0 });
        scene.apply_transform(
            entity,
            Transform {
                translation: Vec3::new(3.0, 1.0, -2.0),
                scale: Vec3::splat(2.0),
                ..Default::default()
            },
        );
        rebuilder.rebuild(&mut scene, NodeId(1), entity, &PrimitiveShape::Box { width: 2.0, height: 1.0, depth: 1.0 });
        let transform = scene.get(entity).unwrap().transform;
        assert_eq!(transform.translation, Vec3::new(3.0, 1.0, -2.0));
        assert_eq!(transform.scale, Vec3::ONE);
    }

    #[test]
    fn physics_follows_rebuilt_geometry() {
        let mut scene = SceneGraph::new();
        let entity = scene.spawn("capsule");
        let mut rebuilder = GeometryRebuilder::new();
        let shape = PrimitiveShape::Capsule { diameter: 1.0, height: 3.0 };
        rebuilder.build(&mut scene, NodeId(1), entity, &shape);
        rebuilder.reconcile_physics(&mut scene, entity, Some(PrimitiveKind::Capsule));
        match scene.get(entity).unwrap().physics.unwrap().shape {
            PhysicsShape::Capsule { half_height, radius } => {
                assert!((radius - 0.5).abs() < 1e-5);
                assert!((half_height - 1.0).abs() < 1e-5);
            }
            other => panic!("unexpected shape {other:?}"),
        }
    }

    #[test]
    fn missing_inputs_use_declared_defaults() {
        let graph = crate::program::ProgramGraph::new();
        let (shape, missing) = PrimitiveShape::read(&graph, NodeId(42), NodeKind::CreateBox).unwrap();
        assert_eq!(shape, PrimitiveShape::Box { width: 1.0, height: 1.0, depth: 1.0 });
        assert_eq!(missing, vec!["WIDTH", "HEIGHT", "DEPTH"]);
    }
}
