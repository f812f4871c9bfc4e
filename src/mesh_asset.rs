//! Mesh data, bounding boxes and the model asset registry.
//!
//! Models are multi-part meshes: every part carries a semantic name (the OBJ
//! object name, or a built-in label such as `Skin` or `TShirt`) that palettes
//! and per-part color bindings match against.

use std::collections::HashMap;
use std::sync::Arc;

use glam::{Mat4, Vec3};
use thiserror::Error;

use crate::color::Color;
use crate::primitives;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to parse OBJ: {0}")]
    Obj(#[from] tobj::LoadError),
    #[error("OBJ file contains no models")]
    EmptyObj,
    #[error("model '{0}' is not registered")]
    UnknownModel(String),
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Compute bounding box from a set of points.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        let mut bounds = Self::new(first, first);
        for p in iter {
            bounds.min = bounds.min.min(*p);
            bounds.max = bounds.max.max(*p);
        }
        Some(bounds)
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn half_extents(&self) -> Vec3 {
        self.size() * 0.5
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::new(self.min.min(other.min), self.max.max(other.max))
    }

    pub fn union_opt(acc: Option<BoundingBox>, next: BoundingBox) -> Option<BoundingBox> {
        Some(match acc {
            Some(b) => b.union(&next),
            None => next,
        })
    }
}

/// Triangle mesh in entity-local space.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        Self { positions, indices }
    }

    pub fn bounds(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(&self.positions)
    }

    /// Bounds of the mesh after transforming every vertex by `matrix`.
    pub fn transformed_bounds(&self, matrix: &Mat4) -> Option<BoundingBox> {
        let points: Vec<Vec3> = self
            .positions
            .iter()
            .map(|p| matrix.transform_point3(*p))
            .collect();
        BoundingBox::from_points(&points)
    }

    /// Multiply every vertex by a per-axis factor.
    pub fn scaled(&self, factor: Vec3) -> Self {
        Self {
            positions: self.positions.iter().map(|p| *p * factor).collect(),
            indices: self.indices.clone(),
        }
    }

    /// Move every vertex by `offset`.
    pub fn translated(&self, offset: Vec3) -> Self {
        Self {
            positions: self.positions.iter().map(|p| *p + offset).collect(),
            indices: self.indices.clone(),
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// One named piece of a model.
#[derive(Debug, Clone)]
pub struct ModelPart {
    pub name: String,
    pub mesh: MeshData,
    pub color: Color,
}

/// A loadable multi-part model.
#[derive(Debug, Clone)]
pub struct ModelAsset {
    pub id: String,
    pub parts: Vec<ModelPart>,
    /// Animation clips the model ships with; the first one autoplays.
    pub animations: Vec<String>,
    /// Scale the loader applies to the renderable root.
    pub import_scale: f32,
}

impl ModelAsset {
    pub fn new(id: impl Into<String>, parts: Vec<ModelPart>) -> Self {
        Self {
            id: id.into(),
            parts,
            animations: Vec::new(),
            import_scale: 1.0,
        }
    }

    pub fn with_animations(mut self, animations: &[&str]) -> Self {
        self.animations = animations.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_import_scale(mut self, scale: f32) -> Self {
        self.import_scale = scale;
        self
    }

    pub fn bounds(&self) -> Option<BoundingBox> {
        self.parts
            .iter()
            .filter_map(|p| p.mesh.bounds())
            .fold(None, BoundingBox::union_opt)
    }

    /// Parse a model from OBJ content, one part per object.
    pub fn from_obj(id: &str, obj_content: &str) -> Result<Self, AssetError> {
        let mut cursor = std::io::Cursor::new(obj_content.as_bytes());
        let load_options = tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        };
        let (models, _materials) =
            tobj::load_obj_buf(&mut cursor, &load_options, |_| Ok((vec![], HashMap::new())))?;

        let parts: Vec<ModelPart> = models
            .into_iter()
            .filter(|m| !m.mesh.positions.is_empty())
            .enumerate()
            .map(|(i, model)| {
                let positions = model
                    .mesh
                    .positions
                    .chunks_exact(3)
                    .map(|c| Vec3::new(c[0], c[1], c[2]))
                    .collect();
                let name = if model.name.is_empty() {
                    format!("part{i}")
                } else {
                    model.name
                };
                ModelPart {
                    name,
                    mesh: MeshData::new(positions, model.mesh.indices),
                    color: Color::new(0.8, 0.8, 0.8),
                }
            })
            .collect();

        if parts.is_empty() {
            return Err(AssetError::EmptyObj);
        }
        Ok(Self::new(id, parts))
    }
}

fn part(name: &str, mesh: MeshData, hex: &str) -> ModelPart {
    ModelPart {
        name: name.to_string(),
        mesh,
        color: Color::from_hex(hex).unwrap_or_default(),
    }
}

fn humanoid(id: &str, height: f32, build: f32) -> ModelAsset {
    let leg = height * 0.45;
    let torso = height * 0.35;
    let head = height * 0.2;
    let hips = leg;
    let parts = vec![
        part(
            "Shorts",
            primitives::box_mesh(0.5 * build, leg, 0.3 * build).translated(Vec3::new(0.0, leg * 0.5, 0.0)),
            "#00008b",
        ),
        part(
            "TShirt",
            primitives::box_mesh(0.6 * build, torso, 0.35 * build)
                .translated(Vec3::new(0.0, hips + torso * 0.5, 0.0)),
            "#ff8f60",
        ),
        part(
            "Sleeves",
            primitives::box_mesh(0.95 * build, torso * 0.4, 0.25 * build)
                .translated(Vec3::new(0.0, hips + torso * 0.8, 0.0)),
            "#ffffff",
        ),
        part(
            "Skin",
            primitives::box_mesh(0.3 * build, head, 0.3 * build)
                .translated(Vec3::new(0.0, hips + torso + head * 0.5, 0.0)),
            "#f0c8a0",
        ),
        part(
            "Hair",
            primitives::box_mesh(0.32 * build, head * 0.25, 0.32 * build)
                .translated(Vec3::new(0.0, hips + torso + head * 0.9, 0.0)),
            "#3b2314",
        ),
        part(
            "Eyes",
            primitives::box_mesh(0.2 * build, head * 0.1, 0.02)
                .translated(Vec3::new(0.0, hips + torso + head * 0.6, 0.15 * build + 0.01)),
            "#000000",
        ),
    ];
    ModelAsset::new(id, parts)
}

/// Registry for model assets.
///
/// Caches assets to avoid redundant loading and allows sharing across instances.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    assets: HashMap<String, Arc<ModelAsset>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the procedural models shipped with the crate.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(humanoid("character", 1.8, 1.0).with_animations(&["Idle", "Walk", "Wave"]));
        registry.register(humanoid("robot", 2.2, 1.3).with_animations(&["Idle", "Walk"]));
        registry.register(ModelAsset::new(
            "tree",
            vec![
                part(
                    "trunk",
                    primitives::cylinder_mesh(1.2, 0.3, 0.4, 12).translated(Vec3::new(0.0, 0.6, 0.0)),
                    "#8b5a2b",
                ),
                part(
                    "canopy",
                    primitives::sphere_mesh(1.6, 12).translated(Vec3::new(0.0, 1.9, 0.0)),
                    "#228b22",
                ),
            ],
        ));
        registry.register(ModelAsset::new(
            "crate",
            vec![part("body", primitives::box_mesh(1.0, 1.0, 1.0), "#c19a6b")],
        ));
        registry.register(ModelAsset::new(
            "rock",
            vec![part(
                "stone",
                primitives::sphere_mesh(1.0, 6).scaled(Vec3::new(1.4, 0.7, 1.0)),
                "#808080",
            )],
        ));
        registry
    }

    /// Register a model from OBJ content.
    pub fn register_from_obj(&mut self, asset_id: &str, obj_content: &str) -> Result<(), AssetError> {
        let asset = ModelAsset::from_obj(asset_id, obj_content)?;
        self.register(asset);
        Ok(())
    }

    pub fn register(&mut self, asset: ModelAsset) {
        self.assets.insert(asset.id.clone(), Arc::new(asset));
    }

    pub fn get(&self, asset_id: &str) -> Option<Arc<ModelAsset>> {
        self.assets.get(asset_id).cloned()
    }

    pub fn contains(&self, asset_id: &str) -> bool {
        self.assets.contains_key(asset_id)
    }

    pub fn unregister(&mut self, asset_id: &str) -> bool {
        self.assets.remove(asset_id).is_some()
    }

    /// Registered ids, sorted.
    pub fn asset_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.assets.keys().map(|s| s.as_str()).collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_from_points() {
        let points = [
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 2.0, 0.0),
        ];
        let bounds = BoundingBox::from_points(&points).unwrap();
        assert_eq!(bounds.min, Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(bounds.max, Vec3::new(1.0, 2.0, 0.0));
        assert!(BoundingBox::from_points(&[]).is_none());
    }

    #[test]
    fn obj_objects_become_parts() {
        let obj_content = "o Wheel\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\no Body\nv 0 0 1\nv 1 0 1\nv 0 1 1\nf 4 5 6\n";
        let asset = ModelAsset::from_obj("cart", obj_content).unwrap();
        let names: Vec<&str> = asset.parts.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Wheel", "Body"]);
        assert_eq!(asset.parts[0].mesh.triangle_count(), 1);
    }

    #[test]
    fn registry_round_trip() {
        let mut registry = ModelRegistry::new();
        registry
            .register_from_obj("tri", "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3")
            .unwrap();
        assert!(registry.contains("tri"));
        assert!(!registry.contains("nonexistent"));
        assert_eq!(registry.get("tri").unwrap().id, "tri");
        assert!(registry.unregister("tri"));
        assert!(!registry.contains("tri"));
    }

    #[test]
    fn builtin_character_has_semantic_parts() {
        let registry = ModelRegistry::with_builtins();
        let character = registry.get("character").unwrap();
        for name in ["Skin", "Hair", "Eyes", "Sleeves", "Shorts", "TShirt"] {
            assert!(character.parts.iter().any(|p| p.name == name), "missing {name}");
        }
        let bounds = character.bounds().unwrap();
        assert!(bounds.min.y.abs() < 1e-5);
        assert!((bounds.max.y - 1.8).abs() < 0.05);
    }
}
