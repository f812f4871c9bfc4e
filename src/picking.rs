//! Screen to world picking against the scene graph.
//!
//! Rays come from a perspective camera; hits are tested against each mesh's
//! local bounds in that mesh's own frame (an oriented box in world space).
//! When nothing is hit the ray falls through to the ground plane `y = 0`.

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::mesh_asset::BoundingBox;
use crate::scene_graph::{EntityId, SceneGraph};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit length.
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Option<Self> {
        if direction.length_squared() <= f32::EPSILON {
            return None;
        }
        Some(Self {
            origin,
            direction: direction.normalize(),
        })
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Straight down through `point`, starting high above the scene.
    pub fn downward_through(point: Vec3) -> Self {
        Self {
            origin: Vec3::new(point.x, point.y + 1000.0, point.z),
            direction: Vec3::NEG_Y,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_radians: f32,
    pub near: f32,
    pub far: f32,
    /// Viewport size in pixels.
    pub viewport: Vec2,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 10.0, 15.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y_radians: 60f32.to_radians(),
            near: 0.1,
            far: 1000.0,
            viewport: Vec2::new(1280.0, 720.0),
        }
    }
}

impl Camera {
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        let aspect = if self.viewport.y > 0.0 {
            self.viewport.x / self.viewport.y
        } else {
            1.0
        };
        Mat4::perspective_rh_gl(self.fov_y_radians, aspect.max(0.0001), self.near, self.far)
    }

    /// World-space ray from the camera through a pixel position.
    pub fn screen_ray(&self, screen: Vec2) -> Option<Ray> {
        if self.viewport.x <= 0.0 || self.viewport.y <= 0.0 {
            return None;
        }
        let ndc_x = (2.0 * screen.x / self.viewport.x) - 1.0;
        let ndc_y = 1.0 - (2.0 * screen.y / self.viewport.y);
        let inv_view_proj = (self.projection_matrix() * self.view_matrix()).inverse();
        let world = inv_view_proj * Vec4::new(ndc_x, ndc_y, 1.0, 1.0);
        if world.w.abs() < f32::EPSILON {
            return None;
        }
        Ray::new(self.position, world.truncate() / world.w - self.position)
    }

    /// Pixel position of a world point, if it is in front of the camera.
    pub fn project_point(&self, point: Vec3) -> Option<Vec2> {
        let clip = self.projection_matrix() * self.view_matrix() * point.extend(1.0);
        if clip.w <= f32::EPSILON {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        Some(Vec2::new(
            (ndc.x + 1.0) * 0.5 * self.viewport.x,
            (1.0 - ndc.y) * 0.5 * self.viewport.y,
        ))
    }
}

/// Slab test. Returns the entry distance, or the exit distance when the ray
/// starts inside the box.
pub fn ray_aabb(ray: &Ray, bounds: &BoundingBox) -> Option<f32> {
    let mut t_min: f32 = 0.0;
    let mut t_max: f32 = f32::INFINITY;
    for axis in 0..3 {
        let o = ray.origin[axis];
        let d = ray.direction[axis];
        let (lo, hi) = (bounds.min[axis], bounds.max[axis]);
        if d.abs() < 1e-6 {
            if o < lo || o > hi {
                return None;
            }
            continue;
        }
        let inv_d = 1.0 / d;
        let mut t1 = (lo - o) * inv_d;
        let mut t2 = (hi - o) * inv_d;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        t_min = t_min.max(t1);
        t_max = t_max.min(t2);
        if t_min > t_max {
            return None;
        }
    }
    if t_max < 0.0 {
        return None;
    }
    Some(if t_min >= 0.0 { t_min } else { t_max })
}

fn matrix_is_finite(matrix: &Mat4) -> bool {
    matrix.to_cols_array().iter().all(|v| v.is_finite())
}

/// Distance along `ray` to a box given in the frame described by `world`.
pub fn ray_hit_oriented(ray: &Ray, world: &Mat4, local: &BoundingBox) -> Option<f32> {
    let inverse = world.inverse();
    if !matrix_is_finite(&inverse) {
        return None;
    }
    let local_ray = Ray::new(
        inverse.transform_point3(ray.origin),
        inverse.transform_vector3(ray.direction),
    )?;
    let t = ray_aabb(&local_ray, local)?;
    let hit = world.transform_point3(local_ray.at(t));
    Some((hit - ray.origin).length())
}

/// Intersection with the ground plane `y = 0`.
pub fn ray_ground(ray: &Ray) -> Option<Vec3> {
    if ray.direction.y.abs() < 1e-6 {
        return None;
    }
    let t = -ray.origin.y / ray.direction.y;
    (t >= 0.0).then(|| ray.at(t))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    pub entity: EntityId,
    pub point: Vec3,
    pub distance: f32,
}

/// Nearest visible mesh entity along `ray`.
pub fn pick(scene: &SceneGraph, ray: &Ray) -> Option<PickHit> {
    let depth = scene.len();
    scene
        .entities()
        .filter(|(_, entity)| entity.visible)
        .filter_map(|(id, entity)| {
            let local = entity.mesh.as_ref()?.bounds()?;
            let world = scene.world_matrix(id, depth)?;
            let distance = ray_hit_oriented(ray, &world, &local)?;
            Some(PickHit {
                entity: id,
                point: ray.at(distance),
                distance,
            })
        })
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
}

/// Where a ray lands: the nearest entity, else the ground plane.
pub fn pick_point(scene: &SceneGraph, ray: &Ray) -> Option<(Vec3, Option<EntityId>)> {
    match pick(scene, ray) {
        Some(hit) => Some((hit.point, Some(hit.entity))),
        None => ray_ground(ray).map(|point| (point, None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives;
    use crate::scene_graph::{EntityCapability, Transform};

    #[test]
    fn center_of_screen_looks_at_target() {
        let camera = Camera::default();
        let ray = camera.screen_ray(camera.viewport * 0.5).unwrap();
        let expected = (camera.target - camera.position).normalize();
        assert!((ray.direction - expected).length() < 1e-3);
        let ground = ray_ground(&ray).unwrap();
        assert!(ground.length() < 1e-2);
    }

    #[test]
    fn projected_points_round_trip_through_rays() {
        let camera = Camera::default();
        let point = Vec3::new(2.0, 0.0, -1.0);
        let pixel = camera.project_point(point).unwrap();
        let hit = ray_ground(&camera.screen_ray(pixel).unwrap()).unwrap();
        assert!((hit - point).length() < 5e-2);
    }

    #[test]
    fn nearest_entity_wins() {
        let mut scene = SceneGraph::new();
        let near = scene.spawn("near");
        scene.set_mesh(near, primitives::box_mesh(1.0, 1.0, 1.0));
        scene.apply_transform(near, Transform::from_translation(Vec3::new(0.0, 0.0, 2.0)));
        let far = scene.spawn("far");
        scene.set_mesh(far, primitives::box_mesh(1.0, 1.0, 1.0));

        let ray = Ray::new(Vec3::new(0.0, 0.0, 10.0), Vec3::NEG_Z).unwrap();
        let hit = pick(&scene, &ray).unwrap();
        assert_eq!(hit.entity, near);
        assert!((hit.point.z - 2.5).abs() < 1e-4);

        scene.set_visible_recursive(near, false);
        assert_eq!(pick(&scene, &ray).unwrap().entity, far);
    }

    #[test]
    fn rotated_boxes_are_hit_in_their_own_frame() {
        let mut scene = SceneGraph::new();
        let slab = scene.spawn("slab");
        scene.set_mesh(slab, primitives::box_mesh(4.0, 0.2, 0.2));
        scene.apply_transform(
            slab,
            Transform {
                rotation: glam::Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
                ..Default::default()
            },
        );
        // After a quarter turn the long axis runs along Z.
        let ray = Ray::new(Vec3::new(0.0, 5.0, 1.5), Vec3::NEG_Y).unwrap();
        assert!(pick(&scene, &ray).is_some());
        let ray = Ray::new(Vec3::new(1.5, 5.0, 0.0), Vec3::NEG_Y).unwrap();
        assert!(pick(&scene, &ray).is_none());
    }

    #[test]
    fn misses_fall_through_to_the_ground() {
        let scene = SceneGraph::new();
        let ray = Ray::downward_through(Vec3::new(3.0, 0.0, -2.0));
        assert_eq!(pick_point(&scene, &ray), Some((Vec3::new(3.0, 0.0, -2.0), None)));
    }
}
