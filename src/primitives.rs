//! Procedural primitive geometry, centered at the origin.

use std::f32::consts::{PI, TAU};

use glam::Vec3;

use crate::mesh_asset::MeshData;

/// Minimum tessellation accepted for curved primitives.
pub const MIN_SEGMENTS: u32 = 3;
/// Upper bound on tessellation so a typo cannot allocate millions of vertices.
pub const MAX_SEGMENTS: u32 = 128;

fn clamp_segments(segments: u32) -> u32 {
    segments.clamp(MIN_SEGMENTS, MAX_SEGMENTS)
}

/// Axis-aligned box with the given full extents.
pub fn box_mesh(width: f32, height: f32, depth: f32) -> MeshData {
    let (hx, hy, hz) = (width * 0.5, height * 0.5, depth * 0.5);
    let corners = [
        // Front face (Z+)
        [-hx, -hy, hz],
        [hx, -hy, hz],
        [hx, hy, hz],
        [-hx, hy, hz],
        // Back face (Z-)
        [-hx, -hy, -hz],
        [-hx, hy, -hz],
        [hx, hy, -hz],
        [hx, -hy, -hz],
        // Top face (Y+)
        [-hx, hy, -hz],
        [-hx, hy, hz],
        [hx, hy, hz],
        [hx, hy, -hz],
        // Bottom face (Y-)
        [-hx, -hy, -hz],
        [hx, -hy, -hz],
        [hx, -hy, hz],
        [-hx, -hy, hz],
        // Right face (X+)
        [hx, -hy, -hz],
        [hx, hy, -hz],
        [hx, hy, hz],
        [hx, -hy, hz],
        // Left face (X-)
        [-hx, -hy, -hz],
        [-hx, -hy, hz],
        [-hx, hy, hz],
        [-hx, hy, -hz],
    ];
    let positions = corners.iter().map(|c| Vec3::from_array(*c)).collect();
    let mut indices = Vec::with_capacity(36);
    for face in 0..6u32 {
        let base = face * 4;
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }
    MeshData::new(positions, indices)
}

/// Flat plane in the XZ plane (Y up).
pub fn plane_mesh(width: f32, depth: f32) -> MeshData {
    let (hx, hz) = (width * 0.5, depth * 0.5);
    let positions = vec![
        Vec3::new(-hx, 0.0, -hz),
        Vec3::new(hx, 0.0, -hz),
        Vec3::new(hx, 0.0, hz),
        Vec3::new(-hx, 0.0, hz),
    ];
    MeshData::new(positions, vec![0, 1, 2, 2, 3, 0])
}

/// UV sphere with `segments` latitude rings and twice as many longitude slices.
///
/// Ring and slice counts are kept even so the mesh touches its bounding box on
/// every axis.
pub fn sphere_mesh(diameter: f32, segments: u32) -> MeshData {
    let lat_segments = clamp_segments(segments).next_multiple_of(2);
    let lon_segments = lat_segments * 2;
    let radius = diameter * 0.5;

    let mut positions = Vec::new();
    let mut indices = Vec::new();

    for lat in 0..=lat_segments {
        let theta = PI * lat as f32 / lat_segments as f32;
        let (sin_theta, cos_theta) = theta.sin_cos();
        for lon in 0..=lon_segments {
            let phi = TAU * lon as f32 / lon_segments as f32;
            let (sin_phi, cos_phi) = phi.sin_cos();
            positions.push(Vec3::new(cos_phi * sin_theta, cos_theta, sin_phi * sin_theta) * radius);
        }
    }

    for lat in 0..lat_segments {
        for lon in 0..lon_segments {
            let first = lat * (lon_segments + 1) + lon;
            let second = first + lon_segments + 1;
            indices.extend_from_slice(&[first, second, first + 1, second, second + 1, first + 1]);
        }
    }

    MeshData::new(positions, indices)
}

/// Capped cylinder (or cone frustum) along Y.
pub fn cylinder_mesh(height: f32, diameter_top: f32, diameter_bottom: f32, tessellation: u32) -> MeshData {
    let slices = clamp_segments(tessellation).next_multiple_of(2);
    let half = height * 0.5;
    let (r_top, r_bottom) = (diameter_top * 0.5, diameter_bottom * 0.5);

    let mut positions = Vec::new();
    let mut indices = Vec::new();

    for i in 0..=slices {
        let phi = TAU * i as f32 / slices as f32;
        let (s, c) = phi.sin_cos();
        positions.push(Vec3::new(c * r_bottom, -half, s * r_bottom));
        positions.push(Vec3::new(c * r_top, half, s * r_top));
    }
    for i in 0..slices {
        let b0 = i * 2;
        indices.extend_from_slice(&[b0, b0 + 1, b0 + 2, b0 + 2, b0 + 1, b0 + 3]);
    }

    let bottom_center = positions.len() as u32;
    positions.push(Vec3::new(0.0, -half, 0.0));
    let top_center = positions.len() as u32;
    positions.push(Vec3::new(0.0, half, 0.0));
    for i in 0..slices {
        let b0 = i * 2;
        indices.extend_from_slice(&[bottom_center, b0 + 2, b0]);
        indices.extend_from_slice(&[top_center, b0 + 1, b0 + 3]);
    }

    MeshData::new(positions, indices)
}

/// Capsule along Y. The overall height never drops below the diameter.
pub fn capsule_mesh(diameter: f32, height: f32) -> MeshData {
    let radius = diameter * 0.5;
    let height = height.max(diameter);
    let half_body = (height - diameter) * 0.5;
    let rings: u32 = 8;
    let slices: u32 = 16;

    let mut positions = Vec::new();
    let mut indices = Vec::new();

    // Upper hemisphere rings, then lower; the equator ring is duplicated so the
    // straight body is the band between them.
    let mut ring_params = Vec::new();
    for r in 0..=rings {
        let theta = (PI * 0.5) * r as f32 / rings as f32;
        ring_params.push((theta, half_body));
    }
    for r in 0..=rings {
        let theta = PI * 0.5 + (PI * 0.5) * r as f32 / rings as f32;
        ring_params.push((theta, -half_body));
    }

    for (theta, offset) in &ring_params {
        let (sin_theta, cos_theta) = theta.sin_cos();
        for s in 0..=slices {
            let phi = TAU * s as f32 / slices as f32;
            let (sin_phi, cos_phi) = phi.sin_cos();
            positions.push(Vec3::new(
                cos_phi * sin_theta * radius,
                cos_theta * radius + offset,
                sin_phi * sin_theta * radius,
            ));
        }
    }

    let ring_count = ring_params.len() as u32;
    for r in 0..ring_count - 1 {
        for s in 0..slices {
            let first = r * (slices + 1) + s;
            let second = first + slices + 1;
            indices.extend_from_slice(&[first, second, first + 1, second, second + 1, first + 1]);
        }
    }

    MeshData::new(positions, indices)
}

/// Square height field in the XZ plane with `resolution` cells per side.
pub fn terrain_mesh(size: f32, resolution: u32, height: impl Fn(f32, f32) -> f32) -> MeshData {
    let cells = resolution.clamp(1, MAX_SEGMENTS);
    let step = size / cells as f32;
    let half = size * 0.5;

    let mut positions = Vec::with_capacity(((cells + 1) * (cells + 1)) as usize);
    for row in 0..=cells {
        for col in 0..=cells {
            let x = col as f32 * step - half;
            let z = row as f32 * step - half;
            positions.push(Vec3::new(x, height(x, z), z));
        }
    }

    let mut indices = Vec::with_capacity((cells * cells * 6) as usize);
    for row in 0..cells {
        for col in 0..cells {
            let a = row * (cells + 1) + col;
            let b = a + cells + 1;
            indices.extend_from_slice(&[a, b, a + 1, b, b + 1, a + 1]);
        }
    }

    MeshData::new(positions, indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_size(mesh: &MeshData, expected: Vec3) {
        let size = mesh.bounds().unwrap().size();
        assert!(
            (size - expected).abs().max_element() < 1e-4,
            "size {size:?} != {expected:?}"
        );
    }

    #[test]
    fn box_extents_match_dimensions() {
        let mesh = box_mesh(2.0, 3.0, 1.0);
        assert_size(&mesh, Vec3::new(2.0, 3.0, 1.0));
        assert_eq!(mesh.triangle_count(), 12);
        assert!(mesh.bounds().unwrap().center().length() < 1e-6);
    }

    #[test]
    fn sphere_extents_match_diameter() {
        assert_size(&sphere_mesh(3.0, 16), Vec3::splat(3.0));
        assert_size(&sphere_mesh(1.0, 5), Vec3::splat(1.0));
    }

    #[test]
    fn sphere_tessellation_changes_vertex_count() {
        let coarse = sphere_mesh(1.0, 8);
        let fine = sphere_mesh(1.0, 32);
        assert!(fine.positions.len() > coarse.positions.len());
    }

    #[test]
    fn cylinder_uses_widest_diameter() {
        assert_size(&cylinder_mesh(2.0, 1.0, 3.0, 24), Vec3::new(3.0, 2.0, 3.0));
    }

    #[test]
    fn capsule_height_is_clamped_to_diameter() {
        assert_size(&capsule_mesh(1.0, 3.0), Vec3::new(1.0, 3.0, 1.0));
        assert_size(&capsule_mesh(2.0, 1.0), Vec3::new(2.0, 2.0, 2.0));
    }

    #[test]
    fn plane_is_flat() {
        assert_size(&plane_mesh(4.0, 2.0), Vec3::new(4.0, 0.0, 2.0));
    }

    #[test]
    fn terrain_follows_height_function() {
        let mesh = terrain_mesh(10.0, 4, |x, _| if x > 0.0 { 2.0 } else { 0.0 });
        assert_eq!(mesh.positions.len(), 25);
        assert_eq!(mesh.triangle_count(), 32);
        assert_size(&mesh, Vec3::new(10.0, 2.0, 10.0));
    }
}
