//! Factory functions for creating test meshes and STL payloads.

use glam::Vec3;
use mesh::{encode_ascii, encode_binary, Triangle, TriangleMesh};

// ── Mesh factories ──────────────────────────────────────────────

/// Axis-aligned box with 12 outward-facing triangles.
pub fn box_mesh(min: Vec3, max: Vec3) -> TriangleMesh {
    let c = |x: bool, y: bool, z: bool| {
        Vec3::new(
            if x { max.x } else { min.x },
            if y { max.y } else { min.y },
            if z { max.z } else { min.z },
        )
    };
    let faces = [
        // Front (+Z)
        ([c(false, false, true), c(true, false, true), c(true, true, true), c(false, true, true)], Vec3::Z),
        // Back (-Z)
        ([c(true, false, false), c(false, false, false), c(false, true, false), c(true, true, false)], Vec3::NEG_Z),
        // Right (+X)
        ([c(true, false, true), c(true, false, false), c(true, true, false), c(true, true, true)], Vec3::X),
        // Left (-X)
        ([c(false, false, false), c(false, false, true), c(false, true, true), c(false, true, false)], Vec3::NEG_X),
        // Top (+Y)
        ([c(false, true, true), c(true, true, true), c(true, true, false), c(false, true, false)], Vec3::Y),
        // Bottom (-Y)
        ([c(false, false, false), c(true, false, false), c(true, false, true), c(false, false, true)], Vec3::NEG_Y),
    ];

    let mut triangles = Vec::with_capacity(12);
    for (quad, normal) in faces {
        triangles.push(Triangle::new(normal, [quad[0], quad[1], quad[2]]));
        triangles.push(Triangle::new(normal, [quad[0], quad[2], quad[3]]));
    }
    TriangleMesh::new(triangles)
}

/// Cube of edge `size` centered at the origin.
pub fn cube_mesh(size: f32) -> TriangleMesh {
    let h = size * 0.5;
    box_mesh(Vec3::splat(-h), Vec3::splat(h))
}

/// Four-faced solid with one corner at the origin.
pub fn tetrahedron_mesh() -> TriangleMesh {
    let a = Vec3::ZERO;
    let b = Vec3::X;
    let c = Vec3::Y;
    let d = Vec3::Z;
    // Normals left zero; decode repairs them from winding.
    TriangleMesh::new(vec![
        Triangle::new(Vec3::ZERO, [a, c, b]),
        Triangle::new(Vec3::ZERO, [a, b, d]),
        Triangle::new(Vec3::ZERO, [a, d, c]),
        Triangle::new(Vec3::ZERO, [b, c, d]),
    ])
}

// ── STL payloads ────────────────────────────────────────────────

pub fn cube_binary_stl(size: f32) -> Vec<u8> {
    encode_binary(&cube_mesh(size), "cube")
}

pub fn cube_ascii_stl(size: f32) -> Vec<u8> {
    encode_ascii(&cube_mesh(size), "cube").into_bytes()
}

pub fn box_binary_stl(min: Vec3, max: Vec3) -> Vec<u8> {
    encode_binary(&box_mesh(min, max), "box")
}

pub fn tetrahedron_binary_stl() -> Vec<u8> {
    encode_binary(&tetrahedron_mesh(), "tetrahedron")
}

/// Binary header announcing triangles with no records behind it.
pub fn truncated_binary_stl() -> Vec<u8> {
    let mut bytes = vec![0u8; 80];
    bytes.extend_from_slice(&4u32.to_le_bytes());
    bytes.extend_from_slice(&[0u8; 20]);
    bytes
}

/// ASCII solid whose facet is missing its `outer loop`.
pub fn malformed_ascii_stl() -> Vec<u8> {
    b"solid broken\n  facet normal 0 0 1\n    vertex 0 0 0\n  endfacet\nendsolid broken\n".to_vec()
}

/// Well-formed binary file with zero triangles.
pub fn empty_binary_stl() -> Vec<u8> {
    encode_binary(&TriangleMesh::default(), "empty")
}
