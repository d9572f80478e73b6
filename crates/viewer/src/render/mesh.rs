use glam::Vec3;
use mesh::TriangleMesh;

/// Floats per interleaved vertex.
pub const VERTEX_STRIDE: usize = 9;

/// CPU-side mesh data: interleaved [pos.x, pos.y, pos.z, norm.x, norm.y, norm.z, r, g, b]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    /// 9 floats per vertex: position(3) + normal(3) + color(3)
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Weld the triangle soup into an indexed buffer, tinting every vertex
    /// with `color`. Positions are taken as-is; normalization is already
    /// baked in by the load pipeline.
    pub fn from_triangles(mesh: &TriangleMesh, color: [f32; 3]) -> Self {
        let indexed = mesh.to_indexed();
        let mut vertices = Vec::with_capacity(indexed.vertex_count() * VERTEX_STRIDE);
        for (p, n) in indexed.positions.iter().zip(&indexed.normals) {
            vertices.extend_from_slice(&[p.x, p.y, p.z, n.x, n.y, n.z, color[0], color[1], color[2]]);
        }
        Self {
            vertices,
            indices: indexed.indices,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / VERTEX_STRIDE
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.vertices
            .chunks_exact(VERTEX_STRIDE)
            .map(|v| Vec3::new(v[0], v[1], v[2]))
    }

    pub fn normals(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.vertices
            .chunks_exact(VERTEX_STRIDE)
            .map(|v| Vec3::new(v[3], v[4], v[5]))
    }
}
