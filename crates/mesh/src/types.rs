use std::collections::HashMap;

use glam::Vec3;

/// One facet of a triangle soup: a face normal and three corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub normal: Vec3,
    pub vertices: [Vec3; 3],
}

impl Triangle {
    pub fn new(normal: Vec3, vertices: [Vec3; 3]) -> Self {
        Self { normal, vertices }
    }

    /// Normal derived from the counter-clockwise winding of the corners.
    /// Zero for a degenerate (zero-area) facet.
    pub fn winding_normal(&self) -> Vec3 {
        let [a, b, c] = self.vertices;
        (b - a).cross(c - a).normalize_or_zero()
    }

    /// True when the stored normal cannot be used for shading.
    pub fn has_unusable_normal(&self) -> bool {
        !self.normal.is_finite() || self.normal.length_squared() < 1e-12
    }
}

/// Ordered, unindexed list of triangles as read from a triangle-soup file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    pub triangles: Vec<Triangle>,
}

impl TriangleMesh {
    pub fn new(triangles: Vec<Triangle>) -> Self {
        Self { triangles }
    }

    pub fn with_capacity(triangles: usize) -> Self {
        Self {
            triangles: Vec::with_capacity(triangles),
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.triangles.len() * 3
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Iterate every corner position, three per triangle.
    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.triangles.iter().flat_map(|t| t.vertices)
    }

    /// Replace zero or non-finite stored normals with the winding normal.
    /// Returns how many facets were repaired.
    pub fn repair_normals(&mut self) -> usize {
        let mut repaired = 0;
        for triangle in &mut self.triangles {
            if triangle.has_unusable_normal() {
                triangle.normal = triangle.winding_normal();
                repaired += 1;
            } else {
                triangle.normal = triangle.normal.normalize();
            }
        }
        repaired
    }

    /// Weld corners that share an identical position and normal into a
    /// vertex buffer plus index buffer. Flat shading is preserved because
    /// corners of facets with different normals are never merged.
    pub fn to_indexed(&self) -> IndexedMesh {
        let mut lookup: HashMap<([u32; 3], [u32; 3]), u32> =
            HashMap::with_capacity(self.vertex_count());
        let mut out = IndexedMesh {
            positions: Vec::new(),
            normals: Vec::new(),
            indices: Vec::with_capacity(self.vertex_count()),
        };

        for triangle in &self.triangles {
            for &corner in &triangle.vertices {
                let key = (vec_bits(corner), vec_bits(triangle.normal));
                let index = *lookup.entry(key).or_insert_with(|| {
                    out.positions.push(corner);
                    out.normals.push(triangle.normal);
                    (out.positions.len() - 1) as u32
                });
                out.indices.push(index);
            }
        }

        out
    }
}

/// Deduplicated form of a [`TriangleMesh`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexedMesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
}

impl IndexedMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

// -0.0 and 0.0 weld together
fn vec_bits(v: Vec3) -> [u32; 3] {
    [(v.x + 0.0).to_bits(), (v.y + 0.0).to_bits(), (v.z + 0.0).to_bits()]
}
