//! Mesh validation utilities.
//!
//! `MeshValidator` checks vertex buffers produced by the load pipeline:
//! stride, in-range indices, unit normals and the canonical viewing volume.

use mesh::BoundingVolume;

use crate::render::mesh::VERTEX_STRIDE;
use crate::render::MeshData;

/// Validator for `MeshData` integrity checks.
pub struct MeshValidator<'a> {
    mesh: &'a MeshData,
}

impl<'a> MeshValidator<'a> {
    pub fn new(mesh: &'a MeshData) -> Self {
        Self { mesh }
    }

    pub fn vertex_count(&self) -> usize {
        self.mesh.vertices.len() / VERTEX_STRIDE
    }

    pub fn triangle_count(&self) -> usize {
        self.mesh.indices.len() / 3
    }

    /// Check that the vertex buffer length is a multiple of the stride.
    pub fn is_stride_valid(&self) -> bool {
        self.mesh.vertices.len() % VERTEX_STRIDE == 0
    }

    pub fn is_index_stride_valid(&self) -> bool {
        self.mesh.indices.len() % 3 == 0
    }

    pub fn are_indices_in_range(&self) -> bool {
        let max_idx = self.vertex_count() as u32;
        self.mesh.indices.iter().all(|&i| i < max_idx)
    }

    /// Check that all vertex normals have unit length (within epsilon).
    pub fn are_normals_normalized(&self, epsilon: f32) -> bool {
        self.mesh
            .normals()
            .all(|n| (n.length() - 1.0).abs() <= epsilon)
    }

    pub fn are_positions_finite(&self) -> bool {
        self.mesh.positions().all(|p| p.is_finite())
    }

    pub fn bounds(&self) -> Option<BoundingVolume> {
        BoundingVolume::from_points(self.mesh.positions())
    }

    /// Check that the largest axis measures `diameter` and the box is
    /// centered at the origin.
    pub fn is_normalized(&self, diameter: f32, epsilon: f32) -> bool {
        match self.bounds() {
            Some(b) if b.is_degenerate() => b.center().length() <= epsilon,
            Some(b) => {
                (b.max_extent() - diameter).abs() <= epsilon && b.center().length() <= epsilon
            }
            None => false,
        }
    }

    /// Run all validation checks and return a list of error messages.
    /// An empty list means the mesh is valid.
    pub fn validate_all(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !self.is_stride_valid() {
            errors.push(format!(
                "Vertex buffer length {} is not a multiple of {VERTEX_STRIDE}",
                self.mesh.vertices.len()
            ));
        }

        if !self.is_index_stride_valid() {
            errors.push(format!(
                "Index buffer length {} is not a multiple of 3",
                self.mesh.indices.len()
            ));
        }

        if !self.are_indices_in_range() {
            let max_idx = self.vertex_count() as u32;
            let out_of_range: Vec<_> = self
                .mesh
                .indices
                .iter()
                .filter(|&&i| i >= max_idx)
                .take(5)
                .collect();
            errors.push(format!(
                "Indices out of range (vertex_count={}): {:?}",
                max_idx, out_of_range
            ));
        }

        if !self.are_positions_finite() {
            errors.push("Some positions are NaN or infinite".to_string());
        }

        if self.vertex_count() > 0 && !self.are_normals_normalized(0.1) {
            errors.push("Some normals are not unit-length (epsilon=0.1)".to_string());
        }

        errors
    }
}
