use glam::Vec3;

use crate::types::TriangleMesh;

/// Axis-aligned bounding box with a derived bounding sphere.
///
/// The sphere radius is half the box diagonal. Camera framing uses the same
/// definition, so any box-derived volume frames consistently.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingVolume {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingVolume {
    /// Box spanning the given corners; components are reordered so that
    /// `min <= max` holds on every axis.
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Single pass over all corner positions. `None` for an empty mesh.
    pub fn from_mesh(mesh: &TriangleMesh) -> Option<Self> {
        Self::from_points(mesh.positions())
    }

    /// Running min/max over a point stream. `None` when the stream is empty.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let (min, max) = points.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Some(Self { min, max })
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Size along each axis.
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Largest of the three axis extents.
    pub fn max_extent(&self) -> f32 {
        self.extent().max_element()
    }

    /// Half the diagonal length; zero when all points coincide.
    pub fn radius(&self) -> f32 {
        self.extent().length() * 0.5
    }

    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.extent().is_finite()
    }

    /// All points coincide.
    pub fn is_degenerate(&self) -> bool {
        self.min == self.max
    }

    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }
}
