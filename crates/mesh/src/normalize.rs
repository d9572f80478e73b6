use glam::{Mat4, Vec3};

use crate::bounds::BoundingVolume;
use crate::error::GeometryError;
use crate::types::TriangleMesh;

/// Canonical size of the largest axis after normalization.
pub const DEFAULT_DIAMETER: f32 = 2.0;

/// Extents at or below this are treated as a single point.
const DEGENERATE_EXTENT: f32 = 1e-12;

/// Uniform scale about the bounds center: `scale * (p + translation)` with
/// `translation = -center`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizationTransform {
    pub scale: f32,
    pub translation: Vec3,
}

impl NormalizationTransform {
    pub const IDENTITY: Self = Self {
        scale: 1.0,
        translation: Vec3::ZERO,
    };

    pub fn apply(&self, p: Vec3) -> Vec3 {
        (p + self.translation) * self.scale
    }

    /// Same mapping applied to a bounding volume. Scale is positive, so the
    /// corner ordering is preserved.
    pub fn apply_bounds(&self, bounds: &BoundingVolume) -> BoundingVolume {
        BoundingVolume::new(self.apply(bounds.min), self.apply(bounds.max))
    }

    /// Bake the mapping into every corner of `mesh`.
    pub fn apply_mesh(&self, mesh: &mut TriangleMesh) {
        for triangle in &mut mesh.triangles {
            for v in &mut triangle.vertices {
                *v = self.apply(*v);
            }
        }
    }

    /// Equivalent model matrix.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale(Vec3::splat(self.scale)) * Mat4::from_translation(self.translation)
    }
}

/// Map `bounds` onto a volume whose largest axis measures `diameter`,
/// centered at the origin. A single-point volume keeps scale 1 and is only
/// recentered.
pub fn normalize(
    bounds: &BoundingVolume,
    diameter: f32,
) -> Result<NormalizationTransform, GeometryError> {
    if !bounds.is_finite() {
        return Err(GeometryError::NonFiniteBounds);
    }

    let extent = bounds.max_extent();
    let scale = if extent <= DEGENERATE_EXTENT {
        1.0
    } else {
        diameter / extent
    };
    if !scale.is_finite() || scale <= 0.0 {
        return Err(GeometryError::InvalidScale { scale });
    }

    Ok(NormalizationTransform {
        scale,
        translation: -bounds.center(),
    })
}
