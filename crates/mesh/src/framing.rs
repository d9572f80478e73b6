use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::bounds::BoundingVolume;

/// Camera position, look-at target and vertical field of view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub target: Vec3,
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
}

impl CameraPose {
    pub fn distance(&self) -> f32 {
        self.position.distance(self.target)
    }
}

/// Tunables for [`frame`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramingConfig {
    /// Multiplier (> 1) on the tight-fit distance so the mesh stays clear of
    /// the frustum edges.
    pub margin: f32,
    /// Distance used when the radius is zero or the fit is not finite.
    pub fallback_distance: f32,
    /// Direction from the target toward the camera.
    pub view_axis: [f32; 3],
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            margin: 1.5,
            fallback_distance: 5.0,
            view_axis: [0.0, 0.0, 1.0],
        }
    }
}

/// Place the camera on the viewing axis far enough that the bounding sphere
/// of an origin-centered mesh fits the vertical field of view.
///
/// `d = margin * r / tan(fov / 2)`. The target is always the origin.
pub fn frame(bounds: &BoundingVolume, fov_degrees: f32, config: &FramingConfig) -> CameraPose {
    let radius = bounds.radius();
    let half_fov = (fov_degrees * 0.5).to_radians();

    let fitted = radius / half_fov.tan() * config.margin;
    let distance = if radius > 0.0 && fitted.is_finite() && fitted > 0.0 {
        fitted
    } else {
        config.fallback_distance
    };

    let axis = Vec3::from_array(config.view_axis).try_normalize().unwrap_or(Vec3::Z);

    CameraPose {
        position: axis * distance,
        target: Vec3::ZERO,
        fov_degrees,
    }
}
