//! Scene graph: lights, material, background and the idle spin of the mesh.

use glam::{Mat4, Vec3};

use crate::config::{rgb, AppearanceSettings, AutoRotateSettings};

/// Surface response shared by the whole mesh; diffuse color lives in the
/// vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub specular: [f32; 3],
    pub shininess: f32,
}

/// One ambient light plus one directional light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lighting {
    pub ambient: [f32; 3],
    /// Directional color already scaled by its intensity
    pub light_color: [f32; 3],
    /// Unit vector pointing from the scene toward the light
    pub light_direction: Vec3,
}

pub struct SceneGraph {
    pub material: Material,
    pub lighting: Lighting,
    pub background: [f32; 3],
    pub auto_rotate: bool,
    spin_speed: f32,
    /// Accumulated rotation about X and Y (radians)
    spin: (f32, f32),
}

impl SceneGraph {
    pub fn new(appearance: &AppearanceSettings, auto_rotate: &AutoRotateSettings) -> Self {
        let intensity = appearance.light_intensity.max(0.0);
        let light = rgb(appearance.light_color);
        let direction = Vec3::from_array(appearance.light_direction)
            .try_normalize()
            .unwrap_or(Vec3::Y);

        Self {
            material: Material {
                specular: rgb(appearance.specular_color),
                shininess: appearance.shininess,
            },
            lighting: Lighting {
                ambient: rgb(appearance.ambient_color),
                light_color: light.map(|c| c * intensity),
                light_direction: direction,
            },
            background: rgb(appearance.background_color),
            auto_rotate: auto_rotate.enabled,
            spin_speed: auto_rotate.speed,
            spin: (0.0, 0.0),
        }
    }

    /// Advance the idle spin by one tick.
    pub fn advance_spin(&mut self) {
        if !self.auto_rotate {
            return;
        }
        self.spin.0 = (self.spin.0 + self.spin_speed) % std::f32::consts::TAU;
        self.spin.1 = (self.spin.1 + self.spin_speed) % std::f32::consts::TAU;
    }

    pub fn reset_spin(&mut self) {
        self.spin = (0.0, 0.0);
    }

    pub fn spin(&self) -> (f32, f32) {
        self.spin
    }

    /// Model matrix of the displayed mesh. The mesh is origin-centered, so
    /// spinning happens in place.
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_rotation_y(self.spin.1) * Mat4::from_rotation_x(self.spin.0)
    }
}
