use glam::{Mat4, Vec3};
use mesh::CameraPose;

use crate::config::{CameraSettings, OrbitSettings};

/// Largest pitch magnitude (radians); keeps the view from flipping over the pole.
const MAX_PITCH: f32 = 1.5;

/// Pending motion below this is dropped.
const SETTLE_EPSILON: f32 = 1e-5;

/// Damped orbit camera around a target point.
///
/// Input accumulates as pending motion; [`update`](Self::update) applies a
/// `damping` fraction of it each tick and decays the rest, so a drag keeps
/// gliding briefly after release.
pub struct OrbitControls {
    /// Horizontal rotation angle (radians)
    pub yaw: f32,
    /// Vertical rotation angle (radians)
    pub pitch: f32,
    /// Distance from target
    pub distance: f32,
    /// Camera target point
    pub target: Vec3,
    /// Vertical field of view (radians)
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    settings: OrbitSettings,
    pending_yaw: f32,
    pending_pitch: f32,
    /// Log-scale zoom; positive moves closer
    pending_zoom: f32,
    pending_pan: Vec3,
    home: CameraPose,
    enabled: bool,
}

impl OrbitControls {
    pub fn new(camera: &CameraSettings, settings: &OrbitSettings) -> Self {
        let home = CameraPose {
            position: Vec3::Z * camera.initial_distance,
            target: Vec3::ZERO,
            fov_degrees: camera.fov_degrees,
        };
        let mut controls = Self {
            yaw: 0.0,
            pitch: 0.0,
            distance: camera.initial_distance,
            target: Vec3::ZERO,
            fov: camera.fov_degrees.to_radians(),
            aspect: 1.0,
            near: camera.near,
            far: camera.far,
            settings: settings.clone(),
            pending_yaw: 0.0,
            pending_pitch: 0.0,
            pending_zoom: 0.0,
            pending_pan: Vec3::ZERO,
            home,
            enabled: true,
        };
        controls.apply_pose(&home);
        controls
    }

    /// Queue a rotation from a pointer drag in pixels.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        if !self.enabled {
            return;
        }
        let speed = self.settings.rotate_speed.to_radians();
        self.pending_yaw -= dx * speed;
        self.pending_pitch += dy * speed;
    }

    /// Queue a zoom. `amount > 0` moves the camera closer.
    pub fn zoom(&mut self, amount: f32) {
        if !self.enabled {
            return;
        }
        self.pending_zoom += amount;
    }

    /// Queue a scroll-wheel zoom in points.
    pub fn scroll(&mut self, delta: f32) {
        self.zoom(delta * self.settings.zoom_speed);
    }

    /// Queue a pan from a pointer drag in pixels over a viewport
    /// `viewport_height` pixels tall. The point under the cursor follows it.
    pub fn pan(&mut self, dx: f32, dy: f32, viewport_height: f32) {
        if !self.enabled || !self.settings.pan_enabled || viewport_height <= 0.0 {
            return;
        }
        let world_per_px = 2.0 * self.distance * (self.fov * 0.5).tan() / viewport_height;
        let offset = (-self.right_vector() * dx + self.up_vector() * dy) * world_per_px;
        self.pending_pan += offset;
    }

    /// Apply one tick of pending motion. Returns `true` while the camera is
    /// still moving.
    pub fn update(&mut self) -> bool {
        if !self.enabled || self.is_settled() {
            return false;
        }
        let f = self.settings.damping.clamp(0.0, 1.0);
        let step = if f > 0.0 { f } else { 1.0 };

        self.yaw += self.pending_yaw * step;
        self.pitch = (self.pitch + self.pending_pitch * step).clamp(-MAX_PITCH, MAX_PITCH);
        if self.pending_zoom != 0.0 {
            let min = self.settings.min_distance.min(self.settings.max_distance);
            let max = self.settings.max_distance.max(min);
            self.distance = (self.distance * (-self.pending_zoom * step).exp()).clamp(min, max);
        }
        self.target += self.pending_pan * step;

        let keep = 1.0 - step;
        self.pending_yaw = settle(self.pending_yaw * keep);
        self.pending_pitch = settle(self.pending_pitch * keep);
        self.pending_zoom = settle(self.pending_zoom * keep);
        self.pending_pan *= keep;
        if self.pending_pan.length_squared() < SETTLE_EPSILON * SETTLE_EPSILON {
            self.pending_pan = Vec3::ZERO;
        }
        true
    }

    pub fn is_settled(&self) -> bool {
        self.pending_yaw == 0.0
            && self.pending_pitch == 0.0
            && self.pending_zoom == 0.0
            && self.pending_pan == Vec3::ZERO
    }

    /// Jump to `pose` and make it the pose [`reset`](Self::reset) returns to.
    pub fn apply_pose(&mut self, pose: &CameraPose) {
        let offset = pose.position - pose.target;
        let distance = offset.length();
        self.target = pose.target;
        if distance > 0.0 && distance.is_finite() {
            self.distance = distance;
            self.yaw = offset.x.atan2(offset.z);
            self.pitch = (offset.y / distance).clamp(-1.0, 1.0).asin().clamp(-MAX_PITCH, MAX_PITCH);
        }
        self.fov = pose.fov_degrees.to_radians();
        self.home = *pose;
        self.stop();
    }

    /// Return to the most recently applied pose.
    pub fn reset(&mut self) {
        let home = self.home;
        self.apply_pose(&home);
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    /// Drop pending motion and ignore further input.
    pub fn dispose(&mut self) {
        self.stop();
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn stop(&mut self) {
        self.pending_yaw = 0.0;
        self.pending_pitch = 0.0;
        self.pending_zoom = 0.0;
        self.pending_pan = Vec3::ZERO;
    }

    /// Camera position in world space
    pub fn eye_position(&self) -> Vec3 {
        let cy = self.yaw.cos();
        let sy = self.yaw.sin();
        let cp = self.pitch.cos();
        let sp = self.pitch.sin();

        self.target
            + Vec3::new(
                self.distance * cp * sy,
                self.distance * sp,
                self.distance * cp * cy,
            )
    }

    /// View matrix (world -> camera)
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye_position(), self.target, Vec3::Y)
    }

    /// Projection matrix (camera -> clip)
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov, self.aspect, self.near, self.far)
    }

    fn right_vector(&self) -> Vec3 {
        let fwd = (self.target - self.eye_position()).normalize_or_zero();
        fwd.cross(Vec3::Y).normalize_or_zero()
    }

    fn up_vector(&self) -> Vec3 {
        let fwd = (self.target - self.eye_position()).normalize_or_zero();
        let right = self.right_vector();
        right.cross(fwd).normalize_or_zero()
    }
}

fn settle(v: f32) -> f32 {
    if v.abs() < SETTLE_EPSILON {
        0.0
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controls(damping: f32) -> OrbitControls {
        let orbit = OrbitSettings {
            damping,
            ..OrbitSettings::default()
        };
        OrbitControls::new(&CameraSettings::default(), &orbit)
    }

    fn run_until_settled(c: &mut OrbitControls) {
        for _ in 0..2000 {
            if !c.update() {
                return;
            }
        }
        panic!("controls never settled");
    }

    #[test]
    fn test_initial_pose_on_z_axis() {
        let c = controls(0.05);
        let eye = c.eye_position();
        assert!((eye - Vec3::new(0.0, 0.0, 5.0)).length() < 1e-5);
    }

    #[test]
    fn test_apply_pose_round_trips_eye() {
        let mut c = controls(0.05);
        let pose = CameraPose {
            position: Vec3::new(1.0, 2.0, 3.0),
            target: Vec3::new(0.5, 0.0, 0.0),
            fov_degrees: 60.0,
        };
        c.apply_pose(&pose);
        assert!((c.eye_position() - pose.position).length() < 1e-4);
        assert!((c.fov - 60.0_f32.to_radians()).abs() < 1e-6);
    }

    #[test]
    fn test_damped_rotation_glides_to_full_amount() {
        let mut c = controls(0.05);
        c.rotate(-20.0, 0.0);
        assert!(c.update());
        let first = c.yaw;
        assert!(first > 0.0 && first < 10.0_f32.to_radians());
        run_until_settled(&mut c);
        assert!((c.yaw - 10.0_f32.to_radians()).abs() < 1e-3);
    }

    #[test]
    fn test_zero_damping_applies_at_once() {
        let mut c = controls(0.0);
        c.rotate(0.0, 20.0);
        c.update();
        assert!((c.pitch - 10.0_f32.to_radians()).abs() < 1e-5);
        assert!(!c.update());
    }

    #[test]
    fn test_pitch_is_clamped() {
        let mut c = controls(0.0);
        c.rotate(0.0, 10_000.0);
        c.update();
        assert_eq!(c.pitch, MAX_PITCH);
    }

    #[test]
    fn test_zoom_respects_limits() {
        let mut c = controls(0.0);
        c.zoom(100.0);
        c.update();
        assert_eq!(c.distance, 1.0);
        c.zoom(-100.0);
        c.update();
        assert_eq!(c.distance, 100.0);
    }

    #[test]
    fn test_pan_moves_target() {
        let mut c = controls(0.0);
        c.pan(100.0, 0.0, 600.0);
        c.update();
        assert!(c.target.x < 0.0);
        assert!(c.target.y.abs() < 1e-5);
    }

    #[test]
    fn test_pan_disabled() {
        let orbit = OrbitSettings {
            pan_enabled: false,
            ..OrbitSettings::default()
        };
        let mut c = OrbitControls::new(&CameraSettings::default(), &orbit);
        c.pan(100.0, 50.0, 600.0);
        assert!(c.is_settled());
    }

    #[test]
    fn test_reset_returns_to_applied_pose() {
        let mut c = controls(0.0);
        let pose = CameraPose {
            position: Vec3::new(0.0, 0.0, 3.2),
            target: Vec3::ZERO,
            fov_degrees: 75.0,
        };
        c.apply_pose(&pose);
        c.rotate(50.0, 30.0);
        c.zoom(0.5);
        c.update();
        c.reset();
        assert!((c.eye_position() - pose.position).length() < 1e-5);
        assert!(c.is_settled());
    }

    #[test]
    fn test_dispose_ignores_input() {
        let mut c = controls(0.05);
        c.rotate(10.0, 10.0);
        c.dispose();
        c.rotate(10.0, 10.0);
        assert!(!c.update());
        assert_eq!(c.yaw, 0.0);
        assert!(!c.is_enabled());
    }

    #[test]
    fn test_projection_uses_aspect() {
        let mut c = controls(0.05);
        c.set_aspect(2.0);
        c.set_aspect(f32::NAN);
        assert_eq!(c.aspect, 2.0);
        let p = c.projection_matrix();
        assert!((p.x_axis.x * 2.0 - p.y_axis.y).abs() < 1e-5);
    }
}
