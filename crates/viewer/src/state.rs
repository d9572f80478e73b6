//! What the viewer currently displays.

use mesh::{BoundingVolume, CameraPose};

use crate::load::RequestId;
use crate::render::MeshHandle;

/// The mesh resident on the GPU.
#[derive(Debug, Clone, PartialEq)]
pub struct InstalledMesh {
    pub handle: MeshHandle,
    pub request: RequestId,
    pub source: String,
    pub triangle_count: usize,
    /// Bounds after normalization
    pub bounds: BoundingVolume,
}

/// Holds at most one installed mesh and the pose it was framed with.
#[derive(Debug, Clone)]
pub struct ViewerState {
    mesh: Option<InstalledMesh>,
    pose: CameraPose,
}

impl ViewerState {
    pub fn new(initial_pose: CameraPose) -> Self {
        Self {
            mesh: None,
            pose: initial_pose,
        }
    }

    pub fn mesh(&self) -> Option<&InstalledMesh> {
        self.mesh.as_ref()
    }

    pub fn pose(&self) -> &CameraPose {
        &self.pose
    }

    /// Replace the displayed mesh; returns the one it displaces so the
    /// caller can release its GPU buffers.
    pub(crate) fn install(&mut self, mesh: InstalledMesh, pose: CameraPose) -> Option<InstalledMesh> {
        self.pose = pose;
        self.mesh.replace(mesh)
    }

    pub(crate) fn clear(&mut self) -> Option<InstalledMesh> {
        self.mesh.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn pose(z: f32) -> CameraPose {
        CameraPose {
            position: Vec3::new(0.0, 0.0, z),
            target: Vec3::ZERO,
            fov_degrees: 75.0,
        }
    }

    fn installed(handle: u64) -> InstalledMesh {
        InstalledMesh {
            handle: MeshHandle(handle),
            request: handle,
            source: format!("{handle}.stl"),
            triangle_count: 12,
            bounds: BoundingVolume::new(Vec3::splat(-1.0), Vec3::splat(1.0)),
        }
    }

    #[test]
    fn test_install_returns_displaced_mesh() {
        let mut state = ViewerState::new(pose(5.0));
        assert!(state.install(installed(1), pose(3.0)).is_none());
        let old = state.install(installed(2), pose(4.0)).unwrap();
        assert_eq!(old.handle, MeshHandle(1));
        assert_eq!(state.mesh().unwrap().handle, MeshHandle(2));
        assert_eq!(state.pose().position.z, 4.0);
    }

    #[test]
    fn test_clear_keeps_pose() {
        let mut state = ViewerState::new(pose(5.0));
        state.install(installed(1), pose(3.0));
        assert!(state.clear().is_some());
        assert!(state.mesh().is_none());
        assert_eq!(state.pose().position.z, 3.0);
        assert!(state.clear().is_none());
    }
}
