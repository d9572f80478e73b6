//! Rendering seam between the viewer runtime and a graphics backend.
//!
//! The runtime never touches a graphics API directly. It hands a
//! [`RenderBackend`] mesh buffers to upload and one [`FrameDescription`] per
//! tick; the binary implements the trait with glow, tests with a headless
//! recorder.

pub mod mesh;

use glam::{Mat4, Vec3};
use thiserror::Error;

pub use self::mesh::MeshData;
use crate::scene::{Lighting, Material};

/// Backend-issued identifier of an uploaded mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u64);

/// Drawable area in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width over height, or `None` for an empty surface.
    pub fn aspect(&self) -> Option<f32> {
        (!self.is_empty()).then(|| self.width as f32 / self.height as f32)
    }
}

/// GPU-side failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResourceError {
    #[error("GPU allocation failed: {0}")]
    Allocation(String),

    #[error("shader program failed: {0}")]
    Shader(String),

    #[error("render surface is detached")]
    Detached,

    #[error("unknown mesh handle {0:?}")]
    UnknownMesh(MeshHandle),

    #[error("renderer lock poisoned")]
    Poisoned,
}

/// Everything a backend needs to draw one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameDescription {
    pub view: Mat4,
    pub projection: Mat4,
    /// Auto-rotation of the displayed mesh
    pub model: Mat4,
    pub eye: Vec3,
    pub mesh: Option<MeshHandle>,
    pub material: Material,
    pub lighting: Lighting,
    pub background: [f32; 3],
}

/// Graphics backend driven by [`ViewerRuntime`](crate::runtime::ViewerRuntime).
///
/// All calls happen on the render thread.
pub trait RenderBackend {
    /// Acquire the surface and compile programs. Called once per runtime.
    fn attach(&mut self) -> Result<(), ResourceError>;

    /// Upload a mesh. On error nothing stays allocated.
    fn upload_mesh(&mut self, data: &MeshData) -> Result<MeshHandle, ResourceError>;

    fn release_mesh(&mut self, handle: MeshHandle) -> Result<(), ResourceError>;

    fn resize(&mut self, size: SurfaceSize);

    fn render(&mut self, frame: &FrameDescription);

    /// Release every remaining GPU object and the surface.
    fn detach(&mut self) -> Result<(), ResourceError>;
}
