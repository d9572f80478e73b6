// Library crate: exposes the viewer runtime and its testable modules.
// Window, egui panels and the GL backend remain in the binary crate.

pub mod config;
pub mod fixtures;
pub mod harness;
pub mod load;
pub mod orbit;
pub mod render;
pub mod runtime;
pub mod scene;
pub mod source;
pub mod state;
pub mod validation;

pub use config::ViewerConfig;
pub use load::{LoadError, LoadEvent, LoadPhase, RequestId};
pub use render::{RenderBackend, SurfaceSize};
pub use runtime::ViewerRuntime;
pub use source::{DefaultFetcher, MeshSource, SourceFetcher};
