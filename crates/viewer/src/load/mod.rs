//! Asynchronous mesh loading.
//!
//! A load request is a [`LoadSession`] that walks the fetch, decode, bound,
//! normalize and frame stages on the tokio runtime and reports back to the
//! [`ViewerRuntime`](crate::runtime::ViewerRuntime). Every session holds a
//! [`LoadToken`]; once a newer request (or teardown) supersedes it, the
//! session stops at its next stage boundary and its result is discarded.

mod events;
mod session;
mod token;

pub use events::{EventHub, LoadEvent};
pub use session::{
    run_pipeline, LoadPhase, LoadSession, PipelineSettings, PreparedMesh, SessionOutcome,
    SessionReport, Superseded,
};
pub use token::{LoadToken, RequestId, TokenSource};

use mesh::{DecodeError, GeometryError};
use thiserror::Error;

use crate::render::ResourceError;
use crate::source::FetchError;

/// Why a load session ended in `Failed`.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("mesh contains no triangles")]
    EmptyMesh,

    #[error("cannot normalize mesh: {0}")]
    Geometry(#[from] GeometryError),

    #[error("GPU upload failed: {0}")]
    Resource(#[from] ResourceError),

    #[error("load worker stopped: {0}")]
    Worker(String),
}
