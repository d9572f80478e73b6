//! Geometry core for the STL viewer.
//!
//! Everything here is synchronous and GPU-free: decoding a triangle soup,
//! measuring it, mapping it into the canonical viewing volume and choosing a
//! camera pose that frames it.

pub mod bounds;
pub mod error;
pub mod framing;
pub mod normalize;
pub mod stl;
pub mod types;

pub use bounds::BoundingVolume;
pub use error::{DecodeError, GeometryError};
pub use framing::{frame, CameraPose, FramingConfig};
pub use normalize::{normalize, NormalizationTransform, DEFAULT_DIAMETER};
pub use stl::{decode, encode_ascii, encode_binary, RawMeshBytes, StlFormat};
pub use types::{IndexedMesh, Triangle, TriangleMesh};
