//! Error types for decoding and geometry operations.

use thiserror::Error;

/// Errors produced while turning raw bytes into a [`crate::TriangleMesh`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DecodeError {
    /// The buffer ends before the structure it announces is complete.
    #[error("truncated mesh data: {details}")]
    Truncated { details: String },

    /// The structure is present but does not follow the format grammar.
    #[error("malformed mesh data: {details}")]
    Malformed { details: String },

    /// The declared source format is not a triangle soup we understand.
    #[error("unsupported mesh format: {extension:?}")]
    UnsupportedFormat { extension: Option<String> },
}

/// Errors produced by bounds, normalization or framing math.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum GeometryError {
    /// Bounding box corners or extents are NaN or infinite.
    #[error("bounding volume is not finite")]
    NonFiniteBounds,

    /// The derived scale factor is not a finite positive number.
    #[error("normalization scale {scale} is not finite and positive")]
    InvalidScale { scale: f32 },
}
