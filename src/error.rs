//! Error types shared across the crate.

use thiserror::Error;

/// Errors reported at the crate's data boundaries.
///
/// Programmer errors (a cut larger than the image, a degenerate geometry) are
/// not represented here; those panic at the call site.
#[derive(Error, Debug)]
pub enum StecaError {
    /// x and y arrays handed to a curve differ in length.
    #[error("array length mismatch: x={x_len}, y={y_len}")]
    LengthMismatch { x_len: usize, y_len: usize },

    /// A peak function name that is not registered.
    #[error("unknown peak function: {0}")]
    UnknownFunction(String),

    /// A measurement or correction image whose size differs from the session's.
    #[error("image size {actual_w}x{actual_h} does not match session size {expected_w}x{expected_h}")]
    ImageSizeMismatch {
        expected_w: usize,
        expected_h: usize,
        actual_w: usize,
        actual_h: usize,
    },

    /// A configuration or table could not be read from or written as JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, StecaError>;
