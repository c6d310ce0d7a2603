//! C-compatible FFI layer.
//!
//! Exposes curves and single-curve fitting to other languages (Python cffi,
//! C). Every function returns a [`StecaStatus`] or a value with a
//! documented null fallback. Handles are owned by the caller.

pub mod curve;
pub mod fit;
pub mod types;

pub use curve::*;
pub use fit::*;
pub use types::*;
