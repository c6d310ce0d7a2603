//! C-compatible type definitions for FFI.

use crate::error::StecaError;

/// Result status codes for FFI functions.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StecaStatus {
    /// Operation succeeded.
    Ok = 0,
    /// Null pointer was passed.
    NullPointer = 1,
    /// Invalid argument.
    InvalidArgument = 2,
    /// Array length mismatch.
    LengthMismatch = 3,
    /// Invalid UTF-8 string.
    InvalidUtf8 = 4,
    /// No peak function of that name.
    UnknownFunction = 5,
    /// Output buffer too small.
    BufferTooSmall = 6,
}

impl From<&StecaError> for StecaStatus {
    fn from(err: &StecaError) -> Self {
        match err {
            StecaError::LengthMismatch { .. } => StecaStatus::LengthMismatch,
            StecaError::UnknownFunction(_) => StecaStatus::UnknownFunction,
            _ => StecaStatus::InvalidArgument,
        }
    }
}

/// C-compatible array view (pointer + length).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CArrayView {
    pub data: *const f64,
    pub len: usize,
}

impl CArrayView {
    pub fn empty() -> Self {
        Self {
            data: std::ptr::null(),
            len: 0,
        }
    }

    pub fn from_slice(values: &[f64]) -> Self {
        Self {
            data: values.as_ptr(),
            len: values.len(),
        }
    }
}

/// C-compatible peak fit result.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CPeakFit {
    pub center: f64,
    pub center_error: f64,
    pub intensity: f64,
    pub intensity_error: f64,
    pub fwhm: f64,
    pub fwhm_error: f64,
    /// Solver iterations; 0 for raw peaks.
    pub iterations: usize,
    /// The solver stopped on a convergence criterion.
    pub converged: bool,
}
