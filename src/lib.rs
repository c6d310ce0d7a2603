//! Stecars - stress and texture calculation core for 2D X-ray diffraction.
//!
//! This crate turns detector images into diffractograms and fitted peak
//! tables:
//!
//! - Pixel to (2θ, γ) angle maps, shared between measurements of equal geometry
//! - Binning of clustered images into intensity curves per gamma sector
//! - Polynomial background and peak fitting with a bounded Levenberg-Marquardt solver
//! - Pole-figure angles and reflection tables across all clusters, optionally
//!   interpolated onto a regular alpha/beta grid
//! - FFI layer for Python (cffi) and other language bindings
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │     FFI Layer (stecars.h)           │
//! │  C-compatible functions & types     │
//! └─────────────────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────┐
//! │              Session                │
//! │  ┌───────────┐  ┌───────────────┐  │
//! │  │ Clusters  │  │  Dfgrams and  │  │
//! │  │ + Project │  │  Reflections  │  │
//! │  └───────────┘  └───────────────┘  │
//! │  ┌───────────┐  ┌───────────────┐  │
//! │  │ AngleMap  │  │  LM fitting   │  │
//! │  │ LRU cache │  │  engine       │  │
//! │  └───────────┘  └───────────────┘  │
//! └─────────────────────────────────────┘
//! ```
//!
//! # FFI Usage
//!
//! ```c
//! // Create a curve
//! CurveHandle curve;
//! steca_curve_create(xs, ys, len, &curve);
//!
//! // Fit a peak
//! CPeakFit fit;
//! steca_fit_peak(curve, "Gaussian", 14.0, 26.0, &fit);
//!
//! // Cleanup
//! steca_curve_free(curve);
//! ```

pub mod cache;
pub mod data;
pub mod error;
pub mod ffi;
pub mod fit;
pub mod geometry;
pub mod session;

// Re-export commonly used items
pub use data::{Curve, Image, Measurement, MetaAttribute, Metadata, Range, Ranges};
pub use error::{Result, StecaError};
pub use fit::{FitReport, FunctionRegistry, PeakFunction, PeakKind, Polynomial};
pub use geometry::{AngleMap, AngleMapKey, Geometry, ImageCut, Size2d};
pub use session::{ReflectionInfo, ReflectionInfos, Session, SessionConfig};

// Re-export FFI types for cbindgen
pub use ffi::curve::*;
pub use ffi::fit::*;
pub use ffi::types::*;
