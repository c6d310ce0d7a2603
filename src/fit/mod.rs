//! Parametric functions, peak shapes and the least-squares engine.

pub mod engine;
pub mod peak;
pub mod polynomial;
pub mod registry;
pub mod traits;

pub use engine::{fit, FitReport, StopReason};
pub use peak::{PeakFunction, PeakKind, RawOutcome, Xy};
pub use polynomial::Polynomial;
pub use registry::FunctionRegistry;
pub use traits::{FitParameter, ParametricFunction};
