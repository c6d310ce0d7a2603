//! Core data structures: ranges, curves, images and measurements.

pub mod curve;
pub mod image;
pub mod measurement;
pub mod metadata;
pub mod range;

pub use curve::Curve;
pub use image::{correction_normalizer, Image};
pub use measurement::Measurement;
pub use metadata::{AverageMode, MetaAttribute, Metadata};
pub use range::{Range, Ranges};
