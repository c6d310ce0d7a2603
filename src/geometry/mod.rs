//! Detector geometry and the pixel to scattering-angle mapping.

pub mod angle_map;
pub mod detector;

pub use angle_map::{lower_bound, upper_bound, AngleMap, AngleMapKey, ScatterDirection};
pub use detector::{Geometry, ImageCut, Size2d, IJ};
