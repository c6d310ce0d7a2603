//! Session-level computations: clusters, projection, fitting and the
//! reflection tables built from them, directly and on the pole-figure grid.

pub mod cluster;
pub mod config;
pub mod dfgram;
pub mod interpolate;
pub mod project;
pub mod reflection;
#[allow(clippy::module_inception)]
pub mod session;

pub use cluster::{group_into_clusters, Cluster};
pub use config::{
    BaselineSettings, IntensityScaling, InterpolParams, NormalizationMode, PeakSettings,
    SessionConfig,
};
pub use dfgram::{Dfgram, FitSettings, PeakFit};
pub use interpolate::{angle_between, calculate_delta_beta, interpolate_infos};
pub use project::{num_tth_bins, project_cluster, project_measurement, ProjectionParams};
pub use reflection::{calculate_alpha_beta, Cell, Measured, ReflectionInfo, ReflectionInfos};
pub use session::{Progress, Session};
