//! Session configuration snapshot and its JSON form.

use crate::data::{Range, Ranges};
use crate::error::Result;
use crate::fit::PeakKind;
use crate::geometry::{Geometry, ImageCut};
use serde::{Deserialize, Serialize};

/// What diffractogram intensities are normalised to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NormalizationMode {
    #[default]
    None,
    /// Monitor counts.
    Monitor,
    /// Monitor count increments.
    DeltaMonitor,
    /// Exposure time.
    Time,
    /// Exposure time increments.
    DeltaTime,
    /// Background level under the diffractogram.
    Background,
}

/// How binned pixel intensities are combined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntensityScaling {
    /// Average per bin (times `scale`) instead of summing.
    pub averaged: bool,
    pub scale: f64,
}

impl Default for IntensityScaling {
    fn default() -> Self {
        Self {
            averaged: true,
            scale: 1.0,
        }
    }
}

/// Background polynomial and the 2theta ranges it is fitted over.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaselineSettings {
    pub degree: usize,
    pub ranges: Ranges,
}

/// One peak to evaluate: its 2theta range and shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakSettings {
    pub range: Range,
    pub function: PeakKind,
}

impl PeakSettings {
    pub fn new(range: Range, function: PeakKind) -> Self {
        Self { range, function }
    }
}

/// Pole-figure interpolation onto a regular alpha/beta grid. Angles in
/// degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolParams {
    pub enabled: bool,
    pub step_alpha: f64,
    pub step_beta: f64,
    /// Search radius of the inverse-distance weighting. `None` searches
    /// without limit and disables the fallback from averaging.
    pub idw_radius: Option<f64>,
    /// Grid points up to this alpha are averaged first.
    pub avg_alpha_max: f64,
    pub avg_radius: f64,
    /// Percentage of the strongest points within `avg_radius` that are
    /// averaged.
    pub threshold: u8,
}

impl Default for InterpolParams {
    fn default() -> Self {
        Self {
            enabled: false,
            step_alpha: 5.0,
            step_beta: 5.0,
            idw_radius: Some(10.0),
            avg_alpha_max: 15.0,
            avg_radius: 5.0,
            threshold: 100,
        }
    }
}

/// Everything the computations of a session depend on, besides the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub geometry: Geometry,
    pub image_cut: ImageCut,
    /// Opposite cut margins are kept equal when clamped.
    pub image_cut_linked: bool,
    /// Number of gamma sectors per cluster; 0 and 1 both mean one sector.
    pub gamma_slices: usize,
    pub baseline: BaselineSettings,
    pub peaks: Vec<PeakSettings>,
    pub normalization: NormalizationMode,
    pub intensity: IntensityScaling,
    /// Consecutive measurements combined into one cluster.
    pub binning: usize,
    /// Leave out a trailing cluster with fewer than `binning` members.
    pub drop_incomplete: bool,
    /// Number of angle maps kept in memory.
    pub angle_map_capacity: usize,
    pub interpolation: InterpolParams,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            geometry: Geometry::default(),
            image_cut: ImageCut::default(),
            image_cut_linked: false,
            gamma_slices: 0,
            baseline: BaselineSettings::default(),
            peaks: Vec::new(),
            normalization: NormalizationMode::None,
            intensity: IntensityScaling::default(),
            binning: 1,
            drop_incomplete: false,
            angle_map_capacity: 64,
            interpolation: InterpolParams::default(),
        }
    }
}

impl SessionConfig {
    /// Effective number of gamma sectors.
    pub fn num_sectors(&self) -> usize {
        self.gamma_slices.max(1)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
