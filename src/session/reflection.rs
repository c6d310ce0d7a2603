//! Per-peak result rows and pole-figure angles.

use crate::cache::Cached;
use crate::data::{MetaAttribute, Metadata, Range};
use crate::error::Result;
use nalgebra::{Matrix3, Vector3};
use serde::Serialize;
use std::f64::consts::{FRAC_PI_2, PI};

/// A value and its standard error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measured {
    pub value: f64,
    pub error: f64,
}

impl Measured {
    pub fn new(value: f64, error: f64) -> Self {
        Self { value, error }
    }

    pub fn nan() -> Self {
        Self::new(f64::NAN, f64::NAN)
    }
}

/// One cell of an exported row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Num(f64),
    Text(String),
}

impl Cell {
    /// The numeric value; NaN for text.
    pub fn as_f64(&self) -> f64 {
        match self {
            Cell::Num(v) => *v,
            Cell::Text(_) => f64::NAN,
        }
    }
}

/// Fit outcome of one peak in one cluster and gamma sector.
#[derive(Debug, Clone, PartialEq)]
pub struct ReflectionInfo {
    metadata: Option<Metadata>,
    alpha: f64,
    beta: f64,
    rge_gma: Range,
    inten: Measured,
    tth: Measured,
    fwhm: Measured,
    gamma_over_sigma: Measured,
}

const REFLECTION_TAGS: [&str; 12] = [
    "alpha",
    "beta",
    "gamma1",
    "gamma2",
    "inten",
    "sigma_inten",
    "2theta",
    "sigma_2theta",
    "fwhm",
    "sigma_fwhm",
    "gamma_over_sigma",
    "sigma_gamma_over_sigma",
];

impl ReflectionInfo {
    pub fn new(
        metadata: Option<Metadata>,
        alpha: f64,
        beta: f64,
        rge_gma: Range,
        inten: Measured,
        tth: Measured,
        fwhm: Measured,
    ) -> Self {
        Self {
            metadata,
            alpha,
            beta,
            rge_gma,
            inten,
            tth,
            fwhm,
            gamma_over_sigma: Measured::nan(),
        }
    }

    pub fn with_gamma_over_sigma(mut self, gamma_over_sigma: Measured) -> Self {
        self.gamma_over_sigma = gamma_over_sigma;
        self
    }

    /// Row holding angles only; the fit fields are NaN.
    pub fn angles_only(metadata: Option<Metadata>, alpha: f64, beta: f64, rge_gma: Range) -> Self {
        Self::new(
            metadata,
            alpha,
            beta,
            rge_gma,
            Measured::nan(),
            Measured::nan(),
            Measured::nan(),
        )
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn rge_gma(&self) -> Range {
        self.rge_gma
    }

    pub fn inten(&self) -> f64 {
        self.inten.value
    }

    pub fn inten_error(&self) -> f64 {
        self.inten.error
    }

    pub fn tth(&self) -> f64 {
        self.tth.value
    }

    pub fn tth_error(&self) -> f64 {
        self.tth.error
    }

    pub fn fwhm(&self) -> f64 {
        self.fwhm.value
    }

    pub fn fwhm_error(&self) -> f64 {
        self.fwhm.error
    }

    /// Width ratio of PseudoVoigt2 fits; NaN for other shapes.
    pub fn gamma_over_sigma(&self) -> Measured {
        self.gamma_over_sigma
    }

    /// Column tags matching [`ReflectionInfo::data`].
    pub fn data_tags() -> Vec<&'static str> {
        let mut tags = REFLECTION_TAGS.to_vec();
        tags.extend(MetaAttribute::ALL.iter().map(|a| a.tag()));
        tags.extend(["date", "comment"]);
        tags
    }

    /// The row as exported: angles, fit values, then metadata. Missing
    /// metadata gives NaN cells and empty strings.
    pub fn data(&self) -> Vec<Cell> {
        let mut row: Vec<Cell> = [
            self.alpha,
            self.beta,
            self.rge_gma.min,
            self.rge_gma.max,
            self.inten.value,
            self.inten.error,
            self.tth.value,
            self.tth.error,
            self.fwhm.value,
            self.fwhm.error,
            self.gamma_over_sigma.value,
            self.gamma_over_sigma.error,
        ]
        .into_iter()
        .map(Cell::Num)
        .collect();

        match &self.metadata {
            Some(md) => {
                row.extend(md.numeric_values().iter().copied().map(Cell::Num));
                row.push(Cell::Text(md.date.clone()));
                row.push(Cell::Text(md.comment.clone()));
            }
            None => {
                row.extend((0..MetaAttribute::COUNT).map(|_| Cell::Num(f64::NAN)));
                row.push(Cell::Text(String::new()));
                row.push(Cell::Text(String::new()));
            }
        }
        row
    }
}

#[derive(Serialize)]
struct Table {
    tags: Vec<&'static str>,
    rows: Vec<Vec<Cell>>,
}

/// Rows of one peak over all clusters and sectors.
pub struct ReflectionInfos {
    infos: Vec<ReflectionInfo>,
    avg_inten: Cached<[ReflectionInfo], f64>,
    rge_inten: Cached<[ReflectionInfo], Range>,
}

impl Default for ReflectionInfos {
    fn default() -> Self {
        Self::new()
    }
}

impl ReflectionInfos {
    pub fn new() -> Self {
        Self {
            infos: Vec::new(),
            avg_inten: Cached::new(|infos: &[ReflectionInfo]| {
                let finite: Vec<f64> = infos
                    .iter()
                    .map(|r| r.inten())
                    .filter(|v| v.is_finite())
                    .collect();
                if finite.is_empty() {
                    0.0
                } else {
                    finite.iter().sum::<f64>() / finite.len() as f64
                }
            }),
            rge_inten: Cached::new(|infos: &[ReflectionInfo]| {
                let mut rge = Range::invalid();
                for v in infos.iter().map(|r| r.inten()).filter(|v| v.is_finite()) {
                    rge.extend_by(v);
                }
                rge
            }),
        }
    }

    pub fn append(&mut self, info: ReflectionInfo) {
        self.infos.push(info);
        self.avg_inten.invalidate();
        self.rge_inten.invalidate();
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&ReflectionInfo> {
        self.infos.get(i)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ReflectionInfo> {
        self.infos.iter()
    }

    /// Mean of the finite intensities, 0 if there are none.
    pub fn average_inten(&self) -> f64 {
        *self.avg_inten.get(&self.infos)
    }

    /// Range of the finite intensities.
    pub fn rge_inten(&self) -> Range {
        *self.rge_inten.get(&self.infos)
    }

    /// The table as a JSON object with `tags` and `rows`; NaN cells become
    /// `null`.
    pub fn to_json(&self) -> Result<String> {
        let table = Table {
            tags: ReflectionInfo::data_tags(),
            rows: self.infos.iter().map(ReflectionInfo::data).collect(),
        };
        Ok(serde_json::to_string(&table)?)
    }
}

/// Clockwise rotation about x.
fn rot_cw_x(angle: f64) -> Matrix3<f64> {
    let (s, c) = angle.sin_cos();
    Matrix3::new(1.0, 0.0, 0.0, 0.0, c, -s, 0.0, s, c)
}

/// Clockwise rotation about z.
fn rot_cw_z(angle: f64) -> Matrix3<f64> {
    let (s, c) = angle.sin_cos();
    Matrix3::new(c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0)
}

fn rot_ccw_z(angle: f64) -> Matrix3<f64> {
    rot_cw_z(angle).transpose()
}

/// Pole-figure angles `(alpha, beta)` in degrees for a reflection at `tth`
/// and `gma` measured with sample orientation `chi`, `omg`, `phi` (all in
/// degrees).
///
/// Alpha lies in `[0, 90]`: directions in the lower hemisphere are
/// mirrored. Beta lies in `[0, 360)`.
pub fn calculate_alpha_beta(tth: f64, gma: f64, chi: f64, omg: f64, phi: f64) -> (f64, f64) {
    let rotated = rot_cw_z(phi.to_radians())
        * rot_cw_x(chi.to_radians())
        * rot_cw_z(omg.to_radians())
        * rot_cw_x(gma.to_radians())
        * rot_ccw_z((tth / 2.0).to_radians())
        * Vector3::new(0.0, 1.0, 0.0);

    let mut alpha = rotated.z.acos();
    let mut beta = rotated.x.atan2(rotated.y);

    if alpha > FRAC_PI_2 {
        alpha = (alpha - PI).abs();
        beta += if beta < 0.0 { PI } else { -PI };
    }
    if beta < 0.0 {
        beta += 2.0 * PI;
    }
    (alpha.to_degrees(), beta.to_degrees())
}
