//! Peak shapes and their fitting.

use super::engine::{self, FitReport, StopReason};
use super::traits::{FitParameter, ParametricFunction};
use crate::data::{Curve, Range};
use crate::error::{Result, StecaError};
use serde::{Deserialize, Serialize};
use std::f64::consts::LN_2;
use std::str::FromStr;

/// σ = FWHM · GAUSS_FWHM_TO_SIGMA for a Gaussian.
const GAUSS_FWHM_TO_SIGMA: f64 = 0.424661;

/// `sqrt(8 ln 2)`, FWHM of a Gaussian over its σ.
fn gauss_sigma_to_fwhm() -> f64 {
    (8.0 * LN_2).sqrt()
}

/// The built-in peak shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PeakKind {
    /// Moments of the raw data, no fit.
    Raw,
    #[default]
    Gaussian,
    Lorentzian,
    /// Gaussian and Lorentzian mixed by η with a shared width.
    PseudoVoigt1,
    /// Gaussian and Lorentzian mixed by η with independent widths.
    PseudoVoigt2,
}

impl PeakKind {
    pub const ALL: [PeakKind; 5] = [
        PeakKind::Raw,
        PeakKind::Gaussian,
        PeakKind::Lorentzian,
        PeakKind::PseudoVoigt1,
        PeakKind::PseudoVoigt2,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PeakKind::Raw => "Raw",
            PeakKind::Gaussian => "Gaussian",
            PeakKind::Lorentzian => "Lorentzian",
            PeakKind::PseudoVoigt1 => "PseudoVoigt1",
            PeakKind::PseudoVoigt2 => "PseudoVoigt2",
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, PeakKind::Raw)
    }

    fn default_parameters(&self) -> Vec<FitParameter> {
        let ampl = FitParameter::bounded(1.0, 0.0, f64::INFINITY);
        let x_shift = FitParameter::new(0.0);
        let width = FitParameter::bounded(1.0, 0.0, f64::INFINITY);
        let eta = FitParameter::bounded(0.1, 0.0, 1.0);
        match self {
            PeakKind::Raw => Vec::new(),
            PeakKind::Gaussian | PeakKind::Lorentzian => vec![ampl, x_shift, width],
            PeakKind::PseudoVoigt1 => vec![ampl, x_shift, width, eta],
            PeakKind::PseudoVoigt2 => vec![ampl, x_shift, width, width, eta],
        }
    }
}

impl FromStr for PeakKind {
    type Err = StecaError;

    fn from_str(s: &str) -> Result<Self> {
        PeakKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| StecaError::UnknownFunction(s.to_string()))
    }
}

/// A point (x, y); NaN components mark "unknown".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Xy {
    pub x: f64,
    pub y: f64,
}

impl Xy {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn invalid() -> Self {
        Self::new(f64::NAN, f64::NAN)
    }

    pub fn is_valid(&self) -> bool {
        !self.x.is_nan() && !self.y.is_nan()
    }
}

impl Default for Xy {
    fn default() -> Self {
        Self::invalid()
    }
}

/// Peak characteristics computed from the data alone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawOutcome {
    /// Intensity-weighted mean x.
    pub center: f64,
    /// `sqrt(8 ln 2)` times the intensity-weighted standard deviation of x.
    pub fwhm: f64,
    /// Sum of y times the x-width per sample.
    pub intensity: f64,
}

impl RawOutcome {
    /// Moments of `curve`; `range` supplies the width the samples cover.
    /// All fields are NaN for an empty curve.
    pub fn from_curve(curve: &Curve, range: &Range) -> Self {
        if curve.is_empty() {
            return Self {
                center: f64::NAN,
                fwhm: f64::NAN,
                intensity: f64::NAN,
            };
        }
        let sum_y = curve.sum_y();
        let sum_xy: f64 = curve.xs().iter().zip(curve.ys()).map(|(x, y)| x * y).sum();
        let center = sum_xy / sum_y;
        let var: f64 = curve
            .xs()
            .iter()
            .zip(curve.ys())
            .map(|(x, y)| y * (x - center) * (x - center))
            .sum::<f64>()
            / sum_y;
        Self {
            center,
            fwhm: gauss_sigma_to_fwhm() * var.sqrt(),
            intensity: sum_y * (range.width() / curve.len() as f64),
        }
    }
}

/// A peak shape together with its fit range, start guesses and fitted state.
#[derive(Debug, Clone)]
pub struct PeakFunction {
    kind: PeakKind,
    params: Vec<FitParameter>,
    range: Range,
    guessed_peak: Xy,
    guessed_fwhm: f64,
    // samples used by the last fit, kept for the raw step function
    fitted_curve: Curve,
    raw: Option<RawOutcome>,
}

impl PeakFunction {
    pub fn new(kind: PeakKind) -> Self {
        Self {
            kind,
            params: kind.default_parameters(),
            range: Range::invalid(),
            guessed_peak: Xy::invalid(),
            guessed_fwhm: f64::NAN,
            fitted_curve: Curve::new(),
            raw: None,
        }
    }

    /// Fit a fresh function of `kind` to the samples of `curve` in `range`.
    pub fn from_fit(kind: PeakKind, curve: &Curve, range: Range) -> (PeakFunction, FitReport) {
        let mut f = PeakFunction::new(kind);
        f.set_range(range);
        let report = f.fit(curve);
        (f, report)
    }

    pub fn kind(&self) -> PeakKind {
        self.kind
    }

    pub fn range(&self) -> Range {
        self.range
    }

    pub fn set_range(&mut self, range: Range) {
        self.range = range;
    }

    pub fn guessed_peak(&self) -> Xy {
        self.guessed_peak
    }

    pub fn guessed_fwhm(&self) -> f64 {
        self.guessed_fwhm
    }

    /// Use `peak` as start position and height.
    pub fn set_guessed_peak(&mut self, peak: Xy) {
        self.guessed_peak = peak;
        if !self.kind.is_raw() {
            self.params[0].set(peak.y, 0.0);
            self.params[1].set(peak.x, 0.0);
        }
    }

    /// Derive the start widths from `fwhm`.
    pub fn set_guessed_fwhm(&mut self, fwhm: f64) {
        self.guessed_fwhm = fwhm;
        match self.kind {
            PeakKind::Raw => {}
            PeakKind::Gaussian => self.params[2].set(fwhm * GAUSS_FWHM_TO_SIGMA, 0.0),
            PeakKind::Lorentzian | PeakKind::PseudoVoigt1 => self.params[2].set(fwhm / 2.0, 0.0),
            PeakKind::PseudoVoigt2 => {
                self.params[2].set(fwhm * GAUSS_FWHM_TO_SIGMA, 0.0);
                self.params[3].set(fwhm / 2.0, 0.0);
            }
        }
    }

    /// Forget the start guesses so that the next fit derives new ones.
    pub fn clear_guesses(&mut self) {
        self.guessed_peak = Xy::invalid();
        self.guessed_fwhm = f64::NAN;
    }

    /// Fit to the samples of `curve` inside the peak range.
    ///
    /// Missing guesses are taken from the data: the highest sample gives the
    /// peak, the nearest samples below half its height on either side give
    /// the FWHM. Raw peaks only record the samples and their moments.
    pub fn fit(&mut self, curve: &Curve) -> FitReport {
        let c = curve.intersect(&self.range);
        self.fitted_curve = c.clone();

        if self.kind.is_raw() {
            self.raw = Some(RawOutcome::from_curve(&c, &self.range));
            return FitReport {
                stop: StopReason::NoParameters,
                iterations: 0,
                sum_sq: f64::NAN,
            };
        }
        if c.is_empty() {
            return engine::fit(self, &c);
        }

        if !self.guessed_peak.is_valid() || self.guessed_fwhm.is_nan() {
            let (peak, fwhm) = guess_peak(&c);
            self.guessed_peak = peak;
            self.guessed_fwhm = fwhm;
        }
        // restart from the guesses
        self.params = self.kind.default_parameters();
        self.set_guessed_peak(self.guessed_peak);
        self.set_guessed_fwhm(self.guessed_fwhm);

        engine::fit(self, &c)
    }

    /// Peak position and height after fitting.
    pub fn fitted_peak(&self) -> Xy {
        match self.kind {
            PeakKind::Raw => match &self.raw {
                Some(raw) => Xy::new(raw.center, raw.intensity),
                None => Xy::invalid(),
            },
            _ => Xy::new(self.params[1].value(), self.params[0].value()),
        }
    }

    pub fn fitted_fwhm(&self) -> f64 {
        let p = &self.params;
        match self.kind {
            PeakKind::Raw => self.raw.map_or(f64::NAN, |r| r.fwhm),
            PeakKind::Gaussian => p[2].value() * gauss_sigma_to_fwhm(),
            PeakKind::Lorentzian | PeakKind::PseudoVoigt1 => p[2].value() * 2.0,
            PeakKind::PseudoVoigt2 => {
                let eta = p[4].value();
                ((1.0 - eta) * p[2].value() / GAUSS_FWHM_TO_SIGMA + eta * p[3].value() * 2.0) / 2.0
            }
        }
    }

    /// Errors of position and height.
    pub fn peak_error(&self) -> Xy {
        match self.kind {
            PeakKind::Raw => Xy::new(0.0, 0.0),
            _ => Xy::new(self.params[1].error(), self.params[0].error()),
        }
    }

    pub fn fwhm_error(&self) -> f64 {
        let p = &self.params;
        match self.kind {
            PeakKind::Raw => 0.0,
            PeakKind::Gaussian => p[2].error() * gauss_sigma_to_fwhm(),
            PeakKind::Lorentzian | PeakKind::PseudoVoigt1 => p[2].error() * 2.0,
            PeakKind::PseudoVoigt2 => p[2].error() + p[3].error(),
        }
    }

    /// Lorentzian over Gaussian width with its propagated error. Only
    /// PseudoVoigt2 has two widths; other shapes give NaN.
    pub fn gamma_over_sigma(&self) -> Xy {
        if self.kind != PeakKind::PseudoVoigt2 {
            return Xy::invalid();
        }
        let (sigma, gamma) = (&self.params[2], &self.params[3]);
        let ratio = gamma.value() / sigma.value();
        let rel = (gamma.error() / gamma.value()).hypot(sigma.error() / sigma.value());
        Xy::new(ratio, (ratio * rel).abs())
    }

    /// Raw moments of the last fitted samples, for raw peaks.
    pub fn raw_outcome(&self) -> Option<RawOutcome> {
        self.raw
    }

    /// The fitted shape sampled at the x positions of `curve` inside the range.
    pub fn as_curve(&self, curve: &Curve) -> Curve {
        let mut ret = Curve::new();
        for &x in curve.xs() {
            if self.range.contains(x) {
                ret.append(x, self.y(x, None));
            }
        }
        ret
    }

    // step function over the samples of the last raw fit
    fn raw_y(&self, x: f64) -> f64 {
        let n = self.fitted_curve.len();
        if n == 0 || self.range.is_empty() || !self.range.contains(x) {
            return 0.0;
        }
        let dx = self.range.width() / n as f64;
        let i = ((x - self.range.min) / dx).floor().max(0.0) as usize;
        self.fitted_curve.y(i.min(n - 1))
    }
}

/// Peak guess from the highest sample and the half-maximum crossings.
fn guess_peak(c: &Curve) -> (Xy, f64) {
    let Some(peak_index) = c.idx_max() else {
        return (Xy::invalid(), f64::NAN);
    };
    let peak = Xy::new(c.x(peak_index), c.y(peak_index));
    let half = peak.y / 2.0;

    let mut hmi1 = peak_index;
    for i in (0..peak_index).rev() {
        hmi1 = i;
        if c.y(i) < half {
            break;
        }
    }
    let mut hmi2 = peak_index;
    for i in peak_index..c.len() {
        hmi2 = i;
        if c.y(i) < half {
            break;
        }
    }
    (peak, c.x(hmi2) - c.x(hmi1))
}

impl ParametricFunction for PeakFunction {
    fn name(&self) -> &'static str {
        self.kind.name()
    }

    fn parameters(&self) -> &[FitParameter] {
        &self.params
    }

    fn parameters_mut(&mut self) -> &mut [FitParameter] {
        &mut self.params
    }

    fn y(&self, x: f64, params: Option<&[f64]>) -> f64 {
        if self.kind.is_raw() {
            return self.raw_y(x);
        }
        let ampl = self.param_value(0, params);
        let dx = x - self.param_value(1, params);
        match self.kind {
            PeakKind::Raw => 0.0,
            PeakKind::Gaussian => {
                let arg = dx / self.param_value(2, params);
                ampl * (-0.5 * arg * arg).exp()
            }
            PeakKind::Lorentzian => {
                let arg = dx / self.param_value(2, params);
                ampl / (1.0 + arg * arg)
            }
            PeakKind::PseudoVoigt1 => {
                let eta = self.param_value(3, params);
                let arg = dx / self.param_value(2, params);
                let arg2 = arg * arg;
                (1.0 - eta) * ampl * (-arg2 * LN_2).exp() + eta * ampl / (1.0 + arg2)
            }
            PeakKind::PseudoVoigt2 => {
                let eta = self.param_value(4, params);
                let arg_g = dx / self.param_value(2, params);
                let arg_l = dx / self.param_value(3, params);
                (1.0 - eta) * ampl * (-arg_g * arg_g * LN_2).exp()
                    + eta * ampl / (1.0 + arg_l * arg_l)
            }
        }
    }

    fn dy(&self, x: f64, i: usize, params: Option<&[f64]>) -> f64 {
        let ampl = self.param_value(0, params);
        let dx = x - self.param_value(1, params);
        match self.kind {
            PeakKind::Raw => 0.0,
            PeakKind::Gaussian => {
                let sigma = self.param_value(2, params);
                let arg = dx / sigma;
                let exa = (-0.5 * arg * arg).exp();
                match i {
                    0 => exa,
                    1 => ampl * exa * dx / (sigma * sigma),
                    _ => ampl * exa * dx * dx / (sigma * sigma * sigma),
                }
            }
            PeakKind::Lorentzian => {
                let gamma = self.param_value(2, params);
                let arg = dx / gamma;
                let arg2 = arg * arg;
                let den = (1.0 + arg2) * (1.0 + arg2);
                match i {
                    0 => 1.0 / (1.0 + arg2),
                    1 => 2.0 * ampl * dx / (den * gamma * gamma),
                    _ => 2.0 * ampl * dx * dx / (den * gamma * gamma * gamma),
                }
            }
            PeakKind::PseudoVoigt1 => {
                let w = self.param_value(2, params);
                let eta = self.param_value(3, params);
                let arg2 = (dx / w) * (dx / w);
                let g = (-arg2 * LN_2).exp();
                let l = 1.0 + arg2;
                match i {
                    0 => eta / l + (1.0 - eta) * g,
                    1 => {
                        eta * 2.0 * ampl * dx / (l * l * w * w)
                            + (1.0 - eta) * 2.0 * ampl * dx * LN_2 * g / (w * w)
                    }
                    2 => {
                        eta * 2.0 * ampl * dx * dx / (l * l * w * w * w)
                            + (1.0 - eta) * 2.0 * ampl * dx * dx * LN_2 * g / (w * w * w)
                    }
                    _ => ampl / l - ampl * g,
                }
            }
            PeakKind::PseudoVoigt2 => {
                let sigma = self.param_value(2, params);
                let gamma = self.param_value(3, params);
                let eta = self.param_value(4, params);
                let arg_g2 = (dx / sigma) * (dx / sigma);
                let g = (-arg_g2 * LN_2).exp();
                let arg_l2 = (dx / gamma) * (dx / gamma);
                let l = 1.0 + arg_l2;
                match i {
                    0 => eta / l + (1.0 - eta) * g,
                    1 => {
                        eta * 2.0 * ampl * dx / (l * l * gamma * gamma)
                            + (1.0 - eta) * 2.0 * ampl * dx * LN_2 * g / (sigma * sigma)
                    }
                    2 => (1.0 - eta) * 2.0 * ampl * dx * dx * LN_2 * g / (sigma * sigma * sigma),
                    3 => eta * 2.0 * ampl * dx * dx / (l * l * gamma * gamma * gamma),
                    _ => ampl / l - ampl * g,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampled(f: impl Fn(f64) -> f64) -> Curve {
        let mut c = Curve::new();
        for i in 0..=100 {
            let x = i as f64 * 0.1;
            c.append(x, f(x));
        }
        c
    }

    fn gaussian(a: f64, x0: f64, s: f64) -> impl Fn(f64) -> f64 {
        move |x| a * (-0.5 * ((x - x0) / s).powi(2)).exp()
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in PeakKind::ALL {
            assert_eq!(kind.name().parse::<PeakKind>().unwrap(), kind);
        }
        assert!(matches!(
            "Voigt".parse::<PeakKind>(),
            Err(StecaError::UnknownFunction(_))
        ));
    }

    #[test]
    fn test_parameter_counts_and_bounds() {
        assert_eq!(PeakFunction::new(PeakKind::Raw).parameter_count(), 0);
        assert_eq!(PeakFunction::new(PeakKind::Gaussian).parameter_count(), 3);
        assert_eq!(PeakFunction::new(PeakKind::PseudoVoigt1).parameter_count(), 4);
        let pv2 = PeakFunction::new(PeakKind::PseudoVoigt2);
        assert_eq!(pv2.parameter_count(), 5);
        assert_eq!(pv2.parameters()[4].allowed(), Range::new(0.0, 1.0));
        assert_eq!(pv2.parameters()[0].allowed_min(), 0.0);
        assert_eq!(pv2.parameters()[1].allowed_min(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_guess_from_curve() {
        let c = sampled(gaussian(10.0, 5.0, 2.0));
        let (peak, fwhm) = guess_peak(&c);
        assert_eq!(peak, Xy::new(c.x(50), 10.0));
        // true FWHM is 4.71, crossings are taken on the first sample below half
        assert!((fwhm - 4.8).abs() < 0.25);
    }

    #[test]
    fn test_gaussian_fit_recovers_parameters() {
        let c = sampled(gaussian(10.0, 5.0, 2.0));
        let (f, report) = PeakFunction::from_fit(PeakKind::Gaussian, &c, Range::new(0.0, 10.0));
        assert!(report.converged(), "{report:?}");
        let p = f.parameters();
        assert!((p[0].value() - 10.0).abs() < 1e-3);
        assert!((p[1].value() - 5.0).abs() < 1e-3);
        assert!((p[2].value() - 2.0).abs() < 1e-3);
        assert!((f.fitted_fwhm() - 2.0 * (8.0 * LN_2).sqrt()).abs() < 1e-3);
        assert!((f.fitted_peak().x - 5.0).abs() < 1e-3);
    }

    #[test]
    fn test_lorentzian_fit() {
        let c = sampled(|x| 4.0 / (1.0 + ((x - 6.0) / 0.8).powi(2)));
        let (f, _) = PeakFunction::from_fit(PeakKind::Lorentzian, &c, Range::new(2.0, 10.0));
        assert!((f.fitted_peak().x - 6.0).abs() < 1e-3);
        assert!((f.fitted_peak().y - 4.0).abs() < 1e-3);
        assert!((f.fitted_fwhm() - 1.6).abs() < 1e-3);
    }

    #[test]
    fn test_analytic_derivatives_match_differences() {
        let mut f = PeakFunction::new(PeakKind::PseudoVoigt2);
        f.set_guessed_peak(Xy::new(1.0, 3.0));
        f.parameters_mut()[2].set(0.7, 0.0);
        f.parameters_mut()[3].set(1.3, 0.0);
        f.parameters_mut()[4].set(0.4, 0.0);
        let base: Vec<f64> = f.parameters().iter().map(|p| p.value()).collect();

        let h = 1e-6;
        for x in [0.2, 1.0, 1.9] {
            for i in 0..base.len() {
                let mut up = base.clone();
                up[i] += h;
                let mut down = base.clone();
                down[i] -= h;
                let numeric = (f.y(x, Some(&up)) - f.y(x, Some(&down))) / (2.0 * h);
                let analytic = f.dy(x, i, None);
                assert!((numeric - analytic).abs() < 1e-5, "x={x} i={i}");
            }
        }
    }

    #[test]
    fn test_raw_outcome() {
        let c = Curve::from_xy(vec![1.0, 2.0, 3.0], vec![1.0, 2.0, 1.0]).unwrap();
        let (f, _) = PeakFunction::from_fit(PeakKind::Raw, &c, Range::new(0.5, 3.5));
        let raw = f.raw_outcome().unwrap();
        assert!((raw.center - 2.0).abs() < 1e-12);
        // weighted variance (1 + 0 + 1) / 4
        assert!((raw.fwhm - (8.0 * LN_2).sqrt() * 0.5f64.sqrt()).abs() < 1e-12);
        assert!((raw.intensity - 4.0).abs() < 1e-12);
        assert_eq!(f.peak_error(), Xy::new(0.0, 0.0));
        assert_eq!(f.fwhm_error(), 0.0);
        assert_eq!(f.y(2.0, None), 2.0);
        assert_eq!(f.y(9.0, None), 0.0);
    }

    #[test]
    fn test_pseudo_voigt2_fwhm() {
        let mut f = PeakFunction::new(PeakKind::PseudoVoigt2);
        f.parameters_mut()[2].set(GAUSS_FWHM_TO_SIGMA, 0.0);
        f.parameters_mut()[3].set(0.5, 0.0);
        f.parameters_mut()[4].set(0.5, 0.0);
        assert!((f.fitted_fwhm() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_gamma_over_sigma() {
        let mut f = PeakFunction::new(PeakKind::PseudoVoigt2);
        f.parameters_mut()[2].set(0.5, 0.05);
        f.parameters_mut()[3].set(1.0, 0.0);
        let g = f.gamma_over_sigma();
        assert!((g.x - 2.0).abs() < 1e-12);
        assert!((g.y - 0.2).abs() < 1e-12);

        assert!(!PeakFunction::new(PeakKind::Gaussian).gamma_over_sigma().is_valid());
        assert!(!PeakFunction::new(PeakKind::Raw).gamma_over_sigma().is_valid());
    }
}
