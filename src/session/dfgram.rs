//! A diffractogram together with its lazily fitted background and peaks.

use super::config::{BaselineSettings, PeakSettings};
use crate::cache::{Cached, CachedVector};
use crate::data::{Curve, Range};
use crate::fit::{FitReport, ParametricFunction, PeakFunction, Polynomial, RawOutcome, StopReason};
use std::cell::RefCell;
use std::rc::Rc;

/// The part of the session configuration a [`Dfgram`] is fitted with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FitSettings {
    pub baseline: BaselineSettings,
    pub peaks: Vec<PeakSettings>,
}

/// A fitted peak shape and how the fit went.
#[derive(Debug, Clone)]
pub struct PeakFit {
    pub function: PeakFunction,
    pub report: FitReport,
}

impl PeakFit {
    /// There were samples to fit, the solver did not break down and the
    /// fitted position and height are finite.
    pub fn success(&self) -> bool {
        if matches!(self.report.stop, StopReason::EmptyCurve | StopReason::Singular) {
            return false;
        }
        let peak = self.function.fitted_peak();
        peak.x.is_finite() && peak.y.is_finite()
    }
}

/// Diffractogram of one cluster and gamma sector.
///
/// Every derived quantity is computed on first use and kept until the
/// owner reports a change through [`Dfgram::update_settings`] or one of the
/// `invalidate_*` methods.
pub struct Dfgram {
    curve: Curve,
    settings: RefCell<Rc<FitSettings>>,
    bg_fit: Cached<Dfgram, Option<Polynomial>>,
    bg_as_curve: Cached<Dfgram, Curve>,
    curve_minus_bg: Cached<Dfgram, Curve>,
    raw_outcomes: CachedVector<Dfgram, RawOutcome>,
    peak_fits: CachedVector<Dfgram, PeakFit>,
    peaks_as_curve: CachedVector<Dfgram, Curve>,
}

fn num_peaks(d: &Dfgram) -> usize {
    d.settings.borrow().peaks.len()
}

fn compute_bg_fit(d: &Dfgram) -> Option<Polynomial> {
    let settings = d.settings();
    let baseline = &settings.baseline;
    let (poly, report) = Polynomial::from_fit(baseline.degree, &d.curve, &baseline.ranges);
    (report.stop != StopReason::EmptyCurve).then_some(poly)
}

fn compute_bg_as_curve(d: &Dfgram) -> Curve {
    let bg = d.bg_fit();
    let mut ret = Curve::new();
    if let Some(poly) = bg.as_ref() {
        for &x in d.curve.xs() {
            ret.append(x, poly.y(x, None));
        }
    }
    ret
}

fn compute_curve_minus_bg(d: &Dfgram) -> Curve {
    match d.bg_fit().as_ref() {
        Some(poly) => d.curve.subtract(|x| poly.y(x, None)),
        None => d.curve.clone(),
    }
}

fn peak_settings(d: &Dfgram, jp: usize) -> PeakSettings {
    d.settings.borrow().peaks[jp]
}

fn compute_raw_outcome(d: &Dfgram, jp: usize) -> RawOutcome {
    let range = peak_settings(d, jp).range;
    RawOutcome::from_curve(&d.curve_minus_bg().intersect(&range), &range)
}

fn compute_peak_fit(d: &Dfgram, jp: usize) -> PeakFit {
    let settings = peak_settings(d, jp);
    let (function, report) =
        PeakFunction::from_fit(settings.function, &d.curve_minus_bg(), settings.range);
    PeakFit { function, report }
}

fn compute_peak_as_curve(d: &Dfgram, jp: usize) -> Curve {
    let fit = d.peak_fit(jp);
    if !fit.success() {
        return Curve::new();
    }
    fit.function.as_curve(&d.curve_minus_bg())
}

impl Dfgram {
    pub fn new(curve: Curve, settings: Rc<FitSettings>) -> Self {
        Self {
            curve,
            settings: RefCell::new(settings),
            bg_fit: Cached::new(compute_bg_fit),
            bg_as_curve: Cached::new(compute_bg_as_curve),
            curve_minus_bg: Cached::new(compute_curve_minus_bg),
            raw_outcomes: CachedVector::new(num_peaks, compute_raw_outcome),
            peak_fits: CachedVector::new(num_peaks, compute_peak_fit),
            peaks_as_curve: CachedVector::new(num_peaks, compute_peak_as_curve),
        }
    }

    /// The projected intensities.
    pub fn curve(&self) -> &Curve {
        &self.curve
    }

    pub fn settings(&self) -> Rc<FitSettings> {
        Rc::clone(&self.settings.borrow())
    }

    pub fn num_peaks(&self) -> usize {
        num_peaks(self)
    }

    /// Background polynomial fitted over the baseline ranges; `None` when no
    /// sample lies inside them.
    pub fn bg_fit(&self) -> Rc<Option<Polynomial>> {
        self.bg_fit.get(self)
    }

    /// Background sampled at the curve positions; empty without background.
    pub fn bg_as_curve(&self) -> Rc<Curve> {
        self.bg_as_curve.get(self)
    }

    pub fn curve_minus_bg(&self) -> Rc<Curve> {
        self.curve_minus_bg.get(self)
    }

    /// # Panics
    /// Panics if `jp` is not a configured peak.
    pub fn raw_outcome(&self, jp: usize) -> Rc<RawOutcome> {
        self.raw_outcomes.get(self, jp)
    }

    /// # Panics
    /// Panics if `jp` is not a configured peak.
    pub fn peak_fit(&self, jp: usize) -> Rc<PeakFit> {
        self.peak_fits.get(self, jp)
    }

    /// Fitted peak sampled inside its range; empty if nothing was fitted.
    ///
    /// # Panics
    /// Panics if `jp` is not a configured peak.
    pub fn peak_as_curve(&self, jp: usize) -> Rc<Curve> {
        self.peaks_as_curve.get(self, jp)
    }

    /// Mean of the background polynomial over `range`, NaN without background.
    pub fn bg_level(&self, range: &Range) -> f64 {
        match self.bg_fit().as_ref() {
            Some(poly) => poly.avg_y(range),
            None => f64::NAN,
        }
    }

    /// Drop the background and everything fitted on top of it.
    pub fn invalidate_bg(&self) {
        self.bg_fit.invalidate();
        self.bg_as_curve.invalidate();
        self.curve_minus_bg.invalidate();
        self.invalidate_peaks();
    }

    pub fn invalidate_peaks(&self) {
        self.raw_outcomes.invalidate();
        self.peak_fits.invalidate();
        self.peaks_as_curve.invalidate();
    }

    pub fn invalidate_peak_at(&self, jp: usize) {
        self.raw_outcomes.invalidate_at(jp);
        self.peak_fits.invalidate_at(jp);
        self.peaks_as_curve.invalidate_at(jp);
    }

    /// Switch to `settings`, dropping only the results that depend on what
    /// changed.
    pub fn update_settings(&self, settings: Rc<FitSettings>) {
        let old = self.settings();
        *self.settings.borrow_mut() = Rc::clone(&settings);

        if old.baseline != settings.baseline {
            self.invalidate_bg();
        } else if old.peaks.len() != settings.peaks.len() {
            self.invalidate_peaks();
        } else {
            for (jp, (a, b)) in old.peaks.iter().zip(&settings.peaks).enumerate() {
                if a != b {
                    self.invalidate_peak_at(jp);
                }
            }
        }
    }
}
