//! Polynomial background model.

use super::engine::{self, FitReport};
use super::traits::{FitParameter, ParametricFunction};
use crate::data::{Curve, Range, Ranges};

/// `y = Σ cᵢ xⁱ` with unbounded coefficients.
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    coefficients: Vec<FitParameter>,
}

impl Polynomial {
    /// Zero polynomial of the given degree.
    pub fn new(degree: usize) -> Self {
        Self {
            coefficients: vec![FitParameter::default(); degree + 1],
        }
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    /// Coefficient of `xⁱ`.
    pub fn coefficient(&self, i: usize) -> f64 {
        self.coefficients[i].value()
    }

    pub fn set_coefficients(&mut self, values: &[f64]) {
        for (par, &v) in self.coefficients.iter_mut().zip(values) {
            par.set(v, 0.0);
        }
    }

    /// Mean value over `range`: the antiderivative difference divided by the
    /// width, or the plain value at a zero-width range.
    pub fn avg_y(&self, range: &Range) -> f64 {
        let w = range.width();
        if w == 0.0 {
            return self.y(range.min, None);
        }
        let (mut a_min, mut a_max) = (0.0, 0.0);
        let (mut x_min, mut x_max) = (range.min, range.max);
        for (i, par) in self.coefficients.iter().enumerate() {
            let fac = par.value() / (i + 1) as f64;
            a_min += fac * x_min;
            a_max += fac * x_max;
            x_min *= range.min;
            x_max *= range.max;
        }
        (a_max - a_min) / w
    }

    /// Fit a polynomial of `degree` to the samples of `curve` inside `ranges`.
    pub fn from_fit(degree: usize, curve: &Curve, ranges: &Ranges) -> (Polynomial, FitReport) {
        let mut poly = Polynomial::new(degree);
        let report = engine::fit(&mut poly, &curve.intersect_ranges(ranges));
        (poly, report)
    }
}

impl ParametricFunction for Polynomial {
    fn name(&self) -> &'static str {
        "Polynomial"
    }

    fn parameters(&self) -> &[FitParameter] {
        &self.coefficients
    }

    fn parameters_mut(&mut self) -> &mut [FitParameter] {
        &mut self.coefficients
    }

    fn y(&self, x: f64, params: Option<&[f64]>) -> f64 {
        let mut value = 0.0;
        let mut t = 1.0;
        for i in 0..self.coefficients.len() {
            value += self.param_value(i, params) * t;
            t *= x;
        }
        value
    }

    fn dy(&self, x: f64, i: usize, _params: Option<&[f64]>) -> f64 {
        x.powi(i as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate() {
        let mut p = Polynomial::new(2);
        p.set_coefficients(&[1.0, -2.0, 3.0]);
        assert_eq!(p.degree(), 2);
        assert_eq!(p.y(2.0, None), 1.0 - 4.0 + 12.0);
        assert_eq!(p.dy(2.0, 2, None), 4.0);
        assert_eq!(p.y(2.0, Some(&[0.0, 1.0, 0.0])), 2.0);
    }

    #[test]
    fn test_avg_y() {
        let mut p = Polynomial::new(1);
        p.set_coefficients(&[1.0, 2.0]);
        // mean of 1 + 2x over [0, 2] is 3
        assert!((p.avg_y(&Range::new(0.0, 2.0)) - 3.0).abs() < 1e-12);
        assert_eq!(p.avg_y(&Range::point(1.5)), 4.0);
    }

    #[test]
    fn test_linear_fit() {
        let curve = Curve::from_xy(vec![0.0, 1.0, 2.0, 3.0], vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        let ranges = Ranges::from_ranges([Range::new(0.0, 3.0)]);
        let (p, report) = Polynomial::from_fit(1, &curve, &ranges);
        assert!(report.converged());
        assert!(p.coefficient(0).abs() < 1e-3);
        assert!((p.coefficient(1) - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_fit_restricted_to_ranges() {
        // a spike in the middle must not pull a flat background
        let ys = vec![2.0, 2.0, 2.0, 50.0, 2.0, 2.0, 2.0];
        let xs: Vec<f64> = (0..7).map(|i| i as f64).collect();
        let curve = Curve::from_xy(xs, ys).unwrap();
        let ranges = Ranges::from_ranges([Range::new(0.0, 2.0), Range::new(4.0, 6.0)]);
        let (p, _) = Polynomial::from_fit(0, &curve, &ranges);
        assert!((p.coefficient(0) - 2.0).abs() < 1e-6);
    }
}
