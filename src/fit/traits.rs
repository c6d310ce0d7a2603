//! Parametric function trait and fit parameters.

use crate::data::Range;

/// One adjustable parameter of a parametric function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitParameter {
    value: f64,
    error: f64,
    /// Interval the value may take during fitting.
    allowed: Range,
}

impl Default for FitParameter {
    fn default() -> Self {
        Self {
            value: 0.0,
            error: 0.0,
            allowed: Range::infinite(),
        }
    }
}

impl FitParameter {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            ..Default::default()
        }
    }

    /// Parameter restricted to `[min, max]`.
    pub fn bounded(value: f64, min: f64, max: f64) -> Self {
        Self {
            value,
            error: 0.0,
            allowed: Range::new(min, max),
        }
    }

    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    #[inline]
    pub fn error(&self) -> f64 {
        self.error
    }

    pub fn allowed(&self) -> Range {
        self.allowed
    }

    /// Set value and error.
    pub fn set(&mut self, value: f64, error: f64) {
        self.value = value;
        self.error = error;
    }

    pub fn set_allowed(&mut self, allowed: Range) {
        self.allowed = allowed;
    }

    /// Lower bound for the solver. An unset range pins the parameter to its value.
    pub fn allowed_min(&self) -> f64 {
        if self.allowed.is_valid() {
            self.allowed.min
        } else {
            self.value
        }
    }

    /// Upper bound for the solver. An unset range pins the parameter to its value.
    pub fn allowed_max(&self) -> f64 {
        if self.allowed.is_valid() {
            self.allowed.max
        } else {
            self.value
        }
    }
}

/// A function `y(x; p)` with analytic partial derivatives in `p`.
///
/// Evaluation uses the stored parameter values unless `params` supplies an
/// override of the same length.
pub trait ParametricFunction {
    /// Short human-readable name.
    fn name(&self) -> &'static str;

    fn parameters(&self) -> &[FitParameter];

    fn parameters_mut(&mut self) -> &mut [FitParameter];

    fn y(&self, x: f64, params: Option<&[f64]>) -> f64;

    /// Partial derivative of `y` with respect to parameter `i`.
    fn dy(&self, x: f64, i: usize, params: Option<&[f64]>) -> f64;

    fn parameter_count(&self) -> usize {
        self.parameters().len()
    }

    /// Value of parameter `i`, taken from `params` when given.
    fn param_value(&self, i: usize, params: Option<&[f64]>) -> f64 {
        match params {
            Some(p) => p[i],
            None => self.parameters()[i].value(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_bounds() {
        let p = FitParameter::new(3.0);
        assert_eq!(p.allowed_min(), f64::NEG_INFINITY);
        assert_eq!(p.allowed_max(), f64::INFINITY);

        let p = FitParameter::bounded(0.5, 0.0, 1.0);
        assert_eq!((p.allowed_min(), p.allowed_max()), (0.0, 1.0));

        let mut p = FitParameter::new(2.0);
        p.set_allowed(Range::invalid());
        assert_eq!((p.allowed_min(), p.allowed_max()), (2.0, 2.0));
    }
}
