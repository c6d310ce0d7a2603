//! Ordered x-y sample container.

use super::range::{Range, Ranges};
use crate::error::{Result, StecaError};

/// A sequence of (x, y) samples with cached x and y ranges.
///
/// The ordered operations ([`Curve::intersect`], [`Curve::intersect_ranges`])
/// expect ascending x. That is a precondition of the caller and is not checked.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Curve {
    xs: Vec<f64>,
    ys: Vec<f64>,
    rge_x: Range,
    rge_y: Range,
}

impl Curve {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from matching x and y arrays.
    pub fn from_xy(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self> {
        if xs.len() != ys.len() {
            return Err(StecaError::LengthMismatch {
                x_len: xs.len(),
                y_len: ys.len(),
            });
        }

        let mut curve = Self::with_capacity(xs.len());
        for (x, y) in xs.into_iter().zip(ys) {
            curve.append(x, y);
        }
        Ok(curve)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            xs: Vec::with_capacity(capacity),
            ys: Vec::with_capacity(capacity),
            rge_x: Range::invalid(),
            rge_y: Range::invalid(),
        }
    }

    /// Append a sample, extending the cached ranges.
    pub fn append(&mut self, x: f64, y: f64) {
        self.xs.push(x);
        self.ys.push(y);
        self.rge_x.extend_by(x);
        self.rge_y.extend_by(y);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Number of samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    #[inline]
    pub fn x(&self, i: usize) -> f64 {
        self.xs[i]
    }

    #[inline]
    pub fn y(&self, i: usize) -> f64 {
        self.ys[i]
    }

    #[inline]
    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    #[inline]
    pub fn ys(&self) -> &[f64] {
        &self.ys
    }

    #[inline]
    pub fn rge_x(&self) -> Range {
        self.rge_x
    }

    #[inline]
    pub fn rge_y(&self) -> Range {
        self.rge_y
    }

    /// Samples whose x lies in `range`. Empty if `range` is empty.
    pub fn intersect(&self, range: &Range) -> Curve {
        let mut res = Curve::new();
        if range.is_empty() {
            return res;
        }
        self.collect_within(range, 0, &mut res);
        res
    }

    /// Samples whose x lies in any of the sorted, disjoint `ranges`.
    pub fn intersect_ranges(&self, ranges: &Ranges) -> Curve {
        let mut res = Curve::new();
        let mut xi = 0;
        for range in ranges.iter() {
            xi = self.collect_within(range, xi, &mut res);
        }
        res
    }

    // Merge-scan from `xi`; returns the first index past the range.
    fn collect_within(&self, range: &Range, mut xi: usize, res: &mut Curve) -> usize {
        let n = self.len();
        while xi < n && self.xs[xi] < range.min {
            xi += 1;
        }
        while xi < n && self.xs[xi] <= range.max {
            res.append(self.xs[xi], self.ys[xi]);
            xi += 1;
        }
        xi
    }

    /// Subtract `f(x)` from every y.
    pub fn subtract(&self, f: impl Fn(f64) -> f64) -> Curve {
        let mut res = Curve::with_capacity(self.len());
        for (&x, &y) in self.xs.iter().zip(&self.ys) {
            res.append(x, y - f(x));
        }
        res
    }

    /// Index of the first maximal y, `None` for an empty curve.
    pub fn idx_max(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, &y) in self.ys.iter().enumerate() {
            match best {
                Some(b) if !(y > self.ys[b]) => {}
                _ => best = Some(i),
            }
        }
        best
    }

    pub fn sum_y(&self) -> f64 {
        self.ys.iter().sum()
    }
}
