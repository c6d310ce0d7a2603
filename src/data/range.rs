//! Closed intervals and sorted interval lists.

use serde::{Deserialize, Serialize};

/// A closed interval `[min, max]`.
///
/// NaN bounds mark an unset ("invalid") range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Default for Range {
    fn default() -> Self {
        Self::invalid()
    }
}

impl Range {
    /// Range with both bounds NaN.
    pub const fn invalid() -> Self {
        Self {
            min: f64::NAN,
            max: f64::NAN,
        }
    }

    /// Range spanning the whole real line.
    pub const fn infinite() -> Self {
        Self {
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
        }
    }

    /// Range holding a single value.
    pub fn point(val: f64) -> Self {
        Self { min: val, max: val }
    }

    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Range from two values in either order.
    pub fn safe_from(v1: f64, v2: f64) -> Self {
        if v1 > v2 {
            Self::new(v2, v1)
        } else {
            Self::new(v1, v2)
        }
    }

    /// Both bounds set.
    #[inline]
    pub fn is_valid(&self) -> bool {
        !self.min.is_nan() && !self.max.is_nan()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.is_valid() || self.min >= self.max
    }

    /// `max - min`, NaN when invalid.
    #[inline]
    pub fn width(&self) -> f64 {
        if self.is_valid() {
            self.max - self.min
        } else {
            f64::NAN
        }
    }

    #[inline]
    pub fn center(&self) -> f64 {
        if self.is_valid() {
            (self.min + self.max) / 2.0
        } else {
            f64::NAN
        }
    }

    /// The `i`-th of `n` equal sub-intervals.
    ///
    /// # Panics
    /// Panics if `n == 0`.
    pub fn slice(&self, i: usize, n: usize) -> Range {
        assert!(n > 0, "cannot slice a range into zero parts");
        let delta = self.width() / n as f64;
        let min = self.min + i as f64 * delta;
        Range::new(min, min + delta)
    }

    /// Grow the range so that it includes `val`. An invalid range becomes a point.
    pub fn extend_by(&mut self, val: f64) {
        self.min = if self.min.is_nan() { val } else { self.min.min(val) };
        self.max = if self.max.is_nan() { val } else { self.max.max(val) };
    }

    /// Grow the range so that it includes `that`.
    pub fn extend_by_range(&mut self, that: &Range) {
        self.extend_by(that.min);
        self.extend_by(that.max);
    }

    #[inline]
    pub fn contains(&self, val: f64) -> bool {
        self.min <= val && val <= self.max
    }

    pub fn contains_range(&self, that: &Range) -> bool {
        self.min <= that.min && that.max <= self.max
    }

    pub fn intersects(&self, that: &Range) -> bool {
        self.min <= that.max && that.min <= self.max
    }

    /// Overlap of two ranges. Disjoint ranges yield an empty range placed at
    /// the boundary nearest to `that`.
    pub fn intersect(&self, that: &Range) -> Range {
        if !self.is_valid() || !that.is_valid() {
            return Range::invalid();
        }
        let min = self.min.max(that.min);
        let max = self.max.min(that.max);
        if min <= max {
            return Range::new(min, max);
        }
        if that.max < self.min {
            Range::point(self.min)
        } else {
            Range::point(self.max)
        }
    }

    /// Clamp `val` into the range.
    pub fn bound(&self, val: f64) -> f64 {
        if self.is_valid() && !val.is_nan() {
            val.max(self.min).min(self.max)
        } else {
            f64::NAN
        }
    }
}

/// Sorted list of non-overlapping ranges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Range>", into = "Vec<Range>")]
pub struct Ranges {
    ranges: Vec<Range>,
}

impl Ranges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from arbitrary ranges; overlapping entries are resolved as by
    /// successive [`Ranges::add`].
    pub fn from_ranges(ranges: impl IntoIterator<Item = Range>) -> Self {
        let mut result = Self::new();
        for r in ranges {
            result.add(r);
        }
        result
    }

    /// Insert a range, dropping every existing range it intersects.
    pub fn add(&mut self, range: Range) {
        self.ranges.retain(|r| !range.intersects(r));
        self.ranges.push(range);
        self.ranges.sort_by(|a, b| a.min.total_cmp(&b.min));
    }

    /// Remove the range equal to `range`. Returns whether it was present.
    pub fn remove(&mut self, range: &Range) -> bool {
        match self.ranges.iter().position(|r| r == range) {
            Some(pos) => {
                self.ranges.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&Range> {
        self.ranges.get(i)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Range> {
        self.ranges.iter()
    }
}

impl From<Vec<Range>> for Ranges {
    fn from(ranges: Vec<Range>) -> Self {
        Self::from_ranges(ranges)
    }
}

impl From<Ranges> for Vec<Range> {
    fn from(ranges: Ranges) -> Self {
        ranges.ranges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_default() {
        let r = Range::default();
        assert!(!r.is_valid());
        assert!(r.is_empty());
        assert!(r.width().is_nan());
        assert!(r.center().is_nan());
    }

    #[test]
    fn test_extend_from_invalid() {
        let mut r = Range::invalid();
        r.extend_by(3.0);
        assert_eq!(r, Range::point(3.0));
        r.extend_by(-1.0);
        r.extend_by(2.0);
        assert_eq!(r, Range::new(-1.0, 3.0));
    }

    #[test]
    fn test_slice() {
        let r = Range::new(0.0, 10.0);
        assert_eq!(r.slice(0, 4), Range::new(0.0, 2.5));
        assert_eq!(r.slice(3, 4), Range::new(7.5, 10.0));
        assert_eq!(r.slice(0, 1), r);
    }

    #[test]
    fn test_intersect() {
        let a = Range::new(0.0, 5.0);
        assert_eq!(a.intersect(&Range::new(3.0, 8.0)), Range::new(3.0, 5.0));
        assert!(a.intersect(&Range::new(6.0, 8.0)).is_empty());
        assert_eq!(a.intersect(&Range::new(6.0, 8.0)), Range::point(5.0));
        assert_eq!(a.intersect(&Range::new(-3.0, -1.0)), Range::point(0.0));
    }

    #[test]
    fn test_safe_from_and_contains() {
        let r = Range::safe_from(4.0, 1.0);
        assert_eq!(r, Range::new(1.0, 4.0));
        assert!(r.contains(1.0));
        assert!(r.contains(4.0));
        assert!(!r.contains(4.5));
        assert!(!r.contains(f64::NAN));
    }

    #[test]
    fn test_ranges_add_replaces_overlaps() {
        let mut rs = Ranges::new();
        rs.add(Range::new(5.0, 6.0));
        rs.add(Range::new(1.0, 2.0));
        assert_eq!(rs.len(), 2);
        assert_eq!(rs.get(0), Some(&Range::new(1.0, 2.0)));

        rs.add(Range::new(1.5, 5.5));
        assert_eq!(rs.len(), 1);
        assert_eq!(rs.get(0), Some(&Range::new(1.5, 5.5)));
    }

    #[test]
    fn test_ranges_unset_entry_sorts_last() {
        let rs = Ranges::from_ranges([
            Range::new(5.0, 6.0),
            Range::invalid(),
            Range::new(1.0, 2.0),
        ]);
        assert_eq!(rs.len(), 3);
        assert_eq!(rs.get(0), Some(&Range::new(1.0, 2.0)));
        assert_eq!(rs.get(1), Some(&Range::new(5.0, 6.0)));
        assert!(!rs.get(2).unwrap().is_valid());
    }
}
