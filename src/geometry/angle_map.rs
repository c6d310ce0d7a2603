//! Per-pixel scattering angles and the gamma-sorted pixel index.

use super::detector::{Geometry, ImageCut, Size2d, IJ};
use crate::data::Range;
use ndarray::Array2;
use tracing::debug;

/// Scattering direction of one pixel, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScatterDirection {
    pub tth: f64,
    pub gma: f64,
}

/// Everything an [`AngleMap`] depends on. Compared by value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleMapKey {
    pub geometry: Geometry,
    pub size: Size2d,
    pub cut: ImageCut,
    pub mid_pix: IJ,
    pub mid_tth: f64,
}

impl AngleMapKey {
    pub fn new(geometry: Geometry, size: Size2d, cut: ImageCut, mid_tth: f64) -> Self {
        Self {
            geometry,
            size,
            cut,
            mid_pix: geometry.mid_pix(size),
            mid_tth,
        }
    }
}

/// Scattering angles of every pixel for one detector setting.
///
/// Immutable once built. Besides the dense per-pixel array it holds the
/// gamma values of all pixels inside the cut, sorted ascending, together
/// with the flattened pixel index (`j * w + i`) each value came from.
#[derive(Debug, Clone)]
pub struct AngleMap {
    key: AngleMapKey,
    dirs: Array2<ScatterDirection>,
    gmas: Vec<f64>,
    gma_indexes: Vec<usize>,
    rge_tth: Range,
    rge_gma: Range,
    rge_gma_full: Range,
}

impl AngleMap {
    /// Compute the map for `key`.
    ///
    /// # Panics
    /// Panics if the geometry violates its minima or the cut does not leave
    /// at least one pixel on both axes.
    pub fn new(key: AngleMapKey) -> Self {
        let AngleMapKey {
            geometry,
            size,
            cut,
            mid_pix,
            mid_tth,
        } = key;
        assert!(geometry.is_valid(), "detector geometry below its minima");
        assert!(
            size.w > cut.left + cut.right,
            "image width does not exceed horizontal cut"
        );
        assert!(
            size.h > cut.top + cut.bottom,
            "image height does not exceed vertical cut"
        );

        let pix = geometry.pix_size;
        let (s, c) = mid_tth.to_radians().sin_cos();

        // detector center in the beam frame
        let b_x1 = geometry.detector_distance * s;
        let b_z1 = geometry.detector_distance * c;

        let mut dirs = Array2::from_elem((size.h, size.w), ScatterDirection::default());
        for i in 0..size.w {
            let d_x = (i as f64 - mid_pix.i as f64) * pix;
            let b_x = b_x1 + d_x * c;
            let b_z = b_z1 - d_x * s;
            let b_x2 = b_x * b_x;
            for j in 0..size.h {
                let b_y = (mid_pix.j as f64 - j as f64) * pix;
                let b_r = (b_x2 + b_y * b_y).sqrt();
                dirs[[j, i]] = ScatterDirection {
                    tth: b_r.atan2(b_z).to_degrees(),
                    gma: b_y.atan2(b_x).to_degrees(),
                };
            }
        }

        let mut rge_tth = Range::invalid();
        let mut rge_gma = Range::invalid();
        let mut rge_gma_full = Range::invalid();
        let mut sorted: Vec<(f64, usize)> = Vec::with_capacity(cut.net_size(size).count());

        for j in cut.top..size.h - cut.bottom {
            for i in cut.left..size.w - cut.right {
                let dir = dirs[[j, i]];
                rge_tth.extend_by(dir.tth);
                rge_gma_full.extend_by(dir.gma);
                if dir.tth >= mid_tth {
                    rge_gma.extend_by(dir.gma);
                }
                sorted.push((dir.gma, j * size.w + i));
            }
        }

        // sort_by is stable: equal gammas keep row-major order
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (gmas, gma_indexes) = sorted.into_iter().unzip();

        debug!(
            w = size.w,
            h = size.h,
            mid_tth,
            distance = geometry.detector_distance,
            "built angle map"
        );

        Self {
            key,
            dirs,
            gmas,
            gma_indexes,
            rge_tth,
            rge_gma,
            rge_gma_full,
        }
    }

    pub fn key(&self) -> &AngleMapKey {
        &self.key
    }

    /// Direction of the pixel at column `i`, row `j`.
    #[inline]
    pub fn dir_at(&self, i: usize, j: usize) -> ScatterDirection {
        self.dirs[[j, i]]
    }

    /// Direction of the pixel at flattened index `j * w + i`.
    #[inline]
    pub fn dir_at1(&self, ind: usize) -> ScatterDirection {
        let w = self.key.size.w;
        self.dirs[[ind / w, ind % w]]
    }

    /// Sorted gamma values of the pixels inside the cut.
    pub fn gmas(&self) -> &[f64] {
        &self.gmas
    }

    /// Flattened pixel index belonging to each entry of [`AngleMap::gmas`].
    pub fn gma_indexes(&self) -> &[usize] {
        &self.gma_indexes
    }

    /// 2theta range over the pixels inside the cut.
    pub fn rge_tth(&self) -> Range {
        self.rge_tth
    }

    /// Gamma range over pixels with 2theta at or above the mid 2theta.
    pub fn rge_gma(&self) -> Range {
        self.rge_gma
    }

    /// Gamma range over all pixels inside the cut.
    pub fn rge_gma_full(&self) -> Range {
        self.rge_gma_full
    }

    /// Half-open slice `[min, max)` of the sorted index covering `rge_gma`.
    /// Never inverted: a NaN lower bound gives an empty slice at the end.
    pub fn gma_index_range(&self, rge_gma: &Range) -> (usize, usize) {
        let min_index = lower_bound(&self.gmas, rge_gma.min);
        let max_index = upper_bound(&self.gmas, rge_gma.max).max(min_index);
        (min_index, max_index)
    }
}

/// First index whose value is not below `x`.
///
/// NaN routes toward the end: a NaN `x` yields `v.len()`, and a NaN entry
/// counts as below any bound.
pub fn lower_bound(v: &[f64], x: f64) -> usize {
    if x.is_nan() {
        return v.len();
    }
    partition_point(v, |val| !(val >= x))
}

/// First index whose value is above `x`.
///
/// NaN routes toward the end as in [`lower_bound`].
pub fn upper_bound(v: &[f64], x: f64) -> usize {
    if x.is_nan() {
        return v.len();
    }
    partition_point(v, |val| !(val > x))
}

// Binary search for the first index where `pred` turns false.
fn partition_point(v: &[f64], pred: impl Fn(f64) -> bool) -> usize {
    let (mut lo, mut hi) = (0usize, v.len());
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if pred(v[mid]) {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}
