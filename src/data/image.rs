//! Detector images and the correction normalizer.

use crate::geometry::{ImageCut, Size2d};
use ndarray::Array2;

/// A 2D detector image. Rows are indexed by `j`, columns by `i`; NaN marks a
/// missing pixel.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    intens: Array2<f32>,
}

impl Image {
    /// Wrap an array of shape `(h, w)`.
    pub fn new(intens: Array2<f32>) -> Self {
        Self { intens }
    }

    /// Image of the given size with every pixel set to `val`.
    pub fn filled(size: Size2d, val: f32) -> Self {
        Self {
            intens: Array2::from_elem((size.h, size.w), val),
        }
    }

    /// Build from row-major data of length `w * h`.
    pub fn from_row_major(size: Size2d, data: Vec<f32>) -> Option<Self> {
        Array2::from_shape_vec((size.h, size.w), data)
            .ok()
            .map(Self::new)
    }

    pub fn size(&self) -> Size2d {
        let (h, w) = self.intens.dim();
        Size2d::new(w, h)
    }

    /// Intensity at column `i`, row `j`.
    #[inline]
    pub fn inten2d(&self, i: usize, j: usize) -> f32 {
        self.intens[[j, i]]
    }

    #[inline]
    pub fn set_inten2d(&mut self, i: usize, j: usize, val: f32) {
        self.intens[[j, i]] = val;
    }

    /// Intensity at flattened index `j * w + i`.
    #[inline]
    pub fn inten1d(&self, ind: usize) -> f32 {
        let w = self.intens.ncols();
        self.intens[[ind / w, ind % w]]
    }

    pub fn array(&self) -> &Array2<f32> {
        &self.intens
    }
}

/// Per-pixel factors that flatten the detector response of a correction image.
///
/// Inside the cut area each factor is the area's average intensity divided by
/// the pixel's intensity, NaN for non-positive pixels. Pixels outside the cut
/// keep the factor 1.
///
/// # Panics
/// Panics if the cut does not leave at least one pixel.
pub fn correction_normalizer(corr: &Image, cut: &ImageCut) -> Image {
    let size = corr.size();
    assert!(cut.fits(size), "image cut exceeds correction image");

    let net = cut.net_size(size);
    let (di, dj) = (cut.left, cut.top);

    let mut sum = 0.0f64;
    for j in 0..net.h {
        for i in 0..net.w {
            sum += corr.inten2d(i + di, j + dj) as f64;
        }
    }
    let avg = sum / net.count() as f64;

    let mut normalizer = Image::filled(size, 1.0);
    for j in 0..net.h {
        for i in 0..net.w {
            let inten = corr.inten2d(i + di, j + dj);
            let fact = if inten > 0.0 {
                avg / inten as f64
            } else {
                f64::NAN
            };
            normalizer.set_inten2d(i + di, j + dj, fact as f32);
        }
    }
    normalizer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_layout() {
        let img = Image::from_row_major(Size2d::new(3, 2), vec![0., 1., 2., 3., 4., 5.]).unwrap();
        assert_eq!(img.size(), Size2d::new(3, 2));
        assert_eq!(img.inten2d(2, 0), 2.0);
        assert_eq!(img.inten2d(0, 1), 3.0);
        assert_eq!(img.inten1d(4), 4.0);
        assert!(Image::from_row_major(Size2d::new(3, 3), vec![0.0; 4]).is_none());
    }

    #[test]
    fn test_correction_normalizer() {
        let mut corr = Image::filled(Size2d::new(4, 4), 2.0);
        corr.set_inten2d(1, 1, 4.0);
        corr.set_inten2d(2, 2, 0.0);
        corr.set_inten2d(0, 0, 100.0);

        let norm = correction_normalizer(&corr, &ImageCut::uniform(1));
        // cut area holds 4.0, 2.0, 2.0, 0.0 -> average 2.0
        assert_eq!(norm.inten2d(1, 1), 0.5);
        assert_eq!(norm.inten2d(2, 1), 1.0);
        assert!(norm.inten2d(2, 2).is_nan());
        assert_eq!(norm.inten2d(0, 0), 1.0);
    }
}
