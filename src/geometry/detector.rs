//! Detector geometry, image size and image cut.

use serde::{Deserialize, Serialize};

/// Integer pixel offset (column `i`, row `j`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct IJ {
    pub i: i32,
    pub j: i32,
}

impl IJ {
    pub fn new(i: i32, j: i32) -> Self {
        Self { i, j }
    }
}

/// Image size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size2d {
    pub w: usize,
    pub h: usize,
}

impl Size2d {
    pub fn new(w: usize, h: usize) -> Self {
        Self { w, h }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.w * self.h
    }
}

/// Detector placement relative to the sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    /// Sample to detector distance.
    pub detector_distance: f64,
    /// Edge length of a square pixel, same unit as the distance.
    pub pix_size: f64,
    /// Offset of the primary beam from the image center.
    pub mid_pix_offset: IJ,
}

impl Geometry {
    pub const MIN_DETECTOR_DISTANCE: f64 = 10.0;
    pub const MIN_DETECTOR_PIXEL_SIZE: f64 = 0.1;
    pub const DEF_DETECTOR_DISTANCE: f64 = 1035.0;
    pub const DEF_DETECTOR_PIXEL_SIZE: f64 = 1.0;

    /// Create a geometry, raising distance and pixel size to their minima.
    pub fn new(detector_distance: f64, pix_size: f64, mid_pix_offset: IJ) -> Self {
        Self {
            detector_distance: detector_distance.max(Self::MIN_DETECTOR_DISTANCE),
            pix_size: pix_size.max(Self::MIN_DETECTOR_PIXEL_SIZE),
            mid_pix_offset,
        }
    }

    /// Distance and pixel size respect their minima.
    pub fn is_valid(&self) -> bool {
        self.detector_distance >= Self::MIN_DETECTOR_DISTANCE
            && self.pix_size >= Self::MIN_DETECTOR_PIXEL_SIZE
    }

    /// Beam position in pixels for an image of the given size.
    pub fn mid_pix(&self, size: Size2d) -> IJ {
        IJ::new(
            (size.w / 2) as i32 + self.mid_pix_offset.i,
            (size.h / 2) as i32 + self.mid_pix_offset.j,
        )
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            detector_distance: Self::DEF_DETECTOR_DISTANCE,
            pix_size: Self::DEF_DETECTOR_PIXEL_SIZE,
            mid_pix_offset: IJ::default(),
        }
    }
}

/// Margins excluded from evaluation, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ImageCut {
    pub left: usize,
    pub top: usize,
    pub right: usize,
    pub bottom: usize,
}

impl ImageCut {
    pub fn new(left: usize, top: usize, right: usize, bottom: usize) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Same margin on all four sides.
    pub fn uniform(margin: usize) -> Self {
        Self::new(margin, margin, margin, margin)
    }

    /// Total horizontal and vertical margin.
    pub fn margin_size(&self) -> Size2d {
        Size2d::new(self.left + self.right, self.top + self.bottom)
    }

    /// Image size remaining inside the margins. Zero-sized if the cut is too large.
    pub fn net_size(&self, size: Size2d) -> Size2d {
        let m = self.margin_size();
        Size2d::new(size.w.saturating_sub(m.w), size.h.saturating_sub(m.h))
    }

    /// Margins leave at least one pixel on both axes.
    pub fn fits(&self, size: Size2d) -> bool {
        let m = self.margin_size();
        size.w > m.w && size.h > m.h
    }

    /// Limit the margins so that at least one pixel remains.
    ///
    /// With `top_left_first` the top and left margins are limited first, so
    /// they give way when a pair does not fit. With `linked`, colliding
    /// opposite margins are both set to the largest value that still leaves a
    /// pixel in the middle.
    pub fn clamped(&self, size: Size2d, top_left_first: bool, linked: bool) -> ImageCut {
        if size.is_empty() {
            return ImageCut::default();
        }

        let limit = |m1: usize, m2: usize, max_together: usize| -> (usize, usize) {
            let (m1, m2, max) = (m1 as i64, m2 as i64, max_together as i64);
            if linked && m1 + m2 >= max {
                let m = ((max - 1) / 2).max(0) as usize;
                (m, m)
            } else {
                let m1 = m1.min(max - m2 - 1).max(0);
                let m2 = m2.min(max - m1 - 1).max(0);
                (m1 as usize, m2 as usize)
            }
        };

        let mut cut = *self;
        if top_left_first {
            (cut.top, cut.bottom) = limit(cut.top, cut.bottom, size.h);
            (cut.left, cut.right) = limit(cut.left, cut.right, size.w);
        } else {
            (cut.bottom, cut.top) = limit(cut.bottom, cut.top, size.h);
            (cut.right, cut.left) = limit(cut.right, cut.left, size.w);
        }
        cut
    }
}
