//! Projection of detector images onto 2theta bins.

use super::config::IntensityScaling;
use crate::data::{Curve, Image, Range};
use crate::geometry::{AngleMap, ImageCut};
use tracing::debug;

/// Inputs of [`project_cluster`] besides the member images.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionParams<'a> {
    /// 2theta range covered by the bins.
    pub rge_tth: Range,
    /// Gamma range of the pixels taken into account.
    pub rge_gma: Range,
    pub num_bins: usize,
    /// Per-pixel factors; pixels with a NaN factor are left out.
    pub correction: Option<&'a Image>,
    pub intensity: IntensityScaling,
    /// Applied to every output value.
    pub norm_factor: f64,
}

/// Add the pixels of `image` within `rge_gma` to the bins starting at
/// `min_tth`, each `delta_tth` wide.
///
/// Pixels with NaN intensity or NaN correction are skipped. A zero
/// `delta_tth` (a single remaining pixel column) puts every pixel into the
/// first bin.
///
/// # Panics
/// Panics if the accumulators differ in length or are empty.
#[allow(clippy::too_many_arguments)]
pub fn project_measurement(
    intens: &mut [f64],
    counts: &mut [usize],
    image: &Image,
    angle_map: &AngleMap,
    rge_gma: &Range,
    min_tth: f64,
    delta_tth: f64,
    correction: Option<&Image>,
) {
    assert_eq!(intens.len(), counts.len(), "accumulator length mismatch");
    assert!(!intens.is_empty(), "no bins to project onto");

    let last = intens.len() - 1;
    let (min_index, max_index) = angle_map.gma_index_range(rge_gma);
    for &ind in &angle_map.gma_indexes()[min_index..max_index] {
        let mut inten = image.inten1d(ind);
        if inten.is_nan() {
            continue;
        }
        if let Some(corr) = correction {
            let fact = corr.inten1d(ind);
            if fact.is_nan() {
                continue;
            }
            inten *= fact;
        }

        let tth = angle_map.dir_at1(ind).tth;
        // rounding may overshoot the last bin
        let ti = if delta_tth > 0.0 {
            ((tth - min_tth) / delta_tth).floor().max(0.0) as usize
        } else {
            0
        };
        let ti = ti.min(last);

        intens[ti] += inten as f64;
        counts[ti] += 1;
    }
}

/// Number of 2theta bins for a cluster.
///
/// One bin per net horizontal pixel. For clusters of several measurements
/// the count grows with the ratio of the cluster's 2theta width to that of
/// its first member.
///
/// # Panics
/// Panics if the result would be zero.
pub fn num_tth_bins(image_width: usize, cut: &ImageCut, member_tth: &[Range], cluster_tth: &Range) -> usize {
    let mut ret = image_width.saturating_sub(cut.left + cut.right);
    if member_tth.len() > 1 {
        ret = (ret as f64 * cluster_tth.width() / member_tth[0].width()) as usize;
    }
    assert!(ret > 0, "no 2theta bins");
    ret
}

/// Bin the pixels of all `members` into one diffractogram.
///
/// In averaged mode every non-empty bin is scaled by `scale / count`,
/// otherwise the plain sums are kept. Bin `i` is placed at
/// `rge_tth.min + i * delta`.
pub fn project_cluster(members: &[(&Image, &AngleMap)], params: &ProjectionParams<'_>) -> Curve {
    let n = params.num_bins;
    let min_tth = params.rge_tth.min;
    let delta_tth = params.rge_tth.width() / n as f64;

    let mut intens = vec![0.0; n];
    let mut counts = vec![0usize; n];
    for (image, angle_map) in members {
        project_measurement(
            &mut intens,
            &mut counts,
            image,
            angle_map,
            &params.rge_gma,
            min_tth,
            delta_tth,
            params.correction,
        );
    }

    if params.intensity.averaged {
        let scale = params.intensity.scale;
        for (inten, &cnt) in intens.iter_mut().zip(&counts) {
            if cnt > 0 {
                *inten *= scale / cnt as f64;
            }
        }
    }

    debug!(
        members = members.len(),
        bins = n,
        gma_min = params.rge_gma.min,
        gma_max = params.rge_gma.max,
        "projected cluster"
    );

    let mut curve = Curve::with_capacity(n);
    for (i, inten) in intens.into_iter().enumerate() {
        curve.append(min_tth + delta_tth * i as f64, inten * params.norm_factor);
    }
    curve
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{AngleMapKey, Geometry, Size2d, IJ};

    fn flat_map(mid_tth: f64) -> AngleMap {
        let geometry = Geometry::new(1000.0, 1.0, IJ::default());
        AngleMap::new(AngleMapKey::new(
            geometry,
            Size2d::new(10, 10),
            ImageCut::default(),
            mid_tth,
        ))
    }

    fn params<'a>(map: &AngleMap, averaged: bool) -> ProjectionParams<'a> {
        ProjectionParams {
            rge_tth: map.rge_tth(),
            rge_gma: map.rge_gma_full(),
            num_bins: 10,
            correction: None,
            intensity: IntensityScaling {
                averaged,
                scale: 1.0,
            },
            norm_factor: 1.0,
        }
    }

    #[test]
    fn test_num_tth_bins() {
        let cut = ImageCut::new(1, 0, 2, 0);
        let r = Range::new(0.0, 2.0);
        assert_eq!(num_tth_bins(10, &cut, &[r], &r), 7);
        assert_eq!(num_tth_bins(10, &cut, &[r, r], &Range::new(0.0, 3.0)), 10);
    }

    #[test]
    fn test_two_constant_images_averaged() {
        let map = flat_map(20.0);
        let image = Image::filled(Size2d::new(10, 10), 5.0);
        let members = [(&image, &map), (&image, &map)];

        let curve = project_cluster(&members, &params(&map, true));
        assert_eq!(curve.len(), 10);
        for &y in curve.ys() {
            assert!((y - 5.0).abs() < 1e-9, "bin value {y}");
        }
        assert!((curve.x(0) - map.rge_tth().min).abs() < 1e-12);
    }

    #[test]
    fn test_constant_image_summed() {
        let map = flat_map(20.0);
        let image = Image::filled(Size2d::new(10, 10), 5.0);

        let mut intens = vec![0.0; 10];
        let mut counts = vec![0; 10];
        let rge = map.rge_tth();
        project_measurement(
            &mut intens,
            &mut counts,
            &image,
            &map,
            &map.rge_gma_full(),
            rge.min,
            rge.width() / 10.0,
            None,
        );
        assert_eq!(counts.iter().sum::<usize>(), 100);
        for (inten, cnt) in intens.iter().zip(&counts) {
            assert!((inten - 5.0 * *cnt as f64).abs() < 1e-9);
        }

        let curve = project_cluster(&[(&image, &map)], &params(&map, false));
        assert!((curve.sum_y() - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_nan_pixels_and_correction_skipped() {
        let map = flat_map(20.0);
        let mut image = Image::filled(Size2d::new(10, 10), 1.0);
        image.set_inten2d(0, 0, f32::NAN);
        let mut corr = Image::filled(Size2d::new(10, 10), 2.0);
        corr.set_inten2d(1, 0, f32::NAN);

        let mut p = params(&map, false);
        p.correction = Some(&corr);
        let curve = project_cluster(&[(&image, &map)], &p);
        assert!((curve.sum_y() - 2.0 * 98.0).abs() < 1e-9);
    }

    #[test]
    fn test_norm_factor_applied() {
        let map = flat_map(20.0);
        let image = Image::filled(Size2d::new(10, 10), 4.0);
        let mut p = params(&map, true);
        p.norm_factor = 0.5;
        let curve = project_cluster(&[(&image, &map)], &p);
        assert!(curve.ys().iter().all(|y| (y - 2.0).abs() < 1e-9));
    }
}
