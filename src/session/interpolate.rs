//! Pole-figure interpolation of reflection rows onto a regular alpha/beta
//! grid.
//!
//! Grid points up to `avg_alpha_max` average the strongest rows within
//! `avg_radius`. Other points, and averaged points without any row in reach,
//! use inverse-distance weighting of the nearest row in each of the four
//! quadrants around them.

use super::config::InterpolParams;
use super::reflection::{Measured, ReflectionInfo, ReflectionInfos};
use super::session::Progress;
use crate::data::Range;
use tracing::{info, warn};

/// Rows farther than this in beta are not considered by the quadrant search.
const BETA_LIMIT: f64 = 30.0;

/// Intensity, 2theta and FWHM of a row.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Itf {
    inten: f64,
    tth: f64,
    fwhm: f64,
}

impl Itf {
    fn nan() -> Self {
        Self {
            inten: f64::NAN,
            tth: f64::NAN,
            fwhm: f64::NAN,
        }
    }

    fn of(info: &ReflectionInfo) -> Self {
        Self {
            inten: info.inten(),
            tth: info.tth(),
            fwhm: info.fwhm(),
        }
    }
}

/// `beta1 - beta2` for angles in `[0, 360]`, folded into `[-180, 180]`.
pub fn calculate_delta_beta(beta1: f64, beta2: f64) -> f64 {
    let mut delta = beta1 - beta2;
    if (delta - 360.0).abs() < delta.abs() {
        delta -= 360.0;
    }
    if (delta + 360.0).abs() < delta.abs() {
        delta += 360.0;
    }
    delta
}

/// Angle between two points on the unit sphere with polar angles `alpha1`,
/// `alpha2` and azimuth difference `delta_beta`, all in degrees.
///
/// Haversine form: coinciding points are exactly 0 apart.
pub fn angle_between(alpha1: f64, alpha2: f64, delta_beta: f64) -> f64 {
    let (a1, a2) = (alpha1.to_radians(), alpha2.to_radians());
    let half_alpha = ((a1 - a2) / 2.0).sin();
    let half_beta = (delta_beta.to_radians() / 2.0).sin();
    let h = half_alpha * half_alpha + a1.sin() * a2.sin() * half_beta * half_beta;
    (2.0 * h.clamp(0.0, 1.0).sqrt().asin()).to_degrees()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quadrant {
    NorthEast,
    SouthEast,
    SouthWest,
    NorthWest,
}

impl Quadrant {
    const ALL: [Quadrant; 4] = [
        Quadrant::NorthEast,
        Quadrant::SouthEast,
        Quadrant::SouthWest,
        Quadrant::NorthWest,
    ];

    fn contains(self, delta_alpha: f64, delta_beta: f64) -> bool {
        match self {
            Quadrant::NorthEast => delta_alpha >= 0.0 && delta_beta >= 0.0,
            Quadrant::SouthEast => delta_alpha >= 0.0 && delta_beta < 0.0,
            Quadrant::SouthWest => delta_alpha < 0.0 && delta_beta < 0.0,
            Quadrant::NorthWest => delta_alpha < 0.0 && delta_beta >= 0.0,
        }
    }

    /// Quadrant searched around the mirrored point when this one is empty.
    fn remapped(self) -> Quadrant {
        match self {
            Quadrant::NorthEast => Quadrant::NorthWest,
            Quadrant::SouthEast => Quadrant::SouthWest,
            Quadrant::SouthWest => Quadrant::NorthEast,
            Quadrant::NorthWest => Quadrant::SouthEast,
        }
    }
}

/// Rows closer than `radius` to `(alpha, beta)`.
fn search_points(alpha: f64, beta: f64, radius: f64, infos: &ReflectionInfos) -> Vec<Itf> {
    infos
        .iter()
        .filter(|r| {
            angle_between(r.alpha(), alpha, calculate_delta_beta(r.beta(), beta)) < radius
        })
        .map(Itf::of)
        .collect()
}

/// Nearest row and its distance in each of `quadrants` around
/// `(alpha, beta)`. A quadrant whose nearest row is not closer than `radius`
/// stays empty.
fn search_in_quadrants<'a>(
    quadrants: &[Quadrant],
    alpha: f64,
    beta: f64,
    radius: Option<f64>,
    infos: &'a ReflectionInfos,
) -> Vec<Option<(f64, &'a ReflectionInfo)>> {
    let mut nearest: Vec<Option<(f64, &ReflectionInfo)>> = vec![None; quadrants.len()];
    for info in infos.iter() {
        let delta_beta = calculate_delta_beta(info.beta(), beta);
        if delta_beta.abs() > BETA_LIMIT {
            continue;
        }
        let delta_alpha = info.alpha() - alpha;
        let d = angle_between(alpha, info.alpha(), delta_beta);
        for (q, slot) in quadrants.iter().zip(nearest.iter_mut()) {
            if q.contains(delta_alpha, delta_beta) && slot.map_or(true, |(best, _)| d < best) {
                *slot = Some((d, info));
            }
        }
    }
    nearest
        .into_iter()
        .map(|slot| slot.filter(|(d, _)| radius.map_or(true, |r| *d < r)))
        .collect()
}

fn inverse_distance_weighing(found: &[(f64, &ReflectionInfo)]) -> Itf {
    if let Some((_, info)) = found.iter().find(|(d, _)| *d == 0.0) {
        return Itf::of(info);
    }
    let mut sum = Itf {
        inten: 0.0,
        tth: 0.0,
        fwhm: 0.0,
    };
    let mut weights = 0.0;
    for (d, info) in found {
        let w = 1.0 / d;
        sum.inten += info.inten() * w;
        sum.tth += info.tth() * w;
        sum.fwhm += info.fwhm() * w;
        weights += w;
    }
    Itf {
        inten: sum.inten / weights,
        tth: sum.tth / weights,
        fwhm: sum.fwhm / weights,
    }
}

/// Inverse-distance weighting at `(alpha, beta)`; NaN unless every quadrant
/// has a row in reach.
fn interpolate_values(radius: Option<f64>, infos: &ReflectionInfos, alpha: f64, beta: f64) -> Itf {
    let mut found = search_in_quadrants(&Quadrant::ALL, alpha, beta, radius, infos);
    for (q, slot) in Quadrant::ALL.into_iter().zip(found.iter_mut()) {
        if slot.is_some() {
            continue;
        }
        // mirror through the pole, J. Appl. Cryst. (2011) 44, 641
        let mirrored_alpha = match q {
            Quadrant::NorthEast | Quadrant::SouthEast => 180.0 - alpha,
            Quadrant::SouthWest | Quadrant::NorthWest => -alpha,
        };
        let mirrored_beta = if beta < 180.0 { beta + 180.0 } else { beta - 180.0 };
        *slot = search_in_quadrants(&[q.remapped()], mirrored_alpha, mirrored_beta, radius, infos)
            .into_iter()
            .next()
            .flatten();
    }
    let found: Vec<(f64, &ReflectionInfo)> = found.into_iter().flatten().collect();
    if found.len() == Quadrant::ALL.len() {
        inverse_distance_weighing(&found)
    } else {
        Itf::nan()
    }
}

/// Mean of the strongest `threshold` percent of `itfs`, at least one of them.
fn average_strongest(mut itfs: Vec<Itf>, threshold: u8) -> Option<Itf> {
    if itfs.is_empty() {
        return None;
    }
    itfs.sort_by(|a, b| a.inten.total_cmp(&b.inten));
    let n = itfs.len();
    let keep = f64::from(threshold.min(100)) / 100.0;
    let begin = ((n as f64 * (1.0 - keep)).round() as usize).min(n - 1);
    let used = &itfs[begin..];
    let cnt = used.len() as f64;
    Some(Itf {
        inten: used.iter().map(|i| i.inten).sum::<f64>() / cnt,
        tth: used.iter().map(|i| i.tth).sum::<f64>() / cnt,
        fwhm: used.iter().map(|i| i.fwhm).sum::<f64>() / cnt,
    })
}

fn grid_row(alpha: f64, beta: f64, rge_gma: Range, itf: Itf) -> ReflectionInfo {
    ReflectionInfo::new(
        None,
        alpha,
        beta,
        rge_gma,
        Measured::new(itf.inten, f64::NAN),
        Measured::new(itf.tth, f64::NAN),
        Measured::new(itf.fwhm, f64::NAN),
    )
}

/// Interpolate `direct` onto the grid `alpha = 0, step_alpha, .., 90` by
/// `beta = 0, step_beta, .. < 360`. Disabled parameters give an empty table;
/// without direct rows every grid point carries angles only.
pub fn interpolate_infos(
    direct: &ReflectionInfos,
    params: &InterpolParams,
    progress: Progress<'_>,
) -> ReflectionInfos {
    let mut ret = ReflectionInfos::new();
    if !params.enabled {
        return ret;
    }
    if !(params.step_alpha > 0.0 && params.step_beta > 0.0) {
        warn!(
            step_alpha = params.step_alpha,
            step_beta = params.step_beta,
            "interpolation steps must be positive"
        );
        return ret;
    }

    let num_alphas = (90.0 / params.step_alpha).round() as usize;
    let num_betas = (360.0 / params.step_beta).round() as usize;
    let total = (num_alphas + 1) * num_betas;
    // all rows of one peak share the gamma range of the first
    let rge_gma = direct.get(0).map_or(Range::invalid(), |r| r.rge_gma());
    info!(rows = direct.len(), grid = total, "interpolating pole figure");

    for i in 0..=num_alphas {
        progress(i * num_betas, total);
        let alpha = i as f64 * params.step_alpha;
        for j in 0..num_betas {
            let beta = j as f64 * params.step_beta;
            if direct.is_empty() {
                ret.append(ReflectionInfo::angles_only(None, alpha, beta, Range::invalid()));
                continue;
            }
            if alpha <= params.avg_alpha_max {
                let near = search_points(alpha, beta, params.avg_radius, direct);
                if let Some(avg) = average_strongest(near, params.threshold) {
                    ret.append(grid_row(alpha, beta, rge_gma, avg));
                    continue;
                }
                if params.idw_radius.is_none() {
                    ret.append(ReflectionInfo::angles_only(None, alpha, beta, Range::invalid()));
                    continue;
                }
            }
            let itf = interpolate_values(params.idw_radius, direct, alpha, beta);
            ret.append(grid_row(alpha, beta, rge_gma, itf));
        }
    }
    progress(total, total);
    info!(rows = ret.len(), "pole figure interpolated");
    ret
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(alpha: f64, beta: f64, inten: f64) -> ReflectionInfo {
        ReflectionInfo::new(
            None,
            alpha,
            beta,
            Range::new(-10.0, 10.0),
            Measured::new(inten, 0.0),
            Measured::new(30.0, 0.0),
            Measured::new(0.5, 0.0),
        )
    }

    fn at(infos: &ReflectionInfos, alpha: f64, beta: f64) -> &ReflectionInfo {
        infos
            .iter()
            .find(|r| r.alpha() == alpha && r.beta() == beta)
            .unwrap()
    }

    fn params() -> InterpolParams {
        InterpolParams {
            enabled: true,
            ..InterpolParams::default()
        }
    }

    fn run(direct: &ReflectionInfos, params: &InterpolParams) -> ReflectionInfos {
        interpolate_infos(direct, params, &mut |_: usize, _: usize| {})
    }

    #[test]
    fn test_delta_beta_is_cyclic() {
        assert_eq!(calculate_delta_beta(10.0, 350.0), 20.0);
        assert_eq!(calculate_delta_beta(350.0, 10.0), -20.0);
        assert_eq!(calculate_delta_beta(90.0, 45.0), 45.0);
        assert_eq!(calculate_delta_beta(180.0, 0.0).abs(), 180.0);
        assert_eq!(calculate_delta_beta(0.0, 360.0), 0.0);
    }

    #[test]
    fn test_angle_between() {
        let close = |a: f64, b: f64| (a - b).abs() < 1e-9;
        assert!(close(angle_between(0.0, 90.0, 0.0), 90.0));
        assert!(close(angle_between(30.0, 30.0, 0.0), 0.0));
        assert!(close(angle_between(90.0, 90.0, 180.0), 180.0));
        assert!(close(angle_between(45.0, 45.0, 90.0), 60.0));
        // every azimuth meets at the pole
        assert!(close(angle_between(0.0, 20.0, 135.0), 20.0));
    }

    #[test]
    fn test_disabled_gives_empty_table() {
        let mut direct = ReflectionInfos::new();
        direct.append(row(10.0, 10.0, 1.0));
        assert!(run(&direct, &InterpolParams::default()).is_empty());

        let zero_step = InterpolParams {
            step_beta: 0.0,
            ..params()
        };
        assert!(run(&direct, &zero_step).is_empty());
    }

    #[test]
    fn test_empty_direct_gives_angle_grid() {
        let p = InterpolParams {
            step_alpha: 30.0,
            step_beta: 90.0,
            ..params()
        };
        let mut steps = Vec::new();
        let out = interpolate_infos(&ReflectionInfos::new(), &p, &mut |done: usize, total: usize| {
            steps.push((done, total))
        });
        assert_eq!(out.len(), 4 * 4);
        assert!(out.iter().all(|r| r.inten().is_nan()));
        assert_eq!(at(&out, 90.0, 270.0).beta(), 270.0);
        assert_eq!(steps.last(), Some(&(16, 16)));
    }

    #[test]
    fn test_averaging_threshold() {
        let mut direct = ReflectionInfos::new();
        direct.append(row(10.0, 91.0, 1.0));
        direct.append(row(11.0, 90.0, 2.0));
        direct.append(row(9.0, 89.0, 3.0));
        direct.append(row(60.0, 200.0, 100.0));

        let p = InterpolParams {
            step_alpha: 10.0,
            step_beta: 90.0,
            idw_radius: None,
            ..params()
        };
        let out = run(&direct, &p);
        assert_eq!(out.len(), 10 * 4);
        let avg = at(&out, 10.0, 90.0);
        assert_eq!(avg.inten(), 2.0);
        assert_eq!(avg.tth(), 30.0);
        assert!(avg.metadata().is_none());
        assert_eq!(avg.rge_gma(), Range::new(-10.0, 10.0));
        // nothing within the averaging radius and no fallback
        assert!(at(&out, 0.0, 0.0).inten().is_nan());

        let strongest = InterpolParams { threshold: 50, ..p };
        assert_eq!(at(&run(&direct, &strongest), 10.0, 90.0).inten(), 3.0);
    }

    #[test]
    fn test_inverse_distance_on_dense_grid() {
        // intensity equals alpha, rows halfway between the grid points
        let mut direct = ReflectionInfos::new();
        for i in 0..18 {
            for j in 0..72 {
                let alpha = 2.5 + 5.0 * i as f64;
                direct.append(row(alpha, 2.5 + 5.0 * j as f64, alpha));
            }
        }
        let p = InterpolParams {
            step_alpha: 15.0,
            step_beta: 30.0,
            avg_alpha_max: 0.0,
            ..params()
        };
        let out = run(&direct, &p);
        let mid = at(&out, 45.0, 90.0);
        assert!((mid.inten() - 45.0).abs() < 0.1, "inten {}", mid.inten());
        assert_eq!(mid.tth(), 30.0);
        assert!(mid.inten_error().is_nan());

        // beta wraps around 0
        let wrapped = at(&out, 45.0, 0.0);
        assert!((wrapped.inten() - 45.0).abs() < 0.1, "inten {}", wrapped.inten());
    }

    #[test]
    fn test_inverse_distance_needs_every_quadrant() {
        let mut direct = ReflectionInfos::new();
        direct.append(row(47.0, 92.0, 1.0));
        direct.append(row(43.0, 88.0, 1.0));
        let p = InterpolParams {
            step_alpha: 15.0,
            step_beta: 30.0,
            avg_alpha_max: 0.0,
            ..params()
        };
        assert!(at(&run(&direct, &p), 45.0, 90.0).inten().is_nan());
    }

    #[test]
    fn test_coinciding_row_is_taken_as_is() {
        let mut direct = ReflectionInfos::new();
        for (alpha, beta, inten) in [
            (60.0, 90.0, 7.0),
            (62.0, 92.0, 1.0),
            (62.0, 88.0, 1.0),
            (58.0, 88.0, 1.0),
            (58.0, 92.0, 1.0),
        ] {
            direct.append(row(alpha, beta, inten));
        }
        let p = InterpolParams {
            step_alpha: 30.0,
            step_beta: 90.0,
            avg_alpha_max: 0.0,
            ..params()
        };
        assert_eq!(at(&run(&direct, &p), 60.0, 90.0).inten(), 7.0);
    }
}
