//! The session: measurements, configuration and every cached result.

use super::cluster::{group_into_clusters, Cluster};
use super::config::{
    BaselineSettings, IntensityScaling, InterpolParams, NormalizationMode, PeakSettings,
    SessionConfig,
};
use super::dfgram::{Dfgram, FitSettings};
use super::interpolate::interpolate_infos;
use super::project::{num_tth_bins, project_cluster, ProjectionParams};
use super::reflection::{calculate_alpha_beta, Measured, ReflectionInfo, ReflectionInfos};
use crate::cache::{Cached, CachedVector, KeyedCache, LruCache};
use crate::data::{correction_normalizer, Curve, Image, Measurement, Metadata, Range};
use crate::error::{Result, StecaError};
use crate::geometry::{AngleMap, AngleMapKey, Geometry, ImageCut, Size2d};
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Receives `(done, total)` while a long computation advances.
pub type Progress<'a> = &'a mut dyn FnMut(usize, usize);

/// Owner of the loaded data and of all derived results.
///
/// Results are computed on demand and cached. Every setter drops exactly
/// the cached results that depend on what it changed.
pub struct Session {
    config: SessionConfig,
    fit_settings: Rc<FitSettings>,
    measurements: Vec<Rc<Measurement>>,
    clusters: Vec<Cluster>,
    correction: Option<Rc<Image>>,
    normalizer: Option<KeyedCache<ImageCut, Image>>,
    angle_maps: LruCache<AngleMapKey, AngleMap>,
    /// Per cluster, one diffractogram per gamma sector.
    dfgrams: Vec<CachedVector<Session, Dfgram>>,
    /// Unnormalised diffractogram of all active measurements.
    avg_dfgram: Cached<Session, Option<Dfgram>>,
    /// Per configured peak.
    reflection_infos: CachedVector<Session, ReflectionInfos>,
    /// Per configured peak, `reflection_infos` on the pole-figure grid.
    interpolated: CachedVector<Session, ReflectionInfos>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        let fit_settings = Rc::new(fit_settings_of(&config));
        let angle_maps = LruCache::new(config.angle_map_capacity.max(1));
        Self {
            config,
            fit_settings,
            measurements: Vec::new(),
            clusters: Vec::new(),
            correction: None,
            normalizer: None,
            angle_maps,
            dfgrams: Vec::new(),
            avg_dfgram: Cached::new(compute_avg_dfgram),
            reflection_infos: CachedVector::new(
                |s: &Session| s.config.peaks.len(),
                |s: &Session, jp| s.compute_reflection_infos(jp, &mut |_: usize, _: usize| {}),
            ),
            interpolated: CachedVector::new(
                |s: &Session| s.config.peaks.len(),
                |s: &Session, jp| {
                    if !s.config.interpolation.enabled {
                        return ReflectionInfos::new();
                    }
                    let direct = s.reflection_infos(jp);
                    interpolate_infos(&direct, &s.config.interpolation, &mut |_: usize, _: usize| {})
                },
            ),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn measurements(&self) -> &[Rc<Measurement>] {
        &self.measurements
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// Common image size, if any measurement is loaded.
    pub fn image_size(&self) -> Option<Size2d> {
        self.measurements.first().map(|m| m.image_size())
    }

    // -- data --

    /// Append a measurement. All images of a session share one size.
    pub fn add_measurement(&mut self, measurement: Measurement) -> Result<()> {
        let expected = self
            .image_size()
            .or_else(|| self.correction.as_ref().map(|c| c.size()));
        if let Some(expected) = expected {
            check_size(expected, measurement.image_size())?;
        }
        self.measurements.push(Rc::new(measurement));
        self.clamp_cut();
        self.regroup();
        Ok(())
    }

    pub fn clear_measurements(&mut self) {
        self.measurements.clear();
        self.regroup();
    }

    /// Use `image` as detector correction; pass `None` to switch it off.
    pub fn set_correction(&mut self, image: Option<Image>) -> Result<()> {
        match image {
            Some(image) => {
                if let Some(expected) = self.image_size() {
                    check_size(expected, image.size())?;
                }
                let corr = Rc::new(image);
                let source = Rc::clone(&corr);
                self.normalizer = Some(KeyedCache::new(move |cut: &ImageCut| {
                    correction_normalizer(&source, cut)
                }));
                self.correction = Some(corr);
            }
            None => {
                self.correction = None;
                self.normalizer = None;
            }
        }
        self.invalidate_curves();
        Ok(())
    }

    pub fn has_correction(&self) -> bool {
        self.correction.is_some()
    }

    /// Per-pixel correction factors for the current cut.
    pub fn normalizer(&self) -> Option<Rc<Image>> {
        self.normalizer
            .as_ref()
            .map(|n| n.get(&self.config.image_cut))
    }

    // -- configuration --

    /// Replace the whole configuration.
    pub fn set_config(&mut self, config: SessionConfig) {
        if config.angle_map_capacity != self.config.angle_map_capacity {
            self.angle_maps = LruCache::new(config.angle_map_capacity.max(1));
        }
        let regroup = config.binning != self.config.binning
            || config.drop_incomplete != self.config.drop_incomplete;
        self.config = config;
        self.clamp_cut();
        self.fit_settings = Rc::new(fit_settings_of(&self.config));
        if regroup {
            self.regroup();
        } else {
            self.invalidate_curves();
        }
    }

    pub fn set_geometry(&mut self, geometry: Geometry) {
        self.config.geometry = geometry;
        self.invalidate_curves();
    }

    /// Set the cut margins, limited so that at least one pixel of the
    /// loaded images remains.
    pub fn set_image_cut(&mut self, cut: ImageCut) {
        self.config.image_cut = cut;
        self.clamp_cut();
        self.invalidate_curves();
    }

    pub fn set_image_cut_linked(&mut self, linked: bool) {
        self.config.image_cut_linked = linked;
        self.clamp_cut();
        self.invalidate_curves();
    }

    fn clamp_cut(&mut self) {
        if let Some(size) = self.image_size() {
            let cut = self.config.image_cut;
            self.config.image_cut = cut.clamped(size, true, self.config.image_cut_linked);
            if self.config.image_cut != cut {
                debug!(?cut, clamped = ?self.config.image_cut, "image cut clamped");
            }
        }
    }

    /// Number of gamma sectors per cluster.
    pub fn set_gamma_slices(&mut self, n: usize) {
        self.config.gamma_slices = n;
        self.invalidate_curves();
    }

    pub fn set_normalization(&mut self, mode: NormalizationMode) {
        self.config.normalization = mode;
        self.invalidate_curves();
    }

    pub fn set_intensity_scaling(&mut self, intensity: IntensityScaling) {
        self.config.intensity = intensity;
        self.invalidate_curves();
    }

    pub fn set_binning(&mut self, binning: usize, drop_incomplete: bool) {
        self.config.binning = binning;
        self.config.drop_incomplete = drop_incomplete;
        self.regroup();
    }

    /// # Panics
    /// Panics if `c` is not a cluster index.
    pub fn set_cluster_active(&mut self, c: usize, on: bool) {
        if self.clusters[c].is_active() == on {
            return;
        }
        self.clusters[c].set_active(on);
        // grand averages and the experiment background follow the active set
        if self.config.normalization != NormalizationMode::None {
            self.invalidate_curves();
        } else {
            self.avg_dfgram.invalidate();
            self.invalidate_infos();
        }
    }

    pub fn set_baseline(&mut self, baseline: BaselineSettings) {
        self.config.baseline = baseline;
        if self.config.normalization == NormalizationMode::Background {
            self.fit_settings = Rc::new(fit_settings_of(&self.config));
            self.invalidate_curves();
        } else {
            self.push_fit_settings();
            self.invalidate_infos();
        }
    }

    pub fn add_peak(&mut self, peak: PeakSettings) {
        self.config.peaks.push(peak);
        self.push_fit_settings();
    }

    /// # Panics
    /// Panics if `jp` is not a peak index.
    pub fn set_peak(&mut self, jp: usize, peak: PeakSettings) {
        self.config.peaks[jp] = peak;
        self.push_fit_settings();
        self.reflection_infos.invalidate_at(jp);
        self.interpolated.invalidate_at(jp);
    }

    /// # Panics
    /// Panics if `jp` is not a peak index.
    pub fn remove_peak(&mut self, jp: usize) {
        self.config.peaks.remove(jp);
        self.push_fit_settings();
        self.invalidate_infos();
    }

    /// Only the interpolated tables depend on these.
    pub fn set_interpolation(&mut self, params: InterpolParams) {
        self.config.interpolation = params;
        self.interpolated.invalidate();
    }

    // -- invalidation --

    fn regroup(&mut self) {
        self.clusters = group_into_clusters(
            &self.measurements,
            self.config.binning,
            self.config.drop_incomplete,
        );
        debug!(
            measurements = self.measurements.len(),
            clusters = self.clusters.len(),
            "regrouped measurements"
        );
        self.invalidate_curves();
    }

    /// Drop every projected curve and everything computed from them.
    fn invalidate_curves(&mut self) {
        self.dfgrams = (0..self.clusters.len())
            .map(|c| {
                CachedVector::new(
                    |s: &Session| s.config.num_sectors(),
                    move |s: &Session, i| s.compute_dfgram(c, i),
                )
            })
            .collect();
        self.avg_dfgram.invalidate();
        self.invalidate_infos();
    }

    fn invalidate_infos(&self) {
        self.reflection_infos.invalidate();
        self.interpolated.invalidate();
    }

    /// Hand new fit settings to the cached diffractograms, which keep their
    /// curves and drop only the affected fits.
    fn push_fit_settings(&mut self) {
        let settings = Rc::new(fit_settings_of(&self.config));
        self.fit_settings = Rc::clone(&settings);
        for sectors in &self.dfgrams {
            sectors.for_all_valid(self, |_, d| d.update_settings(Rc::clone(&settings)));
        }
        if let Some(avg) = self.avg_dfgram.get_if() {
            if let Some(d) = avg.as_ref() {
                d.update_settings(Rc::clone(&settings));
            }
        }
    }

    // -- geometry --

    /// Angle map of `measurement` under the current geometry and cut.
    ///
    /// # Panics
    /// Panics if the cut leaves no pixel of the image.
    pub fn angle_map(&self, measurement: &Measurement) -> Rc<AngleMap> {
        let key = AngleMapKey::new(
            self.config.geometry,
            measurement.image_size(),
            self.config.image_cut,
            measurement.mid_tth(),
        );
        self.angle_maps.get_or_insert_with(&key, |k| AngleMap::new(*k))
    }

    fn members_range(&self, members: &[Rc<Measurement>], f: impl Fn(&AngleMap) -> Range) -> Range {
        let mut rge = Range::invalid();
        for m in members {
            rge.extend_by_range(&f(self.angle_map(m).as_ref()));
        }
        rge
    }

    /// Union of the member 2theta ranges.
    pub fn cluster_rge_tth(&self, c: usize) -> Range {
        self.members_range(self.clusters[c].members(), AngleMap::rge_tth)
    }

    /// Union of the member gamma ranges.
    pub fn cluster_rge_gma(&self, c: usize) -> Range {
        self.members_range(self.clusters[c].members(), AngleMap::rge_gma)
    }

    /// Gamma range of sector `i` of cluster `c`.
    pub fn sector_range(&self, c: usize, i: usize) -> Range {
        self.cluster_rge_gma(c).slice(i, self.config.num_sectors())
    }

    // -- projection --

    fn project(&self, members: &[Rc<Measurement>], rge_gma: Range, norm_factor: f64) -> Curve {
        let maps: Vec<Rc<AngleMap>> = members.iter().map(|m| self.angle_map(m)).collect();
        let member_tth: Vec<Range> = maps.iter().map(|m| m.rge_tth()).collect();
        let mut rge_tth = Range::invalid();
        for r in &member_tth {
            rge_tth.extend_by_range(r);
        }
        let num_bins = num_tth_bins(
            members[0].image_size().w,
            &self.config.image_cut,
            &member_tth,
            &rge_tth,
        );

        let normalizer = self.normalizer();
        let pairs: Vec<(&Image, &AngleMap)> = members
            .iter()
            .zip(&maps)
            .map(|(m, map)| (m.image(), map.as_ref()))
            .collect();
        project_cluster(
            &pairs,
            &ProjectionParams {
                rge_tth,
                rge_gma,
                num_bins,
                correction: normalizer.as_deref(),
                intensity: self.config.intensity,
                norm_factor,
            },
        )
    }

    fn compute_dfgram(&self, c: usize, i: usize) -> Dfgram {
        let curve = self.project(
            self.clusters[c].members(),
            self.sector_range(c, i),
            self.norm_factor(c),
        );
        Dfgram::new(curve, Rc::clone(&self.fit_settings))
    }

    /// Diffractogram of gamma sector `i` of cluster `c`.
    ///
    /// # Panics
    /// Panics if `c` or `i` is out of range.
    pub fn dfgram(&self, c: usize, i: usize) -> Rc<Dfgram> {
        self.dfgrams[c].get(self, i)
    }

    /// Unnormalised diffractogram of all active measurements combined.
    pub fn avg_dfgram(&self) -> Rc<Option<Dfgram>> {
        self.avg_dfgram.get(self)
    }

    // -- normalisation --

    fn active_members(&self) -> impl Iterator<Item = &Rc<Measurement>> {
        self.clusters
            .iter()
            .filter(|c| c.is_active())
            .flat_map(|c| c.members())
    }

    /// Mean of `f` over all members of active clusters.
    fn grand_average(&self, f: impl Fn(&Metadata) -> f64) -> f64 {
        let (sum, cnt) = self
            .active_members()
            .fold((0.0, 0usize), |(sum, cnt), m| (sum + f(m.metadata()), cnt + 1));
        sum / cnt as f64
    }

    /// Background level of cluster `c` before normalisation.
    fn cluster_bg_level(&self, c: usize) -> f64 {
        let curve = self.project(self.clusters[c].members(), self.cluster_rge_gma(c), 1.0);
        let rge = curve.rge_x();
        Dfgram::new(curve, Rc::clone(&self.fit_settings)).bg_level(&rge)
    }

    /// Factor the intensities of cluster `c` are multiplied with.
    ///
    /// NaN, with a warning, when numerator or denominator is not positive.
    pub fn norm_factor(&self, c: usize) -> f64 {
        let cluster = &self.clusters[c];
        let (num, den) = match self.config.normalization {
            NormalizationMode::None => return 1.0,
            NormalizationMode::Monitor => (
                self.grand_average(Metadata::monitor_count),
                cluster.avg_monitor_count(),
            ),
            NormalizationMode::DeltaMonitor => (
                self.grand_average(Metadata::delta_monitor_count),
                cluster.avg_delta_monitor_count(),
            ),
            NormalizationMode::Time => (self.grand_average(Metadata::time), cluster.avg_time()),
            NormalizationMode::DeltaTime => (
                self.grand_average(Metadata::delta_time),
                cluster.avg_delta_time(),
            ),
            NormalizationMode::Background => {
                let num = match self.avg_dfgram().as_ref() {
                    Some(d) => d.bg_level(&d.curve().rge_x()),
                    None => f64::NAN,
                };
                (num, self.cluster_bg_level(c))
            }
        };
        if num > 0.0 && den > 0.0 {
            num / den
        } else {
            warn!(cluster = c, num, den, "Bad normalisation value");
            f64::NAN
        }
    }

    // -- aggregation --

    /// Result row of peak `jp` in sector `i` of cluster `c`.
    fn reflection_info(&self, c: usize, i: usize, jp: usize) -> ReflectionInfo {
        let settings = self.config.peaks[jp];
        let cluster = &self.clusters[c];
        let metadata = Some(cluster.metadata().clone());
        let range = settings.range;
        let sector = self.sector_range(c, i);
        let alpha_beta = |tth: f64| {
            calculate_alpha_beta(tth, sector.center(), cluster.chi(), cluster.omg(), cluster.phi())
        };

        if range.is_empty() {
            let (alpha, beta) = alpha_beta(range.center());
            return ReflectionInfo::angles_only(metadata, alpha, beta, sector);
        }

        let dfgram = self.dfgram(c, i);
        let mut gamma_over_sigma = Measured::nan();
        let (tth, fwhm, inten) = if settings.function.is_raw() {
            let out = dfgram.raw_outcome(jp);
            (
                Measured::new(out.center, 0.0),
                Measured::new(out.fwhm, 0.0),
                Measured::new(out.intensity, 0.0),
            )
        } else {
            let fit = dfgram.peak_fit(jp);
            if fit.success() {
                let f = &fit.function;
                let (peak, err) = (f.fitted_peak(), f.peak_error());
                let ratio = f.gamma_over_sigma();
                gamma_over_sigma = Measured::new(ratio.x, ratio.y);
                (
                    Measured::new(peak.x, err.x),
                    Measured::new(f.fitted_fwhm(), f.fwhm_error()),
                    Measured::new(peak.y, err.y),
                )
            } else {
                (Measured::nan(), Measured::nan(), Measured::nan())
            }
        };

        let angle_tth = if tth.value.is_finite() {
            tth.value
        } else {
            range.center()
        };
        let (alpha, beta) = alpha_beta(angle_tth);
        if !range.contains(tth.value) {
            return ReflectionInfo::angles_only(metadata, alpha, beta, sector);
        }
        ReflectionInfo::new(metadata, alpha, beta, sector, inten, tth, fwhm)
            .with_gamma_over_sigma(gamma_over_sigma)
    }

    /// Rows of peak `jp` over all active clusters and gamma sectors. Rows
    /// without a valid intensity are left out.
    ///
    /// # Panics
    /// Panics if `jp` is not a peak index.
    pub fn compute_reflection_infos(&self, jp: usize, progress: Progress<'_>) -> ReflectionInfos {
        let n = self.config.num_sectors();
        let active: Vec<usize> = self
            .clusters
            .iter()
            .filter(|c| c.is_active())
            .map(|c| c.index())
            .collect();
        info!(peak = jp, clusters = active.len(), sectors = n, "fitting peak");

        let mut infos = ReflectionInfos::new();
        for (step, &c) in active.iter().enumerate() {
            progress(step, active.len());
            for i in 0..n {
                let info = self.reflection_info(c, i, jp);
                if !info.inten().is_nan() {
                    infos.append(info);
                }
            }
        }
        progress(active.len(), active.len());
        info!(peak = jp, rows = infos.len(), "peak fitted");
        infos
    }

    /// Cached [`Session::compute_reflection_infos`].
    pub fn reflection_infos(&self, jp: usize) -> Rc<ReflectionInfos> {
        self.reflection_infos.get(self, jp)
    }

    /// Rows of peak `jp` interpolated onto the pole-figure grid; empty while
    /// interpolation is disabled.
    ///
    /// # Panics
    /// Panics if `jp` is not a peak index.
    pub fn interpolated_infos(&self, jp: usize) -> Rc<ReflectionInfos> {
        self.interpolated.get(self, jp)
    }

    /// The table a pole figure of peak `jp` is drawn from: interpolated when
    /// enabled, the direct rows otherwise.
    pub fn pole_figure_infos(&self, jp: usize) -> Rc<ReflectionInfos> {
        if self.config.interpolation.enabled {
            self.interpolated_infos(jp)
        } else {
            self.reflection_infos(jp)
        }
    }

    fn active_dfgrams(&self, progress: Progress<'_>, mut f: impl FnMut(&Dfgram)) {
        let n = self.config.num_sectors();
        let active: Vec<usize> = self
            .clusters
            .iter()
            .filter(|c| c.is_active())
            .map(|c| c.index())
            .collect();
        for (step, &c) in active.iter().enumerate() {
            progress(step, active.len());
            for i in 0..n {
                f(self.dfgram(c, i).as_ref());
            }
        }
        progress(active.len(), active.len());
    }

    /// Intensity range over the diffractograms of all active clusters and
    /// sectors.
    pub fn intensity_range(&self, progress: Progress<'_>) -> Range {
        let mut rge = Range::invalid();
        self.active_dfgrams(progress, |d| {
            if !d.curve().is_empty() {
                rge.extend_by_range(&d.curve().rge_y());
            }
        });
        info!(min = rge.min, max = rge.max, "intensity range");
        rge
    }

    /// Mean background level over the diffractograms of all active clusters
    /// and sectors; NaN when no background is defined.
    pub fn average_background(&self, progress: Progress<'_>) -> f64 {
        let (mut sum, mut cnt) = (0.0, 0usize);
        self.active_dfgrams(progress, |d| {
            let level = d.bg_level(&d.curve().rge_x());
            if level.is_finite() {
                sum += level;
                cnt += 1;
            }
        });
        let avg = if cnt > 0 { sum / cnt as f64 } else { f64::NAN };
        info!(avg, dfgrams = cnt, "average background");
        avg
    }
}

fn fit_settings_of(config: &SessionConfig) -> FitSettings {
    FitSettings {
        baseline: config.baseline.clone(),
        peaks: config.peaks.clone(),
    }
}

fn check_size(expected: Size2d, actual: Size2d) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(StecaError::ImageSizeMismatch {
            expected_w: expected.w,
            expected_h: expected.h,
            actual_w: actual.w,
            actual_h: actual.h,
        })
    }
}

fn compute_avg_dfgram(s: &Session) -> Option<Dfgram> {
    let members: Vec<Rc<Measurement>> = s.active_members().cloned().collect();
    if members.is_empty() {
        return None;
    }
    let rge_gma = s.members_range(&members, AngleMap::rge_gma);
    let curve = s.project(&members, rge_gma, 1.0);
    Some(Dfgram::new(curve, Rc::clone(&s.fit_settings)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{MetaAttribute, Ranges};
    use crate::fit::PeakKind;
    use crate::geometry::IJ;

    fn constant(val: f32, mon: f64) -> Measurement {
        let meta = Metadata::new()
            .with(MetaAttribute::MidTth, 20.0)
            .with(MetaAttribute::MonitorCount, mon);
        Measurement::new(Image::filled(Size2d::new(10, 10), val), meta)
    }

    fn test_config() -> SessionConfig {
        SessionConfig {
            geometry: Geometry::new(1000.0, 1.0, IJ::default()),
            ..SessionConfig::default()
        }
    }

    #[test]
    fn test_two_measurements_one_cluster() {
        let mut config = test_config();
        config.binning = 2;
        let mut session = Session::new(config);
        session.add_measurement(constant(5.0, 1.0)).unwrap();
        session.add_measurement(constant(5.0, 1.0)).unwrap();
        assert_eq!(session.clusters().len(), 1);

        let d = session.dfgram(0, 0);
        assert_eq!(d.curve().len(), 10);
        assert!(d.curve().ys().iter().all(|y| (y - 5.0).abs() < 1e-6));
        assert!(Rc::ptr_eq(&d, &session.dfgram(0, 0)));
    }

    #[test]
    fn test_size_mismatch() {
        let mut session = Session::new(test_config());
        session.add_measurement(constant(1.0, 1.0)).unwrap();
        let other = Measurement::new(Image::filled(Size2d::new(5, 5), 1.0), Metadata::new());
        assert!(matches!(
            session.add_measurement(other),
            Err(StecaError::ImageSizeMismatch { .. })
        ));
        let corr = Image::filled(Size2d::new(4, 4), 1.0);
        assert!(session.set_correction(Some(corr)).is_err());
        assert!(!session.has_correction());
    }

    #[test]
    fn test_monitor_normalisation() {
        let mut config = test_config();
        config.normalization = NormalizationMode::Monitor;
        let mut session = Session::new(config);
        session.add_measurement(constant(4.0, 10.0)).unwrap();
        session.add_measurement(constant(4.0, 30.0)).unwrap();

        assert!((session.norm_factor(0) - 2.0).abs() < 1e-12);
        assert!((session.norm_factor(1) - 2.0 / 3.0).abs() < 1e-12);
        let d = session.dfgram(0, 0);
        assert!(d.curve().ys().iter().all(|y| (y - 8.0).abs() < 1e-5));

        session.set_cluster_active(1, false);
        assert!((session.norm_factor(0) - 1.0).abs() < 1e-12);
        assert!(!Rc::ptr_eq(&d, &session.dfgram(0, 0)));
    }

    #[test]
    fn test_bad_normalisation_is_nan() {
        let mut config = test_config();
        config.normalization = NormalizationMode::Time;
        let mut session = Session::new(config);
        session.add_measurement(constant(4.0, 10.0)).unwrap();
        assert!(session.norm_factor(0).is_nan());
        assert!(session.dfgram(0, 0).curve().ys().iter().all(|y| y.is_nan()));
    }

    #[test]
    fn test_bad_normalisation_gives_no_rows() {
        let mut config = test_config();
        config.normalization = NormalizationMode::Time;
        config.peaks = vec![PeakSettings::new(Range::new(19.9, 20.3), PeakKind::Gaussian)];
        let mut session = Session::new(config);
        session.add_measurement(constant(4.0, 10.0)).unwrap();

        assert!(!session.dfgram(0, 0).peak_fit(0).success());
        let infos = session.reflection_infos(0);
        assert!(infos.is_empty());
        assert_eq!(infos.average_inten(), 0.0);
    }

    #[test]
    fn test_image_cut_clamped_to_images() {
        let mut session = Session::new(test_config());
        session.set_image_cut(ImageCut::uniform(5));
        assert_eq!(session.config().image_cut, ImageCut::uniform(5));

        session.add_measurement(constant(1.0, 1.0)).unwrap();
        let size = Size2d::new(10, 10);
        assert!(session.config().image_cut.fits(size));
        assert_eq!(session.dfgram(0, 0).curve().len(), 1);

        session.set_image_cut(ImageCut::uniform(7));
        assert_eq!(session.config().image_cut, ImageCut::new(2, 2, 7, 7));

        session.set_image_cut_linked(true);
        session.set_image_cut(ImageCut::uniform(6));
        assert_eq!(session.config().image_cut, ImageCut::uniform(4));
        assert_eq!(session.dfgram(0, 0).curve().len(), 2);
    }

    #[test]
    fn test_gamma_sectors() {
        let mut config = test_config();
        config.gamma_slices = 3;
        let mut session = Session::new(config);
        session.add_measurement(constant(1.0, 1.0)).unwrap();

        let full = session.cluster_rge_gma(0);
        let s0 = session.sector_range(0, 0);
        let s2 = session.sector_range(0, 2);
        assert!((s0.min - full.min).abs() < 1e-12);
        assert!((s2.max - full.max).abs() < 1e-9);
        assert_eq!(session.dfgram(0, 2).curve().len(), 10);

        session.set_gamma_slices(1);
        let single = session.sector_range(0, 0);
        assert!((single.min - full.min).abs() < 1e-12);
        assert!((single.max - full.max).abs() < 1e-9);
    }

    #[test]
    fn test_peak_change_keeps_curve() {
        let mut config = test_config();
        config.baseline = BaselineSettings {
            degree: 0,
            ranges: Ranges::from_ranges([Range::new(0.0, 90.0)]),
        };
        let mut session = Session::new(config);
        session.add_measurement(constant(3.0, 1.0)).unwrap();

        let d = session.dfgram(0, 0);
        let bg = d.bg_fit();
        session.add_peak(PeakSettings::new(Range::new(19.9, 20.1), PeakKind::Raw));
        let same = session.dfgram(0, 0);
        assert!(Rc::ptr_eq(&d, &same));
        assert!(Rc::ptr_eq(&bg, &same.bg_fit()));
        assert_eq!(same.num_peaks(), 1);

        session.set_geometry(Geometry::new(900.0, 1.0, IJ::default()));
        assert!(!Rc::ptr_eq(&d, &session.dfgram(0, 0)));
    }

    #[test]
    fn test_angle_maps_shared() {
        let mut session = Session::new(test_config());
        session.add_measurement(constant(1.0, 1.0)).unwrap();
        session.add_measurement(constant(2.0, 1.0)).unwrap();
        let a = session.angle_map(&session.measurements()[0]);
        let b = session.angle_map(&session.measurements()[1]);
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_interpolated_infos_follow_settings() {
        let mut config = test_config();
        config.peaks = vec![PeakSettings::new(Range::new(19.9, 20.1), PeakKind::Raw)];
        let mut session = Session::new(config);
        session.add_measurement(constant(3.0, 1.0)).unwrap();

        assert!(session.interpolated_infos(0).is_empty());
        let direct = session.reflection_infos(0);
        assert!(Rc::ptr_eq(&direct, &session.pole_figure_infos(0)));

        session.set_interpolation(InterpolParams {
            enabled: true,
            step_alpha: 30.0,
            step_beta: 90.0,
            ..InterpolParams::default()
        });
        let grid = session.interpolated_infos(0);
        assert_eq!(grid.len(), 4 * 4);
        assert!(Rc::ptr_eq(&grid, &session.interpolated_infos(0)));
        assert!(Rc::ptr_eq(&grid, &session.pole_figure_infos(0)));
        // the direct rows survive a change of the grid
        assert!(Rc::ptr_eq(&direct, &session.reflection_infos(0)));

        session.set_peak(0, PeakSettings::new(Range::new(19.8, 20.2), PeakKind::Raw));
        assert!(!Rc::ptr_eq(&grid, &session.interpolated_infos(0)));
        let grid = session.interpolated_infos(0);
        session.set_cluster_active(0, false);
        assert!(!Rc::ptr_eq(&grid, &session.interpolated_infos(0)));
        assert!(session.reflection_infos(0).is_empty());
    }

    #[test]
    fn test_progress_reported() {
        let mut session = Session::new(test_config());
        for _ in 0..3 {
            session.add_measurement(constant(2.0, 1.0)).unwrap();
        }
        let mut steps = Vec::new();
        let rge = session.intensity_range(&mut |done: usize, total: usize| steps.push((done, total)));
        assert_eq!(steps, vec![(0, 3), (1, 3), (2, 3), (3, 3)]);
        assert!((rge.min - 2.0).abs() < 1e-6);
        assert!((rge.max - 2.0).abs() < 1e-6);
    }
}
