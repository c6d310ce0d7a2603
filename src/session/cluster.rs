//! Grouping of consecutive measurements into clusters.

use crate::data::{Measurement, Metadata};
use crate::geometry::Size2d;
use std::rc::Rc;

/// Consecutive measurements evaluated as one.
#[derive(Debug, Clone)]
pub struct Cluster {
    index: usize,
    /// Position of the first member in the measurement list.
    offset: usize,
    members: Vec<Rc<Measurement>>,
    metadata: Metadata,
    incomplete: bool,
    active: bool,
}

impl Cluster {
    /// # Panics
    /// Panics if `members` is empty.
    pub fn new(index: usize, offset: usize, members: Vec<Rc<Measurement>>, incomplete: bool) -> Self {
        assert!(!members.is_empty(), "cluster without members");
        let metadata = Metadata::average(members.iter().map(|m| m.metadata()));
        Self {
            index,
            offset,
            members,
            metadata,
            incomplete,
            active: true,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn members(&self) -> &[Rc<Measurement>] {
        &self.members
    }

    pub fn count(&self) -> usize {
        self.members.len()
    }

    pub fn first(&self) -> &Measurement {
        &self.members[0]
    }

    /// Fewer members than the binning asks for.
    pub fn is_incomplete(&self) -> bool {
        self.incomplete
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, on: bool) {
        self.active = on;
    }

    /// Member metadata combined by [`Metadata::average`].
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// All members share the image size of the first.
    pub fn image_size(&self) -> Size2d {
        self.first().image_size()
    }

    fn avg(&self, f: impl Fn(&Metadata) -> f64) -> f64 {
        self.members.iter().map(|m| f(m.metadata())).sum::<f64>() / self.count() as f64
    }

    pub fn omg(&self) -> f64 {
        self.avg(Metadata::omg)
    }

    pub fn phi(&self) -> f64 {
        self.avg(Metadata::phi)
    }

    pub fn chi(&self) -> f64 {
        self.avg(Metadata::chi)
    }

    pub fn avg_monitor_count(&self) -> f64 {
        self.avg(Metadata::monitor_count)
    }

    pub fn avg_delta_monitor_count(&self) -> f64 {
        self.avg(Metadata::delta_monitor_count)
    }

    pub fn avg_time(&self) -> f64 {
        self.avg(Metadata::time)
    }

    pub fn avg_delta_time(&self) -> f64 {
        self.avg(Metadata::delta_time)
    }
}

/// Split `measurements` into blocks of `binning` consecutive entries.
///
/// A binning of 0 is treated as 1. A shorter trailing block is kept and
/// flagged as incomplete, or left out when `drop_incomplete` is set.
pub fn group_into_clusters(
    measurements: &[Rc<Measurement>],
    binning: usize,
    drop_incomplete: bool,
) -> Vec<Cluster> {
    let binning = binning.max(1);
    let mut clusters = Vec::with_capacity(measurements.len() / binning + 1);
    for (n, chunk) in measurements.chunks(binning).enumerate() {
        let incomplete = chunk.len() < binning;
        if incomplete && drop_incomplete {
            break;
        }
        clusters.push(Cluster::new(
            clusters.len(),
            n * binning,
            chunk.to_vec(),
            incomplete,
        ));
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Image, MetaAttribute};

    fn measurement(omg: f64, mon: f64) -> Rc<Measurement> {
        let meta = Metadata::new()
            .with(MetaAttribute::Omega, omg)
            .with(MetaAttribute::MonitorCount, mon);
        Rc::new(Measurement::new(Image::filled(Size2d::new(4, 3), 1.0), meta))
    }

    fn series(n: usize) -> Vec<Rc<Measurement>> {
        (0..n).map(|i| measurement(i as f64, 10.0 * (i + 1) as f64)).collect()
    }

    #[test]
    fn test_group_single() {
        let clusters = group_into_clusters(&series(3), 1, false);
        assert_eq!(clusters.len(), 3);
        assert!(clusters.iter().all(|c| c.count() == 1 && !c.is_incomplete()));
        assert_eq!(clusters[2].offset(), 2);
    }

    #[test]
    fn test_group_incomplete_tail() {
        let ms = series(5);
        let clusters = group_into_clusters(&ms, 2, false);
        assert_eq!(clusters.len(), 3);
        assert!(clusters[2].is_incomplete());
        assert_eq!(clusters[2].count(), 1);
        assert_eq!(clusters[2].offset(), 4);

        let dropped = group_into_clusters(&ms, 2, true);
        assert_eq!(dropped.len(), 2);
        assert_eq!(dropped[1].index(), 1);
    }

    #[test]
    fn test_zero_binning_is_one() {
        assert_eq!(group_into_clusters(&series(2), 0, false).len(), 2);
        assert!(group_into_clusters(&[], 3, false).is_empty());
    }

    #[test]
    fn test_member_averages() {
        let clusters = group_into_clusters(&series(4), 2, false);
        let c = &clusters[1];
        assert_eq!(c.omg(), 2.5);
        assert_eq!(c.avg_monitor_count(), 35.0);
        assert_eq!(c.metadata().omg(), 2.5);
        assert_eq!(c.image_size(), Size2d::new(4, 3));
        assert!(c.is_active());
    }
}
