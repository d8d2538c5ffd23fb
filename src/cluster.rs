//! Incrementally updated clusters.
//!
//! A [`Cluster`] is an accumulator: voxels go in through [`Cluster::add`] and
//! are never taken out. Each addition updates
//!
//! - a running mean curve (the centroid itself in [`Mode::Growing`], or a
//!   separate member mean in [`Mode::Fixed`]),
//! - Welford statistics over the peak amplitude of every added curve,
//! - the running mean of the member coordinates,
//! - the ordered list of member coordinates.
//!
//! # Running means
//!
//! Adding value `v` to a mean `m` over `n` earlier members:
//!
//! ```text
//! m' = (m * n + v) / (n + 1)
//! ```
//!
//! # Ranking
//!
//! Techniques that grow many clusters keep only the strongest ones. The
//! strength of a cluster is chosen with [`StrengthScore`]; [`prune`] keeps the
//! best `keep` clusters and [`weakest`] finds the one to evict when an online
//! technique runs out of room.

use crate::voxel::{Coord, Voxel};

/// How a cluster treats its centroid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// The centroid is the running mean of the members.
    Growing,
    /// The centroid was supplied at construction and never changes; members
    /// accumulate into a separate mean.
    Fixed,
}

/// Online mean and sample standard deviation (Welford).
#[derive(Debug, Clone, Default, PartialEq)]
struct PeakStats {
    n: usize,
    mean: f64,
    m2: f64,
}

impl PeakStats {
    fn push(&mut self, value: f64) {
        self.n += 1;
        let delta = value - self.mean;
        self.mean += delta / self.n as f64;
        self.m2 += delta * (value - self.mean);
    }

    fn mean(&self) -> Option<f64> {
        (self.n > 0).then_some(self.mean)
    }

    /// Sample standard deviation; 0 for a single observation.
    fn stdev(&self) -> Option<f64> {
        match self.n {
            0 => None,
            1 => Some(0.0),
            n => Some((self.m2 / (n - 1) as f64).sqrt()),
        }
    }
}

/// A group of voxels with similar kinetics.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    mode: Mode,
    centroid: Option<Vec<f64>>,
    member_mean: Option<Vec<f64>>,
    peaks: PeakStats,
    spatial: [f64; 3],
    coordinates: Vec<Coord>,
}

impl Default for Cluster {
    fn default() -> Self {
        Self::new()
    }
}

impl Cluster {
    /// An empty cluster whose centroid will follow its members.
    pub fn new() -> Self {
        Self {
            mode: Mode::Growing,
            centroid: None,
            member_mean: None,
            peaks: PeakStats::default(),
            spatial: [0.0; 3],
            coordinates: Vec::new(),
        }
    }

    /// A growing cluster whose first member (and centroid) is `voxel`.
    pub fn seeded(voxel: &Voxel) -> Self {
        let mut c = Self::new();
        c.add(voxel);
        c
    }

    /// An empty cluster with a fixed reference centroid.
    pub fn fixed(centroid: Vec<f64>) -> Self {
        Self {
            mode: Mode::Fixed,
            centroid: Some(centroid),
            ..Self::new()
        }
    }

    /// Add a member.
    pub fn add(&mut self, voxel: &Voxel) {
        let n = self.size() as f64;
        let slot = match self.mode {
            Mode::Growing => &mut self.centroid,
            Mode::Fixed => &mut self.member_mean,
        };
        match slot {
            Some(mean) if n > 0.0 => {
                for (m, v) in mean.iter_mut().zip(&voxel.curve) {
                    *m = (*m * n + v) / (n + 1.0);
                }
            }
            other => *other = Some(voxel.curve.clone()),
        }

        let c = voxel.coord;
        for (s, v) in self
            .spatial
            .iter_mut()
            .zip([c.x as f64, c.y as f64, c.slice as f64])
        {
            *s = (*s * n + v) / (n + 1.0);
        }

        self.peaks.push(voxel.peak());
        self.coordinates.push(c);
    }

    /// Centroid mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The reference curve: the running mean when growing, the supplied curve
    /// when fixed. `None` for an empty growing cluster.
    pub fn centroid(&self) -> Option<&[f64]> {
        self.centroid.as_deref()
    }

    /// Running mean of the members of a fixed cluster.
    pub fn member_mean(&self) -> Option<&[f64]> {
        self.member_mean.as_deref()
    }

    /// Running mean of the member curves, whatever the mode.
    pub fn mean_curve(&self) -> Option<&[f64]> {
        match self.mode {
            Mode::Growing => self.centroid(),
            Mode::Fixed => self.member_mean(),
        }
    }

    /// Mean of the member peak amplitudes.
    pub fn peak_mean(&self) -> Option<f64> {
        self.peaks.mean()
    }

    /// Sample standard deviation of the member peak amplitudes (0 for a
    /// single member).
    pub fn peak_stdev(&self) -> Option<f64> {
        self.peaks.stdev()
    }

    /// Mean member position as `(x, y, slice)`.
    pub fn spatial_centroid(&self) -> (f64, f64, f64) {
        (self.spatial[0], self.spatial[1], self.spatial[2])
    }

    /// Number of members.
    pub fn size(&self) -> usize {
        self.coordinates.len()
    }

    /// Whether no voxel was ever added.
    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    /// Member coordinates in insertion order.
    pub fn coordinates(&self) -> &[Coord] {
        &self.coordinates
    }

    /// Ranking score under `score`.
    pub fn strength(&self, score: StrengthScore) -> f64 {
        let size = self.size() as f64;
        match score {
            StrengthScore::Size => size,
            StrengthScore::SizeTimesPeak => size * self.peak_mean().unwrap_or(0.0),
        }
    }
}

/// Ranking used when clusters compete for a bounded number of slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum StrengthScore {
    /// `size * peak_mean`.
    #[default]
    SizeTimesPeak,
    /// `size` alone.
    Size,
}

/// Keep the `keep` strongest clusters, strongest first.
///
/// The returned order is the new numbering: element 0 is cluster 1. Equal
/// scores keep their insertion order.
pub fn prune(clusters: Vec<Cluster>, keep: usize, score: StrengthScore) -> Vec<Cluster> {
    let mut scored: Vec<(f64, Cluster)> = clusters
        .into_iter()
        .map(|c| (c.strength(score), c))
        .collect();
    // stable: ties stay in insertion order
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.truncate(keep);
    scored.into_iter().map(|(_, c)| c).collect()
}

/// Index of the weakest cluster (the first one on ties).
pub fn weakest(clusters: &[Cluster], score: StrengthScore) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, c) in clusters.iter().enumerate() {
        let s = c.strength(score);
        if best.map_or(true, |(_, b)| s < b) {
            best = Some((i, s));
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn vox(x: usize, curve: &[f64]) -> Voxel {
        Voxel::new(x, 0, 1, curve.to_vec())
    }

    fn batch_mean(curves: &[&[f64]]) -> Vec<f64> {
        let mut out = vec![0.0; curves[0].len()];
        for c in curves {
            for (o, v) in out.iter_mut().zip(c.iter()) {
                *o += v;
            }
        }
        out.iter().map(|o| o / curves.len() as f64).collect()
    }

    #[test]
    fn test_seeded_cluster_starts_with_one_member() {
        let c = Cluster::seeded(&Voxel::new(2, 4, 3, vec![1.0, 5.0, 2.0]));
        assert_eq!(c.mode(), Mode::Growing);
        assert_eq!(c.size(), 1);
        assert_eq!(c.centroid(), Some(&[1.0, 5.0, 2.0][..]));
        assert_eq!(c.peak_mean(), Some(5.0));
        assert_eq!(c.peak_stdev(), Some(0.0));
        assert_eq!(c.spatial_centroid(), (2.0, 4.0, 3.0));
        assert_eq!(c.coordinates(), &[Coord::new(2, 4, 3)]);
    }

    #[test]
    fn test_empty_cluster_has_no_statistics() {
        let c = Cluster::new();
        assert!(c.is_empty());
        assert_eq!(c.centroid(), None);
        assert_eq!(c.peak_mean(), None);
        assert_eq!(c.peak_stdev(), None);
    }

    #[test]
    fn test_fixed_cluster_keeps_its_centroid() {
        let mut c = Cluster::fixed(vec![0.0, 0.0]);
        c.add(&vox(0, &[2.0, 4.0]));
        c.add(&vox(2, &[4.0, 8.0]));
        assert_eq!(c.centroid(), Some(&[0.0, 0.0][..]));
        assert_eq!(c.member_mean(), Some(&[3.0, 6.0][..]));
        assert_eq!(c.mean_curve(), c.member_mean());
        assert_eq!(c.spatial_centroid().0, 1.0);
        assert_relative_eq!(c.peak_mean().unwrap_or_default(), 6.0);
        assert_relative_eq!(c.peak_stdev().unwrap_or_default(), 8.0f64.sqrt());
    }

    #[test]
    fn test_prune_keeps_largest_when_peaks_equal() {
        let clusters: Vec<Cluster> = (1..=5)
            .map(|size| {
                let mut c = Cluster::new();
                for i in 0..size {
                    c.add(&vox(i, &[1.0, 3.0]));
                }
                c
            })
            .collect();

        let kept = prune(clusters.clone(), 2, StrengthScore::SizeTimesPeak);
        assert_eq!(kept.iter().map(Cluster::size).collect::<Vec<_>>(), vec![5, 4]);

        let kept = prune(clusters.clone(), 2, StrengthScore::Size);
        assert_eq!(kept.iter().map(Cluster::size).collect::<Vec<_>>(), vec![5, 4]);

        // asking for more than exists keeps everything
        assert_eq!(prune(clusters, 10, StrengthScore::Size).len(), 5);
    }

    #[test]
    fn test_prune_breaks_ties_by_insertion_order() {
        let a = Cluster::seeded(&vox(0, &[1.0]));
        let b = Cluster::seeded(&vox(1, &[1.0]));
        let kept = prune(vec![a, b], 1, StrengthScore::Size);
        assert_eq!(kept[0].coordinates()[0].x, 0);
    }

    #[test]
    fn test_score_variants_differ() {
        let mut big_dim = Cluster::new();
        for i in 0..3 {
            big_dim.add(&vox(i, &[1.0]));
        }
        let bright = Cluster::seeded(&vox(9, &[10.0]));
        let clusters = vec![big_dim, bright];
        assert_eq!(weakest(&clusters, StrengthScore::Size), Some(1));
        assert_eq!(weakest(&clusters, StrengthScore::SizeTimesPeak), Some(0));
        assert_eq!(weakest(&[], StrengthScore::Size), None);
    }

    proptest! {
        #[test]
        fn test_incremental_mean_matches_batch(
            curves in proptest::collection::vec(
                proptest::collection::vec(-1e3f64..1e3, 4),
                1..40,
            )
        ) {
            let mut c = Cluster::new();
            for (i, curve) in curves.iter().enumerate() {
                c.add(&vox(i, curve));
            }
            let refs: Vec<&[f64]> = curves.iter().map(Vec::as_slice).collect();
            let batch = batch_mean(&refs);
            let inc = c.centroid().unwrap();
            for (a, b) in inc.iter().zip(&batch) {
                prop_assert!((a - b).abs() < 1e-6, "{a} vs {b}");
            }
            prop_assert_eq!(c.size(), c.coordinates().len());
            prop_assert_eq!(c.size(), curves.len());
        }
    }
}
