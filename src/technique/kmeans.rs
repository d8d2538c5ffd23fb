//! K-means over time-activity curves.
//!
//! Lloyd's algorithm with a pluggable [`Metric`] and [`Seeding`].
//!
//! # Rounds
//!
//! ```text
//! SEED → ASSIGN ⇄ RECOMPUTE → CONVERGED
//! ```
//!
//! 1. **Seed**: pick `k` voxels; their curves are the round-0 centroids.
//! 2. **Assign**: every voxel joins the nearest centroid's cluster. Each
//!    cluster keeps its centroid fixed for the round and accumulates the
//!    member mean separately.
//! 3. **Recompute**: the member mean of every non-empty cluster becomes a
//!    centroid of the next round. Empty clusters are dropped.
//!
//! # Convergence
//!
//! When no cluster was dropped, the round's movement is
//!
//! ```text
//! SSE = Σᵢ ||meanᵢ - centroidᵢ||²
//! ```
//!
//! and the run stops once `SSE / SSE_prev > 1 - threshold / 100`, i.e. once
//! a round no longer reduces the movement by more than `threshold` percent
//! of the previous one. `SSE_prev` starts at `f64::MAX`. A round that moves
//! nothing (`SSE == 0`) has converged. A round that dropped a cluster is not
//! tested. `max_iter` caps the number of rounds.
//!
//! Unlike textbook k-means the metric need not be Euclidean: with a
//! correlation metric clusters group curves by shape rather than amplitude.

use super::seeding::{Seeder, Seeding};
use super::{ClusterSet, Segmentation, Technique};
use crate::cluster::Cluster;
use crate::error::{Error, Result};
use crate::metric::{Metric, Pearson};
use crate::stats;
use crate::voxel::Voxel;
use rand::prelude::*;

/// K-means clustering.
#[derive(Debug)]
pub struct KMeans {
    /// Number of clusters.
    k: usize,
    /// Distance used for seeding and assignment.
    metric: Box<dyn Metric>,
    /// Initial centroid strategy.
    seeding: Seeding,
    /// Maximum refinement rounds.
    max_iter: usize,
    /// Stopping threshold, in percent.
    threshold: f64,
    /// Random seed.
    seed: Option<u64>,
    /// Draw cap per random seed.
    max_seed_draws: usize,
}

impl Default for KMeans {
    fn default() -> Self {
        Self::new(5)
    }
}

impl KMeans {
    /// Create a K-means clusterer (Pearson distance, k-means++ seeding).
    pub fn new(k: usize) -> Self {
        Self {
            k,
            metric: Box::new(Pearson),
            seeding: Seeding::default(),
            max_iter: 100,
            threshold: 0.0,
            seed: None,
            max_seed_draws: 10_000,
        }
    }

    /// Set the distance metric.
    pub fn with_metric(mut self, metric: Box<dyn Metric>) -> Self {
        self.metric = metric;
        self
    }

    /// Set the seeding strategy.
    pub fn with_seeding(mut self, seeding: Seeding) -> Self {
        self.seeding = seeding;
        self
    }

    /// Set maximum rounds.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the stopping threshold (percent, `0..=100`).
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Cap the draws spent on one random seed.
    pub fn with_max_seed_draws(mut self, max_seed_draws: usize) -> Self {
        self.max_seed_draws = max_seed_draws;
        self
    }

    /// Number of clusters requested.
    pub fn k(&self) -> usize {
        self.k
    }

    fn validate(&self, n_items: usize) -> Result<()> {
        if self.k == 0 || self.k > n_items {
            return Err(Error::InvalidClusterCount {
                requested: self.k,
                n_items,
            });
        }
        if self.max_iter == 0 {
            return Err(Error::InvalidParameter {
                name: "max_iter",
                message: "must be at least 1",
            });
        }
        if !(0.0..=100.0).contains(&self.threshold) {
            return Err(Error::InvalidParameter {
                name: "threshold",
                message: "must be a percentage in [0, 100]",
            });
        }
        if self.max_seed_draws == 0 {
            return Err(Error::InvalidParameter {
                name: "max_seed_draws",
                message: "must be at least 1",
            });
        }
        Ok(())
    }

    /// One assignment pass against fixed `centroids`.
    fn assign(&self, voxels: &[&Voxel], centroids: &[Vec<f64>]) -> Result<ClusterSet> {
        let mut set: ClusterSet = centroids
            .iter()
            .cloned()
            .map(Cluster::fixed)
            .collect::<Vec<_>>()
            .into();
        for &voxel in voxels {
            if let Some((i, _)) = set.nearest(self.metric.as_ref(), &voxel.curve)? {
                set.add_to(i, voxel)?;
            }
        }
        Ok(set)
    }
}

impl Technique for KMeans {
    fn name(&self) -> &'static str {
        "kmeans"
    }

    fn metric_mut(&mut self) -> Option<&mut dyn Metric> {
        Some(self.metric.as_mut())
    }

    fn process(&mut self, voxels: &[&Voxel]) -> Result<Segmentation> {
        if voxels.is_empty() {
            return Err(Error::EmptyInput);
        }
        self.validate(voxels.len())?;

        let mut rng: Box<dyn RngCore> = match self.seed {
            Some(s) => Box::new(StdRng::seed_from_u64(s)),
            None => Box::new(rand::rng()),
        };
        let seeds = Seeder {
            voxels,
            metric: self.metric.as_ref(),
            rng: &mut rng,
            max_draws: self.max_seed_draws,
        }
        .select(&self.seeding, self.k)?;
        tracing::debug!(
            seeding = %self.seeding,
            seeds = ?seeds.iter().map(|&i| voxels[i].coord).collect::<Vec<_>>(),
            "initial centroids"
        );

        let mut centroids: Vec<Vec<f64>> = seeds.iter().map(|&i| voxels[i].curve.clone()).collect();
        let mut sse_prev = f64::MAX;
        let mut round = ClusterSet::new();
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.max_iter && !converged {
            iterations += 1;
            round = self.assign(voxels, &centroids)?;

            let next: Vec<Vec<f64>> = round
                .iter()
                .filter_map(|c| c.member_mean().map(<[f64]>::to_vec))
                .collect();

            if next.len() == centroids.len() {
                let sse: f64 = next
                    .iter()
                    .zip(&centroids)
                    .map(|(a, b)| stats::sse(a, b))
                    .sum();
                let ratio = sse / sse_prev;
                sse_prev = sse;
                converged = sse == 0.0 || ratio > 1.0 - self.threshold / 100.0;
                tracing::debug!(round = iterations, clusters = next.len(), sse, ratio, "kmeans round");
            } else {
                tracing::debug!(
                    round = iterations,
                    before = centroids.len(),
                    after = next.len(),
                    "empty clusters dropped"
                );
            }
            centroids = next;
        }

        let formed = round.len();
        let clusters: Vec<Cluster> = round.into_vec().into_iter().filter(|c| !c.is_empty()).collect();
        Ok(Segmentation::new(clusters)
            .with_iterations(iterations, converged)
            .with_formed(formed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::Rmsd;
    use crate::voxel::{Coord, VoxelSet};

    /// Two clumps: rising curves near the origin, falling curves far away.
    fn clumps() -> VoxelSet {
        let mut voxels = Vec::new();
        for i in 0..6 {
            let e = i as f64 * 0.01;
            voxels.push(Voxel::new(i, 0, 1, vec![1.0 + e, 2.0 + e, 3.0 + e, 4.0 + e]));
            voxels.push(Voxel::new(i, 1, 1, vec![40.0 - e, 30.0 - e, 20.0 - e, 10.0 + e]));
        }
        VoxelSet::new(voxels).unwrap()
    }

    fn rows(seg: &Segmentation) -> Vec<Vec<usize>> {
        seg.clusters()
            .iter()
            .map(|c| c.coordinates().iter().map(|p| p.y).collect())
            .collect()
    }

    #[test]
    fn test_kmeans_basic() {
        let data = clumps();
        let mut km = KMeans::new(2).with_metric(Box::new(Rmsd)).with_seed(42);
        let seg = km.run(&data, false).unwrap();

        assert_eq!(seg.len(), 2);
        for members in rows(&seg) {
            assert_eq!(members.len(), 6);
            assert!(members.windows(2).all(|w| w[0] == w[1]), "mixed cluster {members:?}");
        }
        assert!(seg.converged());
    }

    #[test]
    fn test_kmeans_all_points_assigned() {
        let data = clumps();
        for seeding in [
            Seeding::Random,
            Seeding::PlusPlus,
            Seeding::LegacyPlusPlus,
            Seeding::Farthest { first: None },
        ] {
            let mut km = KMeans::new(3).with_seeding(seeding).with_seed(123);
            let seg = km.run(&data, false).unwrap();
            assert_eq!(seg.n_voxels(), 12);
            assert_eq!(seg.labels().len(), 12);
            assert!(seg.len() <= 3);
        }
    }

    #[test]
    fn test_kmeans_deterministic_with_seed() {
        let data = clumps();
        let a = KMeans::new(3).with_seed(9).run(&data, false).unwrap();
        let b = KMeans::new(3).with_seed(9).run(&data, false).unwrap();
        assert_eq!(a.labels(), b.labels(), "same seed should give same result");
    }

    #[test]
    fn test_kmeans_converges_in_one_round_from_true_centroids() {
        // identical curves per clump: the seeds are already the means
        let mut voxels = Vec::new();
        for i in 0..4 {
            voxels.push(Voxel::new(i, 0, 1, vec![1.0, 2.0, 3.0]));
            voxels.push(Voxel::new(i, 1, 1, vec![9.0, 5.0, 1.0]));
            voxels.push(Voxel::new(i, 2, 1, vec![50.0, 60.0, 70.0]));
        }
        let data = VoxelSet::new(voxels).unwrap();
        let seeds = Seeding::Manual(vec![Coord::new(0, 0, 1), Coord::new(0, 1, 1), Coord::new(0, 2, 1)]);
        let mut km = KMeans::new(3)
            .with_metric(Box::new(Rmsd))
            .with_seeding(seeds)
            .with_threshold(5.0);
        let seg = km.run(&data, false).unwrap();
        assert_eq!(seg.iterations(), 1);
        assert!(seg.converged());
        assert_eq!(rows(&seg), vec![vec![0; 4], vec![1; 4], vec![2; 4]]);
    }

    #[test]
    fn test_kmeans_drops_empty_clusters() {
        // two distinct curves but three seeds: one seed duplicates a curve,
        // so ties send its voxels to the earlier cluster
        let data = VoxelSet::new(vec![
            Voxel::new(0, 0, 1, vec![1.0, 2.0]),
            Voxel::new(1, 0, 1, vec![1.0, 2.0]),
            Voxel::new(2, 0, 1, vec![5.0, 9.0]),
        ])
        .unwrap();
        let seeds = Seeding::Manual(vec![Coord::new(0, 0, 1), Coord::new(1, 0, 1), Coord::new(2, 0, 1)]);
        let mut km = KMeans::new(3).with_metric(Box::new(Rmsd)).with_seeding(seeds);
        let seg = km.run(&data, false).unwrap();
        assert_eq!(seg.len(), 2);
        assert_eq!(seg.formed(), 2);
        assert_eq!(seg.n_voxels(), 3);
    }

    #[test]
    fn test_kmeans_stops_at_max_iter() {
        let data = clumps();
        let mut km = KMeans::new(4).with_seed(1).with_max_iter(1).with_metric(Box::new(Rmsd));
        let seg = km.run(&data, false).unwrap();
        assert_eq!(seg.iterations(), 1);
    }

    #[test]
    fn test_kmeans_k_larger_than_n_error() {
        let data = VoxelSet::new(vec![Voxel::new(0, 0, 1, vec![1.0, 2.0])]).unwrap();
        let result = KMeans::new(5).run(&data, false);
        assert_eq!(
            result.unwrap_err(),
            Error::InvalidClusterCount {
                requested: 5,
                n_items: 1
            }
        );
        assert!(KMeans::new(0).run(&data, false).is_err());
    }

    #[test]
    fn test_kmeans_rejects_bad_parameters() {
        let data = clumps();
        assert!(KMeans::new(2).with_threshold(150.0).run(&data, false).is_err());
        assert!(KMeans::new(2).with_max_iter(0).run(&data, false).is_err());
    }
}
