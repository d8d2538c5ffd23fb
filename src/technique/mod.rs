//! Clustering techniques.
//!
//! Every technique turns the active voxels of a [`VoxelSource`] into an
//! ordered list of [`Cluster`]s, numbered from 1.
//!
//! | Technique | Family | Clusters |
//! |---|---|---|
//! | [`KMeans`] | iterative refinement | at most `k` |
//! | [`LeaderFollower`] | online, single pass | at most `keep_clusters` |
//! | [`Pca`] | decomposition | one per component |
//! | [`Svd`] | decomposition | one per component |
//! | [`Ica`] | decomposition | one per component |
//!
//! # Lifecycle
//!
//! [`Technique::run`] collects the active voxels (optionally skipping noise),
//! initialises the technique's metric over their curves, and hands them to
//! [`Technique::process`]. Techniques hold no state between runs beyond
//! their parameters.

mod decomposition;
mod kmeans;
mod leader_follower;
mod seeding;

pub use decomposition::{Ica, MatrixType, Pca, Projection, Svd};
pub use kmeans::KMeans;
pub use leader_follower::{AmplitudeGate, CandidateSelection, LeaderFollower};
pub use seeding::Seeding;

use crate::cluster::Cluster;
use crate::error::{Error, Result};
use crate::metric::Metric;
use crate::voxel::{active_voxels, Coord, Voxel, VoxelSource};
use std::collections::BTreeMap;
use std::fmt::Debug;

/// A clustering algorithm over voxel curves.
pub trait Technique: Debug {
    /// Registry name.
    fn name(&self) -> &'static str;

    /// The metric this technique scores with, if any.
    fn metric_mut(&mut self) -> Option<&mut dyn Metric> {
        None
    }

    /// Cluster `voxels`. The metric, if any, is already initialised.
    fn process(&mut self, voxels: &[&Voxel]) -> Result<Segmentation>;

    /// Run over `source`, skipping voxels the source flags as noise when
    /// `skip_noise` is set.
    fn run(&mut self, source: &dyn VoxelSource, skip_noise: bool) -> Result<Segmentation> {
        let voxels: Vec<&Voxel> = active_voxels(source, skip_noise).collect();
        if voxels.is_empty() {
            return Err(Error::EmptyInput);
        }
        let name = self.name();
        tracing::info!(technique = name, voxels = voxels.len(), skip_noise, "clustering started");

        if let Some(metric) = self.metric_mut() {
            let curves: Vec<&[f64]> = voxels.iter().map(|v| v.curve.as_slice()).collect();
            metric.init(&curves)?;
        }
        let seg = self.process(&voxels)?;

        tracing::info!(
            technique = name,
            formed = seg.formed(),
            kept = seg.len(),
            iterations = seg.iterations(),
            converged = seg.converged(),
            "clustering finished"
        );
        Ok(seg)
    }
}

/// Working collection of clusters owned by a running technique.
///
/// Clusters are addressed by index (0-based) or by label (1-based).
#[derive(Debug, Clone, Default)]
pub struct ClusterSet {
    clusters: Vec<Cluster>,
}

impl ClusterSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of clusters, empty ones included.
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// Whether the set holds no cluster.
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Append a cluster and return its index.
    pub fn push(&mut self, cluster: Cluster) -> usize {
        self.clusters.push(cluster);
        self.clusters.len() - 1
    }

    /// Remove the cluster at `index`, shifting later ones down.
    pub fn remove(&mut self, index: usize) -> Option<Cluster> {
        (index < self.clusters.len()).then(|| self.clusters.remove(index))
    }

    /// Cluster at `index`.
    pub fn get(&self, index: usize) -> Option<&Cluster> {
        self.clusters.get(index)
    }

    /// Cluster labelled `label` (1-based), created empty if the set is not
    /// yet that long.
    pub fn cluster_at(&mut self, label: usize) -> Result<&mut Cluster> {
        if label == 0 {
            return Err(Error::InvalidParameter {
                name: "label",
                message: "cluster labels start at 1",
            });
        }
        if self.clusters.len() < label {
            self.clusters.resize_with(label, Cluster::new);
        }
        Ok(&mut self.clusters[label - 1])
    }

    /// Add `voxel` to the cluster at `index`.
    pub fn add_to(&mut self, index: usize, voxel: &Voxel) -> Result<()> {
        let n = self.clusters.len();
        let cluster = self.clusters.get_mut(index).ok_or(Error::InvalidClusterCount {
            requested: index + 1,
            n_items: n,
        })?;
        cluster.add(voxel);
        Ok(())
    }

    /// Distance from `curve` to every centroid, `None` for clusters without
    /// one.
    pub fn distances(&self, metric: &dyn Metric, curve: &[f64]) -> Result<Vec<Option<f64>>> {
        self.clusters
            .iter()
            .map(|c| c.centroid().map(|centroid| metric.distance(curve, centroid)).transpose())
            .collect()
    }

    /// Index and distance of the nearest centroid. Ties, including clusters
    /// that are all at [`crate::metric::MAX_DISTANCE`], go to the lowest
    /// index.
    pub fn nearest(&self, metric: &dyn Metric, curve: &[f64]) -> Result<Option<(usize, f64)>> {
        let mut best: Option<(usize, f64)> = None;
        for (i, d) in self.distances(metric, curve)?.into_iter().enumerate() {
            if let Some(d) = d {
                if best.map_or(true, |(_, b)| d < b) {
                    best = Some((i, d));
                }
            }
        }
        Ok(best)
    }

    /// Iterate the clusters in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter()
    }

    /// The clusters as a slice.
    pub fn as_slice(&self) -> &[Cluster] {
        &self.clusters
    }

    /// The clusters, in index order.
    pub fn into_vec(self) -> Vec<Cluster> {
        self.clusters
    }
}

impl From<Vec<Cluster>> for ClusterSet {
    fn from(clusters: Vec<Cluster>) -> Self {
        Self { clusters }
    }
}

/// Named text produced alongside a segmentation (a decomposition basis).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AuxiliaryInfo {
    /// Payload name, e.g. `pca_vectors`.
    pub name: String,
    /// One matrix row per line, values separated by `", "`.
    pub text: String,
}

/// Finished clusters of one run.
#[derive(Debug, Clone)]
pub struct Segmentation {
    clusters: Vec<Cluster>,
    auxiliary: Option<AuxiliaryInfo>,
    iterations: usize,
    converged: bool,
    formed: usize,
}

impl Segmentation {
    /// Wrap finished clusters; label `i + 1` is `clusters[i]`.
    pub fn new(clusters: Vec<Cluster>) -> Self {
        let formed = clusters.len();
        Self {
            clusters,
            auxiliary: None,
            iterations: 1,
            converged: true,
            formed,
        }
    }

    pub(crate) fn with_auxiliary(mut self, info: AuxiliaryInfo) -> Self {
        self.auxiliary = Some(info);
        self
    }

    pub(crate) fn with_iterations(mut self, iterations: usize, converged: bool) -> Self {
        self.iterations = iterations;
        self.converged = converged;
        self
    }

    pub(crate) fn with_formed(mut self, formed: usize) -> Self {
        self.formed = formed;
        self
    }

    /// Clusters, label 1 first.
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// Take the clusters.
    pub fn into_clusters(self) -> Vec<Cluster> {
        self.clusters
    }

    /// Cluster with 1-based `label`.
    pub fn cluster(&self, label: usize) -> Option<&Cluster> {
        label.checked_sub(1).and_then(|i| self.clusters.get(i))
    }

    /// Number of clusters.
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// Whether no cluster survived.
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Decomposition basis, when the technique produced one.
    pub fn auxiliary(&self) -> Option<&AuxiliaryInfo> {
        self.auxiliary.as_ref()
    }

    /// Refinement rounds run (1 for single-pass techniques).
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Whether an iterative technique met its stopping rule before the
    /// iteration cap. Always `true` for single-pass techniques.
    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Clusters that existed before pruning.
    pub fn formed(&self) -> usize {
        self.formed
    }

    /// Label of the cluster that holds `coord`.
    pub fn label_of(&self, coord: Coord) -> Option<usize> {
        self.clusters
            .iter()
            .position(|c| c.coordinates().contains(&coord))
            .map(|i| i + 1)
    }

    /// Every clustered coordinate with its label.
    pub fn labels(&self) -> BTreeMap<Coord, usize> {
        self.clusters
            .iter()
            .enumerate()
            .flat_map(|(i, c)| c.coordinates().iter().map(move |&coord| (coord, i + 1)))
            .collect()
    }

    /// Total number of clustered voxels.
    pub fn n_voxels(&self) -> usize {
        self.clusters.iter().map(Cluster::size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::{Pearson, Rmsd, MAX_DISTANCE};

    #[test]
    fn test_cluster_at_grows_with_empty_clusters() -> Result<()> {
        let mut set = ClusterSet::new();
        set.cluster_at(3)?.add(&Voxel::new(0, 0, 1, vec![1.0]));
        assert_eq!(set.len(), 3);
        assert!(set.get(0).is_some_and(Cluster::is_empty));
        assert_eq!(set.get(2).map(Cluster::size), Some(1));
        assert!(set.cluster_at(0).is_err());
        Ok(())
    }

    #[test]
    fn test_nearest_prefers_lowest_index_on_ties() -> Result<()> {
        let set = ClusterSet::from(vec![
            Cluster::fixed(vec![0.0, 0.0]),
            Cluster::fixed(vec![2.0, 2.0]),
            Cluster::fixed(vec![0.0, 0.0]),
            Cluster::new(),
        ]);
        assert_eq!(set.nearest(&Rmsd, &[0.5, 0.5])?, Some((0, 0.5)));
        assert_eq!(set.nearest(&Rmsd, &[2.0, 2.0])?, Some((1, 0.0)));

        // constant centroids are undefined under Pearson
        let flat = ClusterSet::from(vec![
            Cluster::fixed(vec![1.0, 1.0, 1.0]),
            Cluster::fixed(vec![2.0, 2.0, 2.0]),
        ]);
        assert_eq!(flat.nearest(&Pearson, &[1.0, 2.0, 3.0])?, Some((0, MAX_DISTANCE)));
        assert_eq!(ClusterSet::new().nearest(&Rmsd, &[1.0])?, None);
        Ok(())
    }

    #[test]
    fn test_segmentation_labels() {
        let mut a = Cluster::new();
        a.add(&Voxel::new(0, 0, 1, vec![1.0]));
        a.add(&Voxel::new(1, 0, 1, vec![1.0]));
        let b = Cluster::seeded(&Voxel::new(5, 5, 2, vec![3.0]));
        let seg = Segmentation::new(vec![a, b]);

        assert_eq!(seg.label_of(Coord::new(1, 0, 1)), Some(1));
        assert_eq!(seg.label_of(Coord::new(5, 5, 2)), Some(2));
        assert_eq!(seg.label_of(Coord::new(9, 9, 9)), None);
        assert_eq!(seg.labels().len(), 3);
        assert_eq!(seg.n_voxels(), 3);
        assert!(seg.cluster(0).is_none());
        assert_eq!(seg.cluster(2).map(Cluster::size), Some(1));
    }
}
