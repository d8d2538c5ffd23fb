//! Leader-follower clustering.
//!
//! A single pass in which every voxel either follows an existing cluster or
//! leads a new one. The number of clusters is not fixed in advance: a
//! similarity threshold decides when a curve is different enough to start
//! its own cluster.
//!
//! # Algorithm
//!
//! Voxels are visited by decreasing peak amplitude (ties: earlier peak time
//! first, then source order), so the brightest curves lead. For each voxel:
//!
//! 1. Score it against every centroid: `score = 1 - distance`.
//! 2. A cluster is a candidate when `score > threshold` and
//!    `score > limitᵢ`, where `limitᵢ` starts at `threshold` and is
//!    multiplied by `increment` each time cluster `i` admits a member. An
//!    increment above 1 makes popular clusters harder to join.
//! 3. One candidate is chosen by [`CandidateSelection`] and, if the
//!    [`AmplitudeGate`] lets it, the voxel joins it.
//! 4. With no candidate, the voxel leads a new cluster. At `max_clusters`
//!    the weakest cluster is evicted first when allowed, otherwise the voxel
//!    is dropped.
//!
//! Scores are computed on the smoothed curve (optional); clusters always
//! accumulate the raw curve. At the end the `keep_clusters` strongest
//! clusters survive, strongest first.

use super::{ClusterSet, Segmentation, Technique};
use crate::cluster::{prune, weakest, Cluster, StrengthScore};
use crate::error::{Error, Result};
use crate::metric::{Metric, Pearson};
use crate::stats;
use crate::voxel::Voxel;

/// How one cluster is picked among several candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum CandidateSelection {
    /// Smallest Euclidean distance to the centroid.
    #[default]
    NearestEuclidean,
    /// Smallest `euclidean · exp(-score)`, favouring similar shapes.
    WeightedEuclidean,
    /// Highest score.
    MaxScore,
}

/// Peak amplitude condition on joining a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum AmplitudeGate {
    /// No condition.
    #[default]
    Off,
    /// The voxel's peak must exceed the cluster's mean peak.
    AboveMean,
    /// The voxel's peak must be at least `mean - stdev` of the cluster peaks.
    WithinStdev,
}

impl AmplitudeGate {
    fn admits(self, cluster: &Cluster, peak: f64) -> bool {
        let mean = cluster.peak_mean().unwrap_or(f64::NEG_INFINITY);
        match self {
            AmplitudeGate::Off => true,
            AmplitudeGate::AboveMean => peak > mean,
            AmplitudeGate::WithinStdev => peak >= mean - cluster.peak_stdev().unwrap_or(0.0),
        }
    }
}

/// Leader-follower clustering.
#[derive(Debug)]
pub struct LeaderFollower {
    metric: Box<dyn Metric>,
    threshold: f64,
    increment: f64,
    max_clusters: usize,
    keep_clusters: usize,
    evict_weakest: bool,
    presort: bool,
    smooth: bool,
    selection: CandidateSelection,
    gate: AmplitudeGate,
    score: StrengthScore,
}

impl Default for LeaderFollower {
    fn default() -> Self {
        Self::new()
    }
}

impl LeaderFollower {
    /// Pearson scoring, threshold 0.3, no tightening, up to 1000 clusters
    /// of which the best 50 are kept.
    pub fn new() -> Self {
        Self {
            metric: Box::new(Pearson),
            threshold: 0.3,
            increment: 1.0,
            max_clusters: 1000,
            keep_clusters: 50,
            evict_weakest: false,
            presort: true,
            smooth: true,
            selection: CandidateSelection::default(),
            gate: AmplitudeGate::default(),
            score: StrengthScore::default(),
        }
    }

    /// Set the scoring metric.
    pub fn with_metric(mut self, metric: Box<dyn Metric>) -> Self {
        self.metric = metric;
        self
    }

    /// Set the similarity threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the per-admission threshold multiplier (`1.0` keeps limits fixed).
    pub fn with_increment(mut self, increment: f64) -> Self {
        self.increment = increment;
        self
    }

    /// Set the working cluster capacity.
    pub fn with_max_clusters(mut self, max_clusters: usize) -> Self {
        self.max_clusters = max_clusters;
        self
    }

    /// Set how many clusters survive the final ranking.
    pub fn with_keep_clusters(mut self, keep_clusters: usize) -> Self {
        self.keep_clusters = keep_clusters;
        self
    }

    /// Evict the weakest cluster instead of dropping voxels at capacity.
    pub fn with_evict_weakest(mut self, evict: bool) -> Self {
        self.evict_weakest = evict;
        self
    }

    /// Visit voxels by decreasing peak amplitude (default) or in source order.
    pub fn with_presort(mut self, presort: bool) -> Self {
        self.presort = presort;
        self
    }

    /// Score smoothed curves (default) or raw ones.
    pub fn with_smoothing(mut self, smooth: bool) -> Self {
        self.smooth = smooth;
        self
    }

    /// Set the candidate selection rule.
    pub fn with_selection(mut self, selection: CandidateSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Set the amplitude gate.
    pub fn with_gate(mut self, gate: AmplitudeGate) -> Self {
        self.gate = gate;
        self
    }

    /// Set the strength score used for eviction and the final ranking.
    pub fn with_score(mut self, score: StrengthScore) -> Self {
        self.score = score;
        self
    }

    fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() {
            return Err(Error::InvalidParameter {
                name: "threshold",
                message: "must be finite",
            });
        }
        if !(self.increment.is_finite() && self.increment > 0.0) {
            return Err(Error::InvalidParameter {
                name: "increment",
                message: "must be positive and finite",
            });
        }
        if self.max_clusters == 0 {
            return Err(Error::InvalidParameter {
                name: "max_clusters",
                message: "must be at least 1",
            });
        }
        if self.keep_clusters == 0 {
            return Err(Error::InvalidParameter {
                name: "keep_clusters",
                message: "must be at least 1",
            });
        }
        Ok(())
    }

    /// Visiting order: peak descending, then peak time ascending, then
    /// source order.
    fn order(&self, voxels: &[&Voxel]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..voxels.len()).collect();
        if self.presort {
            let peaks: Vec<f64> = voxels.iter().map(|v| v.peak()).collect();
            let times: Vec<usize> = voxels.iter().map(|v| stats::argmax(&v.curve)).collect();
            order.sort_by(|&a, &b| peaks[b].total_cmp(&peaks[a]).then(times[a].cmp(&times[b])));
        }
        order
    }

    /// Candidates for `probe` as `(index, score)`.
    fn candidates(&self, set: &ClusterSet, limits: &[f64], probe: &[f64]) -> Result<Vec<(usize, f64)>> {
        let mut out = Vec::new();
        for (i, d) in set.distances(self.metric.as_ref(), probe)?.into_iter().enumerate() {
            if let Some(d) = d {
                let score = 1.0 - d;
                if score > self.threshold && score > limits[i] {
                    out.push((i, score));
                }
            }
        }
        Ok(out)
    }

    /// Pick one of `candidates` for `curve`. First wins on ties.
    fn choose(&self, set: &ClusterSet, candidates: &[(usize, f64)], curve: &[f64]) -> Option<usize> {
        if candidates.len() <= 1 {
            return candidates.first().map(|&(i, _)| i);
        }
        let euclid = |i: usize| {
            set.get(i)
                .and_then(Cluster::centroid)
                .map_or(f64::INFINITY, |c| stats::euclidean(curve, c))
        };
        let mut best: Option<(usize, f64)> = None;
        for &(i, score) in candidates {
            // lower is better
            let key = match self.selection {
                CandidateSelection::NearestEuclidean => euclid(i),
                CandidateSelection::WeightedEuclidean => euclid(i) * (-score).exp(),
                CandidateSelection::MaxScore => -score,
            };
            if best.map_or(true, |(_, b)| key < b) {
                best = Some((i, key));
            }
        }
        best.map(|(i, _)| i)
    }
}

impl Technique for LeaderFollower {
    fn name(&self) -> &'static str {
        "leader_follower"
    }

    fn metric_mut(&mut self) -> Option<&mut dyn Metric> {
        Some(self.metric.as_mut())
    }

    fn process(&mut self, voxels: &[&Voxel]) -> Result<Segmentation> {
        if voxels.is_empty() {
            return Err(Error::EmptyInput);
        }
        self.validate()?;

        let mut set = ClusterSet::new();
        // per-cluster limits, indexed like `set`
        let mut limits: Vec<f64> = Vec::new();
        let mut dropped = 0usize;
        let mut evicted = 0usize;

        for i in self.order(voxels) {
            let voxel = voxels[i];
            if set.is_empty() {
                set.push(Cluster::seeded(voxel));
                limits.push(self.threshold);
                continue;
            }

            let probe = if self.smooth {
                stats::smooth(&voxel.curve)
            } else {
                voxel.curve.clone()
            };
            let candidates = self.candidates(&set, &limits, &probe)?;

            if let Some(c) = self.choose(&set, &candidates, &voxel.curve) {
                let admitted = set.get(c).is_some_and(|cl| self.gate.admits(cl, voxel.peak()));
                if admitted {
                    set.add_to(c, voxel)?;
                    limits[c] *= self.increment;
                } else {
                    dropped += 1;
                }
                continue;
            }

            if set.len() >= self.max_clusters {
                match weakest(set.as_slice(), self.score).filter(|_| self.evict_weakest) {
                    Some(w) => {
                        set.remove(w);
                        limits.remove(w);
                        evicted += 1;
                    }
                    None => {
                        dropped += 1;
                        continue;
                    }
                }
            }
            set.push(Cluster::seeded(voxel));
            limits.push(self.threshold);
        }

        let formed = set.len();
        let kept = prune(set.into_vec(), self.keep_clusters, self.score);
        tracing::debug!(formed, kept = kept.len(), dropped, evicted, "leader-follower pass done");
        Ok(Segmentation::new(kept).with_formed(formed))
    }
}
