//! Declarative run configuration.
//!
//! Plain data describing a metric or a technique and its parameters, with
//! `build` turning it into a ready-to-run trait object. With the `serde`
//! feature every config (de)serialises, tagged by `"type"`; omitted fields
//! take the defaults of the corresponding builder.
//!
//! ```json
//! {
//!   "type": "leader_follower",
//!   "metric": { "type": "pearson" },
//!   "threshold": 0.5,
//!   "keep_clusters": 10
//! }
//! ```

use crate::cluster::StrengthScore;
use crate::error::Result;
use crate::metric::{Cosine, Mahalanobis, Metric, PNorm, Pearson, Rmsd, Spearman};
use crate::technique::{
    AmplitudeGate, CandidateSelection, Ica, KMeans, LeaderFollower, MatrixType, Pca, Seeding, Svd,
    Technique,
};

/// A metric and its parameters.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "type", rename_all = "snake_case")
)]
pub enum MetricConfig {
    /// [`Pearson`].
    #[default]
    Pearson,
    /// [`Spearman`].
    Spearman,
    /// [`Cosine`].
    Cosine,
    /// [`Rmsd`].
    Rmsd,
    /// [`PNorm`] of order `p`.
    #[cfg_attr(feature = "serde", serde(rename = "pnorm"))]
    PNorm {
        /// Order (default 2).
        #[cfg_attr(feature = "serde", serde(default = "default_p"))]
        p: f64,
    },
    /// [`Mahalanobis`].
    Mahalanobis,
}

#[cfg(feature = "serde")]
fn default_p() -> f64 {
    2.0
}

impl MetricConfig {
    /// Build the metric, validating its parameters.
    pub fn build(&self) -> Result<Box<dyn Metric>> {
        Ok(match *self {
            MetricConfig::Pearson => Box::new(Pearson),
            MetricConfig::Spearman => Box::new(Spearman),
            MetricConfig::Cosine => Box::new(Cosine),
            MetricConfig::Rmsd => Box::new(Rmsd),
            MetricConfig::PNorm { p } => Box::new(PNorm::try_new(p)?),
            MetricConfig::Mahalanobis => Box::new(Mahalanobis::new()),
        })
    }
}

/// [`KMeans`] parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct KMeansConfig {
    /// Number of clusters.
    pub k: usize,
    /// Distance.
    pub metric: MetricConfig,
    /// Seeding, in its text form when serialised.
    pub seeding: Seeding,
    /// Maximum rounds.
    pub max_iter: usize,
    /// Stopping threshold in percent.
    pub threshold: f64,
    /// Random seed.
    pub seed: Option<u64>,
    /// Draw cap per random seed.
    pub max_seed_draws: usize,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            k: 5,
            metric: MetricConfig::default(),
            seeding: Seeding::default(),
            max_iter: 100,
            threshold: 0.0,
            seed: None,
            max_seed_draws: 10_000,
        }
    }
}

/// [`LeaderFollower`] parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct LeaderFollowerConfig {
    /// Scoring distance.
    pub metric: MetricConfig,
    /// Similarity threshold.
    pub threshold: f64,
    /// Per-admission threshold multiplier.
    pub increment: f64,
    /// Working capacity.
    pub max_clusters: usize,
    /// Clusters kept after ranking.
    pub keep_clusters: usize,
    /// Evict the weakest cluster at capacity.
    pub evict_weakest: bool,
    /// Visit by decreasing peak.
    pub presort: bool,
    /// Score smoothed curves.
    pub smooth: bool,
    /// Candidate tie-break.
    pub selection: CandidateSelection,
    /// Amplitude condition.
    pub gate: AmplitudeGate,
    /// Ranking score.
    pub score: StrengthScore,
}

impl Default for LeaderFollowerConfig {
    fn default() -> Self {
        Self {
            metric: MetricConfig::default(),
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
}

/// [`Pca`] parameters.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct PcaConfig {
    /// Covariance or correlation.
    pub matrix: MatrixType,
    /// Leading components kept (all when absent).
    pub components: Option<usize>,
}

/// [`Svd`] parameters.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct SvdConfig {
    /// Leading components kept (all when absent).
    pub components: Option<usize>,
}

/// [`Ica`] parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct IcaConfig {
    /// Independent components.
    pub components: usize,
    /// Maximum fixed-point iterations.
    pub max_iter: usize,
    /// Convergence tolerance.
    pub tol: f64,
    /// Random seed.
    pub seed: Option<u64>,
}

impl Default for IcaConfig {
    fn default() -> Self {
        Self {
            components: 5,
            max_iter: 200,
            tol: 1e-4,
            seed: None,
        }
    }
}

/// A technique and its parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "type", rename_all = "snake_case")
)]
pub enum TechniqueConfig {
    /// Iterative refinement.
    #[cfg_attr(feature = "serde", serde(rename = "kmeans"))]
    KMeans(KMeansConfig),
    /// Online leader-follower.
    LeaderFollower(LeaderFollowerConfig),
    /// Principal components.
    Pca(PcaConfig),
    /// Singular vectors.
    Svd(SvdConfig),
    /// Independent components.
    Ica(IcaConfig),
}

impl Default for TechniqueConfig {
    fn default() -> Self {
        TechniqueConfig::KMeans(KMeansConfig::default())
    }
}

impl TechniqueConfig {
    /// Build the technique. Metric parameters are checked here; technique
    /// parameters when it runs.
    pub fn build(&self) -> Result<Box<dyn Technique>> {
        Ok(match self {
            TechniqueConfig::KMeans(c) => {
                let mut km = KMeans::new(c.k)
                    .with_metric(c.metric.build()?)
                    .with_seeding(c.seeding.clone())
                    .with_max_iter(c.max_iter)
                    .with_threshold(c.threshold)
                    .with_max_seed_draws(c.max_seed_draws);
                if let Some(seed) = c.seed {
                    km = km.with_seed(seed);
                }
                Box::new(km)
            }
            TechniqueConfig::LeaderFollower(c) => Box::new(
                LeaderFollower::new()
                    .with_metric(c.metric.build()?)
                    .with_threshold(c.threshold)
                    .with_increment(c.increment)
                    .with_max_clusters(c.max_clusters)
                    .with_keep_clusters(c.keep_clusters)
                    .with_evict_weakest(c.evict_weakest)
                    .with_presort(c.presort)
                    .with_smoothing(c.smooth)
                    .with_selection(c.selection)
                    .with_gate(c.gate)
                    .with_score(c.score),
            ),
            TechniqueConfig::Pca(c) => {
                let mut pca = Pca::new().with_matrix(c.matrix);
                if let Some(m) = c.components {
                    pca = pca.with_components(m);
                }
                Box::new(pca)
            }
            TechniqueConfig::Svd(c) => {
                let mut svd = Svd::new();
                if let Some(m) = c.components {
                    svd = svd.with_components(m);
                }
                Box::new(svd)
            }
            TechniqueConfig::Ica(c) => {
                let mut ica = Ica::new(c.components).with_max_iter(c.max_iter).with_tol(c.tol);
                if let Some(seed) = c.seed {
                    ica = ica.with_seed(seed);
                }
                Box::new(ica)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_build_names() {
        let cases = [
            (TechniqueConfig::default(), "kmeans"),
            (TechniqueConfig::LeaderFollower(LeaderFollowerConfig::default()), "leader_follower"),
            (TechniqueConfig::Pca(PcaConfig::default()), "pca"),
            (TechniqueConfig::Svd(SvdConfig::default()), "svd"),
            (TechniqueConfig::Ica(IcaConfig::default()), "ica"),
        ];
        for (config, name) in cases {
            assert_eq!(config.build().unwrap().name(), name);
        }
    }

    #[test]
    fn test_bad_metric_parameter_fails_build() {
        let config = TechniqueConfig::KMeans(KMeansConfig {
            metric: MetricConfig::PNorm { p: -1.0 },
            ..KMeansConfig::default()
        });
        assert!(matches!(
            config.build().unwrap_err(),
            Error::InvalidParameter { name: "p", .. }
        ));
    }

    #[cfg(feature = "serde")]
    mod serde_tests {
        use super::*;

        #[test]
        fn test_missing_fields_take_defaults() {
            let json = r#"{"type": "leader_follower", "threshold": 0.5, "keep_clusters": 10}"#;
            let config: TechniqueConfig = serde_json::from_str(json).unwrap();
            let TechniqueConfig::LeaderFollower(lf) = config else {
                panic!("wrong variant");
            };
            assert_eq!(lf.threshold, 0.5);
            assert_eq!(lf.keep_clusters, 10);
            assert_eq!(lf.max_clusters, 1000);
            assert_eq!(lf.metric, MetricConfig::Pearson);
        }

        #[test]
        fn test_seeding_uses_text_form() {
            let json = r#"{"type": "kmeans", "k": 3, "seeding": "det++;1,2,3", "metric": {"type": "pnorm"}}"#;
            let config: TechniqueConfig = serde_json::from_str(json).unwrap();
            let TechniqueConfig::KMeans(km) = &config else {
                panic!("wrong variant");
            };
            assert_eq!(km.k, 3);
            assert_eq!(km.metric, MetricConfig::PNorm { p: 2.0 });
            assert_eq!(km.seeding.to_string(), "det++;1,2,3");

            let back: TechniqueConfig = serde_json::from_str(&serde_json::to_string(&config).unwrap()).unwrap();
            assert_eq!(back, config);

            let bad = r#"{"type": "kmeans", "seeding": "1,2"}"#;
            assert!(serde_json::from_str::<TechniqueConfig>(bad).is_err());
        }
    }
}
