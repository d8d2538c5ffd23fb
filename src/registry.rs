//! Name → constructor lookup for metrics and techniques.
//!
//! Front ends select implementations by name. The registry is an explicit
//! table filled at construction; [`Registry::with_builtins`] holds every
//! implementation this crate ships and callers may register their own.
//!
//! ```
//! use tacluster::Registry;
//!
//! let registry = Registry::with_builtins();
//! let metric = registry.metric("spearman").unwrap();
//! assert_eq!(metric.name(), "spearman");
//! assert!(registry.technique("no-such-technique").is_err());
//! ```

use crate::error::{Error, Result};
use crate::metric::{Cosine, Mahalanobis, Metric, PNorm, Pearson, Rmsd, Spearman};
use crate::technique::{Ica, KMeans, LeaderFollower, Pca, Svd, Technique};
use std::collections::BTreeMap;

/// Builds a metric with default parameters.
pub type MetricFactory = fn() -> Box<dyn Metric>;

/// Builds a technique with default parameters.
pub type TechniqueFactory = fn() -> Box<dyn Technique>;

/// Table of known metrics and techniques.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    metrics: BTreeMap<String, MetricFactory>,
    techniques: BTreeMap<String, TechniqueFactory>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in metric and technique.
    pub fn with_builtins() -> Self {
        let mut r = Self::new();
        r.register_metric("pearson", || -> Box<dyn Metric> { Box::new(Pearson) });
        r.register_metric("spearman", || -> Box<dyn Metric> { Box::new(Spearman) });
        r.register_metric("cosine", || -> Box<dyn Metric> { Box::new(Cosine) });
        r.register_metric("rmsd", || -> Box<dyn Metric> { Box::new(Rmsd) });
        r.register_metric("pnorm", || -> Box<dyn Metric> { Box::new(PNorm::default()) });
        r.register_metric("mahalanobis", || -> Box<dyn Metric> {
            Box::new(Mahalanobis::new())
        });

        r.register_technique("kmeans", || -> Box<dyn Technique> { Box::new(KMeans::default()) });
        r.register_technique("leader_follower", || -> Box<dyn Technique> {
            Box::new(LeaderFollower::new())
        });
        r.register_technique("pca", || -> Box<dyn Technique> { Box::new(Pca::new()) });
        r.register_technique("svd", || -> Box<dyn Technique> { Box::new(Svd::new()) });
        r.register_technique("ica", || -> Box<dyn Technique> { Box::new(Ica::default()) });
        r
    }

    /// Register `factory` under `name`, returning the one it replaces.
    pub fn register_metric(&mut self, name: impl Into<String>, factory: MetricFactory) -> Option<MetricFactory> {
        self.metrics.insert(name.into(), factory)
    }

    /// Register `factory` under `name`, returning the one it replaces.
    pub fn register_technique(
        &mut self,
        name: impl Into<String>,
        factory: TechniqueFactory,
    ) -> Option<TechniqueFactory> {
        self.techniques.insert(name.into(), factory)
    }

    /// A fresh metric registered as `name`.
    pub fn metric(&self, name: &str) -> Result<Box<dyn Metric>> {
        self.metrics
            .get(name)
            .map(|f| f())
            .ok_or_else(|| Error::UnknownName {
                kind: "metric",
                name: name.to_string(),
            })
    }

    /// A fresh technique registered as `name`.
    pub fn technique(&self, name: &str) -> Result<Box<dyn Technique>> {
        self.techniques
            .get(name)
            .map(|f| f())
            .ok_or_else(|| Error::UnknownName {
                kind: "technique",
                name: name.to_string(),
            })
    }

    /// Registered metric names, sorted.
    pub fn metric_names(&self) -> impl Iterator<Item = &str> {
        self.metrics.keys().map(String::as_str)
    }

    /// Registered technique names, sorted.
    pub fn technique_names(&self) -> impl Iterator<Item = &str> {
        self.techniques.keys().map(String::as_str)
    }
}
