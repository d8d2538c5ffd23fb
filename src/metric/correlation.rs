//! Correlation distances.

use super::{guarded, Metric};
use crate::error::Result;
use crate::stats;

/// `1 - r` with `r` the Pearson correlation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pearson;

impl Metric for Pearson {
    fn name(&self) -> &'static str {
        "pearson"
    }

    fn distance(&self, data: &[f64], centroid: &[f64]) -> Result<f64> {
        guarded(data, centroid, || 1.0 - stats::pearson(data, centroid))
    }
}

/// `1 - ρ` with `ρ` the Spearman rank correlation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Spearman;

impl Metric for Spearman {
    fn name(&self) -> &'static str {
        "spearman"
    }

    fn distance(&self, data: &[f64], centroid: &[f64]) -> Result<f64> {
        guarded(data, centroid, || 1.0 - stats::spearman(data, centroid))
    }
}
