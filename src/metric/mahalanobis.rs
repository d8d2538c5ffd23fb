//! Mahalanobis distance under the covariance of the whole image.
//!
//! `init` streams every active curve once, accumulating the frame-by-frame
//! co-moment matrix with Welford's update
//!
//! ```text
//! δ  = x - μ
//! μ' = μ + δ / n
//! C' = C + δ (x - μ')ᵀ
//! ```
//!
//! and inverts the bias-corrected covariance `C / (n - 1)` once. Distances
//! are then a quadratic form in the stored inverse.

use super::{guarded, Metric};
use crate::error::{Error, Result};
use crate::linalg;
use ndarray::{Array1, Array2};

/// Eigenvalues at or below this fraction of the largest make the covariance
/// singular.
const RCOND: f64 = 1e-12;

/// Mahalanobis distance. Must be initialised before use.
#[derive(Debug, Clone, Default)]
pub struct Mahalanobis {
    inverse: Option<Array2<f64>>,
}

impl Mahalanobis {
    /// An uninitialised metric.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `init` has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.inverse.is_some()
    }
}

/// Bias-corrected covariance of the rows, streamed.
fn covariance(curves: &[&[f64]]) -> Result<Array2<f64>> {
    let first = curves.first().ok_or(Error::EmptyInput)?;
    let d = first.len();
    let mut mean = Array1::<f64>::zeros(d);
    let mut comoment = Array2::<f64>::zeros((d, d));
    for (i, curve) in curves.iter().enumerate() {
        if curve.len() != d {
            return Err(Error::DimensionMismatch {
                expected: d,
                found: curve.len(),
            });
        }
        let x = Array1::from_vec(curve.to_vec());
        let delta = &x - &mean;
        mean.scaled_add(1.0 / (i + 1) as f64, &delta);
        let after = &x - &mean;
        for r in 0..d {
            for c in 0..d {
                comoment[[r, c]] += delta[r] * after[c];
            }
        }
    }
    let n = curves.len();
    if n < 2 {
        return Err(Error::InversionFailed);
    }
    Ok(comoment / (n - 1) as f64)
}

impl Metric for Mahalanobis {
    fn name(&self) -> &'static str {
        "mahalanobis"
    }

    fn init(&mut self, curves: &[&[f64]]) -> Result<()> {
        self.inverse = None;
        let cov = covariance(curves)?;
        // the streamed co-moment is symmetric only up to rounding
        let sym = (&cov + &cov.t()) * 0.5;
        self.inverse = Some(linalg::spd_inverse(&sym, RCOND)?);
        tracing::debug!(frames = sym.nrows(), curves = curves.len(), "covariance inverted");
        Ok(())
    }

    fn distance(&self, data: &[f64], centroid: &[f64]) -> Result<f64> {
        let inverse = self.inverse.as_ref().ok_or(Error::MetricNotInitialized {
            metric: "mahalanobis",
        })?;
        if data.len() != inverse.nrows() {
            return Err(Error::DimensionMismatch {
                expected: inverse.nrows(),
                found: data.len(),
            });
        }
        guarded(data, centroid, || {
            let diff: Array1<f64> = data.iter().zip(centroid).map(|(a, b)| a - b).collect();
            diff.dot(&inverse.dot(&diff)).max(0.0).sqrt()
        })
    }
}
