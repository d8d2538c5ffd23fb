//! Distances between time-activity curves.
//!
//! A [`Metric`] scores how far a voxel curve lies from a cluster centroid.
//! Some metrics carry state that depends on the whole image (Mahalanobis
//! needs the covariance of every active curve), so each run calls
//! [`Metric::init`] once over the active curves before the first
//! [`Metric::distance`].
//!
//! # Contract
//!
//! - `distance(x, x) == 0` exactly. Every built-in compares the inputs
//!   element-wise first and returns 0 without computing anything.
//! - An undefined result (a constant curve under a correlation, a zero
//!   vector under cosine) is [`MAX_DISTANCE`], never `NaN`.
//! - Curves of different length are an error, except for [`PNorm`] which
//!   scores them 0.
//!
//! | Metric | distance |
//! |---|---|
//! | [`Pearson`] | `1 - r` |
//! | [`Spearman`] | `1 - ρ` (average ranks) |
//! | [`Cosine`] | `1 - a·b / (‖a‖ ‖b‖)` |
//! | [`Rmsd`] | `sqrt(mean((a - b)²))` |
//! | [`PNorm`] | `(Σ |a - b|^p)^(1/p)` |
//! | [`Mahalanobis`] | `sqrt((a - b)ᵀ Σ⁻¹ (a - b))` |

mod correlation;
mod mahalanobis;
mod norm;

pub use correlation::{Pearson, Spearman};
pub use mahalanobis::Mahalanobis;
pub use norm::{Cosine, PNorm, Rmsd};

use crate::error::{Error, Result};
use std::fmt::Debug;

/// Distance returned when a metric is undefined for its inputs.
pub const MAX_DISTANCE: f64 = f64::MAX;

/// A dissimilarity between two curves.
pub trait Metric: Debug {
    /// Registry name.
    fn name(&self) -> &'static str;

    /// Precompute run-wide state from every active curve.
    ///
    /// Called once per run, before any [`Metric::distance`]. Stateless metrics
    /// keep the default no-op.
    fn init(&mut self, _curves: &[&[f64]]) -> Result<()> {
        Ok(())
    }

    /// Distance of `data` from `centroid` (non-negative).
    fn distance(&self, data: &[f64], centroid: &[f64]) -> Result<f64>;
}

/// Shared guard for the built-ins: length check, exact-equality short
/// circuit, and `NaN` to [`MAX_DISTANCE`].
pub(crate) fn guarded(data: &[f64], centroid: &[f64], f: impl FnOnce() -> f64) -> Result<f64> {
    if data.len() != centroid.len() {
        return Err(Error::DimensionMismatch {
            expected: centroid.len(),
            found: data.len(),
        });
    }
    if data == centroid {
        return Ok(0.0);
    }
    let d = f();
    Ok(if d.is_nan() { MAX_DISTANCE } else { d })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn builtins() -> Vec<Box<dyn Metric>> {
        vec![
            Box::new(Pearson),
            Box::new(Spearman),
            Box::new(Cosine),
            Box::new(Rmsd),
            Box::new(PNorm::default()),
            Box::new(PNorm::new(1.0)),
        ]
    }

    #[test]
    fn test_guard_maps_nan_to_sentinel() {
        assert_eq!(guarded(&[1.0], &[2.0], || f64::NAN), Ok(MAX_DISTANCE));
        assert_eq!(guarded(&[1.0], &[1.0], || f64::NAN), Ok(0.0));
        assert!(matches!(
            guarded(&[1.0], &[1.0, 2.0], || 0.5),
            Err(Error::DimensionMismatch { expected: 2, found: 1 })
        ));
    }

    proptest! {
        #[test]
        fn test_distance_to_self_is_exactly_zero(
            curve in proptest::collection::vec(-1e6f64..1e6, 1..32)
        ) {
            for m in builtins() {
                prop_assert_eq!(m.distance(&curve, &curve)?, 0.0, "{}", m.name());
            }
        }

        #[test]
        fn test_distances_are_symmetric_and_non_negative(
            a in proptest::collection::vec(0.1f64..1e3, 6),
            b in proptest::collection::vec(0.1f64..1e3, 6),
        ) {
            for m in builtins() {
                let ab = m.distance(&a, &b)?;
                let ba = m.distance(&b, &a)?;
                prop_assert!(ab >= 0.0, "{} gave {ab}", m.name());
                prop_assert!((ab - ba).abs() <= 1e-9 * ab.max(1.0), "{}: {ab} vs {ba}", m.name());
            }
        }
    }
}
