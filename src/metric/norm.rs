//! Norm-based distances.

use super::{guarded, Metric};
use crate::error::{Error, Result};
use crate::stats;

/// Root-mean-square deviation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rmsd;

impl Metric for Rmsd {
    fn name(&self) -> &'static str {
        "rmsd"
    }

    fn distance(&self, data: &[f64], centroid: &[f64]) -> Result<f64> {
        guarded(data, centroid, || stats::rmsd(data, centroid))
    }
}

/// `1 - cos(a, b)`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Cosine;

impl Metric for Cosine {
    fn name(&self) -> &'static str {
        "cosine"
    }

    fn distance(&self, data: &[f64], centroid: &[f64]) -> Result<f64> {
        guarded(data, centroid, || {
            let dot: f64 = data.iter().zip(centroid).map(|(a, b)| a * b).sum();
            let na = data.iter().map(|a| a * a).sum::<f64>().sqrt();
            let nb = centroid.iter().map(|b| b * b).sum::<f64>().sqrt();
            // 0/0 stays NaN
            let cos = dot / (na * nb);
            1.0 - cos.clamp(-1.0, 1.0)
        })
    }
}

/// Minkowski distance of order `p`.
///
/// Curves of different length score 0 rather than failing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PNorm {
    p: f64,
}

impl Default for PNorm {
    fn default() -> Self {
        Self { p: 2.0 }
    }
}

impl PNorm {
    /// Distance of order `p` (`p = 2` is Euclidean).
    pub fn new(p: f64) -> Self {
        Self { p }
    }

    /// Build after checking that `p` is a positive finite number.
    pub fn try_new(p: f64) -> Result<Self> {
        if !(p.is_finite() && p > 0.0) {
            return Err(Error::InvalidParameter {
                name: "p",
                message: "must be positive and finite",
            });
        }
        Ok(Self::new(p))
    }

    /// The order.
    pub fn p(&self) -> f64 {
        self.p
    }
}

impl Metric for PNorm {
    fn name(&self) -> &'static str {
        "pnorm"
    }

    fn distance(&self, data: &[f64], centroid: &[f64]) -> Result<f64> {
        if data.len() != centroid.len() {
            return Ok(0.0);
        }
        guarded(data, centroid, || {
            data.iter()
                .zip(centroid)
                .map(|(a, b)| (a - b).abs().powf(self.p))
                .sum::<f64>()
                .powf(1.0 / self.p)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::MAX_DISTANCE;
    use approx::assert_relative_eq;

    #[test]
    fn test_rmsd() {
        let d = Rmsd.distance(&[1.0, 2.0, 3.0], &[10.0, 20.0, 30.0]).unwrap();
        assert_relative_eq!(d, ((81.0 + 324.0 + 729.0) / 3.0f64).sqrt());
    }

    #[test]
    fn test_cosine() {
        assert_relative_eq!(Cosine.distance(&[1.0, 0.0], &[0.0, 1.0]).unwrap(), 1.0);
        assert_relative_eq!(Cosine.distance(&[1.0, 2.0], &[2.0, 4.0]).unwrap(), 0.0, epsilon = 1e-12);
        assert_eq!(Cosine.distance(&[0.0, 0.0], &[1.0, 1.0]).unwrap(), MAX_DISTANCE);
    }

    #[test]
    fn test_pnorm_orders() {
        let a = [0.0, 0.0];
        let b = [3.0, 4.0];
        assert_relative_eq!(PNorm::default().distance(&a, &b).unwrap(), 5.0);
        assert_relative_eq!(PNorm::new(1.0).distance(&a, &b).unwrap(), 7.0);
        assert_eq!(PNorm::default().distance(&[1.0], &[1.0, 2.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_pnorm_rejects_bad_order() {
        assert!(PNorm::try_new(0.0).is_err());
        assert!(PNorm::try_new(f64::NAN).is_err());
        assert_eq!(PNorm::try_new(3.0).map(|m| m.p()), Ok(3.0));
    }

    #[test]
    fn test_mismatched_lengths_are_an_error() {
        assert!(Rmsd.distance(&[1.0], &[1.0, 2.0]).is_err());
        assert!(Cosine.distance(&[1.0], &[1.0, 2.0]).is_err());
    }
}
