//! Independent component segmentation (FastICA).
//!
//! Frames are the observed mixtures and voxels the samples: each frame is a
//! linear mix of a few spatial source maps, and FastICA recovers a
//! separating matrix that makes the maps as non-Gaussian as possible.
//!
//! # Steps
//!
//! 1. Centre each frame and whiten with the leading `m` eigenpairs of the
//!    frame covariance: `K = Λₘ^(-1/2) Uₘᵀ`, `Z = K Xcᵀ`.
//! 2. Symmetric fixed-point iteration with `g = tanh` (log-cosh contrast):
//!
//!    ```text
//!    W ← E[g(WZ) Zᵀ] - diag(E[g'(WZ)]) W
//!    W ← (W Wᵀ)^(-1/2) W
//!    ```
//!
//!    until no row of `W` turns any more: `maxᵢ ||⟨wᵢ', wᵢ⟩| - 1| < tol`.
//! 3. The separating matrix is `W K`; each voxel's coefficients are its
//!    source values.
//!
//! The exported basis (`ica_sources`) is the transposed separating matrix,
//! one frame per row. Failing to converge is an error; no partial basis is
//! returned.

use super::{center, data_matrix, n_components, Projection};
use crate::error::{Error, Result};
use crate::linalg;
use crate::technique::{Segmentation, Technique};
use crate::voxel::Voxel;
use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_distr::StandardNormal;

/// Relative eigenvalue floor for whitening and decorrelation.
const RCOND: f64 = 1e-12;

/// ICA segmentation.
#[derive(Debug, Clone)]
pub struct Ica {
    components: usize,
    max_iter: usize,
    tol: f64,
    seed: Option<u64>,
}

impl Default for Ica {
    fn default() -> Self {
        Self::new(5)
    }
}

impl Ica {
    /// Extract `components` independent components.
    pub fn new(components: usize) -> Self {
        Self {
            components,
            max_iter: 200,
            tol: 1e-4,
            seed: None,
        }
    }

    /// Set maximum fixed-point iterations.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set convergence tolerance.
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Set random seed for the initial unmixing matrix.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.max_iter == 0 {
            return Err(Error::InvalidParameter {
                name: "max_iter",
                message: "must be at least 1",
            });
        }
        if !(self.tol >= 0.0) {
            return Err(Error::InvalidParameter {
                name: "tol",
                message: "must be non-negative",
            });
        }
        Ok(())
    }

    /// Project `voxels` onto the independent components.
    pub fn project(&self, voxels: &[&Voxel]) -> Result<Projection> {
        self.validate()?;
        let mut x = data_matrix(voxels)?;
        center(&mut x)?;
        let (n, frames) = x.dim();
        let m = n_components(Some(self.components), frames.min(n))?;

        // whitening
        let cov = x.t().dot(&x) / n as f64;
        let (values, vectors) = linalg::symmetric_eigen(&cov)?;
        let top = values[0];
        if values[..m].iter().any(|&v| !(v > RCOND * top)) {
            return Err(Error::Decomposition(format!(
                "data has fewer than {m} non-degenerate dimensions"
            )));
        }
        let k = Array2::from_shape_fn((m, frames), |(i, f)| vectors[[f, i]] / values[i].sqrt());
        let z = k.dot(&x.t());

        let mut rng: Box<dyn RngCore> = match self.seed {
            Some(s) => Box::new(StdRng::seed_from_u64(s)),
            None => Box::new(rand::rng()),
        };
        let init = Array2::from_shape_fn((m, m), |_| rng.sample::<f64, _>(StandardNormal));
        let mut w = decorrelate(&init)?;

        let mut converged = false;
        let mut iterations = 0;
        while iterations < self.max_iter {
            iterations += 1;
            let wz = w.dot(&z);
            let g = wz.mapv(f64::tanh);
            let g_prime_mean: Array1<f64> = g
                .mapv(|v| 1.0 - v * v)
                .mean_axis(Axis(1))
                .ok_or(Error::EmptyInput)?;
            let mut next = g.dot(&z.t()) / n as f64;
            for (mut row, (w_row, &gp)) in next
                .rows_mut()
                .into_iter()
                .zip(w.rows().into_iter().zip(g_prime_mean.iter()))
            {
                row.scaled_add(-gp, &w_row);
            }
            let next = decorrelate(&next)?;

            let change = next
                .rows()
                .into_iter()
                .zip(w.rows())
                .map(|(a, b)| (a.dot(&b).abs() - 1.0).abs())
                .fold(0.0, f64::max);
            w = next;
            if change < self.tol {
                converged = true;
                break;
            }
        }
        if !converged {
            return Err(Error::ConvergenceFailure { iterations });
        }
        tracing::debug!(components = m, iterations, "fastica converged");

        let separating = w.dot(&k);
        let coefficients = x.dot(&separating.t());
        Ok(Projection {
            coefficients,
            basis: separating.t().to_owned(),
        })
    }
}

/// Symmetric decorrelation, `(W Wᵀ)^(-1/2) W`.
fn decorrelate(w: &Array2<f64>) -> Result<Array2<f64>> {
    let gram = w.dot(&w.t());
    let sym = (&gram + &gram.t()) * 0.5;
    Ok(linalg::spd_inverse_sqrt(&sym, RCOND)?.dot(w))
}

impl Technique for Ica {
    fn name(&self) -> &'static str {
        "ica"
    }

    fn process(&mut self, voxels: &[&Voxel]) -> Result<Segmentation> {
        self.project(voxels)?.segment(voxels, "ica_sources")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Frames mix two uniform source maps.
    fn mixtures(n: usize) -> Vec<Voxel> {
        let mut rng = StdRng::seed_from_u64(17);
        let a = [1.0, 2.0, 3.0, 4.0, 2.0];
        let b = [4.0, 1.0, 1.0, 0.5, 3.0];
        (0..n)
            .map(|i| {
                let sa: f64 = rng.random_range(0.0..1.0);
                let sb: f64 = rng.random_range(0.0..1.0);
                let curve = a.iter().zip(&b).map(|(x, y)| sa * x + sb * y).collect();
                Voxel::new(i % 20, i / 20, 1, curve)
            })
            .collect()
    }

    #[test]
    fn test_sources_are_white() -> Result<()> {
        let voxels = mixtures(400);
        let refs: Vec<&Voxel> = voxels.iter().collect();
        let p = Ica::new(2).with_seed(3).project(&refs)?;
        assert_eq!(p.coefficients.dim(), (400, 2));
        assert_eq!(p.basis.dim(), (5, 2));

        // recovered sources are uncorrelated with unit variance
        let s = &p.coefficients;
        let cov = s.t().dot(s) / 400.0;
        assert_abs_diff_eq!(cov[[0, 0]], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(cov[[1, 1]], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(cov[[0, 1]], 0.0, epsilon = 1e-6);
        Ok(())
    }

    #[test]
    fn test_non_convergence_is_an_error() {
        let voxels = mixtures(100);
        let refs: Vec<&Voxel> = voxels.iter().collect();
        let r = Ica::new(2).with_seed(1).with_max_iter(1).with_tol(0.0).project(&refs);
        assert_eq!(r.unwrap_err(), Error::ConvergenceFailure { iterations: 1 });
    }

    #[test]
    fn test_too_many_components() {
        let voxels = mixtures(50);
        let refs: Vec<&Voxel> = voxels.iter().collect();
        // rank-2 data cannot be whitened to three components
        assert!(matches!(
            Ica::new(3).with_seed(1).project(&refs),
            Err(Error::Decomposition(_))
        ));
        assert!(matches!(
            Ica::new(6).project(&refs),
            Err(Error::InvalidClusterCount { requested: 6, .. })
        ));
    }

    #[test]
    fn test_ica_segmentation() -> Result<()> {
        let voxels = mixtures(200);
        let refs: Vec<&Voxel> = voxels.iter().collect();
        let seg = Ica::new(2).with_seed(5).process(&refs)?;
        assert_eq!(seg.len(), 2);
        assert_eq!(seg.n_voxels(), 200);
        assert_eq!(seg.auxiliary().map(|a| a.name.as_str()), Some("ica_sources"));
        Ok(())
    }
}
