//! Principal component segmentation.
//!
//! Centre the voxel × frame matrix `X`, build the frame × frame covariance
//! (or correlation) matrix, and project onto its eigenvectors ordered by
//! decreasing eigenvalue:
//!
//! ```text
//! C = Xcᵀ Xc / (n - 1)
//! C = V Λ Vᵀ
//! coefficients = Xc V
//! ```
//!
//! The exported basis (`pca_vectors`) is `V`, one frame per row.

use super::{center, data_matrix, n_components, Projection};
use crate::error::Result;
use crate::linalg;
use crate::technique::{Segmentation, Technique};
use crate::voxel::Voxel;
use ndarray::{s, Array2};

/// Which second-moment matrix is decomposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum MatrixType {
    /// Frame covariance.
    #[default]
    Covariance,
    /// Frame correlation. Frames with zero variance correlate with nothing.
    Correlation,
}

/// PCA segmentation.
#[derive(Debug, Clone, Default)]
pub struct Pca {
    matrix: MatrixType,
    components: Option<usize>,
}

impl Pca {
    /// Covariance PCA keeping every component.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decompose the covariance or the correlation matrix.
    pub fn with_matrix(mut self, matrix: MatrixType) -> Self {
        self.matrix = matrix;
        self
    }

    /// Keep only the leading `components`.
    pub fn with_components(mut self, components: usize) -> Self {
        self.components = Some(components);
        self
    }

    /// Project `voxels` onto the principal components.
    pub fn project(&self, voxels: &[&Voxel]) -> Result<Projection> {
        let mut x = data_matrix(voxels)?;
        center(&mut x)?;
        let n = x.nrows();
        let m = n_components(self.components, x.ncols())?;

        let mut c = x.t().dot(&x) / n.saturating_sub(1).max(1) as f64;
        if self.matrix == MatrixType::Correlation {
            c = correlation(&c);
        }
        let (values, vectors) = linalg::symmetric_eigen(&c)?;
        tracing::debug!(eigenvalues = ?&values[..m], "pca basis");

        let basis = vectors.slice(s![.., ..m]).to_owned();
        Ok(Projection {
            coefficients: x.dot(&basis),
            basis,
        })
    }
}

/// Normalise a covariance matrix to correlations.
fn correlation(cov: &Array2<f64>) -> Array2<f64> {
    let sd: Vec<f64> = cov.diag().iter().map(|v| v.max(0.0).sqrt()).collect();
    Array2::from_shape_fn(cov.raw_dim(), |(i, j)| {
        if i == j {
            1.0
        } else if sd[i] > 0.0 && sd[j] > 0.0 {
            cov[[i, j]] / (sd[i] * sd[j])
        } else {
            0.0
        }
    })
}

impl Technique for Pca {
    fn name(&self) -> &'static str {
        "pca"
    }

    fn process(&mut self, voxels: &[&Voxel]) -> Result<Segmentation> {
        self.project(voxels)?.segment(voxels, "pca_vectors")
    }
}
