//! Singular value segmentation.
//!
//! Thin SVD of the centred voxel × frame matrix, `Xc = U Σ Vᵀ`; voxels are
//! projected onto the right singular vectors, `coefficients = Xc V = U Σ`.
//! The exported basis (`svd_vectors`) is `V`, one frame per row.

use super::{center, data_matrix, n_components, Projection};
use crate::error::Result;
use crate::linalg;
use crate::technique::{Segmentation, Technique};
use crate::voxel::Voxel;
use ndarray::s;

/// SVD segmentation.
#[derive(Debug, Clone, Default)]
pub struct Svd {
    components: Option<usize>,
}

impl Svd {
    /// Keep every singular vector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only the leading `components`.
    pub fn with_components(mut self, components: usize) -> Self {
        self.components = Some(components);
        self
    }

    /// Project `voxels` onto the right singular vectors.
    pub fn project(&self, voxels: &[&Voxel]) -> Result<Projection> {
        let mut x = data_matrix(voxels)?;
        center(&mut x)?;
        let (singular, v) = linalg::right_singular_vectors(&x)?;
        let m = n_components(self.components, v.ncols())?;
        tracing::debug!(singular_values = ?&singular[..m], "svd basis");

        let basis = v.slice(s![.., ..m]).to_owned();
        Ok(Projection {
            coefficients: x.dot(&basis),
            basis,
        })
    }
}

impl Technique for Svd {
    fn name(&self) -> &'static str {
        "svd"
    }

    fn process(&mut self, voxels: &[&Voxel]) -> Result<Segmentation> {
        self.project(voxels)?.segment(voxels, "svd_vectors")
    }
}
