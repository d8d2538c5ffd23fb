//! Decomposition-based segmentation.
//!
//! PCA, SVD and ICA all project the voxel × frame matrix onto a small basis
//! and then label every voxel with the component it loads on most:
//!
//! ```text
//! label(v) = 1 + argmaxₖ coefficient(v, k)
//! ```
//!
//! This is a hard assignment of what is really a mixture, so it works best
//! when each tissue class is dominated by one component. Component clusters
//! that receive no voxel are kept empty, so label `c` always belongs to
//! component `c - 1`.
//!
//! Each technique also exports its basis as [`AuxiliaryInfo`] text: one
//! basis row per line, values separated by `", "`.

mod ica;
mod pca;
mod svd;

pub use ica::Ica;
pub use pca::{MatrixType, Pca};
pub use svd::Svd;

use super::{AuxiliaryInfo, ClusterSet, Segmentation};
use crate::error::{Error, Result};
use crate::stats;
use crate::voxel::Voxel;
use ndarray::{Array1, Array2, Axis};
use std::fmt::Write;

/// Result of projecting voxels onto a decomposition basis.
#[derive(Debug, Clone)]
pub struct Projection {
    /// One row per voxel, one column per component.
    pub coefficients: Array2<f64>,
    /// The basis as exported (layout depends on the technique).
    pub basis: Array2<f64>,
}

impl Projection {
    /// Number of components.
    pub fn n_components(&self) -> usize {
        self.coefficients.ncols()
    }

    /// 1-based label of every voxel (row).
    pub fn labels(&self) -> Vec<usize> {
        self.coefficients
            .rows()
            .into_iter()
            .map(|row| stats::argmax(&row.to_vec()) + 1)
            .collect()
    }

    /// Assign `voxels` (in projection row order) to component clusters.
    pub(crate) fn segment(self, voxels: &[&Voxel], aux_name: &str) -> Result<Segmentation> {
        let m = self.n_components();
        let mut set = ClusterSet::new();
        if m > 0 {
            set.cluster_at(m)?;
        }
        for (&voxel, label) in voxels.iter().zip(self.labels()) {
            set.cluster_at(label)?.add(voxel);
        }
        let info = AuxiliaryInfo {
            name: aux_name.to_string(),
            text: matrix_text(&self.basis),
        };
        let clusters = set.into_vec();
        tracing::debug!(
            components = m,
            empty = clusters.iter().filter(|c| c.is_empty()).count(),
            "voxels assigned to components"
        );
        Ok(Segmentation::new(clusters).with_auxiliary(info))
    }
}

/// Stack curves into a voxel × frame matrix.
pub(crate) fn data_matrix(voxels: &[&Voxel]) -> Result<Array2<f64>> {
    let first = voxels.first().ok_or(Error::EmptyInput)?;
    let d = first.curve.len();
    if d == 0 {
        return Err(Error::EmptyInput);
    }
    if let Some(bad) = voxels.iter().find(|v| v.curve.len() != d) {
        return Err(Error::DimensionMismatch {
            expected: d,
            found: bad.curve.len(),
        });
    }
    Ok(Array2::from_shape_fn((voxels.len(), d), |(i, j)| voxels[i].curve[j]))
}

/// Subtract the per-frame (column) mean in place and return it.
pub(crate) fn center(x: &mut Array2<f64>) -> Result<Array1<f64>> {
    let mean = x.mean_axis(Axis(0)).ok_or(Error::EmptyInput)?;
    *x -= &mean;
    Ok(mean)
}

/// Resolve a requested component count against what the basis offers.
pub(crate) fn n_components(requested: Option<usize>, available: usize) -> Result<usize> {
    match requested {
        None => Ok(available),
        Some(0) => Err(Error::InvalidParameter {
            name: "components",
            message: "must be at least 1",
        }),
        Some(m) if m > available => Err(Error::InvalidClusterCount {
            requested: m,
            n_items: available,
        }),
        Some(m) => Ok(m),
    }
}

/// One matrix row per line, values separated by `", "`.
pub(crate) fn matrix_text(m: &Array2<f64>) -> String {
    let mut out = String::new();
    for row in m.rows() {
        let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        // writing to a String cannot fail
        let _ = writeln!(out, "{}", line.join(", "));
    }
    out
}
