//! # tacluster
//!
//! Clustering of time-activity curves (TACs) from dynamic images: every
//! voxel carries one intensity value per time frame, and voxels with
//! similar curves are grouped into numbered clusters.
//!
//! Three families of techniques are provided:
//!
//! - **k-means** ([`technique::KMeans`]): iterative refinement from seeded
//!   centroids, with random, k-means++ and deterministic farthest-point
//!   seeding.
//! - **leader-follower** ([`technique::LeaderFollower`]): a single online
//!   pass that grows, evicts and finally ranks clusters.
//! - **decomposition** ([`technique::Pca`], [`technique::Svd`],
//!   [`technique::Ica`]): project curves onto a basis and label each voxel
//!   with its dominant component.
//!
//! Distances are pluggable through [`Metric`]; implementations are looked up
//! by name in a [`Registry`] or built from declarative [`config`] values.
//!
//! ```
//! use tacluster::technique::{KMeans, Seeding};
//! use tacluster::metric::Rmsd;
//! use tacluster::{Coord, Technique, Voxel, VoxelSet};
//!
//! let set = VoxelSet::new(vec![
//!     Voxel::new(0, 0, 1, vec![1.0, 2.0, 3.0]),
//!     Voxel::new(1, 0, 1, vec![1.0, 2.0, 3.0]),
//!     Voxel::new(2, 0, 1, vec![3.0, 2.0, 1.0]),
//!     Voxel::new(3, 0, 1, vec![10.0, 20.0, 30.0]),
//! ])?;
//! let mut km = KMeans::new(2)
//!     .with_metric(Box::new(Rmsd))
//!     .with_seeding(Seeding::Farthest { first: Some(Coord::new(0, 0, 1)) });
//! let seg = km.run(&set, false)?;
//! assert_eq!(seg.n_voxels(), 4);
//! assert_eq!(seg.label_of(Coord::new(0, 0, 1)), seg.label_of(Coord::new(1, 0, 1)));
//! # Ok::<(), tacluster::Error>(())
//! ```

pub mod cluster;
pub mod config;
/// Error types used across `tacluster`.
pub mod error;
mod linalg;
pub mod metric;
pub mod registry;
pub mod stats;
pub mod technique;
pub mod voxel;


pub use cluster::{prune, weakest, Cluster, Mode, StrengthScore};
pub use config::{MetricConfig, TechniqueConfig};
pub use error::{Error, Result};
pub use metric::Metric;
pub use registry::Registry;
pub use technique::{AuxiliaryInfo, Segmentation, Technique};
pub use voxel::{Coord, NoiseRule, Voxel, VoxelSet, VoxelSource};
