//! Voxels and the sources that supply them.
//!
//! The clustering core never touches an image directly. It consumes a
//! [`VoxelSource`]: an ordered, repeatable collection of `(coordinates,
//! curve)` pairs that has already been stripped of masked voxels, plus a
//! noise predicate that techniques may consult when asked to skip noise.

use crate::error::{Error, Result};
use crate::stats;
use std::fmt;

/// Spatial position of a voxel. `slice` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Coord {
    /// Column.
    pub x: usize,
    /// Row.
    pub y: usize,
    /// Slice (1-based).
    pub slice: usize,
}

impl Coord {
    /// Create a coordinate triple.
    pub const fn new(x: usize, y: usize, slice: usize) -> Self {
        Self { x, y, slice }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.slice)
    }
}

/// One spatial location and its time-activity curve.
#[derive(Debug, Clone, PartialEq)]
pub struct Voxel {
    /// Where the curve was sampled.
    pub coord: Coord,
    /// One value per frame.
    pub curve: Vec<f64>,
}

impl Voxel {
    /// Create a voxel.
    pub fn new(x: usize, y: usize, slice: usize, curve: Vec<f64>) -> Self {
        Self {
            coord: Coord::new(x, y, slice),
            curve,
        }
    }

    /// Maximum value of the curve.
    pub fn peak(&self) -> f64 {
        stats::peak(&self.curve)
    }
}

/// `true` when every sample is exactly zero (a masked voxel).
pub fn is_masked(curve: &[f64]) -> bool {
    curve.iter().all(|&v| v == 0.0)
}

/// Supplier of voxels to a clustering run.
pub trait VoxelSource {
    /// All candidate voxels in a deterministic order.
    fn voxels(&self) -> &[Voxel];

    /// Noise predicate. Only consulted when a run is asked to skip noise.
    fn is_noise(&self, _curve: &[f64]) -> bool {
        false
    }

    /// Look up the voxel at `coord`.
    fn find(&self, coord: Coord) -> Option<&Voxel> {
        self.voxels().iter().find(|v| v.coord == coord)
    }

    /// Number of frames per curve (0 for an empty source).
    fn n_frames(&self) -> usize {
        self.voxels().first().map_or(0, |v| v.curve.len())
    }
}

/// Iterate the voxels a run should see.
pub fn active_voxels<'a>(
    source: &'a dyn VoxelSource,
    skip_noise: bool,
) -> impl Iterator<Item = &'a Voxel> + 'a {
    source
        .voxels()
        .iter()
        .filter(move |v| !(skip_noise && source.is_noise(&v.curve)))
}

/// Noise heuristics for [`VoxelSet`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum NoiseRule {
    /// Nothing is noise.
    #[default]
    None,
    /// Low-signal heuristic.
    ///
    /// A curve is noise when its standard deviation exceeds 100 times its
    /// mean, when its mean is below a third of the mean amplitude of the whole
    /// set, or when `|min| >= max`.
    Amplitude,
}

/// In-memory voxel source.
#[derive(Debug, Clone)]
pub struct VoxelSet {
    voxels: Vec<Voxel>,
    rule: NoiseRule,
    mean_amplitude: f64,
}

impl VoxelSet {
    /// Build a set from voxels, checking that every curve has the same length.
    pub fn new(voxels: Vec<Voxel>) -> Result<Self> {
        let first = voxels.first().ok_or(Error::EmptyInput)?;
        let frames = first.curve.len();
        if frames == 0 {
            return Err(Error::EmptyInput);
        }
        if let Some(bad) = voxels.iter().find(|v| v.curve.len() != frames) {
            return Err(Error::DimensionMismatch {
                expected: frames,
                found: bad.curve.len(),
            });
        }
        let mean_amplitude =
            voxels.iter().map(|v| stats::mean(&v.curve)).sum::<f64>() / voxels.len() as f64;
        Ok(Self {
            voxels,
            rule: NoiseRule::None,
            mean_amplitude,
        })
    }

    /// Build a set from a dense volume, dropping masked (all-zero) voxels.
    ///
    /// `data` is frame-major: frame `t`, slice `z` (0-based), row `y`, column
    /// `x` lives at `((t * slices + z) * height + y) * width + x`. Voxels are
    /// emitted x-fastest, then y, then slice.
    pub fn from_volume(
        width: usize,
        height: usize,
        slices: usize,
        frames: usize,
        data: &[f64],
    ) -> Result<Self> {
        let expected = width * height * slices * frames;
        if data.len() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                found: data.len(),
            });
        }
        let plane = width * height;
        let volume = plane * slices;
        let mut voxels = Vec::new();
        for z in 0..slices {
            for y in 0..height {
                for x in 0..width {
                    let offset = z * plane + y * width + x;
                    let curve: Vec<f64> = (0..frames).map(|t| data[t * volume + offset]).collect();
                    if !is_masked(&curve) {
                        voxels.push(Voxel::new(x, y, z + 1, curve));
                    }
                }
            }
        }
        Self::new(voxels)
    }

    /// Attach a noise rule.
    pub fn with_noise_rule(mut self, rule: NoiseRule) -> Self {
        self.rule = rule;
        self
    }

    /// Number of voxels.
    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    /// Whether the set is empty (never true for a constructed set).
    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    /// Mean of the per-voxel mean amplitudes.
    pub fn mean_amplitude(&self) -> f64 {
        self.mean_amplitude
    }
}

impl VoxelSource for VoxelSet {
    fn voxels(&self) -> &[Voxel] {
        &self.voxels
    }

    fn is_noise(&self, curve: &[f64]) -> bool {
        match self.rule {
            NoiseRule::None => false,
            NoiseRule::Amplitude => {
                let sd = stats::variance(curve).sqrt();
                let m = stats::mean(curve);
                let min = curve.iter().copied().fold(f64::INFINITY, f64::min);
                sd > 100.0 * m || m < self.mean_amplitude / 3.0 || min.abs() >= stats::peak(curve)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_volume_orders_x_fastest_and_drops_masked() -> Result<()> {
        // 2x1x2 volume, 2 frames. Voxel (1,0,slice 1) is all zero.
        #[rustfmt::skip]
        let data = [
            // frame 0: slice 1 (x=0, x=1), slice 2 (x=0, x=1)
            1.0, 0.0, 3.0, 4.0,
            // frame 1
            2.0, 0.0, 6.0, 8.0,
        ];
        let set = VoxelSet::from_volume(2, 1, 2, 2, &data)?;
        let coords: Vec<Coord> = set.voxels().iter().map(|v| v.coord).collect();
        assert_eq!(
            coords,
            vec![Coord::new(0, 0, 1), Coord::new(0, 0, 2), Coord::new(1, 0, 2)]
        );
        assert_eq!(set.voxels()[2].curve, vec![4.0, 8.0]);
        assert_eq!(set.n_frames(), 2);
        Ok(())
    }

    #[test]
    fn test_new_rejects_ragged_curves() {
        let r = VoxelSet::new(vec![
            Voxel::new(0, 0, 1, vec![1.0, 2.0]),
            Voxel::new(1, 0, 1, vec![1.0]),
        ]);
        assert_eq!(
            r.unwrap_err(),
            Error::DimensionMismatch {
                expected: 2,
                found: 1
            }
        );
        assert_eq!(VoxelSet::new(vec![]).unwrap_err(), Error::EmptyInput);
    }

    #[test]
    fn test_amplitude_rule_flags_low_signal() -> Result<()> {
        let set = VoxelSet::new(vec![
            Voxel::new(0, 0, 1, vec![10.0, 20.0, 30.0]),
            Voxel::new(1, 0, 1, vec![12.0, 18.0, 30.0]),
            Voxel::new(2, 0, 1, vec![0.1, 0.2, 0.1]),
        ])?
        .with_noise_rule(NoiseRule::Amplitude);

        assert!(!set.is_noise(&[10.0, 20.0, 30.0]));
        assert!(set.is_noise(&[0.1, 0.2, 0.1]));
        // |min| >= max
        assert!(set.is_noise(&[-40.0, 30.0, 30.0]));

        let kept: Vec<_> = active_voxels(&set, true).map(|v| v.coord.x).collect();
        assert_eq!(kept, vec![0, 1]);
        let all: Vec<_> = active_voxels(&set, false).map(|v| v.coord.x).collect();
        assert_eq!(all, vec![0, 1, 2]);
        Ok(())
    }

    #[test]
    fn test_find_by_coordinate() -> Result<()> {
        let set = VoxelSet::new(vec![Voxel::new(3, 4, 2, vec![1.0])])?;
        assert!(set.find(Coord::new(3, 4, 2)).is_some());
        assert!(set.find(Coord::new(3, 4, 1)).is_none());
        assert!(is_masked(&[0.0, 0.0]));
        assert!(!is_masked(&[0.0, 1e-9]));
        Ok(())
    }
}
