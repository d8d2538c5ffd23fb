//! Initial centroid selection for [`super::KMeans`].
//!
//! Seeding picks `k` distinct, unmasked voxels whose curves become the fixed
//! centroids of the first refinement round.
//!
//! | Strategy | First seed | Further seeds |
//! |---|---|---|
//! | [`Seeding::Random`] | uniform | uniform |
//! | [`Seeding::PlusPlus`] | uniform | sampled with probability ∝ D(x)² |
//! | [`Seeding::LegacyPlusPlus`] | uniform | `argmax u · D(x)² / Σ d(x, s)²` |
//! | [`Seeding::Farthest`] | highest peak (or given) | maximin on smoothed curves |
//! | [`Seeding::Manual`] | given | given, then uniform |
//!
//! `D(x)` is the metric distance from `x` to its nearest seed so far.
//!
//! # Text form
//!
//! Seedings also parse from the compact strings used in saved settings:
//!
//! ```text
//! ""                   random
//! "++"                 k-means++
//! "legacy++"           legacy k-means++ approximation
//! "det++"              deterministic farthest point
//! "det++;x,y,z"        deterministic, starting at (x, y, z)
//! "x,y,z;x,y,z;..."    manual seeds, remaining ones random
//! ```

use crate::error::{Error, Result};
use crate::metric::Metric;
use crate::stats;
use crate::voxel::{is_masked, Coord, Voxel};
use rand::Rng;
use std::fmt;
use std::str::FromStr;

/// How the first round's centroids are chosen.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Seeding {
    /// Uniform draws, rejecting masked and already chosen voxels.
    Random,
    /// k-means++ (Arthur & Vassilvitskii): each further seed is sampled with
    /// probability proportional to its squared distance to the nearest seed.
    #[default]
    PlusPlus,
    /// The historical approximation of k-means++: every candidate draws its
    /// own uniform `u` and the largest `u · D(x)² / Σ d(x, s)²` wins. Not a
    /// proper D² sampler.
    LegacyPlusPlus,
    /// Deterministic maximin. Seed 0 is `first` (or the voxel with the
    /// highest peak), every further seed maximises its minimum distance to
    /// the seeds so far. Distances are taken between smoothed curves.
    Farthest {
        /// Starting coordinate.
        first: Option<Coord>,
    },
    /// Caller-supplied coordinates; missing slots are filled randomly.
    Manual(Vec<Coord>),
}

impl Seeding {
    /// Parse `s`, falling back to [`Seeding::Random`] (with a warning) when
    /// it is malformed.
    pub fn parse_or_random(s: &str) -> Self {
        match s.parse() {
            Ok(seeding) => seeding,
            Err(e) => {
                tracing::warn!(spec = s, error = %e, "malformed seeding, falling back to random");
                Seeding::Random
            }
        }
    }
}

fn parse_coord(s: &str) -> Result<Coord> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [x, y, z] = parts.as_slice() else {
        return Err(Error::InvalidSeedSpec(format!("expected x,y,z, got '{s}'")));
    };
    let num = |v: &str| {
        v.parse::<usize>()
            .map_err(|_| Error::InvalidSeedSpec(format!("'{v}' is not a coordinate")))
    };
    let coord = Coord::new(num(x)?, num(y)?, num(z)?);
    if coord.slice == 0 {
        return Err(Error::InvalidSeedSpec(format!("slice must be >= 1 in '{s}'")));
    }
    Ok(coord)
}

impl FromStr for Seeding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s {
            "" => return Ok(Seeding::Random),
            "++" => return Ok(Seeding::PlusPlus),
            "legacy++" => return Ok(Seeding::LegacyPlusPlus),
            "det++" => return Ok(Seeding::Farthest { first: None }),
            _ => {}
        }
        if let Some(rest) = s.strip_prefix("det++;") {
            return Ok(Seeding::Farthest {
                first: Some(parse_coord(rest)?),
            });
        }
        let coords = s
            .split(';')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(parse_coord)
            .collect::<Result<Vec<_>>>()?;
        Ok(Seeding::Manual(coords))
    }
}

impl fmt::Display for Seeding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seeding::Random => Ok(()),
            Seeding::PlusPlus => f.write_str("++"),
            Seeding::LegacyPlusPlus => f.write_str("legacy++"),
            Seeding::Farthest { first: None } => f.write_str("det++"),
            Seeding::Farthest { first: Some(c) } => write!(f, "det++;{c}"),
            Seeding::Manual(coords) => {
                for c in coords {
                    write!(f, "{c};")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Seeding {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Seeding {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Seed selection over one run's active voxels.
pub(crate) struct Seeder<'a, R: ?Sized> {
    pub voxels: &'a [&'a Voxel],
    pub metric: &'a dyn Metric,
    pub rng: &'a mut R,
    pub max_draws: usize,
}

impl<R: Rng + ?Sized> Seeder<'_, R> {
    /// Indices (into `voxels`) of `k` distinct seeds.
    pub fn select(&mut self, seeding: &Seeding, k: usize) -> Result<Vec<usize>> {
        let mut chosen = Vec::with_capacity(k);
        match seeding {
            Seeding::Random => self.fill_random(&mut chosen, k)?,
            Seeding::PlusPlus => {
                self.fill_random(&mut chosen, 1)?;
                while chosen.len() < k {
                    self.push_plus_plus(&mut chosen)?;
                }
            }
            Seeding::LegacyPlusPlus => {
                self.fill_random(&mut chosen, 1)?;
                while chosen.len() < k {
                    self.push_legacy(&mut chosen)?;
                }
            }
            Seeding::Farthest { first } => self.fill_farthest(&mut chosen, *first, k)?,
            Seeding::Manual(coords) => {
                for &coord in coords {
                    if chosen.len() == k {
                        tracing::warn!(k, given = coords.len(), "more manual seeds than clusters, extra ignored");
                        break;
                    }
                    match self.voxels.iter().position(|v| v.coord == coord) {
                        Some(i) if !chosen.contains(&i) => chosen.push(i),
                        Some(_) => tracing::warn!(%coord, "duplicate manual seed ignored"),
                        None => tracing::warn!(%coord, "manual seed is not an active voxel, ignored"),
                    }
                }
                self.fill_random(&mut chosen, k)?;
            }
        }
        Ok(chosen)
    }

    fn usable(&self, i: usize, chosen: &[usize]) -> bool {
        !chosen.contains(&i) && !is_masked(&self.voxels[i].curve)
    }

    /// Uniform draws until `chosen` holds `k` seeds.
    fn fill_random(&mut self, chosen: &mut Vec<usize>, k: usize) -> Result<()> {
        let n = self.voxels.len();
        while chosen.len() < k {
            let mut attempts = 0;
            loop {
                if attempts == self.max_draws {
                    return Err(Error::SeedingExhausted { attempts });
                }
                attempts += 1;
                let i = self.rng.random_range(0..n);
                if self.usable(i, chosen) {
                    chosen.push(i);
                    break;
                }
            }
        }
        Ok(())
    }

    /// Squared distance from voxel `i` to each seed.
    fn seed_distances(&self, i: usize, chosen: &[usize]) -> Result<Vec<f64>> {
        let curve = &self.voxels[i].curve;
        chosen
            .iter()
            .map(|&s| Ok(self.metric.distance(curve, &self.voxels[s].curve)?.powi(2)))
            .collect()
    }

    fn push_plus_plus(&mut self, chosen: &mut Vec<usize>) -> Result<()> {
        let mut weights = vec![0.0; self.voxels.len()];
        for (i, w) in weights.iter_mut().enumerate() {
            if self.usable(i, chosen) {
                *w = self
                    .seed_distances(i, chosen)?
                    .into_iter()
                    .fold(f64::INFINITY, f64::min);
            }
        }

        // undefined distances count as farthest
        let far: Vec<usize> = (0..weights.len())
            .filter(|&i| weights[i].is_infinite())
            .collect();
        if !far.is_empty() {
            chosen.push(far[self.rng.random_range(0..far.len())]);
            return Ok(());
        }

        let total: f64 = weights.iter().sum();
        let next = chosen.len() + 1;
        if total == 0.0 {
            return self.fill_random(chosen, next);
        }
        let threshold = self.rng.random::<f64>() * total;
        let mut cumsum = 0.0;
        let mut selected = None;
        for (i, &w) in weights.iter().enumerate() {
            if w > 0.0 {
                cumsum += w;
                selected = Some(i);
                if cumsum >= threshold {
                    break;
                }
            }
        }
        match selected {
            Some(i) => {
                chosen.push(i);
                Ok(())
            }
            None => self.fill_random(chosen, next),
        }
    }

    fn push_legacy(&mut self, chosen: &mut Vec<usize>) -> Result<()> {
        let mut best: Option<(usize, f64)> = None;
        for i in 0..self.voxels.len() {
            if !self.usable(i, chosen) {
                continue;
            }
            let d = self.seed_distances(i, chosen)?;
            let nearest = d.iter().copied().fold(f64::INFINITY, f64::min);
            let sum: f64 = d.iter().sum();
            let ratio = if sum == 0.0 {
                0.0
            } else if nearest.is_infinite() {
                1.0
            } else {
                nearest / sum
            };
            let score = self.rng.random::<f64>() * ratio;
            if best.map_or(true, |(_, b)| score > b) {
                best = Some((i, score));
            }
        }
        match best {
            Some((i, _)) => {
                chosen.push(i);
                Ok(())
            }
            None => Err(Error::InvalidClusterCount {
                requested: chosen.len() + 1,
                n_items: self.voxels.len(),
            }),
        }
    }

    fn fill_farthest(&mut self, chosen: &mut Vec<usize>, first: Option<Coord>, k: usize) -> Result<()> {
        let smoothed: Vec<Vec<f64>> = self.voxels.iter().map(|v| stats::smooth(&v.curve)).collect();

        let given = first.and_then(|c| {
            let found = self.voxels.iter().position(|v| v.coord == c);
            if found.is_none() {
                tracing::warn!(coord = %c, "starting point is not an active voxel, using highest peak");
            }
            found
        });
        let start = match given {
            Some(i) => i,
            None => {
                let peaks: Vec<f64> = self.voxels.iter().map(|v| v.peak()).collect();
                stats::argmax(&peaks)
            }
        };
        chosen.push(start);

        while chosen.len() < k {
            let mut best: Option<(usize, f64)> = None;
            for i in 0..self.voxels.len() {
                if chosen.contains(&i) {
                    continue;
                }
                let mut nearest = f64::INFINITY;
                for &s in chosen.iter() {
                    nearest = nearest.min(self.metric.distance(&smoothed[i], &smoothed[s])?);
                }
                if best.map_or(true, |(_, b)| nearest > b) {
                    best = Some((i, nearest));
                }
            }
            let (i, _) = best.ok_or(Error::InvalidClusterCount {
                requested: k,
                n_items: self.voxels.len(),
            })?;
            chosen.push(i);
        }
        Ok(())
    }
}
