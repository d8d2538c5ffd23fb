//! Numeric helpers over time-activity curves.
//!
//! Everything here works on plain `&[f64]` slices. Functions that can be
//! undefined (zero variance, empty input) return `NaN` and leave the policy
//! to the caller; metrics turn `NaN` into [`crate::metric::MAX_DISTANCE`].

/// Smoothing kernel used for seed selection and leader-follower scoring.
pub const SMOOTHING_KERNEL: [f64; 5] = [0.13, 0.185, 0.37, 0.185, 0.13];

/// Maximum sample of a curve (`-inf` for an empty curve).
pub fn peak(curve: &[f64]) -> f64 {
    curve.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// Index of the first maximum. `NaN` samples never win; returns 0 for an
/// empty or all-`NaN` slice.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    let mut best_val = f64::NEG_INFINITY;
    for (i, &v) in values.iter().enumerate() {
        if v > best_val {
            best_val = v;
            best = i;
        }
    }
    best
}

/// Arithmetic mean (`NaN` for an empty slice).
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Bias-corrected sample variance (`n - 1` denominator). 0 for a single value.
pub fn variance(values: &[f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return f64::NAN;
    }
    if n == 1 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64
}

/// Pearson product-moment correlation. `NaN` when either input is constant.
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return f64::NAN;
    }
    let (a, b) = (&a[..n], &b[..n]);
    let ma = mean(a);
    let mb = mean(b);
    let mut sab = 0.0;
    let mut saa = 0.0;
    let mut sbb = 0.0;
    for (x, y) in a.iter().zip(b) {
        let dx = x - ma;
        let dy = y - mb;
        sab += dx * dy;
        saa += dx * dx;
        sbb += dy * dy;
    }
    let denom = (saa * sbb).sqrt();
    if denom == 0.0 {
        return f64::NAN;
    }
    (sab / denom).clamp(-1.0, 1.0)
}

/// Fractional ranks (1-based); tied values share the average of their ranks.
pub fn ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&i, &j| values[i].total_cmp(&values[j]));

    let mut out = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // positions start..end (0-based) share rank mean of start+1..=end
        let rank = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            out[idx] = rank;
        }
        start = end;
    }
    out
}

/// Spearman rank correlation (Pearson over average ranks).
pub fn spearman(a: &[f64], b: &[f64]) -> f64 {
    pearson(&ranks(a), &ranks(b))
}

/// Root-mean-square deviation.
pub fn rmsd(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() {
        return f64::NAN;
    }
    (sse(a, b) / a.len() as f64).sqrt()
}

/// Sum of squared differences.
pub fn sse(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Euclidean distance.
pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    sse(a, b).sqrt()
}

/// Five-tap smoothing with [`SMOOTHING_KERNEL`].
///
/// The two samples at each edge are copied unchanged. Every smoothed sample
/// is computed from the raw input, never from already-smoothed neighbours.
pub fn smooth(curve: &[f64]) -> Vec<f64> {
    let mut out = curve.to_vec();
    if curve.len() < 5 {
        return out;
    }
    for i in 2..curve.len() - 2 {
        out[i] = curve[i - 2..=i + 2]
            .iter()
            .zip(SMOOTHING_KERNEL.iter())
            .map(|(v, k)| v * k)
            .sum();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_argmax_takes_first_maximum_and_skips_nan() {
        assert_eq!(argmax(&[1.0, 3.0, 3.0, 2.0]), 1);
        assert_eq!(argmax(&[f64::NAN, -1.0, -2.0]), 1);
        assert_eq!(argmax(&[]), 0);
    }

    #[test]
    fn test_pearson_of_constant_curve_is_nan() {
        assert!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_nan());
        assert_relative_eq!(pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]), 1.0);
        assert_relative_eq!(pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]), -1.0);
    }

    #[test]
    fn test_ranks_average_ties() {
        assert_eq!(ranks(&[10.0, 20.0, 20.0, 5.0]), vec![2.0, 3.5, 3.5, 1.0]);
    }

    #[test]
    fn test_spearman_is_monotone_invariant() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [1.0, 8.0, 27.0, 64.0];
        assert_relative_eq!(spearman(&a, &b), 1.0);
    }

    #[test]
    fn test_smoothing_keeps_edges_and_reads_raw_input() {
        let curve = [0.0, 0.0, 10.0, 0.0, 0.0, 0.0, 0.0];
        let s = smooth(&curve);
        assert_eq!(s[0], 0.0);
        assert_eq!(s[1], 0.0);
        assert_eq!(s[6], 0.0);
        assert_relative_eq!(s[2], 3.7);
        assert_relative_eq!(s[3], 1.85);
        assert_relative_eq!(s[4], 1.3);
        // constant curves are preserved since the kernel sums to one
        let flat = smooth(&[2.0; 8]);
        for v in flat {
            assert_relative_eq!(v, 2.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_short_curves_are_not_smoothed() {
        assert_eq!(smooth(&[1.0, 2.0, 3.0]), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_rmsd_and_variance() {
        assert_relative_eq!(rmsd(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]), (8.0f64 / 3.0).sqrt());
        assert_eq!(variance(&[4.0]), 0.0);
        assert_relative_eq!(variance(&[1.0, 2.0, 3.0, 4.0]), 5.0 / 3.0);
    }
}
