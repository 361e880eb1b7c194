//! Fairness, dispersion and percentile metrics over throughput and FCT samples.
//!
//! Every function accepts an empty slice and answers with a fixed fallback
//! instead of dividing by zero:
//!
//! | function                     | empty | degenerate                 |
//! |------------------------------|-------|----------------------------|
//! | [`jains_fairness`]           | 0.0   | sum of squares 0 -> 1.0    |
//! | [`jains_fairness_pooled`]    | 1.0   | n < 2 or sum of squares 0 -> 1.0 |
//! | [`coefficient_of_variation`] | 0.0   | mean 0 -> 0.0              |
//! | [`min_max_ratio`]            | 0.0   | max 0 -> 1.0               |
//! | [`percentile_interpolated`]  | 0.0   |                            |
//! | [`percentile_nearest`]       | 0.0   |                            |
//! | [`mean`]                     | 0.0   |                            |
//!
//! The two Jain's variants and the two percentile methods feed different
//! reports (single-protocol experiments vs. coexistence runs) and are kept
//! as separate functions so their results stay comparable with earlier runs.

use std::cmp::Ordering;

/// Jain's fairness index `(Σx)² / (n·Σx²)` for single-protocol experiments.
///
/// Returns 0.0 for an empty slice and 1.0 when every value is zero.
pub fn jains_fairness(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    jains_ratio(values)
}

/// Jain's fairness index for a pooled set of flows from both protocols.
///
/// Fewer than two flows are trivially fair (1.0), as are all-zero inputs.
pub fn jains_fairness_pooled(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 1.0;
    }
    jains_ratio(values)
}

fn jains_ratio(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let sum: f64 = values.iter().sum();
    let sum_sq: f64 = values.iter().map(|x| x * x).sum();
    if sum_sq == 0.0 {
        return 1.0;
    }
    (sum * sum) / (n * sum_sq)
}

/// Arithmetic mean, 0.0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation divided by the mean.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = mean(values);
    if mean == 0.0 {
        return 0.0;
    }
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt() / mean
}

/// Smallest value over largest value.
pub fn min_max_ratio(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == 0.0 {
        return 1.0;
    }
    min / max
}

/// Percentile with linear interpolation between closest ranks.
///
/// The fractional rank is `k = (n-1)·p/100`; the result interpolates between
/// the values at `floor(k)` and `floor(k)+1`. Used for FCT percentiles.
pub fn percentile_interpolated(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sorted = sorted_copy(values);
    let last = sorted.len() - 1;

    let k = (last as f64 * p / 100.0).max(0.0);
    let floor = (k.floor() as usize).min(last);
    let ceil = if floor < last { floor + 1 } else { floor };
    let frac = k - floor as f64;

    sorted[floor] + (sorted[ceil] - sorted[floor]) * frac
}

/// Non-interpolating percentile: the value at index `floor(n·p/100)`,
/// clamped to the last element. Used for coexistence throughput percentiles.
pub fn percentile_nearest(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sorted = sorted_copy(values);
    let idx = (sorted.len() as f64 * p / 100.0).max(0.0).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted
}
