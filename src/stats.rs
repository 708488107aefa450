// Small order statistics shared by the filters and calibrators

use itertools::Itertools;

/// Median of the finite values, averaging the two middle values for even
/// counts. Returns `None` if no finite value is present.
pub fn median(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let sorted = values
        .into_iter()
        .filter(|v| v.is_finite())
        .sorted_by(|a, b| a.total_cmp(b))
        .collect::<Vec<f64>>();

    if sorted.is_empty() {
        return None;
    }
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

pub fn median_or(values: impl IntoIterator<Item = f64>, fallback: f64) -> f64 {
    median(values).unwrap_or(fallback)
}

/// Percentile with linear interpolation between closest ranks, `pct` in
/// [0, 100].
pub fn percentile(values: impl IntoIterator<Item = f64>, pct: f64) -> Option<f64> {
    let sorted = values
        .into_iter()
        .filter(|v| v.is_finite())
        .sorted_by(|a, b| a.total_cmp(b))
        .collect::<Vec<f64>>();

    if sorted.is_empty() {
        return None;
    }
    let rank = (pct.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let weight = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * weight)
}
