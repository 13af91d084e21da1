//! Weighting schemes that turn an ordered history into a single score.
//!
//! Both schemes return weights normalized to sum to 1, so a weighted sum of
//! boolean outcomes always lands in `[0, 1]`.

/// Geometric decay by rank: weight `i` is proportional to `1 / 2^(i+1)`.
///
/// Input order is most-recent-first, so the newest event carries roughly twice
/// the influence of the one before it.
pub fn decay_weights(n: usize) -> Vec<f64> {
    let raw: Vec<f64> = (0..n).map(|i| 0.5f64.powi(rank_exponent(i))).collect();
    normalize(raw)
}

/// Linear recency decay bounded to the lookback window.
///
/// Weight `i` is `(period - age_i) / period`, with ages clamped to `[0, period]`.
/// When every event sits exactly at the window edge all weights are zero.
pub fn recency_weights(period_secs: f64, ages_secs: &[f64]) -> Vec<f64> {
    if period_secs <= 0.0 {
        return vec![0.0; ages_secs.len()];
    }
    let raw: Vec<f64> = ages_secs
        .iter()
        .map(|age| (period_secs - age.clamp(0.0, period_secs)) / period_secs)
        .collect();
    normalize(raw)
}

/// Sum of the weights whose outcome is `true`.
pub fn weighted_sum(weights: &[f64], outcomes: impl IntoIterator<Item = bool>) -> f64 {
    weights
        .iter()
        .zip(outcomes)
        .filter(|(_, hit)| *hit)
        .map(|(w, _)| w)
        .sum()
}

fn rank_exponent(i: usize) -> i32 {
    i32::try_from(i).map_or(i32::MAX, |i| i.saturating_add(1))
}

fn normalize(raw: Vec<f64>) -> Vec<f64> {
    let total: f64 = raw.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return vec![0.0; raw.len()];
    }
    raw.into_iter().map(|w| w / total).collect()
}
