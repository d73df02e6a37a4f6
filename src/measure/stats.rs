//! Robust statistics and grading.

use crate::models::{Grade, Metric};

/// Median of the samples. Even-sized samples average the two middle values.
pub fn median(values: &[f64]) -> Option<f64> {
    let sorted = sorted_finite(values);
    if sorted.is_empty() {
        return None;
    }

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

/// Percentile `p` (0..=1) with linear interpolation between the two
/// nearest ranks.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    let sorted = sorted_finite(values);
    match sorted.len() {
        0 => None,
        1 => Some(sorted[0]),
        n => {
            let idx = (n - 1) as f64 * p.clamp(0.0, 1.0);
            let lo = idx.floor() as usize;
            let hi = (lo + 1).min(n - 1);
            let frac = idx - lo as f64;
            Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
        }
    }
}

/// Arithmetic mean.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// `(good, needs_improvement)` upper bounds, both inclusive.
pub fn thresholds(metric: Metric) -> Option<(f64, f64)> {
    match metric {
        Metric::Lcp => Some((2500.0, 4000.0)),
        Metric::Inp => Some((200.0, 500.0)),
        Metric::Cls => Some((0.1, 0.25)),
        Metric::Tbt => Some((200.0, 600.0)),
        Metric::Fcp => Some((1800.0, 3000.0)),
        Metric::Ttfb => Some((800.0, 1800.0)),
        Metric::PerfScore => None,
    }
}

/// Grade a metric value. Absent values and ungraded metrics are N/A.
pub fn grade(metric: Metric, value: Option<f64>) -> Grade {
    let (Some(value), Some((good, ni))) = (value, thresholds(metric)) else {
        return Grade::NotApplicable;
    };

    if value <= good {
        Grade::Good
    } else if value <= ni {
        Grade::NeedsImprovement
    } else {
        Grade::Poor
    }
}
