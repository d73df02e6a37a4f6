//! Cross-URL aggregation and statistics.
//!
//! This module folds every per-URL result into a [`Summary`]: averages and
//! 75th percentiles, worst-N rankings per metric, and frequency tables of
//! the diagnosed bottlenecks.

use crate::measure::stats::{mean, percentile};
use crate::models::{
    Attribution, AttributionCount, Measurement, MeasurementResult, Metric, RankedUrl, Summary,
};
use std::collections::HashMap;

/// Entries kept in each worst-N ranking.
pub const WORST_N: usize = 5;

/// Compute the summary over all results.
pub fn summarize(results: &[MeasurementResult]) -> Summary {
    let measured: Vec<&Measurement> = results.iter().filter_map(|r| r.as_measured()).collect();

    let mut summary = Summary {
        count: results.len(),
        success: measured.len(),
        failed: results.len() - measured.len(),
        ..Default::default()
    };

    for metric in Metric::ALL {
        let values: Vec<f64> = measured
            .iter()
            .filter_map(|m| m.metrics.get(metric))
            .collect();

        if let Some(avg) = mean(&values) {
            summary.average.insert(metric, avg);
        }
        if let Some(p75) = percentile(&values, 0.75) {
            summary.p75.insert(metric, p75);
        }
    }

    for metric in Metric::GRADED {
        summary
            .worst
            .insert(metric, top_worst(&measured, metric, WORST_N));
    }

    summary.attribution = attribution(&measured);

    summary
}

/// The `n` results with the highest value for `metric`. Results without a
/// value are left out; equal values keep their input order.
pub fn top_worst(measured: &[&Measurement], metric: Metric, n: usize) -> Vec<RankedUrl> {
    let mut rows: Vec<RankedUrl> = measured
        .iter()
        .filter_map(|m| {
            Some(RankedUrl {
                url: m.url.clone(),
                value: m.metrics.get(metric)?,
            })
        })
        .collect();

    rows.sort_by(|a, b| b.value.total_cmp(&a.value));
    rows.truncate(n);
    rows
}

/// Count keys and rank them by descending count, ties in first-seen order.
pub fn count_keys<'a, I>(keys: I) -> Vec<AttributionCount>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<AttributionCount> = Vec::new();

    for key in keys {
        match index.get(key).copied() {
            Some(i) => counts[i].count += 1,
            None => {
                index.insert(key, counts.len());
                counts.push(AttributionCount {
                    key: key.to_string(),
                    count: 1,
                });
            }
        }
    }

    // Stable sort keeps first-seen order among equal counts.
    counts.sort_by_key(|c| std::cmp::Reverse(c.count));
    counts
}

fn attribution(measured: &[&Measurement]) -> Attribution {
    Attribution {
        lcp_elements: count_keys(measured.iter().filter_map(|m| {
            m.diagnostics
                .lcp_element
                .as_ref()
                .and_then(|e| e.attribution_key())
        })),
        blocking_resources: count_keys(
            measured
                .iter()
                .filter_map(|m| m.diagnostics.render_blocking.as_ref())
                .map(|r| r.url.as_str()),
        ),
        interaction_targets: count_keys(
            measured
                .iter()
                .filter_map(|m| m.diagnostics.interaction_target.as_deref()),
        ),
    }
}
