//! Before/after comparison of two JSON reports.
//!
//! URLs are paired across the two runs and each metric is averaged over the
//! pairs where both runs have a value.

use crate::models::{Metric, Report};
use crate::report::generator::format_metric;
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

/// Metrics in comparison order.
pub const COMPARED_METRICS: [Metric; 7] = [
    Metric::PerfScore,
    Metric::Lcp,
    Metric::Tbt,
    Metric::Fcp,
    Metric::Cls,
    Metric::Ttfb,
    Metric::Inp,
];

/// Change in one metric between two runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricDelta {
    pub metric: Metric,
    /// URL pairs where both runs had a value.
    pub samples: usize,
    pub old_avg: f64,
    pub new_avg: f64,
    /// `new_avg - old_avg`.
    pub diff: f64,
    /// Positive means better, whichever direction the metric improves in.
    pub improvement_pct: f64,
}

/// Result of comparing two reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub common_urls: usize,
    pub only_old: usize,
    pub only_new: usize,
    pub deltas: Vec<MetricDelta>,
}

/// Load a report previously written as `report.json`.
pub fn load_report(path: &Path) -> Result<Report> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read report: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse report: {}", path.display()))
}

/// Compare two reports URL by URL. Failed URLs are left out on both sides.
pub fn compare_reports(old: &Report, new: &Report) -> Comparison {
    let old_by_url: HashMap<&str, _> = old
        .results
        .iter()
        .filter_map(|r| r.as_measured())
        .map(|m| (m.url.as_str(), m))
        .collect();
    let new_by_url: HashMap<&str, _> = new
        .results
        .iter()
        .filter_map(|r| r.as_measured())
        .map(|m| (m.url.as_str(), m))
        .collect();

    let pairs: Vec<_> = new
        .results
        .iter()
        .filter_map(|r| r.as_measured())
        .filter_map(|n| old_by_url.get(n.url.as_str()).map(|o| (*o, n)))
        .collect();

    let deltas = COMPARED_METRICS
        .iter()
        .filter_map(|&metric| {
            let values: Vec<(f64, f64)> = pairs
                .iter()
                .filter_map(|(o, n)| Some((o.metrics.get(metric)?, n.metrics.get(metric)?)))
                .collect();
            if values.is_empty() {
                return None;
            }

            let count = values.len() as f64;
            let old_avg = values.iter().map(|(o, _)| o).sum::<f64>() / count;
            let new_avg = values.iter().map(|(_, n)| n).sum::<f64>() / count;
            Some(MetricDelta {
                metric,
                samples: values.len(),
                old_avg,
                new_avg,
                diff: new_avg - old_avg,
                improvement_pct: improvement_pct(metric, old_avg, new_avg),
            })
        })
        .collect();

    Comparison {
        common_urls: pairs.len(),
        only_old: old_by_url
            .keys()
            .filter(|url| !new_by_url.contains_key(*url))
            .count(),
        only_new: new_by_url
            .keys()
            .filter(|url| !old_by_url.contains_key(*url))
            .count(),
        deltas,
    }
}

fn improvement_pct(metric: Metric, old_avg: f64, new_avg: f64) -> f64 {
    if old_avg == 0.0 {
        return 0.0;
    }
    let change = (new_avg - old_avg) / old_avg * 100.0;
    if metric.higher_is_better() {
        change
    } else {
        -change
    }
}

fn format_diff(metric: Metric, diff: f64) -> String {
    let sign = if diff < 0.0 { "-" } else { "+" };
    format!("{}{}", sign, format_metric(metric, Some(diff.abs())))
}

/// Render the comparison as a plain-text table.
pub fn format_comparison(comparison: &Comparison) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "Compared {} URLs ({} only in old, {} only in new)\n\n",
        comparison.common_urls, comparison.only_old, comparison.only_new
    ));

    if comparison.deltas.is_empty() {
        output.push_str("No metrics to compare.\n");
        return output;
    }

    output.push_str(&format!(
        "{:<8} {:>10} {:>10} {:>10} {:>9}\n",
        "Metric", "Old", "New", "Diff", "Change"
    ));
    output.push_str(&format!("{}\n", "-".repeat(51)));

    for delta in &comparison.deltas {
        let marker = if delta.improvement_pct > 0.0 {
            "better"
        } else if delta.improvement_pct < 0.0 {
            "worse"
        } else {
            ""
        };
        output.push_str(&format!(
            "{:<8} {:>10} {:>10} {:>10} {:>+8.1}% {}\n",
            delta.metric.label(),
            format_metric(delta.metric, Some(delta.old_avg)),
            format_metric(delta.metric, Some(delta.new_avg)),
            format_diff(delta.metric, delta.diff),
            delta.improvement_pct,
            marker
        ));
    }

    output
}
