//! Report generation.
//!
//! This module renders a finished [`Report`] as JSON, as a CSV table with
//! one row per URL, and as a Markdown summary centred on attribution.

use crate::config::ReportConfig;
use crate::models::{AttributionCount, MeasurementResult, Metric, Report, Summary};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Format a duration: seconds with two decimals from 1s up, whole ms below.
pub fn format_ms(value: f64) -> String {
    if value >= 1000.0 {
        format!("{:.2}s", value / 1000.0)
    } else {
        format!("{}ms", value.round() as i64)
    }
}

/// Format a metric value for display. Absent values render empty.
pub fn format_metric(metric: Metric, value: Option<f64>) -> String {
    match value {
        None => String::new(),
        Some(v) if metric.is_duration() => format_ms(v),
        Some(v) if metric == Metric::PerfScore => format!("{}", (v * 100.0).round() as i64),
        Some(v) => format!("{:.3}", v),
    }
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

const CSV_METRIC_COLUMNS: [Metric; 6] = [
    Metric::Lcp,
    Metric::Ttfb,
    Metric::Fcp,
    Metric::Tbt,
    Metric::Cls,
    Metric::Inp,
];

/// Generate the per-URL CSV table.
pub fn generate_csv_report(results: &[MeasurementResult]) -> String {
    let mut header = vec!["URL".to_string(), "Score".to_string()];
    for metric in CSV_METRIC_COLUMNS {
        header.push(metric.label().to_string());
        header.push(format!("{} Grade", metric.label()));
    }
    header.extend(
        [
            "LCP Element",
            "Blocking Resource",
            "Interaction Target",
            "Finding 1",
            "Finding 2",
            "Finding 3",
            "Error",
        ]
        .map(String::from),
    );

    let mut output = csv_row(&header);

    for result in results {
        let row = match result {
            MeasurementResult::Failed(f) => {
                let mut row = vec![f.url.clone()];
                row.resize(header.len() - 1, String::new());
                row.push(f.error.clone());
                row
            }
            MeasurementResult::Measured(m) => {
                let mut row = vec![
                    m.url.clone(),
                    format_metric(Metric::PerfScore, m.metrics.perf_score),
                ];
                for metric in CSV_METRIC_COLUMNS {
                    row.push(format_metric(metric, m.metrics.get(metric)));
                    row.push(m.grade(metric).to_string());
                }
                row.push(
                    m.diagnostics
                        .lcp_element
                        .as_ref()
                        .and_then(|e| e.attribution_key())
                        .unwrap_or_default()
                        .to_string(),
                );
                row.push(
                    m.diagnostics
                        .render_blocking
                        .as_ref()
                        .map(|r| r.url.clone())
                        .unwrap_or_default(),
                );
                row.push(m.diagnostics.interaction_target.clone().unwrap_or_default());
                for i in 0..3 {
                    row.push(
                        m.findings
                            .get(i)
                            .map(|f| f.title.clone())
                            .unwrap_or_default(),
                    );
                }
                row.push(String::new());
                row
            }
        };
        output.push_str(&csv_row(&row));
    }

    output
}

fn csv_row(fields: &[String]) -> String {
    let mut line = fields
        .iter()
        .map(|f| csv_escape(f))
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}

fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Generate the Markdown summary and attribution report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    output.push_str("# lcpscan Report\n\n");
    output.push_str(&generate_metadata_section(report));
    output.push_str(&generate_statistics_section(&report.summary));
    output.push_str(&generate_worst_section(&report.summary));
    output.push_str(&generate_attribution_section(&report.summary));
    output.push_str(&generate_lcp_reasons_section(&report.results));
    output.push_str(&generate_failures_section(&report.results));
    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(report: &Report) -> String {
    let mut section = String::new();
    let s = &report.settings;

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Generated:** {}\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Started:** {}\n",
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Device:** {}\n", s.device));
    section.push_str(&format!("- **Runs per URL:** {}\n", s.repeats));
    section.push_str(&format!("- **Concurrency:** {}\n", s.concurrency));
    section.push_str(&format!(
        "- **URLs:** {} ({} measured, {} failed)\n",
        report.summary.count, report.summary.success, report.summary.failed
    ));
    section.push('\n');

    section
}

fn generate_statistics_section(summary: &Summary) -> String {
    if summary.average.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Overview\n\n");
    section.push_str("| Metric | Average | P75 |\n");
    section.push_str("|:---|---:|---:|\n");

    for metric in Metric::ALL {
        if let Some(avg) = summary.average.get(&metric) {
            section.push_str(&format!(
                "| {} | {} | {} |\n",
                metric,
                format_metric(metric, Some(*avg)),
                format_metric(metric, summary.p75.get(&metric).copied())
            ));
        }
    }
    section.push('\n');

    section
}

fn generate_worst_section(summary: &Summary) -> String {
    let mut section = String::new();

    for metric in Metric::GRADED {
        let Some(rows) = summary.worst.get(&metric).filter(|r| !r.is_empty()) else {
            continue;
        };

        section.push_str(&format!("### Worst {} (top {})\n\n", metric, rows.len()));
        section.push_str("| # | URL | Value |\n");
        section.push_str("|:---:|:---|---:|\n");
        for (i, row) in rows.iter().enumerate() {
            section.push_str(&format!(
                "| {} | {} | {} |\n",
                i + 1,
                row.url,
                format_metric(metric, Some(row.value))
            ));
        }
        section.push('\n');
    }

    if section.is_empty() {
        return section;
    }
    format!("## Worst URLs\n\n{}", section)
}

fn generate_attribution_section(summary: &Summary) -> String {
    let mut section = String::new();

    section.push_str("## Attribution\n\n");

    let tables: [(&str, &[AttributionCount]); 3] = [
        ("LCP Elements", &summary.attribution.lcp_elements),
        ("Render-Blocking Resources", &summary.attribution.blocking_resources),
        ("Slow Interaction Targets", &summary.attribution.interaction_targets),
    ];

    for (title, counts) in tables {
        section.push_str(&format!("### {}\n\n", title));

        if counts.is_empty() {
            section.push_str("No data.\n\n");
            continue;
        }

        section.push_str("| # | Key | URLs |\n");
        section.push_str("|:---:|:---|:---:|\n");
        for (i, entry) in counts.iter().enumerate() {
            section.push_str(&format!(
                "| {} | `{}` | {} |\n",
                i + 1,
                entry.key.replace('|', "\\|"),
                entry.count
            ));
        }
        section.push('\n');
    }

    section
}

fn generate_lcp_reasons_section(results: &[MeasurementResult]) -> String {
    let mut section = String::new();

    for m in results.iter().filter_map(|r| r.as_measured()) {
        if m.lcp_reasons.is_empty() {
            continue;
        }
        section.push_str(&format!(
            "### {} (LCP {})\n\n",
            m.url,
            format_metric(Metric::Lcp, m.metrics.lcp)
        ));
        for reason in &m.lcp_reasons {
            section.push_str(&format!(
                "- **[{}] {}**: {}\n",
                reason.level, reason.title, reason.detail
            ));
        }
        section.push('\n');
    }

    if section.is_empty() {
        return section;
    }
    format!("## LCP Reasons\n\n{}", section)
}

fn generate_failures_section(results: &[MeasurementResult]) -> String {
    let failures: Vec<_> = results
        .iter()
        .filter_map(|r| match r {
            MeasurementResult::Failed(f) => Some(f),
            MeasurementResult::Measured(_) => None,
        })
        .collect();

    if failures.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Failed URLs\n\n");
    for f in failures {
        let first_line = f.error.lines().next().unwrap_or_default();
        section.push_str(&format!("- {}: {}\n", f.url, first_line));
    }
    section.push('\n');

    section
}

fn generate_footer() -> String {
    "---\n\n*Report generated by lcpscan. Lab metrics from Lighthouse; use for regression comparison.*\n"
        .to_string()
}

/// Write every enabled report format into `dir`. Returns the written paths.
pub fn write_reports(report: &Report, config: &ReportConfig, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let mut written = Vec::new();

    if config.json {
        let path = dir.join("report.json");
        write_file(&path, &generate_json_report(report)?)?;
        written.push(path);
    }

    if config.csv {
        let path = dir.join("report.csv");
        write_file(&path, &generate_csv_report(&report.results))?;
        written.push(path);
    }

    if config.markdown {
        let path = dir.join("attribution.md");
        write_file(&path, &generate_markdown_report(report))?;
        written.push(path);
    }

    Ok(written)
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    info!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::{
        AttributionCount, BlockingResource, Device, Diagnostics, Finding, FindingLevel, Grade,
        LcpElement, LcpReason, Measurement, MeasurementFailure, MetricSet, RankedUrl,
    };
    use chrono::Utc;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn create_test_report() -> Report {
        let measured = MeasurementResult::Measured(Measurement {
            url: "https://example.com/".to_string(),
            device: Device::Mobile,
            repeats: 3,
            successful_trials: 3,
            metrics: MetricSet {
                perf_score: Some(0.72),
                lcp: Some(3210.0),
                inp: None,
                cls: Some(0.12),
                tbt: Some(450.0),
                fcp: Some(1400.0),
                ttfb: Some(310.0),
            },
            grades: BTreeMap::from([
                (Metric::Lcp, Grade::NeedsImprovement),
                (Metric::Cls, Grade::NeedsImprovement),
                (Metric::Inp, Grade::NotApplicable),
            ]),
            diagnostics: Diagnostics {
                lcp_element: Some(LcpElement {
                    selector: Some("img.hero".to_string()),
                    ..Default::default()
                }),
                render_blocking: Some(BlockingResource {
                    url: "https://example.com/a,b.css".to_string(),
                    wasted_ms: 200.0,
                }),
                interaction_target: None,
                evidence: Default::default(),
            },
            flags: Default::default(),
            findings: vec![Finding {
                level: FindingLevel::Medium,
                metric: Metric::Fcp,
                title: "Render-blocking resources".to_string(),
                detail: String::new(),
                value: None,
                audit_id: "render-blocking-resources".to_string(),
                evidence: Some(serde_json::json!({ "items": [] })),
            }],
            lcp_reasons: vec![LcpReason {
                level: FindingLevel::Medium,
                title: "Render-blocking resources".to_string(),
                detail: "Example blocking resource: https://example.com/a,b.css".to_string(),
            }],
            sample_artifact: PathBuf::from("lhr/example.lhr.json"),
            errors: vec![],
        });
        let failed = MeasurementResult::Failed(MeasurementFailure {
            url: "https://down.example/".to_string(),
            device: Device::Mobile,
            error: "Lighthouse timed out after 180s".to_string(),
            all_errors: vec!["Lighthouse timed out after 180s".to_string()],
        });

        let mut summary = Summary {
            count: 2,
            success: 1,
            failed: 1,
            ..Default::default()
        };
        summary.average.insert(Metric::Lcp, 3210.0);
        summary.p75.insert(Metric::Lcp, 3210.0);
        summary.worst.insert(
            Metric::Lcp,
            vec![RankedUrl {
                url: "https://example.com/".to_string(),
                value: 3210.0,
            }],
        );
        summary.attribution.lcp_elements = vec![AttributionCount {
            key: "img.hero".to_string(),
            count: 1,
        }];

        Report {
            generated_at: Utc::now(),
            started_at: Utc::now(),
            settings: Config::default().settings(),
            summary,
            results: vec![measured, failed],
        }
    }

    #[test]
    fn test_format_ms() {
        assert_eq!(format_ms(2712.4), "2.71s");
        assert_eq!(format_ms(999.6), "1000ms");
        assert_eq!(format_ms(420.0), "420ms");
    }

    #[test]
    fn test_format_metric() {
        assert_eq!(format_metric(Metric::Lcp, None), "");
        assert_eq!(format_metric(Metric::Cls, Some(0.1234)), "0.123");
        assert_eq!(format_metric(Metric::PerfScore, Some(0.876)), "88");
    }

    #[test]
    fn test_generate_csv_report() {
        let report = create_test_report();
        let csv = generate_csv_report(&report.results);
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("URL,Score,LCP,LCP Grade,TTFB"));
        assert!(lines[1].starts_with("https://example.com/,72,3.21s,NI,310ms,N/A"));
        assert!(lines[1].contains("\"https://example.com/a,b.css\""));
        assert!(lines[1].contains("Render-blocking resources"));
        assert!(lines[2].starts_with("https://down.example/,,"));
        assert!(lines[2].ends_with("Lighthouse timed out after 180s"));

        let columns = lines[0].split(',').count();
        assert_eq!(lines[2].split(',').count(), columns);
    }

    #[test]
    fn test_generate_markdown_report() {
        let report = create_test_report();
        let markdown = generate_markdown_report(&report);

        assert!(markdown.contains("# lcpscan Report"));
        assert!(markdown.contains("## Overview"));
        assert!(markdown.contains("### Worst LCP (top 1)"));
        assert!(markdown.contains("| 1 | `img.hero` | 1 |"));
        assert!(markdown.contains("### Slow Interaction Targets\n\nNo data."));
        assert!(markdown.contains("## LCP Reasons"));
        assert!(markdown.contains("### https://example.com/ (LCP 3.21s)"));
        assert!(markdown.contains("- **[MED] Render-blocking resources**"));
        assert!(markdown.contains("## Failed URLs"));
        assert!(markdown.contains("https://down.example/"));
    }

    #[test]
    fn test_generate_json_report() {
        let report = create_test_report();
        let json = generate_json_report(&report).unwrap();

        assert!(json.contains("\"generated_at\""));
        assert!(json.contains("\"summary\""));
        assert!(json.contains("\"status\": \"failed\""));
        let parsed: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.results, report.results);
    }

    #[test]
    fn test_write_reports_respects_config() {
        let dir = TempDir::new().unwrap();
        let report = create_test_report();
        let config = ReportConfig {
            json: true,
            csv: false,
            markdown: true,
        };

        let written = write_reports(&report, &config, dir.path()).unwrap();

        assert_eq!(written.len(), 2);
        assert!(dir.path().join("report.json").exists());
        assert!(!dir.path().join("report.csv").exists());
        assert!(dir.path().join("attribution.md").exists());
    }
}
