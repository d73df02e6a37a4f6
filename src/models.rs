//! Data models for lcpscan.
//!
//! This module contains the core data structures that flow through the
//! measurement pipeline: per-trial metrics and diagnostics, per-URL
//! measurement results, and the cross-URL summary.

use crate::config::RunSettings;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Device profile passed to Lighthouse as `--form-factor`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Mobile,
    Desktop,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Mobile => write!(f, "mobile"),
            Device::Desktop => write!(f, "desktop"),
        }
    }
}

/// A measured metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Lighthouse performance category score, 0..1.
    PerfScore,
    /// Largest Contentful Paint (ms).
    Lcp,
    /// Interaction to Next Paint (ms).
    Inp,
    /// Cumulative Layout Shift (unitless).
    Cls,
    /// Total Blocking Time (ms).
    Tbt,
    /// First Contentful Paint (ms).
    Fcp,
    /// Time to First Byte (ms).
    Ttfb,
}

impl Metric {
    /// Every metric, in report order.
    pub const ALL: [Metric; 7] = [
        Metric::PerfScore,
        Metric::Lcp,
        Metric::Inp,
        Metric::Cls,
        Metric::Tbt,
        Metric::Fcp,
        Metric::Ttfb,
    ];

    /// Metrics that carry a grade and a worst-N ranking.
    pub const GRADED: [Metric; 6] = [
        Metric::Lcp,
        Metric::Ttfb,
        Metric::Fcp,
        Metric::Tbt,
        Metric::Cls,
        Metric::Inp,
    ];

    /// Short display label.
    pub fn label(&self) -> &'static str {
        match self {
            Metric::PerfScore => "Score",
            Metric::Lcp => "LCP",
            Metric::Inp => "INP",
            Metric::Cls => "CLS",
            Metric::Tbt => "TBT",
            Metric::Fcp => "FCP",
            Metric::Ttfb => "TTFB",
        }
    }

    /// Whether a larger value is better (only the score).
    pub fn higher_is_better(&self) -> bool {
        matches!(self, Metric::PerfScore)
    }

    /// Whether the metric is a duration in milliseconds.
    pub fn is_duration(&self) -> bool {
        !matches!(self, Metric::PerfScore | Metric::Cls)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Numeric metrics for one trial or one aggregated URL.
///
/// `None` means Lighthouse could not compute the value. It is never
/// interchangeable with a measured zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    pub perf_score: Option<f64>,
    pub lcp: Option<f64>,
    pub inp: Option<f64>,
    pub cls: Option<f64>,
    pub tbt: Option<f64>,
    pub fcp: Option<f64>,
    pub ttfb: Option<f64>,
}

impl MetricSet {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::PerfScore => self.perf_score,
            Metric::Lcp => self.lcp,
            Metric::Inp => self.inp,
            Metric::Cls => self.cls,
            Metric::Tbt => self.tbt,
            Metric::Fcp => self.fcp,
            Metric::Ttfb => self.ttfb,
        }
    }

    /// Store a value, dropping anything non-finite.
    pub fn set(&mut self, metric: Metric, value: Option<f64>) {
        let value = value.filter(|v| v.is_finite());
        match metric {
            Metric::PerfScore => self.perf_score = value,
            Metric::Lcp => self.lcp = value,
            Metric::Inp => self.inp = value,
            Metric::Cls => self.cls = value,
            Metric::Tbt => self.tbt = value,
            Metric::Fcp => self.fcp = value,
            Metric::Ttfb => self.ttfb = value,
        }
    }
}

/// Qualitative bucket for a metric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "GOOD")]
    Good,
    #[serde(rename = "NI")]
    NeedsImprovement,
    #[serde(rename = "POOR")]
    Poor,
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grade::Good => write!(f, "GOOD"),
            Grade::NeedsImprovement => write!(f, "NI"),
            Grade::Poor => write!(f, "POOR"),
            Grade::NotApplicable => write!(f, "N/A"),
        }
    }
}

/// The element Lighthouse identified as the LCP candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LcpElement {
    pub selector: Option<String>,
    pub node_label: Option<String>,
    pub snippet: Option<String>,
    pub source_url: Option<String>,
}

impl LcpElement {
    /// Key used to group identical elements across URLs: the selector,
    /// falling back to the source URL.
    pub fn attribution_key(&self) -> Option<&str> {
        self.selector
            .as_deref()
            .or(self.source_url.as_deref())
            .filter(|k| !k.is_empty())
    }
}

/// The worst render-blocking resource of a trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockingResource {
    pub url: String,
    pub wasted_ms: f64,
}

/// Qualitative attribution for one trial.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub lcp_element: Option<LcpElement>,
    pub render_blocking: Option<BlockingResource>,
    pub interaction_target: Option<String>,
    /// Raw audit payloads keyed by audit id. Reported through findings.
    #[serde(skip)]
    pub evidence: AuditEvidence,
}

/// Selected raw Lighthouse audit data, keyed by audit id.
pub type AuditEvidence = BTreeMap<String, serde_json::Value>;

/// Boolean signals from secondary Lighthouse audits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFlags {
    pub lcp_lazy_loaded: bool,
    pub needs_prioritize_lcp_image: bool,
    pub heavy_bootup: bool,
    pub has_long_tasks: bool,
    pub heavy_main_thread: bool,
    pub lots_unused_js: bool,
}

/// Priority of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FindingLevel {
    #[serde(rename = "HIGH")]
    High,
    #[serde(rename = "MED")]
    Medium,
    #[serde(rename = "LOW")]
    Low,
}

impl fmt::Display for FindingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FindingLevel::High => write!(f, "HIGH"),
            FindingLevel::Medium => write!(f, "MED"),
            FindingLevel::Low => write!(f, "LOW"),
        }
    }
}

/// A likely cause of poor performance, derived from metrics and flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub level: FindingLevel,
    pub metric: Metric,
    pub title: String,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    pub audit_id: String,
    /// Raw audit data backing the finding, when Lighthouse reported any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<serde_json::Value>,
}

/// A suspected reason for a slow LCP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LcpReason {
    pub level: FindingLevel,
    pub title: String,
    pub detail: String,
}

/// One Lighthouse execution against one URL.
#[derive(Debug, Clone)]
pub struct Trial {
    pub url: String,
    pub device: Device,
    pub artifact_path: PathBuf,
    pub metrics: MetricSet,
    pub diagnostics: Diagnostics,
    pub flags: AuditFlags,
    pub error: Option<String>,
}

impl Trial {
    /// A trial that produced no usable result.
    pub fn failed(url: &str, device: Device, artifact_path: PathBuf, error: String) -> Self {
        Self {
            url: url.to_string(),
            device,
            artifact_path,
            metrics: MetricSet::default(),
            diagnostics: Diagnostics::default(),
            flags: AuditFlags::default(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregated outcome for a URL with at least one successful trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub url: String,
    pub device: Device,
    /// Trials requested.
    pub repeats: usize,
    /// Trials that produced a result.
    pub successful_trials: usize,
    /// Per-metric median across successful trials.
    pub metrics: MetricSet,
    pub grades: BTreeMap<Metric, Grade>,
    /// Diagnostics of the representative trial.
    pub diagnostics: Diagnostics,
    pub flags: AuditFlags,
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub lcp_reasons: Vec<LcpReason>,
    /// Lighthouse result of the representative trial.
    pub sample_artifact: PathBuf,
    /// Failures of individual trials that were tolerated.
    pub errors: Vec<String>,
}

impl Measurement {
    pub fn grade(&self, metric: Metric) -> Grade {
        self.grades
            .get(&metric)
            .copied()
            .unwrap_or(Grade::NotApplicable)
    }
}

/// Outcome for a URL where every trial failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementFailure {
    pub url: String,
    pub device: Device,
    /// Short summary of the first few distinct errors.
    pub error: String,
    pub all_errors: Vec<String>,
}

/// Per-URL outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum MeasurementResult {
    Measured(Measurement),
    Failed(MeasurementFailure),
}

impl MeasurementResult {
    pub fn url(&self) -> &str {
        match self {
            MeasurementResult::Measured(m) => &m.url,
            MeasurementResult::Failed(f) => &f.url,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, MeasurementResult::Measured(_))
    }

    pub fn as_measured(&self) -> Option<&Measurement> {
        match self {
            MeasurementResult::Measured(m) => Some(m),
            MeasurementResult::Failed(_) => None,
        }
    }
}

/// A URL paired with one of its metric values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedUrl {
    pub url: String,
    pub value: f64,
}

/// How often one attribution key occurred across the URL set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionCount {
    pub key: String,
    pub count: usize,
}

/// Frequency tables of diagnosed bottlenecks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    pub lcp_elements: Vec<AttributionCount>,
    pub blocking_resources: Vec<AttributionCount>,
    pub interaction_targets: Vec<AttributionCount>,
}

/// Cross-URL rollup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub count: usize,
    pub success: usize,
    pub failed: usize,
    pub average: BTreeMap<Metric, f64>,
    pub p75: BTreeMap<Metric, f64>,
    pub worst: BTreeMap<Metric, Vec<RankedUrl>>,
    pub attribution: Attribution,
}

/// The complete run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub settings: RunSettings,
    pub summary: Summary,
    pub results: Vec<MeasurementResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_set_drops_non_finite() {
        let mut m = MetricSet::default();
        m.set(Metric::Lcp, Some(f64::NAN));
        m.set(Metric::Cls, Some(f64::INFINITY));
        m.set(Metric::Tbt, Some(0.0));
        assert_eq!(m.get(Metric::Lcp), None);
        assert_eq!(m.get(Metric::Cls), None);
        assert_eq!(m.get(Metric::Tbt), Some(0.0));
    }

    #[test]
    fn test_lcp_element_key_falls_back_to_source_url() {
        let element = LcpElement {
            source_url: Some("https://cdn.example.com/hero.jpg".to_string()),
            ..Default::default()
        };
        assert_eq!(
            element.attribution_key(),
            Some("https://cdn.example.com/hero.jpg")
        );

        let element = LcpElement {
            selector: Some("img.hero".to_string()),
            ..element
        };
        assert_eq!(element.attribution_key(), Some("img.hero"));

        assert_eq!(LcpElement::default().attribution_key(), None);
    }

    #[test]
    fn test_finding_level_ordering() {
        assert!(FindingLevel::High < FindingLevel::Medium);
        assert!(FindingLevel::Medium < FindingLevel::Low);
    }

    #[test]
    fn test_measurement_result_serializes_with_status_tag() {
        let failed = MeasurementResult::Failed(MeasurementFailure {
            url: "https://example.com".to_string(),
            device: Device::Mobile,
            error: "boom".to_string(),
            all_errors: vec!["boom".to_string()],
        });

        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["device"], "mobile");
        assert_eq!(json["error"], "boom");
    }

    #[test]
    fn test_grade_display() {
        assert_eq!(Grade::Good.to_string(), "GOOD");
        assert_eq!(Grade::NeedsImprovement.to_string(), "NI");
        assert_eq!(Grade::Poor.to_string(), "POOR");
        assert_eq!(Grade::NotApplicable.to_string(), "N/A");
    }
}
