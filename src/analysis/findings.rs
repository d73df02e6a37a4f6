//! Likely causes of poor page performance.
//!
//! Findings combine the aggregated metrics with the representative trial's
//! audit flags and diagnostics into a short prioritized list. LCP reasons
//! are the subset that explain a slow LCP, in the order they were checked.

use crate::audit::extractor::{
    BOOTUP_AUDIT, CLS_AUDIT, FCP_AUDIT, INP_AUDIT, LCP_AUDIT, RENDER_BLOCKING_AUDIT, TBT_AUDIT,
    TTFB_AUDIT, UNUSED_JS_AUDIT,
};
use crate::models::{AuditFlags, Diagnostics, Finding, FindingLevel, LcpReason, Metric, MetricSet};

const SLOW_LCP_MS: f64 = 4000.0;
const SLOW_TTFB_MS: f64 = 1200.0;
const SLOW_INP_MS: f64 = 500.0;
const HIGH_CLS: f64 = 0.25;
const HIGH_TBT_MS: f64 = 600.0;
const SLOW_FCP_MS: f64 = 3000.0;

/// Build the findings for one URL, most severe first.
pub fn build_findings(metrics: &MetricSet, flags: &AuditFlags, diagnostics: &Diagnostics) -> Vec<Finding> {
    let mut findings = Vec::new();

    let mut add = |level, metric, title: &str, detail: String, value: Option<f64>, audit_id: &str| {
        findings.push(Finding {
            level,
            metric,
            title: title.to_string(),
            detail,
            value,
            audit_id: audit_id.to_string(),
            evidence: diagnostics.evidence.get(audit_id).cloned(),
        });
    };

    if let Some(lcp) = metrics.lcp.filter(|&v| v > SLOW_LCP_MS) {
        add(
            FindingLevel::High,
            Metric::Lcp,
            "Slow LCP",
            format!(
                "LCP ~{:.2}s. Check the LCP resource request, render-blocking, decode and main-thread work.",
                lcp / 1000.0
            ),
            Some(lcp),
            LCP_AUDIT,
        );
    }

    if let Some(ttfb) = metrics.ttfb.filter(|&v| v > SLOW_TTFB_MS) {
        add(
            FindingLevel::High,
            Metric::Ttfb,
            "High TTFB (slow backend, gateway or CDN origin)",
            format!(
                "TTFB ~{:.2}s. Check CDN hit rate, origin latency, API time and redirect chains.",
                ttfb / 1000.0
            ),
            Some(ttfb),
            TTFB_AUDIT,
        );
    }

    if let Some(inp) = metrics.inp.filter(|&v| v > SLOW_INP_MS) {
        add(
            FindingLevel::High,
            Metric::Inp,
            "Slow interaction response (high INP)",
            format!(
                "INP ~{}ms. Look for long tasks, main-thread blocking and third-party scripts.",
                inp.round()
            ),
            Some(inp),
            INP_AUDIT,
        );
    }

    if let Some(cls) = metrics.cls.filter(|&v| v > HIGH_CLS) {
        add(
            FindingLevel::Medium,
            Metric::Cls,
            "Noticeable layout shift (high CLS)",
            format!(
                "CLS ~{:.3}. Reserve space for images, ads and lazy content; review font loading.",
                cls
            ),
            Some(cls),
            CLS_AUDIT,
        );
    }

    if let Some(tbt) = metrics.tbt.filter(|&v| v > HIGH_TBT_MS) {
        add(
            FindingLevel::Medium,
            Metric::Tbt,
            "Main thread blocked (high TBT)",
            format!(
                "TBT ~{}ms. Common causes: large bundles, heavy initialization, third-party scripts.",
                tbt.round()
            ),
            Some(tbt),
            TBT_AUDIT,
        );
    }

    if let Some(fcp) = metrics.fcp.filter(|&v| v > SLOW_FCP_MS) {
        add(
            FindingLevel::Medium,
            Metric::Fcp,
            "Slow first contentful paint (high FCP)",
            format!(
                "FCP ~{:.2}s. Review critical CSS, above-the-fold resource priority and blocking scripts.",
                fcp / 1000.0
            ),
            Some(fcp),
            FCP_AUDIT,
        );
    }

    if flags.lcp_lazy_loaded {
        add(
            FindingLevel::High,
            Metric::Lcp,
            "LCP element is lazy-loaded",
            "Do not lazy-load the largest above-the-fold element.".to_string(),
            metrics.lcp,
            "lcp-lazy-loaded",
        );
    }

    if flags.needs_prioritize_lcp_image {
        add(
            FindingLevel::High,
            Metric::Lcp,
            "LCP image is not prioritized (missing preload or fetchpriority)",
            "Preload the LCP image or set fetchpriority=high.".to_string(),
            metrics.lcp,
            "prioritize-lcp-image",
        );
    }

    if let Some(ref resource) = diagnostics.render_blocking {
        add(
            FindingLevel::Medium,
            Metric::Fcp,
            "Render-blocking resources (CSS or synchronous JS)",
            format!(
                "Worst blocking resource: {} (~{}ms)",
                resource.url,
                resource.wasted_ms.round()
            ),
            None,
            RENDER_BLOCKING_AUDIT,
        );
    }

    if flags.heavy_bootup {
        add(
            FindingLevel::Medium,
            Metric::Tbt,
            "Expensive JS startup (high bootup-time)",
            "Split bundles, defer non-critical code, trim polyfills and over-transpiled output."
                .to_string(),
            metrics.tbt,
            BOOTUP_AUDIT,
        );
    }

    if flags.lots_unused_js {
        add(
            FindingLevel::Low,
            Metric::Tbt,
            "Large amount of unused JavaScript",
            "Shipping less JS up front indirectly improves LCP, FCP and INP.".to_string(),
            None,
            UNUSED_JS_AUDIT,
        );
    }

    findings.sort_by(|a, b| {
        a.level.cmp(&b.level).then_with(|| {
            b.value
                .unwrap_or(0.0)
                .total_cmp(&a.value.unwrap_or(0.0))
        })
    });

    findings
}

/// Suspected reasons for a slow LCP. When LCP is slow and nothing more
/// specific applies, a generic reason is given.
pub fn build_lcp_reasons(
    metrics: &MetricSet,
    flags: &AuditFlags,
    diagnostics: &Diagnostics,
) -> Vec<LcpReason> {
    let mut reasons = Vec::new();
    let mut add = |level, title: &str, detail: String| {
        reasons.push(LcpReason {
            level,
            title: title.to_string(),
            detail,
        });
    };

    if let Some(ttfb) = metrics.ttfb.filter(|&v| v > SLOW_TTFB_MS) {
        add(
            FindingLevel::High,
            "High TTFB (slow backend, gateway or CDN origin)",
            format!(
                "TTFB ~{:.2}s. Check CDN hit rate, origin latency, API time and redirect chains.",
                ttfb / 1000.0
            ),
        );
    }

    if flags.lcp_lazy_loaded {
        add(
            FindingLevel::High,
            "LCP element is lazy-loaded",
            "Do not lazy-load the largest above-the-fold element.".to_string(),
        );
    }

    if flags.needs_prioritize_lcp_image {
        add(
            FindingLevel::High,
            "LCP image is not prioritized (missing preload or fetchpriority)",
            "Preload the LCP image or set fetchpriority=high, and serve it compressed from a CDN."
                .to_string(),
        );
    }

    if let Some(ref resource) = diagnostics.render_blocking {
        add(
            FindingLevel::Medium,
            "Render-blocking resources (CSS or synchronous JS)",
            format!("Example blocking resource: {}", resource.url),
        );
    }

    if let Some(tbt) = metrics.tbt.filter(|&v| v > HIGH_TBT_MS) {
        add(
            FindingLevel::Medium,
            "Main thread blocked (high TBT) delays rendering and LCP",
            format!(
                "TBT ~{}ms. Common causes: large bundles, heavy initialization, third-party scripts.",
                tbt.round()
            ),
        );
    }

    if flags.heavy_bootup {
        add(
            FindingLevel::Medium,
            "Expensive JS startup (high bootup-time)",
            "Split bundles, defer non-critical code, trim polyfills and delay third-party scripts."
                .to_string(),
        );
    }

    if flags.lots_unused_js {
        add(
            FindingLevel::Low,
            "Large amount of unused JavaScript",
            "Shipping less JS up front indirectly improves LCP, FCP and INP.".to_string(),
        );
    }

    if reasons.is_empty() && metrics.lcp.is_some_and(|v| v > SLOW_LCP_MS) {
        reasons.push(LcpReason {
            level: FindingLevel::Medium,
            title: "LCP slow but no explicit diagnosis".to_string(),
            detail: "Check a performance trace: the LCP resource request, CSS blocking, long tasks, and image decode and paint."
                .to_string(),
        });
    }

    reasons
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BlockingResource;

    #[test]
    fn test_healthy_page_has_no_findings() {
        let metrics = MetricSet {
            perf_score: Some(0.98),
            lcp: Some(1200.0),
            inp: Some(80.0),
            cls: Some(0.01),
            tbt: Some(50.0),
            fcp: Some(900.0),
            ttfb: Some(200.0),
        };
        assert!(build_findings(&metrics, &AuditFlags::default(), &Diagnostics::default()).is_empty());
    }

    #[test]
    fn test_findings_sorted_by_level_then_value() {
        let metrics = MetricSet {
            lcp: Some(5200.0),
            ttfb: Some(1500.0),
            tbt: Some(900.0),
            ..Default::default()
        };
        let flags = AuditFlags {
            lots_unused_js: true,
            ..Default::default()
        };
        let diagnostics = Diagnostics {
            render_blocking: Some(BlockingResource {
                url: "https://example.com/app.css".to_string(),
                wasted_ms: 450.0,
            }),
            ..Default::default()
        };

        let findings = build_findings(&metrics, &flags, &diagnostics);
        let ids: Vec<&str> = findings.iter().map(|f| f.audit_id.as_str()).collect();

        assert_eq!(
            ids,
            vec![
                LCP_AUDIT,
                TTFB_AUDIT,
                TBT_AUDIT,
                "render-blocking-resources",
                "unused-javascript"
            ]
        );
        assert!(findings[3].detail.contains("app.css"));
    }

    #[test]
    fn test_absent_metrics_produce_no_threshold_findings() {
        let flags = AuditFlags {
            lcp_lazy_loaded: true,
            ..Default::default()
        };
        let findings = build_findings(&MetricSet::default(), &flags, &Diagnostics::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].level, FindingLevel::High);
        assert_eq!(findings[0].value, None);
    }

    #[test]
    fn test_findings_carry_matching_evidence() {
        let metrics = MetricSet {
            lcp: Some(5000.0),
            ..Default::default()
        };
        let flags = AuditFlags {
            heavy_bootup: true,
            ..Default::default()
        };
        let mut diagnostics = Diagnostics::default();
        diagnostics
            .evidence
            .insert(BOOTUP_AUDIT.to_string(), serde_json::json!({ "numericValue": 2600.0 }));

        let findings = build_findings(&metrics, &flags, &diagnostics);

        let bootup = findings.iter().find(|f| f.audit_id == BOOTUP_AUDIT).unwrap();
        assert_eq!(bootup.evidence, Some(serde_json::json!({ "numericValue": 2600.0 })));
        let lcp = findings.iter().find(|f| f.audit_id == LCP_AUDIT).unwrap();
        assert_eq!(lcp.evidence, None);
    }

    #[test]
    fn test_lcp_reasons_keep_check_order() {
        let metrics = MetricSet {
            lcp: Some(5000.0),
            ttfb: Some(1500.0),
            tbt: Some(800.0),
            ..Default::default()
        };
        let flags = AuditFlags {
            lcp_lazy_loaded: true,
            lots_unused_js: true,
            ..Default::default()
        };

        let reasons = build_lcp_reasons(&metrics, &flags, &Diagnostics::default());
        let levels: Vec<FindingLevel> = reasons.iter().map(|r| r.level).collect();

        assert_eq!(
            levels,
            vec![
                FindingLevel::High,
                FindingLevel::High,
                FindingLevel::Medium,
                FindingLevel::Low
            ]
        );
        assert!(reasons[0].title.contains("TTFB"));
        assert!(reasons[1].title.contains("lazy-loaded"));
    }

    #[test]
    fn test_slow_lcp_without_diagnosis_gets_generic_reason() {
        let slow = MetricSet {
            lcp: Some(4500.0),
            ..Default::default()
        };
        let reasons = build_lcp_reasons(&slow, &AuditFlags::default(), &Diagnostics::default());
        assert_eq!(reasons.len(), 1);
        assert_eq!(reasons[0].title, "LCP slow but no explicit diagnosis");
        assert_eq!(reasons[0].level, FindingLevel::Medium);

        let fine = MetricSet {
            lcp: Some(4000.0),
            ..Default::default()
        };
        assert!(build_lcp_reasons(&fine, &AuditFlags::default(), &Diagnostics::default()).is_empty());
    }
}
