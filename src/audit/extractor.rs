//! Metric and diagnostic extraction from a Lighthouse result.
//!
//! Every lookup here is an `Option` chain. A missing or malformed section
//! yields an absent value; it never fails the whole extraction.

use crate::models::{
    AuditEvidence, AuditFlags, BlockingResource, Diagnostics, LcpElement, Metric, MetricSet,
};
use serde_json::{json, Value};

pub const LCP_AUDIT: &str = "largest-contentful-paint";
pub const INP_AUDIT: &str = "interaction-to-next-paint";
pub const INP_FALLBACK_AUDIT: &str = "experimental-interaction-to-next-paint";
pub const CLS_AUDIT: &str = "cumulative-layout-shift";
pub const TBT_AUDIT: &str = "total-blocking-time";
pub const FCP_AUDIT: &str = "first-contentful-paint";
pub const TTFB_AUDIT: &str = "server-response-time";

const LCP_ELEMENT_AUDIT: &str = "largest-contentful-paint-element";
pub const RENDER_BLOCKING_AUDIT: &str = "render-blocking-resources";

/// Only the first few render-blocking items are considered.
const RENDER_BLOCKING_WINDOW: usize = 5;

/// Render-blocking items kept as evidence.
const RENDER_BLOCKING_EVIDENCE_ITEMS: usize = 10;

pub const BOOTUP_AUDIT: &str = "bootup-time";
pub const LONG_TASKS_AUDIT: &str = "long-tasks";
pub const MAIN_THREAD_AUDIT: &str = "mainthread-work-breakdown";
pub const UNUSED_JS_AUDIT: &str = "unused-javascript";
pub const DIAGNOSTICS_AUDIT: &str = "diagnostics";
pub const THIRD_PARTY_AUDIT: &str = "third-party-summary";

const HEAVY_BOOTUP_MS: f64 = 2000.0;
const HEAVY_MAIN_THREAD_MS: f64 = 4000.0;
const UNUSED_JS_SAVINGS_MS: f64 = 500.0;

/// Everything read from one Lighthouse result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub metrics: MetricSet,
    pub diagnostics: Diagnostics,
    pub flags: AuditFlags,
}

/// Extract metrics, diagnostics and audit flags from a Lighthouse result.
pub fn extract(lhr: &Value) -> Extraction {
    Extraction {
        metrics: extract_metrics(lhr),
        diagnostics: Diagnostics {
            lcp_element: lcp_element(lhr),
            render_blocking: worst_render_blocking(lhr),
            interaction_target: interaction_target(lhr),
            evidence: extract_evidence(lhr),
        },
        flags: extract_flags(lhr),
    }
}

/// Read the numeric metrics.
pub fn extract_metrics(lhr: &Value) -> MetricSet {
    let mut metrics = MetricSet::default();

    metrics.set(Metric::PerfScore, performance_score(lhr));
    metrics.set(Metric::Lcp, audit_numeric(lhr, LCP_AUDIT));
    metrics.set(
        Metric::Inp,
        audit_numeric(lhr, INP_AUDIT).or_else(|| audit_numeric(lhr, INP_FALLBACK_AUDIT)),
    );
    metrics.set(Metric::Cls, audit_numeric(lhr, CLS_AUDIT));
    metrics.set(Metric::Tbt, audit_numeric(lhr, TBT_AUDIT));
    metrics.set(Metric::Fcp, audit_numeric(lhr, FCP_AUDIT));
    metrics.set(Metric::Ttfb, audit_numeric(lhr, TTFB_AUDIT));

    metrics
}

fn audit<'a>(lhr: &'a Value, id: &str) -> Option<&'a Value> {
    lhr.get("audits")?.get(id)
}

fn finite(value: &Value) -> Option<f64> {
    value.as_f64().filter(|v| v.is_finite())
}

fn audit_numeric(lhr: &Value, id: &str) -> Option<f64> {
    audit(lhr, id)?.get("numericValue").and_then(finite)
}

fn audit_score(lhr: &Value, id: &str) -> Option<f64> {
    audit(lhr, id)?.get("score").and_then(finite)
}

fn audit_items<'a>(lhr: &'a Value, id: &str) -> &'a [Value] {
    audit(lhr, id)
        .and_then(|a| a.get("details"))
        .and_then(|d| d.get("items"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn performance_score(lhr: &Value) -> Option<f64> {
    lhr.get("categories")?
        .get("performance")?
        .get("score")
        .and_then(finite)
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn first_string_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| string_field(value, key))
}

/// LCP element from `details.items[0].items[0].node`.
fn lcp_element(lhr: &Value) -> Option<LcpElement> {
    let node = audit_items(lhr, LCP_ELEMENT_AUDIT)
        .first()?
        .get("items")?
        .as_array()?
        .first()?
        .get("node")?;

    if !node.is_object() {
        return None;
    }

    Some(LcpElement {
        selector: string_field(node, "selector"),
        node_label: string_field(node, "nodeLabel"),
        snippet: string_field(node, "snippet"),
        source_url: first_string_field(node, &["url", "sourceURL", "requestUrl"]),
    })
}

/// The render-blocking resource with the most wasted time among the first
/// few listed. The earliest item wins ties.
fn worst_render_blocking(lhr: &Value) -> Option<BlockingResource> {
    audit_items(lhr, RENDER_BLOCKING_AUDIT)
        .iter()
        .take(RENDER_BLOCKING_WINDOW)
        .filter_map(|item| {
            Some(BlockingResource {
                url: string_field(item, "url")?,
                wasted_ms: item.get("wastedMs").and_then(finite)?,
            })
        })
        .fold(None, |best: Option<BlockingResource>, candidate| match best {
            Some(b) if b.wasted_ms >= candidate.wasted_ms => Some(b),
            _ => Some(candidate),
        })
}

/// Target of the slowest interaction, trying the fallback INP audit when
/// the primary lists no events.
fn interaction_target(lhr: &Value) -> Option<String> {
    let primary = audit_items(lhr, INP_AUDIT);
    let events = if primary.is_empty() {
        audit_items(lhr, INP_FALLBACK_AUDIT)
    } else {
        primary
    };

    slowest_interaction(events).and_then(event_target)
}

fn event_duration(event: &Value) -> Option<f64> {
    event
        .get("duration")
        .and_then(finite)
        .or_else(|| event.get("data")?.get("duration").and_then(finite))
}

fn slowest_interaction(events: &[Value]) -> Option<&Value> {
    events
        .iter()
        .filter_map(|event| Some((event, event_duration(event)?)))
        .fold(None, |best: Option<(&Value, f64)>, (event, duration)| match best {
            Some((_, d)) if d >= duration => best,
            _ => Some((event, duration)),
        })
        .map(|(event, _)| event)
}

fn event_target(event: &Value) -> Option<String> {
    const TARGET_KEYS: [&str; 3] = ["target", "selector", "nodeLabel"];

    event
        .get("data")
        .filter(|d| d.is_object())
        .and_then(|d| first_string_field(d, &TARGET_KEYS))
        .or_else(|| first_string_field(event, &TARGET_KEYS))
        .or_else(|| event.get("node").and_then(|n| string_field(n, "selector")))
}

fn audit_detail<'a>(lhr: &'a Value, id: &str, key: &str) -> Option<&'a Value> {
    audit(lhr, id)?.get("details")?.get(key)
}

/// Boolean hints from secondary audits.
pub fn extract_flags(lhr: &Value) -> AuditFlags {
    let unused_js_savings = audit_detail(lhr, UNUSED_JS_AUDIT, "overallSavingsMs").and_then(finite);

    AuditFlags {
        lcp_lazy_loaded: audit_score(lhr, "lcp-lazy-loaded") == Some(0.0),
        needs_prioritize_lcp_image: audit_score(lhr, "prioritize-lcp-image") == Some(0.0),
        heavy_bootup: audit_numeric(lhr, BOOTUP_AUDIT).is_some_and(|v| v > HEAVY_BOOTUP_MS),
        has_long_tasks: !audit_items(lhr, LONG_TASKS_AUDIT).is_empty(),
        heavy_main_thread: audit_numeric(lhr, MAIN_THREAD_AUDIT)
            .is_some_and(|v| v > HEAVY_MAIN_THREAD_MS),
        lots_unused_js: unused_js_savings.is_some_and(|v| v > UNUSED_JS_SAVINGS_MS),
    }
}

/// Raw data of the secondary audits, for audits present in the document.
pub fn extract_evidence(lhr: &Value) -> AuditEvidence {
    let field = |value: Option<&Value>| value.cloned().unwrap_or(Value::Null);
    let numeric = |id: &str| field(audit(lhr, id).and_then(|a| a.get("numericValue")));
    let items = |id: &str| field(audit_detail(lhr, id, "items"));

    let render_blocking: Vec<Value> = audit_items(lhr, RENDER_BLOCKING_AUDIT)
        .iter()
        .take(RENDER_BLOCKING_EVIDENCE_ITEMS)
        .cloned()
        .collect();

    let candidates = [
        (BOOTUP_AUDIT, json!({ "numericValue": numeric(BOOTUP_AUDIT) })),
        (LONG_TASKS_AUDIT, json!({ "items": items(LONG_TASKS_AUDIT) })),
        (MAIN_THREAD_AUDIT, json!({ "numericValue": numeric(MAIN_THREAD_AUDIT) })),
        (
            UNUSED_JS_AUDIT,
            json!({ "overallSavingsMs": field(audit_detail(lhr, UNUSED_JS_AUDIT, "overallSavingsMs")) }),
        ),
        (RENDER_BLOCKING_AUDIT, json!({ "items": render_blocking })),
        (
            DIAGNOSTICS_AUDIT,
            json!({ "details": field(audit(lhr, DIAGNOSTICS_AUDIT).and_then(|a| a.get("details"))) }),
        ),
        (THIRD_PARTY_AUDIT, json!({ "items": items(THIRD_PARTY_AUDIT) })),
    ];

    candidates
        .into_iter()
        .filter(|(id, _)| audit(lhr, id).is_some())
        .map(|(id, payload)| (id.to_string(), payload))
        .collect()
}
