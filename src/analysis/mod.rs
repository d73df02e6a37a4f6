//! Cross-URL analysis.
//!
//! Summary statistics and attribution over all measured URLs, plus
//! per-URL findings.

pub mod aggregator;
pub mod findings;

pub use aggregator::*;
pub use findings::{build_findings, build_lcp_reasons};
