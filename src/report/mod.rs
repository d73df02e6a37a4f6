//! Report output: JSON, CSV, Markdown and run-to-run comparison.

pub mod compare;
pub mod generator;

pub use compare::{compare_reports, format_comparison, load_report};
pub use generator::{format_metric, write_reports};
