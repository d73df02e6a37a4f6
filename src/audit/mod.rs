//! Lighthouse invocation and result extraction.

pub mod extractor;
pub mod runner;

pub use runner::{LighthouseConfig, LighthouseRunner, TrialExecutor};
