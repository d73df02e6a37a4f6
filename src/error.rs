//! Error types.
//!
//! Configuration errors abort the run before any trial starts. Trial errors
//! are recorded on the trial that produced them and never escape the
//! per-URL coordinator.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Invalid run configuration. Fatal to the whole run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("--repeats must be >= 1 (got {0})")]
    InvalidRepeats(usize),

    #[error("--concurrency must be >= 1 (got {0})")]
    InvalidConcurrency(usize),

    #[error("no URLs to measure: provide --url or a non-empty --urls-file")]
    NoUrls,

    #[error("URL listed more than once: {0}")]
    DuplicateUrl(String),
}

/// Failure of a single Lighthouse invocation.
#[derive(Debug, Error)]
pub enum TrialError {
    #[error("failed to create output directory {}: {source}", .path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "command not found: {0}. Install Lighthouse (npm i -g lighthouse) or use --prefer-npx"
    )]
    ToolNotFound(String),

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Lighthouse timed out after {:?}", .0)]
    Timeout(Duration),

    #[error("Lighthouse failed (rc={code}):\n{output}")]
    ToolFailed { code: i32, output: String },

    #[error("failed to read Lighthouse result {}: {source}", .path.display())]
    ArtifactRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed Lighthouse result {}: {source}", .path.display())]
    MalformedArtifact {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
