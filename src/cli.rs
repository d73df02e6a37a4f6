//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation. Values left unset fall back to `.lcpscan.toml`
//! and then to built-in defaults.

use crate::models::Device;
use clap::Parser;
use std::path::PathBuf;

/// lcpscan - batch Lighthouse runs with stable, multi-trial metrics
///
/// Runs Lighthouse several times per URL, takes the median of each metric,
/// and summarizes which elements and resources keep showing up as
/// bottlenecks across the whole URL list.
///
/// Examples:
///   lcpscan --url https://example.com/
///   lcpscan --urls-file urls.txt --repeats 3 --concurrency 2
///   lcpscan --urls-file urls.txt --device desktop --prefer-npx
///   lcpscan --compare old/report.json new/report.json
///   lcpscan --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Single URL to measure
    #[arg(short, long, value_name = "URL", conflicts_with = "urls_file")]
    pub url: Option<String>,

    /// File with one URL per line (blank lines and # comments are skipped)
    #[arg(short = 'f', long, value_name = "FILE")]
    pub urls_file: Option<PathBuf>,

    /// Device form factor
    #[arg(short, long, value_name = "DEVICE", env = "LCPSCAN_DEVICE")]
    pub device: Option<Device>,

    /// Lighthouse runs per URL; metrics are the median across runs
    #[arg(short, long, value_name = "COUNT", env = "LCPSCAN_REPEATS")]
    pub repeats: Option<usize>,

    /// Number of URLs measured concurrently
    #[arg(long, value_name = "NUM", env = "LCPSCAN_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Timeout for a single Lighthouse run, in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout_sec: Option<u64>,

    /// Output directory for reports and raw Lighthouse results
    #[arg(short, long, value_name = "DIR", env = "LCPSCAN_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Run `npx lighthouse` instead of a globally installed `lighthouse`
    #[arg(long)]
    pub prefer_npx: bool,

    /// Path to the Lighthouse executable
    #[arg(long, value_name = "PATH", env = "LIGHTHOUSE_BIN")]
    pub lighthouse_bin: Option<String>,

    /// Chrome launch flags passed through to Lighthouse
    #[arg(long, value_name = "FLAGS", allow_hyphen_values = true)]
    pub chrome_flags: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .lcpscan.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Exit with code 2 if any URL failed on every run
    #[arg(long)]
    pub fail_on_error: bool,

    /// Compare two JSON reports (old, new) instead of measuring
    #[arg(long, num_args = 2, value_names = ["OLD", "NEW"])]
    pub compare: Option<Vec<PathBuf>>,

    /// Generate a default .lcpscan.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if let Some(ref paths) = self.compare {
            for path in paths {
                if !path.is_file() {
                    return Err(format!("Report not found: {}", path.display()));
                }
            }
            return Ok(());
        }

        if self.url.is_none() && self.urls_file.is_none() {
            return Err("Provide --url or --urls-file".to_string());
        }

        if let Some(ref url) = self.url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(ref file) = self.urls_file {
            if !file.is_file() {
                return Err(format!("URL list not found: {}", file.display()));
            }
        }

        if self.repeats == Some(0) {
            return Err("--repeats must be >= 1".to_string());
        }

        if self.concurrency == Some(0) {
            return Err("--concurrency must be >= 1".to_string());
        }

        if self.timeout_sec == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::parse_from(std::iter::once("lcpscan").chain(args.iter().copied()))
    }

    #[test]
    fn test_minimal_args() {
        let args = parse(&["--url", "https://example.com"]);
        assert_eq!(args.url.as_deref(), Some("https://example.com"));
        assert_eq!(args.repeats, None);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_requires_input() {
        assert!(parse(&[]).validate().is_err());
        assert!(parse(&["--init-config"]).validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_url() {
        assert!(parse(&["--url", "example.com"]).validate().is_err());
    }

    #[test]
    fn test_validation_zero_counts() {
        assert!(parse(&["--url", "https://a.b", "--repeats", "0"]).validate().is_err());
        assert!(parse(&["--url", "https://a.b", "--concurrency", "0"]).validate().is_err());
        assert!(parse(&["--url", "https://a.b", "--timeout-sec", "0"]).validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let args = parse(&["--url", "https://a.b", "--verbose", "--quiet"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_chrome_flags_accept_hyphen_values() {
        let args = parse(&["--url", "https://a.b", "--chrome-flags", "--headless=new"]);
        assert_eq!(args.chrome_flags.as_deref(), Some("--headless=new"));
    }

    #[test]
    fn test_compare_takes_two_paths() {
        let args = parse(&["--compare", "old.json", "new.json"]);
        assert_eq!(
            args.compare,
            Some(vec![PathBuf::from("old.json"), PathBuf::from("new.json")])
        );
    }

    #[test]
    fn test_log_level() {
        let mut args = parse(&["--url", "https://a.b"]);
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
