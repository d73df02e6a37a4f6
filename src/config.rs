//! Configuration file handling.
//!
//! This module handles loading `.lcpscan.toml`, merging it with command-line
//! arguments, and resolving the settings the measurement engine runs with.

use crate::audit::LighthouseConfig;
use crate::measure::MeasurePlan;
use crate::models::Device;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file name, looked up in the current directory.
pub const CONFIG_FILE: &str = ".lcpscan.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Lighthouse settings.
    #[serde(default)]
    pub audit: AuditConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Output directory for reports and Lighthouse results.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Number of URLs measured at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
            concurrency: default_concurrency(),
        }
    }
}

fn default_output() -> String {
    "lcp_output".to_string()
}

fn default_concurrency() -> usize {
    2
}

/// Lighthouse invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Form factor passed to Lighthouse.
    #[serde(default)]
    pub device: Device,

    /// Trials per URL; metrics are the median across trials.
    #[serde(default = "default_repeats")]
    pub repeats: usize,

    /// Timeout for a single Lighthouse run.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Run `npx lighthouse` instead of a global install.
    #[serde(default)]
    pub prefer_npx: bool,

    /// Explicit Lighthouse executable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lighthouse_bin: Option<String>,

    /// Chrome launch flags.
    #[serde(default = "default_chrome_flags")]
    pub chrome_flags: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            device: Device::default(),
            repeats: default_repeats(),
            timeout_seconds: default_timeout(),
            prefer_npx: false,
            lighthouse_bin: None,
            chrome_flags: default_chrome_flags(),
        }
    }
}

fn default_repeats() -> usize {
    1
}

fn default_timeout() -> u64 {
    180
}

fn default_chrome_flags() -> String {
    "--headless=new --no-sandbox --disable-gpu --disable-dev-shm-usage".to_string()
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Write `report.json`.
    #[serde(default = "default_true")]
    pub json: bool,

    /// Write `report.csv`.
    #[serde(default = "default_true")]
    pub csv: bool,

    /// Write `attribution.md`.
    #[serde(default = "default_true")]
    pub markdown: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            json: true,
            csv: true,
            markdown: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Resolved settings for one run. Recorded in the JSON report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSettings {
    pub device: Device,
    pub repeats: usize,
    pub concurrency: usize,
    pub timeout_seconds: u64,
    pub output_dir: PathBuf,
    pub prefer_npx: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lighthouse_bin: Option<String>,
    pub chrome_flags: String,
}

impl RunSettings {
    /// Directory holding the raw Lighthouse results.
    pub fn artifact_dir(&self) -> PathBuf {
        self.output_dir.join("lhr")
    }

    pub fn lighthouse_config(&self) -> LighthouseConfig {
        LighthouseConfig {
            command: LighthouseConfig::command_for(self.lighthouse_bin.as_deref(), self.prefer_npx),
            chrome_flags: self.chrome_flags.clone(),
            timeout: Duration::from_secs(self.timeout_seconds),
            output_dir: self.artifact_dir(),
        }
    }

    pub fn plan(&self, urls: Vec<String>) -> MeasurePlan {
        MeasurePlan {
            urls,
            device: self.device,
            repeats: self.repeats,
            concurrency: self.concurrency,
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }
        if args.verbose {
            self.general.verbose = true;
        }

        if let Some(device) = args.device {
            self.audit.device = device;
        }
        if let Some(repeats) = args.repeats {
            self.audit.repeats = repeats;
        }
        if let Some(timeout) = args.timeout_sec {
            self.audit.timeout_seconds = timeout;
        }
        if args.prefer_npx {
            self.audit.prefer_npx = true;
        }
        if let Some(ref bin) = args.lighthouse_bin {
            self.audit.lighthouse_bin = Some(bin.clone());
        }
        if let Some(ref flags) = args.chrome_flags {
            self.audit.chrome_flags = flags.clone();
        }
    }

    /// Log level after merging: `--quiet` wins, then `verbose` from either
    /// the config file or `--verbose`.
    pub fn log_level(&self, args: &crate::cli::Args) -> tracing::Level {
        if !args.quiet && self.general.verbose {
            tracing::Level::DEBUG
        } else {
            args.log_level()
        }
    }

    /// Resolve the settings the engine runs with.
    pub fn settings(&self) -> RunSettings {
        RunSettings {
            device: self.audit.device,
            repeats: self.audit.repeats,
            concurrency: self.general.concurrency,
            timeout_seconds: self.audit.timeout_seconds,
            output_dir: PathBuf::from(&self.general.output),
            prefer_npx: self.audit.prefer_npx,
            lighthouse_bin: self.audit.lighthouse_bin.clone(),
            chrome_flags: self.audit.chrome_flags.clone(),
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
