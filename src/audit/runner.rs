//! Lighthouse invocation.
//!
//! One call to [`TrialExecutor::run_trial`] is one trial: spawn Lighthouse,
//! wait for it under a hard timeout, read the JSON it wrote and extract
//! metrics from it.

use crate::audit::extractor::{self, Extraction};
use crate::error::TrialError;
use crate::models::{Device, Trial};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Maximum characters of tool output kept in an error message.
const MAX_ERROR_OUTPUT_CHARS: usize = 4000;

/// Maximum characters of the sanitized URL in an artifact filename.
const MAX_FILENAME_URL_CHARS: usize = 150;

/// Bytes of the URL hash kept in an artifact filename.
const URL_DIGEST_BYTES: usize = 6;

/// Runs one trial for one URL.
#[async_trait]
pub trait TrialExecutor: Send + Sync {
    /// Run a single trial. `token` distinguishes repeated trials of the same
    /// URL. Failures are reported through [`Trial::error`].
    async fn run_trial(&self, url: &str, device: Device, token: &str) -> Trial;
}

/// How to invoke Lighthouse.
#[derive(Debug, Clone)]
pub struct LighthouseConfig {
    /// Program and leading arguments, e.g. `["npx", "lighthouse"]`.
    pub command: Vec<String>,
    /// Value of `--chrome-flags`.
    pub chrome_flags: String,
    /// Wall-clock limit for one invocation.
    pub timeout: Duration,
    /// Directory receiving `.lhr.json` artifacts.
    pub output_dir: PathBuf,
}

impl LighthouseConfig {
    /// Resolve the command prefix from an explicit binary or the npx preference.
    pub fn command_for(binary: Option<&str>, prefer_npx: bool) -> Vec<String> {
        match binary {
            Some(bin) => vec![bin.to_string()],
            None if prefer_npx => vec!["npx".to_string(), "lighthouse".to_string()],
            None => vec!["lighthouse".to_string()],
        }
    }
}

/// [`TrialExecutor`] backed by the Lighthouse CLI.
pub struct LighthouseRunner {
    config: LighthouseConfig,
}

impl LighthouseRunner {
    pub fn new(config: LighthouseConfig) -> Self {
        Self { config }
    }

    fn build_command(&self, url: &str, device: Device, artifact: &Path) -> Result<Command, TrialError> {
        let (program, prefix) = self
            .config
            .command
            .split_first()
            .ok_or_else(|| TrialError::ToolNotFound(String::new()))?;

        let mut cmd = Command::new(program);
        cmd.args(prefix)
            .arg(url)
            .arg("--quiet")
            .arg("--output=json")
            .arg(format!("--output-path={}", artifact.display()))
            .arg("--only-categories=performance")
            .arg(format!("--form-factor={}", device))
            .arg(format!("--chrome-flags={}", self.config.chrome_flags))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        Ok(cmd)
    }

    async fn execute(&self, url: &str, device: Device, artifact: &Path) -> Result<Extraction, TrialError> {
        tokio::fs::create_dir_all(&self.config.output_dir)
            .await
            .map_err(|source| TrialError::OutputDir {
                path: self.config.output_dir.clone(),
                source,
            })?;

        let program = self.config.command.join(" ");
        let child = self
            .build_command(url, device, artifact)?
            .spawn()
            .map_err(|source| {
                if source.kind() == std::io::ErrorKind::NotFound {
                    TrialError::ToolNotFound(program.clone())
                } else {
                    TrialError::Spawn {
                        program: program.clone(),
                        source,
                    }
                }
            })?;

        let pid = child.id();
        let wait = child.wait_with_output();
        tokio::pin!(wait);
        // Declared after `wait` so it drops first, while the child is still
        // alive and its descendants can be found.
        let mut guard = ProcessTreeGuard::new(pid);

        let output = match tokio::time::timeout(self.config.timeout, &mut wait).await {
            Ok(result) => {
                guard.disarm();
                result.map_err(|source| TrialError::Spawn { program, source })?
            }
            Err(_) => {
                warn!("Lighthouse timed out for {} after {:?}", url, self.config.timeout);
                guard.kill();
                return Err(TrialError::Timeout(self.config.timeout));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let combined = format!("stderr:\n{}\nstdout:\n{}", stderr.trim(), stdout.trim());
            return Err(TrialError::ToolFailed {
                code: output.status.code().unwrap_or(-1),
                output: truncate_tail(&combined, MAX_ERROR_OUTPUT_CHARS),
            });
        }

        let content = tokio::fs::read_to_string(artifact)
            .await
            .map_err(|source| TrialError::ArtifactRead {
                path: artifact.to_path_buf(),
                source,
            })?;

        let lhr: serde_json::Value =
            serde_json::from_str(&content).map_err(|source| TrialError::MalformedArtifact {
                path: artifact.to_path_buf(),
                source,
            })?;

        Ok(extractor::extract(&lhr))
    }
}

#[async_trait]
impl TrialExecutor for LighthouseRunner {
    async fn run_trial(&self, url: &str, device: Device, token: &str) -> Trial {
        let artifact = artifact_path(&self.config.output_dir, url, device, token);
        debug!("Running Lighthouse for {} -> {}", url, artifact.display());

        match self.execute(url, device, &artifact).await {
            Ok(extraction) => Trial {
                url: url.to_string(),
                device,
                artifact_path: artifact,
                metrics: extraction.metrics,
                diagnostics: extraction.diagnostics,
                flags: extraction.flags,
                error: None,
            },
            Err(e) => {
                debug!("Trial {} for {} failed: {}", token, url, e);
                Trial::failed(url, device, artifact, e.to_string())
            }
        }
    }
}

/// Kills a child process and every process it started, unless disarmed.
///
/// Lighthouse runs Chrome, and `npx` runs Lighthouse, so killing only the
/// direct child would leave them running.
struct ProcessTreeGuard {
    pid: Option<u32>,
}

impl ProcessTreeGuard {
    fn new(pid: Option<u32>) -> Self {
        Self { pid }
    }

    fn disarm(&mut self) {
        self.pid = None;
    }

    fn kill(&mut self) {
        if let Some(pid) = self.pid.take() {
            kill_process_tree(pid);
        }
    }
}

impl Drop for ProcessTreeGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Kill `pid` and all of its descendants, deepest first.
pub fn kill_process_tree(pid: u32) {
    let root = sysinfo::Pid::from_u32(pid);

    let mut sys = sysinfo::System::new();
    sys.refresh_processes(sysinfo::ProcessesToUpdate::All, true);

    let mut children_map: HashMap<sysinfo::Pid, Vec<sysinfo::Pid>> = HashMap::new();
    for (p, process) in sys.processes() {
        if let Some(parent) = process.parent() {
            children_map.entry(parent).or_default().push(*p);
        }
    }

    let mut to_kill = Vec::new();
    collect_process_tree(root, &children_map, &mut to_kill);
    debug!("Killing process tree of {} ({} processes)", pid, to_kill.len());

    for pid in to_kill.into_iter().rev() {
        if let Some(process) = sys.process(pid) {
            if process.kill_with(sysinfo::Signal::Kill) != Some(true) {
                process.kill();
            }
        }
    }
}

fn collect_process_tree(
    pid: sysinfo::Pid,
    children_map: &HashMap<sysinfo::Pid, Vec<sysinfo::Pid>>,
    out: &mut Vec<sysinfo::Pid>,
) {
    out.push(pid);
    if let Some(children) = children_map.get(&pid) {
        for child in children {
            collect_process_tree(*child, children_map, out);
        }
    }
}

/// Filesystem-safe name for a URL: scheme dropped, runs of URL punctuation
/// collapsed to `_`, length capped.
pub fn sanitize_filename(url: &str) -> String {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);

    let mut out = String::with_capacity(rest.len());
    let mut in_separator = false;
    for c in rest.chars() {
        if matches!(c, '/' | ':' | '?' | '&' | '=' | '#' | '\\') {
            if !in_separator {
                out.push('_');
            }
            in_separator = true;
        } else {
            out.push(c);
            in_separator = false;
        }
    }

    out.chars().take(MAX_FILENAME_URL_CHARS).collect()
}

/// Short digest of the full URL. Sanitizing is lossy, so the digest keeps
/// distinct URLs apart.
pub fn url_digest(url: &str) -> String {
    let hash = Sha256::digest(url.as_bytes());
    hex::encode(&hash[..URL_DIGEST_BYTES])
}

/// Unique artifact path for one (URL, device, token) trial.
pub fn artifact_path(output_dir: &Path, url: &str, device: Device, token: &str) -> PathBuf {
    let token: String = token.chars().take(30).collect();
    output_dir.join(format!(
        "{}__{}__{}__{}.lhr.json",
        sanitize_filename(url),
        url_digest(url),
        device,
        token
    ))
}

/// Keep the last `max_chars` characters, where the actual error usually is.
fn truncate_tail(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let tail: String = text.chars().skip(total - max_chars).collect();
    format!("[...{} chars truncated]\n{}", total - max_chars, tail)
}
