//! OpenSCAP subprocess executor.

use async_trait::async_trait;
use chrono::Utc;
use compliance_core::ScanReport;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{parser, Executor, ExecutorError, ExecutorErrorKind};
use crate::config::AgentConfig;
use crate::host;

/// `oscap` exits 2 when evaluation finished and at least one rule failed.
const EXIT_RULES_FAILED: i32 = 2;

/// Longest stderr excerpt kept in an error message
const STDERR_EXCERPT: usize = 512;

/// Runs `oscap xccdf eval` and parses its results file.
#[derive(Debug, Clone)]
pub struct OscapExecutor {
    binary: PathBuf,
    results_dir: PathBuf,
    timeout: Duration,
    html_report: bool,
    host_identifier: String,
}

impl OscapExecutor {
    /// Create an executor using `binary`, writing artifacts to `results_dir`
    #[must_use]
    pub fn new(
        binary: impl Into<PathBuf>,
        results_dir: impl Into<PathBuf>,
        host_identifier: impl Into<String>,
    ) -> Self {
        Self {
            binary: binary.into(),
            results_dir: results_dir.into(),
            timeout: Duration::from_secs(1800),
            html_report: false,
            host_identifier: host_identifier.into(),
        }
    }

    /// Create an executor from the agent config
    #[must_use]
    pub fn from_config(config: &AgentConfig, host_identifier: impl Into<String>) -> Self {
        Self::new(&config.scanner_binary, &config.results_dir, host_identifier)
            .timeout(config.scan_timeout())
            .html_report(config.html_report)
    }

    /// Hard limit on one scanner run
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Ask the scanner for an HTML report next to the results file
    #[must_use]
    pub const fn html_report(mut self, enabled: bool) -> Self {
        self.html_report = enabled;
        self
    }

    fn command(&self, profile: &str, content: &Path, results: &Path, report: &Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("xccdf")
            .arg("eval")
            .arg("--profile")
            .arg(profile)
            .arg("--results")
            .arg(results);
        if self.html_report {
            cmd.arg("--report").arg(report);
        }
        cmd.arg(content)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Executor for OscapExecutor {
    async fn execute(
        &self,
        profile: &str,
        content_path: &Path,
    ) -> Result<ScanReport, ExecutorError> {
        if profile.trim().is_empty() {
            return Err(ExecutorError::configuration("profile must not be empty"));
        }
        match tokio::fs::metadata(content_path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                return Err(ExecutorError::configuration(format!(
                    "content path {} is not a file",
                    content_path.display()
                )))
            }
            Err(e) => {
                return Err(ExecutorError::configuration(format!(
                    "content file {} is not readable: {e}",
                    content_path.display()
                )))
            }
        }
        tokio::fs::create_dir_all(&self.results_dir)
            .await
            .map_err(|e| {
                ExecutorError::configuration(format!(
                    "cannot create results dir {}: {e}",
                    self.results_dir.display()
                ))
            })?;

        let scan_id = Uuid::new_v4();
        let results_file = self.results_dir.join(format!("results_{scan_id}.xml"));
        let report_file = self.results_dir.join(format!("report_{scan_id}.html"));

        let started_at = Utc::now();
        info!(
            %scan_id,
            profile,
            content = %content_path.display(),
            "starting scanner"
        );

        let child = self
            .command(profile, content_path, &results_file, &report_file)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => ExecutorError::unavailable(format!(
                    "scanner {} not found",
                    self.binary.display()
                )),
                ErrorKind::PermissionDenied => ExecutorError::unavailable(format!(
                    "scanner {} is not executable",
                    self.binary.display()
                )),
                _ => ExecutorError::tool_failure(format!("failed to start scanner: {e}")),
            })?;

        // Dropping the child on timeout kills the process.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ExecutorError::tool_failure(format!(
                    "failed waiting for scanner: {e}"
                )))
            }
            Err(_) => {
                warn!(%scan_id, timeout_secs = self.timeout.as_secs(), "scanner timed out");
                return Err(ExecutorError::new(
                    ExecutorErrorKind::Timeout,
                    format!("scanner exceeded {}s", self.timeout.as_secs()),
                ));
            }
        };
        let finished_at = Utc::now();

        match output.status.code() {
            Some(0 | EXIT_RULES_FAILED) => {
                debug!(%scan_id, code = ?output.status.code(), "scanner finished");
            }
            Some(code) => {
                let detail = format!(
                    "scanner exited with code {code}: {}",
                    stderr_excerpt(&output.stderr)
                );
                if is_unknown_profile(&output.stderr) {
                    warn!(%scan_id, profile, "profile not found in content");
                    return Err(ExecutorError::configuration(detail));
                }
                return Err(ExecutorError::tool_failure(detail));
            }
            None => {
                return Err(ExecutorError::tool_failure(
                    "scanner was terminated by a signal",
                ))
            }
        }

        let xml = tokio::fs::read_to_string(&results_file).await.map_err(|e| {
            ExecutorError::parse_failure(format!(
                "results file {} not readable: {e}",
                results_file.display()
            ))
        })?;
        let findings = parser::parse_results(&xml)?;

        let report = ScanReport::new(
            profile,
            self.host_identifier.clone(),
            started_at,
            finished_at,
            findings,
        )
        .with_scan_id(scan_id)
        .with_raw_artifact(results_file.display().to_string())
        .with_content(content_path.display().to_string())
        .with_system_info(host::system_info());

        info!(
            %scan_id,
            total = report.summary.total,
            pass = report.summary.pass,
            fail = report.summary.fail,
            score = ?report.summary.compliance_score,
            "scan completed"
        );
        Ok(report)
    }
}

/// `oscap` reports a profile missing from the content as
/// `No profile matching suffix "..." was found` or `Profile '...' not found`.
fn is_unknown_profile(stderr: &[u8]) -> bool {
    let text = String::from_utf8_lossy(stderr).to_lowercase();
    text.contains("no profile matching") || (text.contains("profile") && text.contains("not found"))
}

fn stderr_excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_EXCERPT {
        return text.to_string();
    }
    let mut start = text.len() - STDERR_EXCERPT;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}
