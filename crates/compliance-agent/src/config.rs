//! Agent configuration.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::AgentError;

/// Process-wide configuration, immutable once the agent has started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Collector base URL; reports are posted to `<base>/scans`.
    pub collector_base_url: String,

    /// Bearer token for the collector.
    pub auth_token: Option<String>,

    /// Seconds between scheduled scans; 0 disables the scheduler.
    pub scan_interval_secs: u64,

    /// Profile used by scheduled scans and by manual scans without one.
    pub default_profile: String,

    /// Control surface bind address.
    pub control_listen: IpAddr,

    /// Control surface port.
    pub control_port: u16,

    /// Delivery attempts per report, including the first.
    pub max_submission_retries: u32,

    /// Backoff before the first retry (milliseconds); doubles per attempt.
    pub retry_backoff_base_ms: u64,

    /// Upper bound for a single backoff (seconds).
    pub max_backoff_secs: u64,

    /// Random jitter as a fraction of each backoff.
    pub retry_jitter: f64,

    /// Timeout for each HTTP attempt (seconds).
    pub request_timeout_secs: u64,

    /// Ceiling for one report's whole delivery (seconds).
    pub submission_deadline_secs: u64,

    /// Hard limit on one scanner run (seconds).
    pub scan_timeout_secs: u64,

    /// Scanner executable.
    pub scanner_binary: PathBuf,

    /// Explicit SCAP datastream; auto-detected when unset.
    pub content_path: Option<PathBuf>,

    /// Directory searched first during auto-detection.
    pub content_dir: PathBuf,

    /// Where raw scanner artifacts are kept.
    pub results_dir: PathBuf,

    /// Also ask the scanner for an HTML report.
    pub html_report: bool,

    /// Deliver a flagged placeholder report when the scanner is unavailable.
    pub degraded_reports: bool,

    /// Overrides the machine-id/hostname host identifier.
    pub host_identifier: Option<String>,

    /// Default log filter (`RUST_LOG` wins when set).
    pub log_level: String,

    /// Emit JSON log lines.
    pub log_json: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            collector_base_url: String::from("http://localhost:8002"),
            auth_token: None,
            scan_interval_secs: 3600,
            default_profile: String::from("xccdf_org.ssgproject.content_profile_cis"),
            control_listen: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            control_port: 8080,
            max_submission_retries: 3,
            retry_backoff_base_ms: 1000,
            max_backoff_secs: 60,
            retry_jitter: 0.2,
            request_timeout_secs: 30,
            submission_deadline_secs: 180,
            scan_timeout_secs: 1800,
            scanner_binary: PathBuf::from("oscap"),
            content_path: None,
            content_dir: PathBuf::from("/app/content"),
            results_dir: PathBuf::from("./results"),
            html_report: true,
            degraded_reports: true,
            host_identifier: None,
            log_level: String::from("info"),
            log_json: false,
        }
    }
}

impl AgentConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Check values that would make the agent misbehave at runtime.
    pub fn validate(&self) -> crate::Result<()> {
        let url = url::Url::parse(&self.collector_base_url).map_err(|e| {
            AgentError::Config(format!(
                "invalid collector_base_url {}: {e}",
                self.collector_base_url
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AgentError::Config(format!(
                "collector_base_url must be http or https, got {}",
                url.scheme()
            )));
        }
        if self.default_profile.trim().is_empty() {
            return Err(AgentError::Config("default_profile must not be empty".into()));
        }
        if self.scan_timeout_secs == 0
            || self.request_timeout_secs == 0
            || self.submission_deadline_secs == 0
        {
            return Err(AgentError::Config("timeouts must be greater than zero".into()));
        }
        if !(0.0..=1.0).contains(&self.retry_jitter) {
            return Err(AgentError::Config("retry_jitter must be within [0, 1]".into()));
        }
        Ok(())
    }

    /// Control surface socket address.
    #[must_use]
    pub const fn control_addr(&self) -> SocketAddr {
        SocketAddr::new(self.control_listen, self.control_port)
    }

    /// Scheduler period; `None` in manual-only mode.
    #[must_use]
    pub const fn scan_interval(&self) -> Option<Duration> {
        if self.scan_interval_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.scan_interval_secs))
        }
    }

    /// Hard limit on one scanner run.
    #[must_use]
    pub const fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    /// Retry policy for the collector client.
    #[must_use]
    pub fn retry_config(&self) -> compliance_client::RetryConfig {
        compliance_client::RetryConfig::new()
            .max_attempts(self.max_submission_retries)
            .initial_backoff(Duration::from_millis(self.retry_backoff_base_ms))
            .max_backoff(Duration::from_secs(self.max_backoff_secs))
            .jitter(self.retry_jitter)
            .deadline(Duration::from_secs(self.submission_deadline_secs))
    }

    /// Build the collector client described by this config.
    pub fn collector_client(&self) -> crate::Result<compliance_client::CollectorClient> {
        Ok(
            compliance_client::CollectorClient::builder(&self.collector_base_url)
                .auth_token(self.auth_token.clone())
                .timeout(Duration::from_secs(self.request_timeout_secs))
                .retry(self.retry_config())
                .build()?,
        )
    }
}
