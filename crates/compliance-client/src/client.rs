//! Collector client implementation.

use crate::config::RetryConfig;
use chrono::Utc;
use compliance_core::{
    AttemptOutcome, CollectorPayload, ComplianceError, Result, ScanReport, SubmissionAttempt,
    SubmissionError, SubmissionOutcome,
};
use reqwest::Client as HttpClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Version reported to the collector with every payload
pub const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Ingestion path on the collector
const SCANS_PATH: &str = "/scans";

/// Default per-request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the compliance collector.
///
/// Cheap to clone and holds no per-report state, so concurrent
/// submissions of different reports do not interfere.
#[derive(Clone)]
pub struct CollectorClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: HttpClient,
    base_url: String,
    auth_token: Option<String>,
    request_timeout: Duration,
    retry_config: RetryConfig,
    agent_version: String,
}

impl CollectorClient {
    /// Create a client for the given collector using default settings
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        CollectorClientBuilder::new(base_url).build()
    }

    /// Create a builder for custom configuration
    #[must_use]
    pub fn builder(base_url: impl Into<String>) -> CollectorClientBuilder {
        CollectorClientBuilder::new(base_url)
    }

    /// Collector base URL without trailing slash
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Deliver a report, retrying transient failures.
    ///
    /// Never returns an error: every failure is described by the returned
    /// [`SubmissionOutcome`].
    pub async fn submit(&self, report: &ScanReport) -> SubmissionOutcome {
        let retry = &self.inner.retry_config;
        let url = format!("{}{SCANS_PATH}", self.inner.base_url);
        let payload = CollectorPayload::new(self.inner.agent_version.clone(), report.clone());

        let started = Instant::now();
        let mut attempts = Vec::new();
        let mut last_error = String::new();

        for attempt_number in 1..=retry.max_attempts {
            let remaining = retry.deadline.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                return deadline_exceeded(attempts, started, last_error);
            }
            let timeout = self.inner.request_timeout.min(remaining);

            let sent_at = Utc::now();
            debug!(url = %url, attempt = attempt_number, scan_id = %report.scan_id, "POST report");

            match self.post_once(&url, &payload, timeout).await {
                Ok(status) => {
                    attempts.push(SubmissionAttempt {
                        attempt_number,
                        sent_at,
                        outcome: AttemptOutcome::Accepted,
                        http_status: Some(status),
                    });
                    info!(
                        scan_id = %report.scan_id,
                        attempts = attempt_number,
                        status,
                        "report accepted by collector"
                    );
                    return SubmissionOutcome::accepted(attempts);
                }
                Err(err) => {
                    attempts.push(SubmissionAttempt {
                        attempt_number,
                        sent_at,
                        outcome: attempt_outcome(&err),
                        http_status: err.status_code(),
                    });

                    if !err.is_retryable() {
                        warn!(scan_id = %report.scan_id, error = %err, "collector rejected report");
                        let status = err.status_code().unwrap_or_default();
                        return SubmissionOutcome::failed(
                            attempts,
                            SubmissionError::Rejected {
                                status,
                                message: err.to_string(),
                            },
                        );
                    }

                    last_error = err.to_string();
                    if attempt_number == retry.max_attempts {
                        break;
                    }

                    let delay = retry.delay_for(attempt_number);
                    if started.elapsed() + delay >= retry.deadline {
                        return deadline_exceeded(attempts, started, last_error);
                    }
                    warn!(
                        attempt = attempt_number,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "report delivery failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        warn!(scan_id = %report.scan_id, error = %last_error, "report delivery gave up");
        SubmissionOutcome::failed(
            attempts,
            SubmissionError::RetriesExhausted {
                message: last_error,
            },
        )
    }

    /// Check whether the collector answers its health endpoint
    pub async fn health(&self) -> bool {
        let url = format!("{}/health", self.inner.base_url);
        match self
            .inner
            .http
            .get(&url)
            .timeout(self.inner.request_timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(url = %url, error = %e, "collector health check failed");
                false
            }
        }
    }

    /// Perform one POST and classify the answer
    async fn post_once(
        &self,
        url: &str,
        payload: &CollectorPayload,
        timeout: Duration,
    ) -> Result<u16> {
        let mut request = self.inner.http.post(url).timeout(timeout).json(payload);
        if let Some(token) = &self.inner.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_transport_error(&e, timeout))?;

        let status = response.status();
        if status.is_success() {
            return Ok(status.as_u16());
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| {
                v.get("detail")
                    .or_else(|| v.get("error"))
                    .and_then(|e| e.as_str())
                    .map(String::from)
            })
            .unwrap_or(body);

        let code = status.as_u16();
        if status.is_server_error() {
            Err(ComplianceError::Server { code, message })
        } else {
            Err(ComplianceError::Rejected { code, message })
        }
    }
}

fn classify_transport_error(err: &reqwest::Error, timeout: Duration) -> ComplianceError {
    if err.is_timeout() {
        ComplianceError::Timeout(timeout.as_secs())
    } else if err.is_connect() {
        ComplianceError::Connection(err.to_string())
    } else {
        ComplianceError::Http(err.to_string())
    }
}

const fn attempt_outcome(err: &ComplianceError) -> AttemptOutcome {
    match err {
        ComplianceError::Rejected { .. } | ComplianceError::Server { .. } => {
            AttemptOutcome::Rejected
        }
        ComplianceError::Timeout(_) => AttemptOutcome::Timeout,
        _ => AttemptOutcome::NetworkError,
    }
}

fn deadline_exceeded(
    attempts: Vec<SubmissionAttempt>,
    started: Instant,
    message: String,
) -> SubmissionOutcome {
    let elapsed_secs = started.elapsed().as_secs();
    warn!(elapsed_secs, "report delivery deadline exceeded");
    SubmissionOutcome::failed(
        attempts,
        SubmissionError::DeadlineExceeded {
            elapsed_secs,
            message,
        },
    )
}

/// Builder for configuring a [`CollectorClient`]
pub struct CollectorClientBuilder {
    base_url: String,
    auth_token: Option<String>,
    timeout: Duration,
    user_agent: String,
    retry_config: RetryConfig,
    agent_version: String,
}

impl CollectorClientBuilder {
    /// Create a new builder for the given collector base URL
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("compliance-agent/{AGENT_VERSION}"),
            retry_config: RetryConfig::default(),
            agent_version: AGENT_VERSION.to_string(),
        }
    }

    /// Attach `Authorization: Bearer <token>` to every submission
    #[must_use]
    pub fn auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token.filter(|t| !t.is_empty());
        self
    }

    /// Set the per-attempt request timeout
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the User-Agent header
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Set retry configuration
    #[must_use]
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Override the agent version sent in payloads
    #[must_use]
    pub fn agent_version(mut self, version: impl Into<String>) -> Self {
        self.agent_version = version.into();
        self
    }

    /// Build the client
    pub fn build(self) -> Result<CollectorClient> {
        let parsed = url::Url::parse(&self.base_url)
            .map_err(|e| ComplianceError::InvalidUrl(format!("{}: {e}", self.base_url)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ComplianceError::InvalidUrl(format!(
                "unsupported scheme: {}",
                parsed.scheme()
            )));
        }

        let http = HttpClient::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .gzip(true)
            .build()
            .map_err(|e| ComplianceError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(CollectorClient {
            inner: Arc::new(ClientInner {
                http,
                base_url: self.base_url.trim_end_matches('/').to_string(),
                auth_token: self.auth_token,
                request_timeout: self.timeout,
                retry_config: self.retry_config,
                agent_version: self.agent_version,
            }),
        })
    }
}
