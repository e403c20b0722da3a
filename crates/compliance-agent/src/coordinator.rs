//! Single-flight scan coordination.
//!
//! The coordinator owns the only mutable state in the agent: the current (or
//! most recent) [`ScanJob`]. It lives in a `watch` channel so readers never
//! wait on a running scan, and admission is decided inside one
//! `send_if_modified` closure so two triggers can never both start a job.

use chrono::{DateTime, Utc};
use compliance_core::{
    JobError, JobErrorKind, JobId, JobState, ScanJob, ScanReport, ScanRequest, SubmissionAttempt,
    Summary, Trigger,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::executor::{ContentLocator, Executor, ExecutorError};
use crate::host;
use crate::submitter::Submitter;

/// State published by the coordinator.
#[derive(Debug, Clone, Default)]
pub struct CoordinatorState {
    last_id: JobId,
    /// Current or most recent job
    pub current: Option<ScanJob>,
}

impl CoordinatorState {
    /// The job holding the single-flight slot, if any
    #[must_use]
    pub fn in_flight(&self) -> Option<&ScanJob> {
        self.current.as_ref().filter(|job| job.state.is_in_flight())
    }

    /// The job with `id`, if it is the current one
    #[must_use]
    pub fn job(&self, id: JobId) -> Option<&ScanJob> {
        self.current.as_ref().filter(|job| job.id == id)
    }
}

/// Answer to a scan request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanAck {
    /// Whether a new job was created
    pub accepted: bool,
    /// The new job, or the one already in flight
    pub job_id: JobId,
    /// State of that job
    pub state: JobState,
}

/// Whether a scan currently occupies the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Busy,
}

/// Snapshot returned by [`Coordinator::status`]
#[derive(Debug, Clone, Serialize)]
pub struct AgentStatus {
    pub coordinator: Phase,
    pub job: Option<JobStatus>,
}

/// Operator view of a job
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub id: JobId,
    pub state: JobState,
    pub profile: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datastream: Option<String>,
    pub trigger: Trigger,
    pub requested_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub summary: Option<Summary>,
    pub degraded: Option<String>,
    pub raw_artifact_ref: Option<String>,
    pub last_error: Option<JobError>,
    pub attempts: Vec<SubmissionAttempt>,
}

impl From<&ScanJob> for JobStatus {
    fn from(job: &ScanJob) -> Self {
        let report = job.report.as_ref();
        Self {
            id: job.id,
            state: job.state,
            profile: job.profile.clone(),
            datastream: job.datastream.clone(),
            trigger: job.trigger,
            requested_at: job.requested_at,
            started_at: job.started_at,
            finished_at: job.finished_at,
            summary: report.map(|r| r.summary.clone()),
            degraded: report.and_then(|r| r.degraded.clone()),
            raw_artifact_ref: report.and_then(|r| r.raw_artifact_ref.clone()),
            last_error: job.error.clone(),
            attempts: job.attempts.clone(),
        }
    }
}

impl From<&CoordinatorState> for AgentStatus {
    fn from(state: &CoordinatorState) -> Self {
        Self {
            coordinator: if state.in_flight().is_some() {
                Phase::Busy
            } else {
                Phase::Idle
            },
            job: state.current.as_ref().map(JobStatus::from),
        }
    }
}

struct Inner {
    executor: Arc<dyn Executor>,
    submitter: Arc<dyn Submitter>,
    content: ContentLocator,
    host_identifier: String,
    degraded_reports: bool,
    state: watch::Sender<CoordinatorState>,
}

/// Admits scan requests and drives each accepted job through execute and
/// submit. Cheap to clone.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

impl Coordinator {
    /// Start building a coordinator around an executor and a submitter
    #[must_use]
    pub fn builder(
        executor: Arc<dyn Executor>,
        submitter: Arc<dyn Submitter>,
    ) -> CoordinatorBuilder {
        CoordinatorBuilder {
            executor,
            submitter,
            content: None,
            host_identifier: None,
            degraded_reports: true,
        }
    }

    /// Ask for a scan.
    ///
    /// Never blocks on a running scan. Must be called from within a tokio
    /// runtime because an accepted job is spawned immediately.
    pub fn request_scan(&self, request: ScanRequest) -> ScanAck {
        let trigger = request.trigger;
        let mut ack = ScanAck {
            accepted: false,
            job_id: 0,
            state: JobState::Pending,
        };

        self.inner.state.send_if_modified(|state| {
            if let Some(job) = state.in_flight() {
                ack.job_id = job.id;
                ack.state = job.state;
                return false;
            }
            state.last_id += 1;
            let job = ScanJob::new(state.last_id, request);
            ack = ScanAck {
                accepted: true,
                job_id: job.id,
                state: job.state,
            };
            state.current = Some(job);
            true
        });

        if ack.accepted {
            info!(job_id = ack.job_id, %trigger, "scan accepted");
            self.spawn_pipeline(ack.job_id);
        } else {
            debug!(
                job_id = ack.job_id,
                state = %ack.state,
                %trigger,
                "scan already in progress, request rejected"
            );
        }
        ack
    }

    /// Snapshot of the coordinator and the current job
    #[must_use]
    pub fn status(&self) -> AgentStatus {
        AgentStatus::from(&*self.inner.state.borrow())
    }

    /// Observe state changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CoordinatorState> {
        self.inner.state.subscribe()
    }

    fn spawn_pipeline(&self, id: JobId) {
        let pipeline = tokio::spawn(self.clone().run_job(id));
        let coordinator = self.clone();
        // A panicking pipeline must not hold the single-flight slot forever.
        tokio::spawn(async move {
            if let Err(e) = pipeline.await {
                error!(job_id = id, error = %e, "scan pipeline aborted");
                coordinator.update(id, |job| {
                    if job.state.is_in_flight() {
                        job.fail(
                            JobError::new(
                                JobErrorKind::ToolFailure,
                                format!("scan pipeline aborted: {e}"),
                            ),
                            Utc::now(),
                        );
                    }
                });
            }
        });
    }

    async fn run_job(self, id: JobId) {
        let Some((profile, datastream)) = self.update(id, |job| {
            job.start(Utc::now());
            (job.profile.clone(), job.datastream.clone())
        }) else {
            return;
        };
        info!(job_id = id, %profile, ?datastream, "scan started");

        let result = match self.locate_content(datastream).await {
            Ok(content) => self.inner.executor.execute(&profile, &content).await,
            Err(e) => Err(e),
        };

        let report = match result {
            Ok(report) => report,
            Err(err) if err.is_unavailable() && self.inner.degraded_reports => {
                warn!(
                    job_id = id,
                    reason = %err.detail,
                    "scanner unavailable, submitting degraded report"
                );
                ScanReport::degraded(
                    profile.as_str(),
                    self.inner.host_identifier.as_str(),
                    Utc::now(),
                    err.detail,
                )
                .with_system_info(host::system_info())
            }
            Err(err) => {
                error!(job_id = id, kind = %err.kind, detail = %err.detail, "scan failed");
                self.update(id, |job| job.fail(err.to_job_error(), Utc::now()));
                return;
            }
        };

        self.update(id, |job| job.succeed(report.clone()));

        let outcome = self.inner.submitter.submit(&report).await;
        let attempts = outcome.attempts.len();
        match &outcome.final_error {
            None => info!(job_id = id, scan_id = %report.scan_id, attempts, "report submitted"),
            Some(e) => warn!(job_id = id, attempts, error = %e, "report submission failed"),
        }
        self.update(id, |job| job.record_submission(outcome, Utc::now()));
    }

    /// Directory scans and `os-release` reads run on the blocking pool.
    async fn locate_content(&self, datastream: Option<String>) -> Result<PathBuf, ExecutorError> {
        let locator = self.inner.content.clone();
        tokio::task::spawn_blocking(move || match datastream {
            Some(name) => locator.resolve_named(&name),
            None => locator.resolve(),
        })
        .await
        .unwrap_or_else(|e| {
            Err(ExecutorError::tool_failure(format!(
                "content lookup aborted: {e}"
            )))
        })
    }

    /// Apply `f` to the job with `id` if it is still current, notifying
    /// observers.
    fn update<R>(&self, id: JobId, f: impl FnOnce(&mut ScanJob) -> R) -> Option<R> {
        let mut out = None;
        self.inner
            .state
            .send_if_modified(|state| match state.current.as_mut() {
                Some(job) if job.id == id => {
                    out = Some(f(job));
                    true
                }
                _ => false,
            });
        out
    }
}

/// Builder for [`Coordinator`]
pub struct CoordinatorBuilder {
    executor: Arc<dyn Executor>,
    submitter: Arc<dyn Submitter>,
    content: Option<ContentLocator>,
    host_identifier: Option<String>,
    degraded_reports: bool,
}

impl CoordinatorBuilder {
    /// How each scan finds its content file
    #[must_use]
    pub fn content(mut self, content: ContentLocator) -> Self {
        self.content = Some(content);
        self
    }

    /// Identifier used on degraded reports
    #[must_use]
    pub fn host_identifier(mut self, id: impl Into<String>) -> Self {
        self.host_identifier = Some(id.into());
        self
    }

    /// Submit a flagged placeholder when the scanner is unavailable
    #[must_use]
    pub const fn degraded_reports(mut self, enabled: bool) -> Self {
        self.degraded_reports = enabled;
        self
    }

    /// Build the coordinator
    #[must_use]
    pub fn build(self) -> Coordinator {
        let content = self
            .content
            .unwrap_or_else(|| ContentLocator::new(None, "/app/content"));
        let host_identifier = self
            .host_identifier
            .unwrap_or_else(|| host::host_identifier(None));
        let (state, _) = watch::channel(CoordinatorState::default());
        Coordinator {
            inner: Arc::new(Inner {
                executor: self.executor,
                submitter: self.submitter,
                content,
                host_identifier,
                degraded_reports: self.degraded_reports,
                state,
            }),
        }
    }
}
