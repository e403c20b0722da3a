use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::report::ScanReport;
use super::submission::{SubmissionAttempt, SubmissionOutcome};

/// Identifier of a scan job, unique per process
pub type JobId = u64;

/// What caused a scan to be requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Fired by the periodic scheduler
    Scheduled,
    /// Requested through the control surface
    Manual,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scheduled => write!(f, "scheduled"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// A request to run one scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    /// Profile to evaluate
    pub profile: String,

    /// When the request was made
    pub requested_at: DateTime<Utc>,

    /// Who asked
    pub trigger: Trigger,

    /// Content to scan instead of the auto-detected datastream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datastream: Option<String>,
}

impl ScanRequest {
    /// Create a request stamped with the current time
    #[must_use]
    pub fn new(profile: impl Into<String>, trigger: Trigger) -> Self {
        Self {
            profile: profile.into(),
            requested_at: Utc::now(),
            trigger,
            datastream: None,
        }
    }

    /// Scan a specific datastream rather than the auto-detected one
    #[must_use]
    pub fn with_datastream(mut self, datastream: impl Into<String>) -> Self {
        self.datastream = Some(datastream.into());
        self
    }

    /// Request fired by the scheduler
    #[must_use]
    pub fn scheduled(profile: impl Into<String>) -> Self {
        Self::new(profile, Trigger::Scheduled)
    }

    /// Request made by an operator
    #[must_use]
    pub fn manual(profile: impl Into<String>) -> Self {
        Self::new(profile, Trigger::Manual)
    }
}

/// Lifecycle state of a scan job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Accepted, not started
    Pending,
    /// Scanner is running
    Running,
    /// Report produced, delivery in progress
    Succeeded,
    /// Scan did not produce a report
    Failed,
    /// Report delivered to the collector
    Submitted,
    /// Report produced but not delivered
    SubmissionFailed,
}

impl JobState {
    /// Returns true once nothing further will happen to the job
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Submitted | Self::SubmissionFailed)
    }

    /// Returns true while the job occupies the single in-flight slot
    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        !self.is_terminal()
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Submitted => "submitted",
            Self::SubmissionFailed => "submission_failed",
        };
        write!(f, "{s}")
    }
}

/// Category of a job failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobErrorKind {
    /// Bad profile or missing content file
    Configuration,
    /// Scanner binary or content bundle is absent
    ToolUnavailable,
    /// Scanner exited with an unexpected code
    ToolFailure,
    /// Scanner output could not be parsed
    ParseFailure,
    /// Scanner exceeded its time limit
    Timeout,
    /// Collector refused the report (4xx); needs investigation
    PermanentRejection,
    /// Delivery failed transiently; the next scan may succeed
    TransientSubmission,
}

/// Failure recorded on a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    /// Category
    pub kind: JobErrorKind,
    /// Human-readable detail
    pub message: String,
}

impl JobError {
    /// Create a job error
    #[must_use]
    pub fn new(kind: JobErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// The unit of work in flight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanJob {
    /// Unique job id
    pub id: JobId,

    /// Profile being evaluated
    pub profile: String,

    /// Datastream requested by the operator, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datastream: Option<String>,

    /// Who asked for the scan
    pub trigger: Trigger,

    /// When the scan was requested
    pub requested_at: DateTime<Utc>,

    /// Current lifecycle state
    pub state: JobState,

    /// Set when the scanner starts
    pub started_at: Option<DateTime<Utc>>,

    /// Set when the job reaches a terminal state
    pub finished_at: Option<DateTime<Utc>>,

    /// Present from `Succeeded` onwards
    pub report: Option<ScanReport>,

    /// Present on `Failed` and `SubmissionFailed`
    pub error: Option<JobError>,

    /// Delivery attempts for the report
    #[serde(default)]
    pub attempts: Vec<SubmissionAttempt>,
}

impl ScanJob {
    /// Create a pending job from a request
    #[must_use]
    pub fn new(id: JobId, request: ScanRequest) -> Self {
        Self {
            id,
            profile: request.profile,
            datastream: request.datastream,
            trigger: request.trigger,
            requested_at: request.requested_at,
            state: JobState::Pending,
            started_at: None,
            finished_at: None,
            report: None,
            error: None,
            attempts: Vec::new(),
        }
    }

    /// Pending -> Running
    pub fn start(&mut self, at: DateTime<Utc>) {
        self.state = JobState::Running;
        self.started_at = Some(at);
    }

    /// Running -> Succeeded, taking ownership of the report
    pub fn succeed(&mut self, report: ScanReport) {
        self.state = JobState::Succeeded;
        self.report = Some(report);
    }

    /// Running -> Failed
    pub fn fail(&mut self, error: JobError, at: DateTime<Utc>) {
        self.state = JobState::Failed;
        self.error = Some(error);
        self.finished_at = Some(at);
    }

    /// Succeeded -> Submitted | SubmissionFailed
    pub fn record_submission(&mut self, outcome: SubmissionOutcome, at: DateTime<Utc>) {
        self.attempts = outcome.attempts;
        self.finished_at = Some(at);
        if outcome.success {
            self.state = JobState::Submitted;
            self.error = None;
        } else {
            self.state = JobState::SubmissionFailed;
            let error = outcome.final_error.map_or_else(
                || JobError::new(JobErrorKind::TransientSubmission, "submission failed"),
                |e| {
                    let kind = if e.is_permanent() {
                        JobErrorKind::PermanentRejection
                    } else {
                        JobErrorKind::TransientSubmission
                    };
                    JobError::new(kind, e.to_string())
                },
            );
            self.error = Some(error);
        }
    }
}
