use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of one delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Collector answered 2xx
    Accepted,
    /// Collector answered with an error status
    Rejected,
    /// Request never got an HTTP answer
    NetworkError,
    /// Request exceeded its timeout
    Timeout,
}

/// Record of a single POST to the collector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionAttempt {
    /// 1-based attempt number
    pub attempt_number: u32,

    /// When the request was sent
    pub sent_at: DateTime<Utc>,

    /// What happened
    pub outcome: AttemptOutcome,

    /// HTTP status, when the collector answered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
}

/// Why a submission ended without the collector accepting the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubmissionError {
    /// Collector refused the report; retrying will not help
    #[error("collector rejected report ({status}): {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body or summary
        message: String,
    },

    /// Every allowed attempt failed transiently
    #[error("submission failed after all attempts: {message}")]
    RetriesExhausted {
        /// Last failure seen
        message: String,
    },

    /// The overall submission ceiling was reached
    #[error("submission deadline exceeded after {elapsed_secs}s: {message}")]
    DeadlineExceeded {
        /// Seconds spent before giving up
        elapsed_secs: u64,
        /// Last failure seen
        message: String,
    },
}

impl SubmissionError {
    /// Returns true when the collector permanently refused the report (4xx)
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Rejected { status, .. } if *status >= 400 && *status < 500)
    }
}

/// Full account of delivering one report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    /// True when the collector accepted the report
    pub success: bool,

    /// Every attempt, in order
    pub attempts: Vec<SubmissionAttempt>,

    /// Terminal failure, absent on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_error: Option<SubmissionError>,
}

impl SubmissionOutcome {
    /// Successful delivery
    #[must_use]
    pub const fn accepted(attempts: Vec<SubmissionAttempt>) -> Self {
        Self {
            success: true,
            attempts,
            final_error: None,
        }
    }

    /// Failed delivery
    #[must_use]
    pub const fn failed(attempts: Vec<SubmissionAttempt>, error: SubmissionError) -> Self {
        Self {
            success: false,
            attempts,
            final_error: Some(error),
        }
    }
}
