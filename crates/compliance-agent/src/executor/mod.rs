//! Scan executor: runs the external scanner and normalizes its output.
//!
//! The coordinator only sees the [`Executor`] trait, so tests can swap the
//! real [`OscapExecutor`] for a double that returns canned reports.

pub mod content;
pub mod oscap;
pub mod parser;

use async_trait::async_trait;
use compliance_core::{JobError, JobErrorKind, ScanReport};
use std::path::Path;
use thiserror::Error;

pub use content::ContentLocator;
pub use oscap::OscapExecutor;

/// Category of an executor failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorErrorKind {
    /// Empty or unknown profile, unreadable content file, unusable results dir
    Configuration,
    /// Scanner binary or content bundle is missing entirely
    ToolUnavailable,
    /// Scanner exited with an unexpected code
    ToolFailure,
    /// Results artifact missing or malformed
    ParseFailure,
    /// Scanner exceeded the hard timeout
    Timeout,
}

impl std::fmt::Display for ExecutorErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Configuration => "configuration error",
            Self::ToolUnavailable => "scanner unavailable",
            Self::ToolFailure => "scanner failed",
            Self::ParseFailure => "unparsable scanner output",
            Self::Timeout => "scanner timed out",
        };
        write!(f, "{s}")
    }
}

impl From<ExecutorErrorKind> for JobErrorKind {
    fn from(kind: ExecutorErrorKind) -> Self {
        match kind {
            ExecutorErrorKind::Configuration => Self::Configuration,
            ExecutorErrorKind::ToolUnavailable => Self::ToolUnavailable,
            ExecutorErrorKind::ToolFailure => Self::ToolFailure,
            ExecutorErrorKind::ParseFailure => Self::ParseFailure,
            ExecutorErrorKind::Timeout => Self::Timeout,
        }
    }
}

/// Typed failure from a scan execution
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {detail}")]
pub struct ExecutorError {
    /// Failure category
    pub kind: ExecutorErrorKind,
    /// Human-readable detail
    pub detail: String,
}

impl ExecutorError {
    /// Create an executor error
    #[must_use]
    pub fn new(kind: ExecutorErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Configuration problem, fatal to this scan only
    #[must_use]
    pub fn configuration(detail: impl Into<String>) -> Self {
        Self::new(ExecutorErrorKind::Configuration, detail)
    }

    /// Scanner or content missing
    #[must_use]
    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self::new(ExecutorErrorKind::ToolUnavailable, detail)
    }

    /// Scanner misbehaved
    #[must_use]
    pub fn tool_failure(detail: impl Into<String>) -> Self {
        Self::new(ExecutorErrorKind::ToolFailure, detail)
    }

    /// Output could not be parsed
    #[must_use]
    pub fn parse_failure(detail: impl Into<String>) -> Self {
        Self::new(ExecutorErrorKind::ParseFailure, detail)
    }

    /// Returns true when the scanner could not run at all
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        self.kind == ExecutorErrorKind::ToolUnavailable
    }

    /// Convert into the error recorded on a job
    #[must_use]
    pub fn to_job_error(&self) -> JobError {
        JobError::new(self.kind.into(), self.detail.clone())
    }
}

/// Runs one compliance scan.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Evaluate `profile` from the content file at `content_path`.
    async fn execute(&self, profile: &str, content_path: &Path)
        -> Result<ScanReport, ExecutorError>;
}
