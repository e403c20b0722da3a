//! Core types for the compliance scan agent.
//!
//! This crate provides the foundational types shared by the agent crates:
//!
//! - **Jobs**: [`ScanRequest`], [`ScanJob`] and its [`JobState`] lifecycle
//! - **Reports**: [`ScanReport`], [`Finding`], [`Summary`] and the
//!   [`CollectorPayload`] sent to the collector
//! - **Deliveries**: [`SubmissionAttempt`] and [`SubmissionOutcome`]
//! - **Errors**: [`ComplianceError`] with a [`Result`] alias
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use compliance_core::{Finding, RuleResult, ScanReport, Severity};
//!
//! let now = Utc::now();
//! let report = ScanReport::new(
//!     "xccdf_org.ssgproject.content_profile_cis",
//!     "host-1",
//!     now,
//!     now,
//!     vec![
//!         Finding::new("rule_a", RuleResult::Pass, Severity::High),
//!         Finding::new("rule_b", RuleResult::Fail, Severity::Low),
//!     ],
//! );
//! assert_eq!(report.summary.compliance_score, Some(0.5));
//! ```

mod error;
pub mod types;

pub use error::{ComplianceError, Result};
pub use types::*;
