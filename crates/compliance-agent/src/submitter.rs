//! Report delivery seam.

use async_trait::async_trait;
use compliance_client::CollectorClient;
use compliance_core::{ScanReport, SubmissionOutcome};

/// Delivers a finished report to the collector.
///
/// Implementations own their retry policy and always return an outcome;
/// failures are described by it rather than raised.
#[async_trait]
pub trait Submitter: Send + Sync {
    /// Deliver `report`, retrying transient failures.
    async fn submit(&self, report: &ScanReport) -> SubmissionOutcome;
}

#[async_trait]
impl Submitter for CollectorClient {
    async fn submit(&self, report: &ScanReport) -> SubmissionOutcome {
        Self::submit(self, report).await
    }
}
