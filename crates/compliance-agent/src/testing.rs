//! Test doubles shared by the coordinator, scheduler and control tests.

use async_trait::async_trait;
use chrono::Utc;
use compliance_core::{
    AttemptOutcome, Finding, JobId, JobState, RuleResult, ScanJob, ScanReport, Severity,
    SubmissionAttempt, SubmissionError, SubmissionOutcome,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::coordinator::Coordinator;
use crate::executor::{ContentLocator, Executor, ExecutorError};
use crate::submitter::Submitter;

enum Behavior {
    Report { pass: usize, fail: usize },
    Fail(ExecutorError),
    Panic,
}

/// Executor returning canned results, optionally held until released.
pub struct FakeExecutor {
    behavior: Behavior,
    gate: Option<Semaphore>,
    calls: AtomicUsize,
    last_content: Mutex<Option<PathBuf>>,
}

impl FakeExecutor {
    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            gate: None,
            calls: AtomicUsize::new(0),
            last_content: Mutex::new(None),
        }
    }

    pub fn passing(pass: usize, fail: usize) -> Self {
        Self::with_behavior(Behavior::Report { pass, fail })
    }

    pub fn failing(error: ExecutorError) -> Self {
        Self::with_behavior(Behavior::Fail(error))
    }

    /// Panics inside `execute`, as a bug in the pipeline would.
    pub fn panicking() -> Self {
        Self::with_behavior(Behavior::Panic)
    }

    /// Block each execution until [`FakeExecutor::release`] is called.
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub fn release(&self, scans: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(scans);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Content file passed to the most recent execution
    pub fn last_content(&self) -> Option<PathBuf> {
        self.last_content.lock().unwrap().clone()
    }
}

#[async_trait]
impl Executor for FakeExecutor {
    async fn execute(
        &self,
        profile: &str,
        content_path: &Path,
    ) -> Result<ScanReport, ExecutorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_content.lock().unwrap() = Some(content_path.to_path_buf());
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        match &self.behavior {
            Behavior::Report { pass, fail } => {
                let findings = (0..*pass)
                    .map(|i| Finding::new(format!("pass_{i}"), RuleResult::Pass, Severity::Low))
                    .chain((0..*fail).map(|i| {
                        Finding::new(format!("fail_{i}"), RuleResult::Fail, Severity::High)
                    }))
                    .collect();
                let now = Utc::now();
                Ok(ScanReport::new(profile, "host-1", now, now, findings))
            }
            Behavior::Fail(error) => Err(error.clone()),
            Behavior::Panic => panic!("executor bug"),
        }
    }
}

/// Submitter returning a fixed outcome.
pub struct FakeSubmitter {
    outcome: SubmissionOutcome,
    calls: AtomicUsize,
}

impl FakeSubmitter {
    pub fn accepting() -> Self {
        Self {
            outcome: SubmissionOutcome::accepted(vec![attempt(1, AttemptOutcome::Accepted, 200)]),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn rejecting(status: u16) -> Self {
        Self {
            outcome: SubmissionOutcome::failed(
                vec![attempt(1, AttemptOutcome::Rejected, status)],
                SubmissionError::Rejected {
                    status,
                    message: "rejected".into(),
                },
            ),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Submitter for FakeSubmitter {
    async fn submit(&self, _report: &ScanReport) -> SubmissionOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

fn attempt(number: u32, outcome: AttemptOutcome, status: u16) -> SubmissionAttempt {
    SubmissionAttempt {
        attempt_number: number,
        sent_at: Utc::now(),
        outcome,
        http_status: Some(status),
    }
}

pub fn coordinator(executor: Arc<dyn Executor>, submitter: Arc<dyn Submitter>) -> Coordinator {
    Coordinator::builder(executor, submitter)
        .content(ContentLocator::fixed("/fixture/ssg-test-ds.xml"))
        .host_identifier("host-1")
        .build()
}

/// Wait until job `id` satisfies `done`, returning a copy of it.
pub async fn wait_for_job(
    coordinator: &Coordinator,
    id: JobId,
    done: impl Fn(&ScanJob) -> bool,
) -> ScanJob {
    let mut rx = coordinator.subscribe();
    let wait = rx.wait_for(|state| state.job(id).is_some_and(&done));
    let state = tokio::time::timeout(Duration::from_secs(10), wait)
        .await
        .expect("timed out waiting for job")
        .expect("coordinator dropped");
    let job = state.job(id).cloned().unwrap();
    drop(state);
    job
}

pub async fn wait_for_state(coordinator: &Coordinator, id: JobId, target: JobState) -> ScanJob {
    wait_for_job(coordinator, id, |job| job.state == target).await
}

pub async fn wait_for_terminal(coordinator: &Coordinator, id: JobId) -> ScanJob {
    wait_for_job(coordinator, id, |job| job.state.is_terminal()).await
}
