//! # compliance-agent
//!
//! Long-running host agent that scans the machine with OpenSCAP and reliably
//! delivers the results to a central collector.
//!
//! ## Components
//!
//! - **Executor**: runs `oscap xccdf eval` and parses the XCCDF results
//! - **Coordinator**: admits at most one scan at a time and drives it
//!   through execution and submission
//! - **Scheduler**: requests a scan every `scan_interval_secs`
//! - **Control surface**: `/health`, `/scan`, `/status` and `/scan/profiles`
//!
//! Delivery lives in the `compliance-client` crate behind the [`Submitter`]
//! trait.

pub mod cli;
pub mod config;
pub mod control;
pub mod coordinator;
pub mod error;
pub mod executor;
pub mod host;
pub mod scheduler;
pub mod submitter;

#[cfg(test)]
mod testing;

pub use cli::run;
pub use config::AgentConfig;
pub use coordinator::{AgentStatus, Coordinator, ScanAck};
pub use error::AgentError;
pub use executor::{Executor, ExecutorError, ExecutorErrorKind};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use submitter::Submitter;

/// Result type for agent startup and serving
pub type Result<T> = std::result::Result<T, AgentError>;
