//! HTTP client for the compliance collector.
//!
//! This crate provides [`CollectorClient`], which delivers a
//! [`ScanReport`](compliance_core::ScanReport) to the collector's ingestion
//! endpoint with bounded retries, exponential backoff and jitter.

mod client;
mod config;

pub use client::{CollectorClient, CollectorClientBuilder, AGENT_VERSION};
pub use config::*;
pub use compliance_core::{ComplianceError, Result};
