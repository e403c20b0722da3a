//! Error types for the compliance agent process.

use thiserror::Error;

/// Errors that stop the agent from starting or serving.
///
/// Scan and delivery failures never surface here; they are recorded on the
/// job and visible through the coordinator's status.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Configuration is invalid or missing required fields.
    #[error("config error: {0}")]
    Config(String),

    /// Control surface failed to bind or serve.
    #[error("control server error: {0}")]
    Server(String),

    /// Collector client could not be built.
    #[error("collector client error: {0}")]
    Client(#[from] compliance_core::ComplianceError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error.
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
